//! Pure key-set algebra (spec §4.1). No I/O, no failure modes — every
//! function here is a plain value transform, which is what makes the
//! matcher (`introduction.rs`) and rendezvous table safe to reason about
//! independently of their concurrency.

use std::collections::HashSet;

use crate::ids::Key;

/// `(current ∪ join) \ leave`. If a key appears in both `join` and
/// `leave`, `leave` wins — it is filtered after the union, not before.
pub fn apply_join_leave(current: &HashSet<Key>, join: &[Key], leave: &[Key]) -> HashSet<Key> {
    let mut result: HashSet<Key> = current.clone();
    result.extend(join.iter().cloned());
    for key in leave {
        result.remove(key);
    }
    result
}

/// Duplicate-free intersection. Order is unspecified but stable within a
/// single call (iteration order of `a`).
pub fn intersect(a: &HashSet<Key>, b: &HashSet<Key>) -> Vec<Key> {
    a.iter().filter(|k| b.contains(*k)).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(keys: &[&str]) -> HashSet<Key> {
        keys.iter().map(|k| Key::from(*k)).collect()
    }

    #[test]
    fn join_adds_keys() {
        let current = set(&["doc1"]);
        let result = apply_join_leave(&current, &[Key::from("doc2")], &[]);
        assert_eq!(result, set(&["doc1", "doc2"]));
    }

    #[test]
    fn leave_removes_keys() {
        let current = set(&["doc1", "doc2"]);
        let result = apply_join_leave(&current, &[], &[Key::from("doc1")]);
        assert_eq!(result, set(&["doc2"]));
    }

    #[test]
    fn leave_wins_over_join_for_same_key() {
        let current = set(&[]);
        let result = apply_join_leave(
            &current,
            &[Key::from("doc1")],
            &[Key::from("doc1")],
        );
        assert_eq!(result, set(&[]));
    }

    #[test]
    fn result_has_no_duplicates() {
        let current = set(&["doc1"]);
        let result = apply_join_leave(&current, &[Key::from("doc1"), Key::from("doc1")], &[]);
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn intersect_finds_common_keys() {
        let a = set(&["doc1", "doc2"]);
        let b = set(&["doc2", "doc3"]);
        let mut common = intersect(&a, &b);
        common.sort_by(|x, y| x.as_str().cmp(y.as_str()));
        assert_eq!(common, vec![Key::from("doc2")]);
    }

    #[test]
    fn intersect_empty_when_disjoint() {
        let a = set(&["doc1"]);
        let b = set(&["doc2"]);
        assert!(intersect(&a, &b).is_empty());
    }
}
