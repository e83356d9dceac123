//! Process configuration (spec §6 "CLI / process surface").
//!
//! Mirrors the teacher crate's `clap`-derived `ServerConfig`: every knob is
//! also settable via an environment variable so the relay can be
//! configured the same way whether it's launched by hand or by a process
//! supervisor.

use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "rendez-relay", about = "Peer-discovery and rendezvous relay")]
pub struct RelayConfig {
    /// Address to listen on. `PORT` (if set) overrides the port of
    /// whatever host this is given; the default matches spec §6 (8080).
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    pub listen_addr: String,

    /// Emit JSON logs instead of human-readable ones.
    #[arg(long, env = "RELAY_LOG_JSON", default_value_t = false)]
    pub log_json: bool,
}

impl RelayConfig {
    /// Apply the conventional `PORT` override (Heroku/Fly/most PaaS set
    /// this) on top of whatever `--listen-addr` resolved to.
    pub fn resolve(mut self) -> Self {
        if let Ok(port) = std::env::var("PORT") {
            let host = self
                .listen_addr
                .rsplit_once(':')
                .map(|(host, _)| host)
                .unwrap_or("0.0.0.0");
            self.listen_addr = format!("{host}:{port}");
        }
        self
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            log_json: false,
        }
    }
}
