//! Server wiring: shared state, the listener, and process lifecycle
//! (spec §5/§6, C10). Mirrors the teacher's `Server::run` — bind first so
//! a bind failure surfaces immediately, then serve until a shutdown
//! signal arrives.

use std::sync::Arc;

use crate::config::RelayConfig;
use crate::connections::ConnectionTracker;
use crate::error::RelayError;
use crate::registry::PeerRegistry;
use crate::rendezvous::RendezvousTable;

/// State shared by every connection task.
pub struct AppState {
    pub registry: PeerRegistry,
    pub rendezvous: Arc<RendezvousTable>,
    /// Sessions that have already been paired and spliced — neither the
    /// registry nor the rendezvous table tracks these any more, so
    /// shutdown needs its own handle to force them closed (spec §5).
    pub connections: Arc<ConnectionTracker>,
}

pub struct Server {
    config: RelayConfig,
}

impl Server {
    pub fn new(config: RelayConfig) -> Self {
        Self { config }
    }

    /// Run the server, blocking until a shutdown signal is received.
    /// Returns `Ok(())` on clean shutdown, `Err` on bind failure — the
    /// caller maps that to the process's non-zero exit (spec §6).
    pub async fn run(self) -> Result<(), RelayError> {
        let (_, handle) = self.spawn().await?;
        handle.await.expect("server task panicked")
    }

    /// Bind and start serving in a background task, returning the address
    /// actually bound (useful when `listen_addr` ends in `:0`) and a
    /// handle that resolves once the server has shut down. Lets tests spin
    /// up a real listener on an ephemeral port.
    pub async fn spawn(
        self,
    ) -> Result<(std::net::SocketAddr, tokio::task::JoinHandle<Result<(), RelayError>>), RelayError>
    {
        let listener = tokio::net::TcpListener::bind(&self.config.listen_addr)
            .await
            .map_err(|source| RelayError::Bind {
                addr: self.config.listen_addr.clone(),
                source,
            })?;
        let addr = listener.local_addr().map_err(|source| RelayError::Bind {
            addr: self.config.listen_addr.clone(),
            source,
        })?;
        tracing::info!(%addr, "rendez-relay listening");

        let state = Arc::new(AppState {
            registry: PeerRegistry::new(),
            rendezvous: Arc::new(RendezvousTable::new()),
            connections: Arc::new(ConnectionTracker::new()),
        });
        let router = crate::transport::router(Arc::clone(&state));
        let shutdown_state = Arc::clone(&state);

        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal(shutdown_state))
                .await?;
            tracing::info!("rendez-relay shut down cleanly");
            Ok(())
        });

        Ok((addr, handle))
    }
}

/// Stop accepting new connections and forcibly close every open client
/// transport (spec §5 "Cancellation / timeouts" — no graceful in-flight
/// drain is required). Registered introduction peers, half-open
/// rendezvous slots, and already-spliced bridge sessions are all told to
/// close; axum's graceful shutdown then waits for their connection tasks
/// to actually finish unwinding.
async fn shutdown_signal(state: Arc<AppState>) {
    wait_for_signal().await;
    tracing::info!(
        peers = state.registry.len(),
        slots = state.rendezvous.len(),
        bridges = state.connections.len(),
        "shutting down: closing all client transports"
    );
    state.registry.close_all();
    state.rendezvous.close_all();
    state.connections.close_all();
}

async fn wait_for_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received SIGINT, shutting down..."),
        _ = terminate => tracing::info!("received SIGTERM, shutting down..."),
    }
}
