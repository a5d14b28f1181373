//! HTTP and WebSocket server.

use std::future::Future;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::error::RelayError;
use crate::routes;
use crate::state::Relay;
use crate::ws::{spawn_sweep, ws_handler};

/// Builds the application router.
///
/// The socket endpoint is mounted at both `/` and `/ws`.
pub fn router(relay: Relay) -> Router {
    Router::new()
        .route("/", get(ws_handler))
        .route("/ws", get(ws_handler))
        .route("/notify", post(routes::notify))
        .route("/broadcast", post(routes::broadcast))
        .route("/health", get(routes::health))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(relay)
}

/// Relay server.
#[derive(Debug, Clone)]
pub struct Server {
    relay: Relay,
}

impl Server {
    /// Creates a server around a relay.
    #[must_use]
    pub const fn new(relay: Relay) -> Self {
        Self { relay }
    }

    /// Returns the relay.
    #[must_use]
    pub const fn relay(&self) -> &Relay {
        &self.relay
    }

    /// Binds the configured address and serves until Ctrl-C or SIGTERM.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the address
    /// cannot be bound.
    pub async fn run(self) -> Result<(), RelayError> {
        self.relay.config().validate()?;

        let addr = self.relay.config().bind_addr();
        let listener = TcpListener::bind(&addr).await?;
        info!("Relay listening on {}", addr);

        self.serve_with_shutdown(listener, shutdown_signal()).await
    }

    /// Serves on an already bound listener until the process ends.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or serving fails.
    pub async fn serve(self, listener: TcpListener) -> Result<(), RelayError> {
        self.serve_with_shutdown(listener, std::future::pending()).await
    }

    /// Serves on an already bound listener until `signal` resolves.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or serving fails.
    pub async fn serve_with_shutdown<F>(self, listener: TcpListener, signal: F) -> Result<(), RelayError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.relay.config().validate()?;
        if self.relay.identity().is_trusting() {
            warn!("RELAY_JWT_SECRET is not set; socket identities are taken from the userId parameter unverified");
        }

        let sweep = spawn_sweep(self.relay.clone(), self.relay.config().sweep_interval());
        let app = router(self.relay);

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(signal)
            .await;

        sweep.abort();
        info!("Relay stopped");
        result.map_err(RelayError::from)
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
