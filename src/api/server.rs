//! API Server
//!
//! Wires the router, middleware stack and graceful shutdown around an engine.

use super::{
    handlers::AppState,
    middleware::{create_cors_layer, request_id_middleware},
    routes::create_router,
};
use crate::{
    config::ApiConfig,
    errors::{ConfigError, RuletaResult},
    games::WagerEngine,
};
use axum::http::HeaderName;
use std::{net::SocketAddr, sync::Arc};
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{info, warn};

/// HTTP front end for the wager engine
pub struct ApiServer {
    config: ApiConfig,
    engine: WagerEngine,
}

impl ApiServer {
    pub fn new(config: ApiConfig, engine: WagerEngine) -> Self {
        Self { config, engine }
    }

    /// Bind and serve until Ctrl+C or SIGTERM
    pub async fn run(self) -> RuletaResult<()> {
        let app = self.create_app()?;
        let addr = self.socket_addr()?;

        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!(%addr, "Ruleta API listening");
        self.log_server_info();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("API server stopped gracefully");
        Ok(())
    }

    /// Router with the full middleware stack
    pub fn create_app(&self) -> RuletaResult<axum::Router> {
        let user_id_header = HeaderName::from_bytes(self.config.user_id_header.as_bytes())
            .map_err(|e| ConfigError::InvalidValue {
                field: "api.user_id_header".to_string(),
                value: self.config.user_id_header.clone(),
                reason: e.to_string(),
            })?;

        let state = Arc::new(AppState {
            engine: self.engine.clone(),
            user_id_header,
            version: env!("CARGO_PKG_VERSION").to_string(),
        });

        // Outermost layer first
        Ok(create_router(state).layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(self.config.request_timeout()))
                .layer(create_cors_layer(self.config.allowed_origins.clone()))
                .layer(axum::middleware::from_fn(request_id_middleware)),
        ))
    }

    fn socket_addr(&self) -> RuletaResult<SocketAddr> {
        let ip = self
            .config
            .host
            .parse::<std::net::IpAddr>()
            .map_err(|e| ConfigError::InvalidValue {
                field: "api.host".to_string(),
                value: self.config.host.clone(),
                reason: e.to_string(),
            })?;
        Ok(SocketAddr::from((ip, self.config.port)))
    }

    fn log_server_info(&self) {
        let limits = &self.engine.config().table_limits;
        info!(
            cors = ?self.config.allowed_origins,
            timeout_secs = self.config.request_timeout_secs,
            user_id_header = %self.config.user_id_header,
            min_bet = limits.min_bet,
            max_bet = limits.max_bet,
            "Server configuration"
        );
        info!("   POST /api/spin               - Place a bet slip and spin");
        info!("   POST /api/deposit            - Deposit funds");
        info!("   POST /api/withdraw           - Withdraw funds");
        info!("   POST /api/accounts           - Open an account");
        info!("   GET  /api/account            - Current balance");
        info!("   GET  /api/ledger             - Ledger history");
        info!("   GET  /api/ledger/:id         - Ledger entry");
        info!("   GET  /health                 - Health check");
    }
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }
}
