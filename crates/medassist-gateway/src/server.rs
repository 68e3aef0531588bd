use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;

use medassist_core::RagOrchestrator;
use medassist_core::config::GatewayConfig;
use medassist_llm::router::RouterProvider;
use tokio::sync::watch;

use crate::error::GatewayError;
use crate::router::build_router;

pub(crate) type SharedOrchestrator = Arc<RagOrchestrator<RouterProvider>>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub orchestrator: SharedOrchestrator,
    pub default_namespace: Arc<str>,
    pub started_at: Instant,
}

/// Serves `/v1/ask` and `/health` over one shared orchestrator.
pub struct GatewayServer {
    addr: SocketAddr,
    settings: GatewayConfig,
    default_namespace: String,
    orchestrator: SharedOrchestrator,
    shutdown_rx: watch::Receiver<bool>,
}

fn resolve_addr(bind: &str, port: u16) -> SocketAddr {
    match bind.parse::<IpAddr>() {
        Ok(ip) => {
            if ip.is_unspecified() {
                tracing::warn!(%ip, "gateway reachable from other hosts");
            }
            SocketAddr::new(ip, port)
        }
        Err(e) => {
            tracing::warn!(bind, error = %e, "invalid gateway bind address, using loopback");
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
        }
    }
}

impl GatewayServer {
    #[must_use]
    pub fn new(
        settings: &GatewayConfig,
        orchestrator: SharedOrchestrator,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        if settings.auth_token.is_none() {
            tracing::warn!("gateway auth token not set, /v1/ask is open");
        }
        Self {
            addr: resolve_addr(&settings.bind, settings.port),
            settings: settings.clone(),
            default_namespace: "hospital-docs".into(),
            orchestrator,
            shutdown_rx,
        }
    }

    /// Namespace searched when a request does not name one.
    #[must_use]
    pub fn with_default_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.default_namespace = namespace.into();
        self
    }

    /// Bind and serve until `true` is sent on the shutdown channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot bind or the server fails.
    pub async fn serve(self) -> Result<(), GatewayError> {
        let state = AppState {
            orchestrator: self.orchestrator,
            default_namespace: Arc::from(self.default_namespace),
            started_at: Instant::now(),
        };
        let router = build_router(
            state,
            self.settings.auth_token.as_deref(),
            self.settings.rate_limit,
            self.settings.max_body_size,
        );

        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| GatewayError::Bind(self.addr.to_string(), e))?;
        tracing::info!(addr = %self.addr, "gateway listening");

        let mut shutdown_rx = self.shutdown_rx;
        let shutdown = async move {
            let sender_dropped = shutdown_rx.wait_for(|stop| *stop).await.is_err();
            if sender_dropped {
                std::future::pending::<()>().await;
            }
            tracing::info!("gateway shutting down");
        };

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| GatewayError::Server(e.to_string()))
    }
}
