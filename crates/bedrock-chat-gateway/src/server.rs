use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use bedrock_chat_common::{Error, Result};
use bedrock_chat_config::AppConfig;
use tokio::net::TcpListener;
use tracing::info;

use crate::dispatch::ChatDispatcher;
use crate::router::build_router;
use crate::state::{AppState, SharedState};

pub struct GatewayServer {
    state: SharedState,
}

impl GatewayServer {
    pub fn new(config: AppConfig, dispatcher: ChatDispatcher) -> Self {
        Self {
            state: Arc::new(AppState::new(config, dispatcher)),
        }
    }

    pub fn router(&self) -> Router {
        build_router(Arc::clone(&self.state))
    }

    pub fn addr(&self) -> String {
        let gateway = &self.state.config.gateway;
        format!("{}:{}", gateway.host, gateway.port)
    }

    /// Bind the configured address and serve until Ctrl-C.
    pub async fn run(self) -> Result<()> {
        let listener = TcpListener::bind(self.addr()).await?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    /// In-flight requests are allowed to finish.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local: SocketAddr = listener.local_addr()?;
        info!(
            "bedrock-chat gateway listening on http://{} (mode: {})",
            local,
            self.state.dispatcher.invoker().mode()
        );

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(Error::Io)?;

        info!("gateway stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown signal received");
    }
}
