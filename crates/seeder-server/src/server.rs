use std::sync::Arc;

use seeder_node::{Node, NodeHandle, StructuralVerifier};
use seeder_peer::HttpTransport;
use seeder_store::{open_store, KeyValueStore};
use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::router::build_router;

/// Seeder HTTP server: owns the node and its background workers.
pub struct SeederServer {
    config: ServerConfig,
}

impl SeederServer {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Open the configured store and assemble a node over it.
    pub async fn build_node(&self) -> ServerResult<Arc<Node>> {
        let store = open_store(&self.config.store).await?;
        let transport = HttpTransport::new(self.config.node.request_timeout())?;
        Ok(Arc::new(Node::new(
            store,
            Arc::new(transport),
            Arc::new(StructuralVerifier),
            self.config.node.clone(),
        )))
    }

    /// Start the node and serve requests until Ctrl-C.
    pub async fn serve(self) -> ServerResult<()> {
        let node = self.build_node().await?;
        let handle = node.start().await?;
        let app = build_router(Arc::clone(&node), self.config.max_body_bytes);

        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, store = node.store().kind(), "seeder listening");
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ServerError::Internal(e.to_string()));

        stop(handle, node.store()).await;
        served
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

async fn stop(handle: NodeHandle, store: &Arc<dyn KeyValueStore>) {
    handle.shutdown().await;
    if let Err(e) = store.close().await {
        tracing::warn!(error = %e, "store did not close cleanly");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seeder_store::StoreConfig;

    #[test]
    fn server_construction() {
        let server = SeederServer::new(ServerConfig::default());
        assert_eq!(server.config().bind_addr, "127.0.0.1:1984".parse().unwrap());
    }

    #[tokio::test]
    async fn node_builds_on_memory_store() {
        let config = ServerConfig {
            store: StoreConfig::memory(),
            ..ServerConfig::default()
        };
        let node = SeederServer::new(config).build_node().await.unwrap();
        assert_eq!(node.store().kind(), "memory");
        assert_eq!(node.ranking().peers()[0], "https://arweave.net");
    }
}
