//! Main proxy server implementation.
//!
//! Accepts Postgres wire connections, caps how many are served at once and
//! gives each one its own handler set and session.

use crate::error::ProxyError;
use crate::handler::GatewayServerHandlers;
use sqlward_core::ProxyConfig;
use sqlward_session::SessionServices;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;

/// The sqlward wire front end.
pub struct GatewayProxy {
    config: Arc<ProxyConfig>,
    services: Arc<SessionServices>,
    connections: Arc<Semaphore>,
}

impl GatewayProxy {
    pub fn new(config: ProxyConfig, services: Arc<SessionServices>) -> Self {
        let connections = Arc::new(Semaphore::new(config.max_connections as usize));
        Self {
            config: Arc::new(config),
            services,
            connections,
        }
    }

    /// Get a reference to the proxy configuration.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Bind to `proxy.listen_addr:listen_port` and serve until the task is
    /// dropped.
    pub async fn run(&self) -> Result<(), ProxyError> {
        let listen_addr = self.config.bind_address();
        let listener = TcpListener::bind(&listen_addr)
            .await
            .map_err(|e| ProxyError::BindFailed {
                address: listen_addr.clone(),
                source: e,
            })?;

        tracing::info!(
            address = %listen_addr,
            max_connections = self.config.max_connections,
            "Proxy server listening"
        );
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ProxyError> {
        loop {
            let (socket, peer_addr) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::error!(error = %ProxyError::AcceptFailed(e), "Failed to accept connection");
                    continue;
                }
            };

            let Ok(permit) = self.connections.clone().try_acquire_owned() else {
                tracing::warn!(
                    peer = %peer_addr,
                    max_connections = self.config.max_connections,
                    "Connection limit reached, closing connection"
                );
                drop(socket);
                continue;
            };

            tracing::debug!(peer = %peer_addr, "New connection");
            let handlers = Arc::new(GatewayServerHandlers::new(
                self.config.clone(),
                self.services.clone(),
            ));

            tokio::spawn(async move {
                if let Err(e) = pgwire::tokio::process_socket(socket, None, handlers).await {
                    tracing::error!(peer = %peer_addr, error = ?e, "Connection error");
                }
                drop(permit);
                tracing::debug!(peer = %peer_addr, "Connection closed");
            });
        }
    }
}
