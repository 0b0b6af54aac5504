//! Proxy server module
//!
//! This module implements the accept loop. The relay serves one source at a
//! time: every accepted connection supersedes the live session, which is torn
//! down completely before the new one starts. A session whose source goes
//! away is torn down as soon as that is noticed.

use std::future::Future;
use std::sync::Arc;

use log::{debug, error, info};
use tokio::net::TcpListener;

use crate::common::{bind_listener, configure_stream, Result};
use crate::config::ProxyConfig;
use crate::crypto::RsaDecryptor;
use crate::retry::RetryScheduler;
use super::session::{RelayContext, Session};

/// Proxy server structure
///
/// Accepts source connections and relays their frames to the destination.
pub struct Proxy {
    /// Relay configuration (wrapped in Arc for sharing with sessions)
    config: Arc<ProxyConfig>,
    /// Reply decryptor, kept only when it holds a key
    decryptor: Option<Arc<RsaDecryptor>>,
}

impl Proxy {
    /// Create a new proxy instance
    ///
    /// # Parameters
    ///
    /// * `config` - Relay configuration
    /// * `decryptor` - Reply decryptor; ignored unless a key is loaded
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use std::sync::Arc;
    /// # use retry_relay::Proxy;
    /// # use retry_relay::config::ProxyConfig;
    /// let mut config = ProxyConfig::default();
    /// config.destination_host = "127.0.0.1".to_string();
    /// let proxy = Proxy::new(Arc::new(config), None);
    /// ```
    pub fn new(config: Arc<ProxyConfig>, decryptor: Option<RsaDecryptor>) -> Self {
        let decryptor = decryptor
            .filter(RsaDecryptor::is_enabled)
            .map(Arc::new);

        Self { config, decryptor }
    }

    /// Relay configuration
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Whether replies are decrypted before delivery
    pub fn decrypts_replies(&self) -> bool {
        self.decryptor.is_some()
    }

    /// Start the proxy service
    ///
    /// Binds the configured port and serves until Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::Bind`](crate::common::ProxyError::Bind) if the
    /// port is unavailable.
    pub async fn run(&self) -> Result<()> {
        let listener = bind_listener(&self.config.listen_host, self.config.source_port)?;

        self.serve(listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Accept connections on `listener` until `shutdown` completes
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        match listener.local_addr() {
            Ok(addr) => info!("Proxy service started, listening on {}", addr),
            Err(_) => info!("Proxy service started"),
        }

        let (scheduler, worker) = RetryScheduler::spawn();
        let context = Arc::new(RelayContext {
            config: Arc::clone(&self.config),
            decryptor: self.decryptor.clone(),
            scheduler,
        });

        let mut current: Option<Arc<Session>> = None;
        let mut next_id = 0u64;

        tokio::pin!(shutdown);

        loop {
            let live = current.clone();
            let session_ended = async move {
                match live {
                    Some(session) => session.closed().await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, closing the proxy");
                    break;
                }
                _ = session_ended => {
                    if let Some(session) = current.take() {
                        info!("Session #{} ended, releasing its connections", session.id());
                        session.close().await;
                    }
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        info!("Accepted connection from {}", peer);

                        if let Some(previous) = current.take() {
                            info!("Superseding session #{} ({})", previous.id(), previous.peer());
                            previous.close().await;
                        }

                        configure_stream(&stream);
                        next_id += 1;
                        let session = Session::start(next_id, stream, peer, Arc::clone(&context)).await;
                        debug!("Session #{} started", session.id());
                        current = Some(session);
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                    }
                }
            }
        }

        if let Some(session) = current.take() {
            session.close().await;
        }

        // Queued jobs may still hold the context; they would only abort
        worker.abort();
        debug!("Proxy service stopped");

        Ok(())
    }
}
