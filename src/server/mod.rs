pub mod session;

use anyhow::Context;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tracing::{Instrument, error, info, info_span};

use crate::infrastructure::config::ServerConfig;
use crate::infrastructure::store::DirectoryStore;
use crate::protocol::TextCodec;
use crate::utils;

pub use session::{ServerSession, SessionOutcome};

/// TCP front end for a [`DirectoryStore`]
pub struct FileServer {
    listener: TcpListener,
    store: Arc<DirectoryStore>,
}

impl FileServer {
    /// Open the store directory and bind the listener
    pub async fn bind(config: &ServerConfig) -> anyhow::Result<Self> {
        let store = DirectoryStore::open(config.store_dir_path())
            .await
            .context("Failed to prepare the store directory")?;

        let addr = config.socket_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to listen on {}", addr))?;

        Ok(Self {
            listener,
            store: Arc::new(store),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn store(&self) -> Arc<DirectoryStore> {
        Arc::clone(&self.store)
    }

    /// Accept connections forever
    pub async fn serve(self) {
        self.serve_until(std::future::pending()).await
    }

    /// Accept connections until `shutdown` resolves. Sessions already
    /// running are left to finish on their own.
    pub async fn serve_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Server is shutting down");
                    return;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        self.spawn_session(stream, peer);
                    }
                    Err(e) => error!("Error accepting connection: {}", e),
                }
            }
        }
    }

    fn spawn_session(&self, stream: TcpStream, peer: SocketAddr) {
        let store = self.store();
        let span = info_span!("session", id = %utils::generate_id(), %peer);

        tokio::spawn(
            async move {
                info!("Connected to the client");
                let outcome = handle_connection(stream, store).await;
                info!("Session closed: {:?}", outcome);
            }
            .instrument(span),
        );
    }
}

/// Run a full session over an accepted TCP stream
pub async fn handle_connection(stream: TcpStream, store: Arc<DirectoryStore>) -> SessionOutcome {
    ServerSession::new(TextCodec::new(stream), store).run().await
}
