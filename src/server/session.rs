use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::core::domain::Command;
use crate::core::error::{TransferError, TransferResult};
use crate::infrastructure::store::DirectoryStore;
use crate::protocol::WireCodec;
use crate::utils::format_size;

/// Why a server session ended
#[derive(Debug)]
pub enum SessionOutcome {
    /// The client sent the exit command
    ClientExit,
    /// The client closed the connection between commands
    Disconnected,
    /// The first line of a request was not a known command
    UnknownCommand(String),
    /// A request failed part-way through
    Failed(TransferError),
}

/// One accepted connection, served until exit or the first error
pub struct ServerSession<C> {
    codec: C,
    store: Arc<DirectoryStore>,
}

impl<C: WireCodec> ServerSession<C> {
    pub fn new(codec: C, store: Arc<DirectoryStore>) -> Self {
        Self { codec, store }
    }

    /// Serve requests until the session closes. The transport is dropped
    /// with the session.
    pub async fn run(mut self) -> SessionOutcome {
        loop {
            let command = match self.codec.read_command().await {
                Ok(command) => command,
                Err(TransferError::ConnectionClosed) => {
                    info!("Client disconnected");
                    return SessionOutcome::Disconnected;
                }
                Err(TransferError::UnknownCommand(token)) => {
                    warn!("Invalid option {:?}, closing session", token);
                    return SessionOutcome::UnknownCommand(token);
                }
                Err(e) => {
                    error!("Error reading option: {}", e);
                    return SessionOutcome::Failed(e);
                }
            };
            debug!("Received {} command", command);

            let result = match command {
                Command::Upload => self.handle_upload().await,
                Command::List => self.handle_list().await,
                Command::Download => self.handle_download().await,
                Command::Exit => {
                    info!("Client requested to exit");
                    return SessionOutcome::ClientExit;
                }
            };

            if let Err(e) = result {
                error!("Error handling {}: {}", command, e);
                return SessionOutcome::Failed(e);
            }
        }
    }

    async fn handle_upload(&mut self) -> TransferResult<()> {
        let name = self.codec.read_filename().await?;
        let len = self.codec.read_length().await?;
        info!("Receiving file {} ({})", name, format_size(len));

        let _guard = self.store.lock_exclusive(&name).await;
        let (staging, mut file) = self.store.stage().await?;

        let result = self.codec.copy_exact(len, &mut file).await;
        drop(file);
        match result {
            Ok(_) => {
                self.store.commit(&staging, &name).await?;
                info!("File {} is added to the store", name);
                Ok(())
            }
            Err(e) => {
                if let Err(cleanup) = self.store.discard(&staging).await {
                    warn!("Could not remove partial upload: {}", cleanup);
                }
                Err(match e {
                    TransferError::LocalWrite(source) => TransferError::filesystem(staging, source),
                    other => other,
                })
            }
        }
    }

    async fn handle_list(&mut self) -> TransferResult<()> {
        let listing = self.store.list().await?;
        self.codec.write_listing(&listing).await?;
        info!("Sent {} file names", listing.len());
        Ok(())
    }

    async fn handle_download(&mut self) -> TransferResult<()> {
        let name = self.codec.read_filename().await?;
        debug!("Download requested for {}", name);

        let _guard = self.store.lock_shared(&name).await;
        let content = self.store.read(&name).await?;
        self.codec.write_payload(&content).await?;

        info!("File {} is sent to the client ({})", name, format_size(content.len() as u64));
        Ok(())
    }
}
