pub mod menu;

use std::path::PathBuf;
use tokio::fs::{self, File};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::core::domain::{Command, FileListing, Filename};
use crate::core::error::{TransferError, TransferResult};
use crate::protocol::{TextCodec, WireCodec};

pub use menu::{Console, MenuExit, run_menu};

/// A client's connection to a server together with its local directories.
///
/// Operations fail individually; once one of them loses the transport the
/// session reports itself disconnected and refuses further requests.
pub struct ClientSession<C> {
    codec: C,
    /// Files to upload are read from here
    upload_dir: PathBuf,
    /// Downloaded files are written here
    download_dir: PathBuf,
    connected: bool,
}

impl ClientSession<TextCodec<TcpStream>> {
    /// Connect to a server at `address` (`host:port`)
    pub async fn connect(
        address: &str,
        upload_dir: impl Into<PathBuf>,
        download_dir: impl Into<PathBuf>,
    ) -> TransferResult<Self> {
        let stream = TcpStream::connect(address)
            .await
            .map_err(TransferError::Connection)?;
        info!("Connected to the server {}", address);
        Ok(Self::new(TextCodec::new(stream), upload_dir, download_dir))
    }
}

impl<C: WireCodec> ClientSession<C> {
    pub fn new(codec: C, upload_dir: impl Into<PathBuf>, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            codec,
            upload_dir: upload_dir.into(),
            download_dir: download_dir.into(),
            connected: true,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Send a file from the upload directory. The local file is read
    /// before anything goes on the wire, so a missing file leaves the
    /// session untouched. Returns the number of bytes sent.
    pub async fn upload(&mut self, name: &str) -> TransferResult<u64> {
        self.ensure_connected()?;
        let name = Filename::new(name)?;

        let path = self.upload_dir.join(name.as_str());
        let content = fs::read(&path)
            .await
            .map_err(|e| TransferError::filesystem(&path, e))?;

        let result = self.send_upload(&name, &content).await;
        self.observe(result)?;
        info!("Uploaded {} ({} bytes)", name, content.len());
        Ok(content.len() as u64)
    }

    /// Names of the files on the server
    pub async fn list(&mut self) -> TransferResult<FileListing> {
        self.ensure_connected()?;
        let result = self.request_listing().await;
        self.observe(result)
    }

    /// Fetch a file into the download directory. Returns the number of
    /// bytes written.
    pub async fn download(&mut self, name: &str) -> TransferResult<u64> {
        self.ensure_connected()?;
        let name = Filename::new(name)?;

        let result = self.fetch(&name).await;
        let written = self.observe(result)?;
        info!("Downloaded {} ({} bytes)", name, written);
        Ok(written)
    }

    /// Tell the server we are leaving and close the transport
    pub async fn exit(&mut self) -> TransferResult<()> {
        if !self.connected {
            return Ok(());
        }
        self.connected = false;
        self.codec.write_command(Command::Exit).await?;
        // The server may already have hung up after reading the command
        if let Err(e) = self.codec.shutdown().await {
            debug!("Shutdown after exit failed: {}", e);
        }
        Ok(())
    }

    async fn send_upload(&mut self, name: &Filename, content: &[u8]) -> TransferResult<()> {
        self.codec.write_command(Command::Upload).await?;
        self.codec.write_filename(name).await?;
        self.codec.write_payload(content).await
    }

    async fn request_listing(&mut self) -> TransferResult<FileListing> {
        self.codec.write_command(Command::List).await?;
        self.codec.read_listing().await
    }

    async fn fetch(&mut self, name: &Filename) -> TransferResult<u64> {
        self.codec.write_command(Command::Download).await?;
        self.codec.write_filename(name).await?;

        // The server closes without a length line when it cannot serve the
        // file, so nothing is created locally until one arrives.
        let len = self.codec.read_length().await?;
        debug!("Server announced {} bytes for {}", len, name);

        let path = self.download_dir.join(name.as_str());
        let mut file = match File::create(&path).await {
            Ok(file) => file,
            Err(e) => {
                // Keep the stream aligned for the next request
                self.codec.copy_exact(len, &mut tokio::io::sink()).await?;
                return Err(TransferError::filesystem(path, e));
            }
        };

        match self.codec.copy_exact(len, &mut file).await {
            Ok(written) => Ok(written),
            Err(e) => {
                drop(file);
                if let Err(cleanup) = fs::remove_file(&path).await {
                    warn!("Could not remove partial download {}: {}", path.display(), cleanup);
                }
                match e {
                    TransferError::LocalWrite(source) => {
                        // Unknown how much of the payload is still in flight
                        self.connected = false;
                        Err(TransferError::filesystem(path, source))
                    }
                    other => Err(other),
                }
            }
        }
    }

    fn ensure_connected(&self) -> TransferResult<()> {
        if self.connected {
            Ok(())
        } else {
            Err(TransferError::ConnectionClosed)
        }
    }

    fn observe<T>(&mut self, result: TransferResult<T>) -> TransferResult<T> {
        if let Err(e) = &result {
            if e.is_connection_lost() {
                warn!("Lost connection to the server: {}", e);
                self.connected = false;
            }
        }
        result
    }
}
