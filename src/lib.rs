pub mod client;
pub mod core;
pub mod infrastructure;
pub mod protocol;
pub mod server;
pub mod utils;

// Re-export key types for easier access in integration tests
pub use crate::core::{Command, FileListing, Filename, TransferError, TransferResult};
pub use client::ClientSession;
pub use infrastructure::{AppConfig, DirectoryStore};
pub use server::FileServer;
