pub mod codec;

pub use codec::{TextCodec, WireCodec, parse_length};

// Protocol constants
pub const DEFAULT_PORT: u16 = 8080;
pub const LINE_TERMINATOR: u8 = b'\n';

/// Upper bound on a single command, filename or length line
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Buffer size for payload copies
pub const CHUNK_SIZE: usize = 64 * 1024; // 64KB chunks
