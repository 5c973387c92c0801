use async_trait::async_trait;
use std::cmp;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};

use super::{CHUNK_SIZE, LINE_TERMINATOR, MAX_LINE_LENGTH};
use crate::core::domain::{Command, FileListing, Filename};
use crate::core::error::{TransferError, TransferResult};

/// Framing used by both ends of a session.
///
/// Implementors supply the four transport primitives; the request-level
/// operations are built on top of them, so swapping the framing never
/// touches session logic.
#[async_trait]
pub trait WireCodec: Send {
    /// Read one line, without its terminator
    async fn read_line(&mut self) -> TransferResult<String>;

    /// Write `line` followed by the terminator
    async fn write_line(&mut self, line: &str) -> TransferResult<()>;

    /// Read exactly `len` bytes
    async fn read_exact(&mut self, len: u64) -> TransferResult<Vec<u8>>;

    /// Write every byte of `bytes`
    async fn write_all(&mut self, bytes: &[u8]) -> TransferResult<()>;

    /// Stream exactly `len` bytes from the transport into `sink`
    async fn copy_exact<W>(&mut self, len: u64, sink: &mut W) -> TransferResult<u64>
    where
        W: AsyncWrite + Unpin + Send;

    /// Close the write half of the transport
    async fn shutdown(&mut self) -> TransferResult<()>;

    async fn read_command(&mut self) -> TransferResult<Command> {
        let token = self.read_line().await?;
        token.parse()
    }

    async fn write_command(&mut self, command: Command) -> TransferResult<()> {
        self.write_line(command.token()).await
    }

    async fn read_filename(&mut self) -> TransferResult<Filename> {
        let name = self.read_line().await?;
        Filename::new(name)
    }

    async fn write_filename(&mut self, name: &Filename) -> TransferResult<()> {
        self.write_line(name.as_str()).await
    }

    async fn read_length(&mut self) -> TransferResult<u64> {
        let line = self.read_line().await?;
        parse_length(&line)
    }

    async fn write_length(&mut self, len: u64) -> TransferResult<()> {
        self.write_line(&len.to_string()).await
    }

    async fn read_listing(&mut self) -> TransferResult<FileListing> {
        let line = self.read_line().await?;
        Ok(FileListing::decode(&line))
    }

    async fn write_listing(&mut self, listing: &FileListing) -> TransferResult<()> {
        self.write_line(&listing.encode()).await
    }

    /// Length line followed by the raw payload
    async fn write_payload(&mut self, payload: &[u8]) -> TransferResult<()> {
        self.write_length(payload.len() as u64).await?;
        self.write_all(payload).await
    }
}

/// Parse a decimal payload length. Only ASCII digits are accepted.
pub fn parse_length(line: &str) -> TransferResult<u64> {
    if line.is_empty() || !line.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TransferError::parse("length", line));
    }
    line.parse::<u64>()
        .map_err(|_| TransferError::parse("length", line))
}

/// Newline-delimited text framing over any byte stream
pub struct TextCodec<S> {
    stream: BufReader<S>,
}

impl<S> TextCodec<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream: BufReader::with_capacity(CHUNK_SIZE, stream),
        }
    }

    pub fn into_inner(self) -> S {
        self.stream.into_inner()
    }
}

#[async_trait]
impl<S> WireCodec for TextCodec<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn read_line(&mut self) -> TransferResult<String> {
        let mut line = Vec::new();
        let read = (&mut self.stream)
            .take(MAX_LINE_LENGTH as u64 + 1)
            .read_until(LINE_TERMINATOR, &mut line)
            .await?;

        if read == 0 {
            return Err(TransferError::ConnectionClosed);
        }
        if line.last() != Some(&LINE_TERMINATOR) {
            if line.len() > MAX_LINE_LENGTH {
                return Err(TransferError::parse(
                    "line",
                    format!("longer than {} bytes", MAX_LINE_LENGTH),
                ));
            }
            // Peer closed mid-line
            return Err(TransferError::ConnectionClosed);
        }

        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }

        String::from_utf8(line)
            .map_err(|e| TransferError::parse("line", String::from_utf8_lossy(e.as_bytes())))
    }

    async fn write_line(&mut self, line: &str) -> TransferResult<()> {
        let mut bytes = Vec::with_capacity(line.len() + 1);
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(LINE_TERMINATOR);
        self.write_all(&bytes).await
    }

    async fn read_exact(&mut self, len: u64) -> TransferResult<Vec<u8>> {
        let mut payload = Vec::with_capacity(cmp::min(len, CHUNK_SIZE as u64) as usize);
        let received = (&mut self.stream).take(len).read_to_end(&mut payload).await? as u64;
        if received < len {
            return Err(TransferError::ShortTransfer {
                expected: len,
                received,
            });
        }
        Ok(payload)
    }

    async fn write_all(&mut self, bytes: &[u8]) -> TransferResult<()> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn copy_exact<W>(&mut self, len: u64, sink: &mut W) -> TransferResult<u64>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let mut chunk = vec![0u8; cmp::min(len, CHUNK_SIZE as u64) as usize];
        let mut received = 0u64;

        while received < len {
            let want = cmp::min(len - received, chunk.len() as u64) as usize;
            let n = self.stream.read(&mut chunk[..want]).await?;
            if n == 0 {
                return Err(TransferError::ShortTransfer {
                    expected: len,
                    received,
                });
            }
            sink.write_all(&chunk[..n])
                .await
                .map_err(TransferError::LocalWrite)?;
            received += n as u64;
        }

        sink.flush().await.map_err(TransferError::LocalWrite)?;
        Ok(received)
    }

    async fn shutdown(&mut self) -> TransferResult<()> {
        self.stream.shutdown().await?;
        Ok(())
    }
}
