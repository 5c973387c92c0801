use anyhow::Result;
use fileshare::client::ClientSession;
use fileshare::core::{Command, FileListing, TransferError};
use fileshare::protocol::{TextCodec, WireCodec};
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tokio::io::DuplexStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(10);

type ServerCodec = TextCodec<DuplexStream>;

// Connect a client session to a scripted server running `script`
fn scripted_session<F, Fut>(
    download_dir: &Path,
    script: F,
) -> (ClientSession<TextCodec<DuplexStream>>, JoinHandle<Result<()>>)
where
    F: FnOnce(ServerCodec) -> Fut,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let (client, server) = tokio::io::duplex(64 * 1024);
    let handle = tokio::spawn(script(TextCodec::new(server)));
    let session = ClientSession::new(TextCodec::new(client), download_dir, download_dir);
    (session, handle)
}

async fn expect_download_request(codec: &mut ServerCodec, name: &str) -> Result<()> {
    assert_eq!(codec.read_command().await?, Command::Download);
    assert_eq!(codec.read_filename().await?.as_str(), name);
    Ok(())
}

async fn answer_list(codec: &mut ServerCodec, names: &[&str]) -> Result<()> {
    assert_eq!(codec.read_command().await?, Command::List);
    let listing = FileListing::new(names.iter().map(|name| name.to_string()).collect());
    codec.write_listing(&listing).await?;
    Ok(())
}

#[tokio::test]
async fn test_malformed_download_length_keeps_session_usable() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let (mut session, server) = scripted_session(temp.path(), |mut codec| async move {
        expect_download_request(&mut codec, "x.txt").await?;
        codec.write_line("abc").await?;
        answer_list(&mut codec, &["x.txt"]).await
    });

    let result = timeout(WAIT, session.download("x.txt")).await?;
    assert!(matches!(
        result,
        Err(TransferError::Parse { field: "length", ref value }) if value == "abc"
    ));
    assert!(session.is_connected());
    assert!(!temp.path().join("x.txt").exists());

    let listing = timeout(WAIT, session.list()).await??;
    assert_eq!(listing.names, vec!["x.txt"]);
    timeout(WAIT, server).await???;
    Ok(())
}

#[tokio::test]
async fn test_short_download_leaves_no_local_file() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let (mut session, server) = scripted_session(temp.path(), |mut codec| async move {
        expect_download_request(&mut codec, "partial.bin").await?;
        // Announce ten bytes, send three, hang up
        codec.write_all(b"10\nabc").await?;
        Ok::<_, anyhow::Error>(())
    });

    let err = timeout(WAIT, session.download("partial.bin"))
        .await?
        .unwrap_err();
    assert!(matches!(
        err,
        TransferError::ShortTransfer { expected: 10, received: 3 }
    ));
    assert!(err.to_string().contains("Incomplete transfer"));
    assert!(!temp.path().join("partial.bin").exists());
    assert!(!session.is_connected());
    assert!(matches!(session.list().await, Err(TransferError::ConnectionClosed)));
    timeout(WAIT, server).await???;
    Ok(())
}

#[tokio::test]
async fn test_unwritable_download_drains_payload() -> Result<()> {
    let temp = tempfile::tempdir()?;
    // Never created, so the local file cannot be opened
    let missing_dir = temp.path().join("missing");
    let (mut session, server) = scripted_session(&missing_dir, |mut codec| async move {
        expect_download_request(&mut codec, "a.txt").await?;
        codec.write_payload(b"hello").await?;
        answer_list(&mut codec, &["a.txt"]).await
    });

    let result = timeout(WAIT, session.download("a.txt")).await?;
    assert!(matches!(result, Err(TransferError::Filesystem { .. })));
    assert!(session.is_connected());

    // The payload was consumed, so the next reply lines up
    let listing = timeout(WAIT, session.list()).await??;
    assert_eq!(listing.names, vec!["a.txt"]);
    timeout(WAIT, server).await???;
    Ok(())
}
