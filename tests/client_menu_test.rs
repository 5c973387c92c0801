use anyhow::Result;
use fileshare::client::{ClientSession, Console, MenuExit, run_menu};
use fileshare::infrastructure::DirectoryStore;
use fileshare::protocol::TextCodec;
use fileshare::server::{ServerSession, SessionOutcome};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::DuplexStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(10);

struct MenuRun {
    exit: MenuExit,
    output: String,
    outcome: SessionOutcome,
}

// Drive the menu with scripted console input against an in-memory server
async fn run_script(temp: &TempDir, script: &str) -> Result<MenuRun> {
    let store = Arc::new(DirectoryStore::open(temp.path().join("assets")).await?);
    let upload_dir = temp.path().join("uploads");
    let download_dir = temp.path().join("downloads");
    std::fs::create_dir_all(&upload_dir)?;
    std::fs::create_dir_all(&download_dir)?;

    let (client, server) = tokio::io::duplex(64 * 1024);
    let server: JoinHandle<SessionOutcome> =
        tokio::spawn(ServerSession::new(TextCodec::new(server), store).run());
    let mut session: ClientSession<TextCodec<DuplexStream>> =
        ClientSession::new(TextCodec::new(client), upload_dir, download_dir);

    let mut console = Console::new(Cursor::new(script.as_bytes().to_vec()), Vec::new());
    let exit = timeout(WAIT, run_menu(&mut session, &mut console)).await??;
    drop(session);

    let outcome = timeout(WAIT, server).await??;
    let output = String::from_utf8(console.into_output())?;
    Ok(MenuRun { exit, output, outcome })
}

#[tokio::test]
async fn test_menu_full_walkthrough() -> Result<()> {
    let temp = tempfile::tempdir()?;
    std::fs::create_dir_all(temp.path().join("uploads"))?;
    std::fs::write(temp.path().join("uploads").join("report.txt"), b"hello")?;

    let run = run_script(&temp, "2\n1\nreport.txt\n2\n3\nreport.txt\n4\n").await?;

    assert_eq!(run.exit, MenuExit::UserExit);
    assert!(matches!(run.outcome, SessionOutcome::ClientExit));
    assert!(run.output.contains("1. Upload a file"));
    assert!(run.output.contains("4. Exit"));
    assert!(run.output.contains("No files on the server"));
    assert!(run.output.contains("File is uploaded to the server (5 B)"));
    assert!(run.output.contains("1 report.txt"));
    assert!(run.output.contains("File is downloaded from the server (5 B)"));
    assert_eq!(
        std::fs::read(temp.path().join("downloads").join("report.txt"))?,
        b"hello"
    );
    Ok(())
}

#[tokio::test]
async fn test_menu_invalid_choice_continues() -> Result<()> {
    let temp = tempfile::tempdir()?;

    let run = run_script(&temp, "7\nhello\n4\n").await?;

    assert_eq!(run.exit, MenuExit::UserExit);
    assert_eq!(run.output.matches("Invalid choice").count(), 2);
    Ok(())
}

#[tokio::test]
async fn test_menu_upload_error_keeps_going() -> Result<()> {
    let temp = tempfile::tempdir()?;

    let run = run_script(&temp, "1\nnot-there.txt\n2\n4\n").await?;

    assert_eq!(run.exit, MenuExit::UserExit);
    assert!(run.output.contains("Error uploading file"));
    assert!(run.output.contains("No files on the server"));
    assert!(matches!(run.outcome, SessionOutcome::ClientExit));
    Ok(())
}

#[tokio::test]
async fn test_menu_detects_lost_connection() -> Result<()> {
    let temp = tempfile::tempdir()?;

    // The server drops the session when asked for a missing file
    let run = run_script(&temp, "3\nmissing.txt\n2\n").await?;

    assert_eq!(run.exit, MenuExit::ConnectionLost);
    assert!(run.output.contains("Error downloading file"));
    assert!(run.output.contains("Connection is closed by the server"));
    assert!(!run.output.contains("No files on the server"));
    assert!(!temp.path().join("downloads").join("missing.txt").exists());
    Ok(())
}

#[tokio::test]
async fn test_menu_input_eof_exits_cleanly() -> Result<()> {
    let temp = tempfile::tempdir()?;

    let run = run_script(&temp, "").await?;

    assert_eq!(run.exit, MenuExit::InputClosed);
    assert!(matches!(run.outcome, SessionOutcome::ClientExit));
    Ok(())
}
