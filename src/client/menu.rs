use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout};
use tracing::{error, info};

use super::ClientSession;
use crate::core::domain::Command;
use crate::protocol::WireCodec;
use crate::utils::format_size;

/// How the interactive menu ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuExit {
    /// The user chose to exit
    UserExit,
    /// The server went away
    ConnectionLost,
    /// Console input reached end of file
    InputClosed,
}

/// Line-based console the menu talks through
pub struct Console<R, W> {
    input: R,
    output: W,
}

impl Console<BufReader<Stdin>, Stdout> {
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> Console<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Print a line
    pub async fn say(&mut self, text: &str) -> io::Result<()> {
        self.output.write_all(text.as_bytes()).await?;
        self.output.write_all(b"\n").await?;
        self.output.flush().await
    }

    /// Print `text` without a newline and read the trimmed answer.
    /// `None` once input is exhausted.
    pub async fn prompt(&mut self, text: &str) -> io::Result<Option<String>> {
        self.output.write_all(text.as_bytes()).await?;
        self.output.flush().await?;

        let mut answer = String::new();
        if self.input.read_line(&mut answer).await? == 0 {
            return Ok(None);
        }
        Ok(Some(answer.trim().to_string()))
    }

    pub fn into_output(self) -> W {
        self.output
    }
}

/// Present the command menu until the user exits, input runs out or the
/// server goes away. Failed operations are reported and the loop goes on.
pub async fn run_menu<C, R, W>(
    session: &mut ClientSession<C>,
    console: &mut Console<R, W>,
) -> io::Result<MenuExit>
where
    C: WireCodec,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    loop {
        if !session.is_connected() {
            console.say("Connection is closed by the server").await?;
            return Ok(MenuExit::ConnectionLost);
        }

        for command in Command::ALL {
            console
                .say(&format!("{}. {}", command.token(), command.label()))
                .await?;
        }
        console.say("").await?;

        let Some(choice) = console.prompt("Enter your choice: ").await? else {
            return leave(session, MenuExit::InputClosed).await;
        };

        match choice.parse::<Command>() {
            Ok(Command::Upload) => {
                let Some(name) = console.prompt("Enter the file name: ").await? else {
                    return leave(session, MenuExit::InputClosed).await;
                };
                match session.upload(&name).await {
                    Ok(size) => {
                        console
                            .say(&format!("File is uploaded to the server ({})", format_size(size)))
                            .await?
                    }
                    Err(e) => console.say(&format!("Error uploading file: {}", e)).await?,
                }
            }
            Ok(Command::List) => match session.list().await {
                Ok(listing) if listing.is_empty() => console.say("No files on the server").await?,
                Ok(listing) => {
                    console.say("Files in the server:").await?;
                    for (idx, name) in listing.iter().enumerate() {
                        console.say(&format!("{} {}", idx + 1, name)).await?;
                    }
                }
                Err(e) => console.say(&format!("Error reading file names: {}", e)).await?,
            },
            Ok(Command::Download) => {
                let Some(name) = console.prompt("Enter the file name: ").await? else {
                    return leave(session, MenuExit::InputClosed).await;
                };
                match session.download(&name).await {
                    Ok(size) => {
                        console
                            .say(&format!("File is downloaded from the server ({})", format_size(size)))
                            .await?
                    }
                    Err(e) => console.say(&format!("Error downloading file: {}", e)).await?,
                }
            }
            Ok(Command::Exit) => return leave(session, MenuExit::UserExit).await,
            Err(_) => console.say("Invalid choice").await?,
        }

        console.say("").await?;
    }
}

async fn leave<C: WireCodec>(session: &mut ClientSession<C>, reason: MenuExit) -> io::Result<MenuExit> {
    match session.exit().await {
        Ok(()) => info!("Left the session: {:?}", reason),
        Err(e) => error!("Error closing the session: {}", e),
    }
    Ok(reason)
}
