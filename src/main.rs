use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};

// Added for tracing file logging
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use fileshare::client::{ClientSession, Console, MenuExit, run_menu};
use fileshare::infrastructure::config::{AppConfig, ClientConfig, ServerConfig};
use fileshare::server::FileServer;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Optional JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory for log files
    #[arg(long, global = true)]
    log_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve files from a directory
    Server {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Address to bind to
        #[arg(long)]
        bind: Option<String>,

        /// Directory uploaded files are stored in
        #[arg(short, long)]
        dir: Option<String>,
    },
    /// Connect to a server and open the interactive menu
    Client {
        /// Server address (host:port); prompted for when omitted
        #[arg(short, long)]
        address: Option<String>,

        /// Directory files are uploaded from
        #[arg(long)]
        uploads: Option<String>,

        /// Directory downloads are written to
        #[arg(long)]
        downloads: Option<String>,
    },
}

// Returns a WorkerGuard that must be kept alive for logs to be written
fn init_logging(log_dir: &str, log_file_prefix: &str, console: bool) -> anyhow::Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir))?;

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_prefix);
    let (non_blocking_appender, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_appender)
        .with_ansi(false); // Don't use ANSI codes in files

    // The client menu owns the terminal, so only the server logs to it
    let console_layer = console.then(|| fmt::layer().with_writer(std::io::stdout));

    // Use RUST_LOG env var, default to info
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}

async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let server = FileServer::bind(&config).await?;
    let addr = server.local_addr()?;
    info!("Storing files in {}", server.store().root().display());
    println!("✅ Server is running at {}", addr);

    server
        .serve_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;
    Ok(())
}

async fn run_client(config: ClientConfig) -> anyhow::Result<()> {
    config
        .ensure_directories()
        .context("Failed to create the client directories")?;

    let mut console = Console::stdio();
    let address = match config.server_address.clone() {
        Some(address) => address,
        None => console
            .prompt("Enter the server address, e.g. 127.0.0.1:8080: ")
            .await?
            .unwrap_or_default(),
    };

    console
        .say(&format!("Connecting to the server {} ...", address))
        .await?;
    let mut session = match ClientSession::connect(
        &address,
        config.upload_dir_path(),
        config.download_dir_path(),
    )
    .await
    {
        Ok(session) => session,
        Err(e) => {
            console
                .say(&format!("Error connecting to the server: {}", e))
                .await?;
            return Err(e).with_context(|| format!("Could not connect to {}", address));
        }
    };

    console
        .say(&format!("✅ Connected to the server {}", address))
        .await?;
    console
        .say("You can now upload, list, and download files")
        .await?;
    console.say("").await?;

    let exit = run_menu(&mut session, &mut console).await?;
    info!("Client finished: {:?}", exit);
    if exit == MenuExit::UserExit {
        console.say("Goodbye").await?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    if let Some(log_dir) = cli.log_dir {
        config.log_directory = log_dir;
    }

    match cli.command {
        Commands::Server { port, bind, dir } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(bind) = bind {
                config.server.bind_address = bind;
            }
            if let Some(dir) = dir {
                config.server.store_directory = dir;
            }
            config.validate()?;

            // This guard needs to stay in scope, otherwise logs stop writing.
            let _guard = init_logging(&config.log_directory, "fileshare_server", true)?;
            run_server(config.server).await
        }
        Commands::Client {
            address,
            uploads,
            downloads,
        } => {
            if address.is_some() {
                config.client.server_address = address;
            }
            if let Some(uploads) = uploads {
                config.client.upload_directory = uploads;
            }
            if let Some(downloads) = downloads {
                config.client.download_directory = downloads;
            }
            config.validate()?;

            let _guard = init_logging(&config.log_directory, "fileshare_client", false)?;
            run_client(config.client).await
        }
    }
}
