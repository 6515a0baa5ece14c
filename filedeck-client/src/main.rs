//! filedeck CLI
//!
//! Lists, uploads, renames and deletes files on a filedeck server.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use bytes::Bytes;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use filedeck_client::{ApiClient, FileListController};
use filedeck_common::facts::FactKind;
use filedeck_common::record::FileRecord;

#[derive(Parser, Debug)]
#[command(name = "filedeck", version, about)]
struct Cli {
    /// filedeck server URL.
    #[arg(
        long,
        env = "FILEDECK_SERVER",
        default_value = "http://localhost:3000",
        global = true
    )]
    server: String,

    /// Output format.
    #[arg(long, default_value = "text", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List stored files.
    List,
    /// Upload a local file.
    Upload { path: PathBuf },
    /// Rename a stored file. The old extension is kept when `name` has none.
    Rename { url: String, name: String },
    /// Delete a stored file.
    Delete { url: String },
    /// Fetch a random fact (cat, advice, chuck, dog, affirmation, kanye).
    Fact { kind: FactKind },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let client = ApiClient::new(&cli.server)?;

    match cli.command {
        Command::List => list(&client, &cli.format).await,
        Command::Upload { path } => upload(client, &path, &cli.format).await,
        Command::Rename { url, name } => rename(client, &url, &name, &cli.format).await,
        Command::Delete { url } => delete(client, &url).await,
        Command::Fact { kind } => fact(&client, kind, &cli.format).await,
    }
}

async fn list(client: &ApiClient, format: &OutputFormat) -> anyhow::Result<()> {
    let items = client.list_views().await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&items)?),
        OutputFormat::Text => {
            if items.is_empty() {
                println!("No files.");
            }
            for item in &items {
                println!("{}\t{}", item.pathname, item.url);
            }
        }
    }
    Ok(())
}

async fn upload(client: ApiClient, path: &Path, format: &OutputFormat) -> anyhow::Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .with_context(|| format!("{} has no file name", path.display()))?;
    let content = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let controller = FileListController::new(client);
    let record = controller.upload(&file_name, Bytes::from(content)).await?;
    print_record(&record, format)?;
    warn_if_stale(&controller);
    Ok(())
}

async fn rename(client: ApiClient, url: &str, name: &str, format: &OutputFormat) -> anyhow::Result<()> {
    let controller = FileListController::new(client);
    let record = controller.rename(url, name).await?;
    print_record(&record, format)?;
    warn_if_stale(&controller);
    Ok(())
}

async fn delete(client: ApiClient, url: &str) -> anyhow::Result<()> {
    let controller = FileListController::new(client);
    controller.delete(url).await?;
    if controller.files().iter().any(|f| f.url == url) {
        bail!("{} is still listed after delete", url);
    }
    println!("Deleted {}", url);
    Ok(())
}

async fn fact(client: &ApiClient, kind: FactKind, format: &OutputFormat) -> anyhow::Result<()> {
    let resp = client.fact(kind).await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&resp)?),
        OutputFormat::Text => println!("{}", resp.fact),
    }
    Ok(())
}

fn print_record(record: &FileRecord, format: &OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(record)?),
        OutputFormat::Text => println!("{}\t{}", record.pathname, record.url),
    }
    Ok(())
}

fn warn_if_stale(controller: &FileListController<ApiClient>) {
    if controller.is_stale() {
        if let Some(message) = controller.last_error() {
            eprintln!("warning: {}", message);
        }
    }
}
