use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

mod app;
mod backend;
mod config;
mod events;
mod schema;
mod store;
mod ui;

use app::App;
use backend::BackendClient;
use config::Config;
use store::{ChatRole, ConversationStore};

#[derive(Parser)]
#[command(name = "sqlpilot")]
#[command(version = "0.1.0")]
#[command(about = "Terminal chat client for a natural-language-to-SQL backend", long_about = None)]
struct Cli {
    /// Override the backend base URL
    #[arg(long)]
    backend_url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the saved chat history
    History,
    /// Clear the saved chat history
    ClearHistory,
    /// Fetch and print the current schema
    Schema,
}

fn init_logging(config: &Config) -> Result<()> {
    // Logs go to a file; stderr belongs to the TUI.
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(config.log_path())
        .context("Failed to open log file")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .init();

    Ok(())
}

fn print_history(config: &Config) {
    let store = ConversationStore::open(config.history_path());
    if store.is_empty() {
        println!("No chat history yet. Run 'sqlpilot' to start a conversation!");
        return;
    }

    for turn in store.load_all() {
        let who = match turn.role {
            ChatRole::User => "you",
            ChatRole::Assistant => "sql",
        };
        println!("[{}] {}:", turn.timestamp.format("%Y-%m-%d %H:%M:%S"), who);
        for line in turn.content.lines() {
            println!("    {line}");
        }
    }
}

fn clear_history(config: &Config) -> Result<()> {
    let mut store = ConversationStore::open(config.history_path());
    if store.is_empty() {
        println!("Chat history is already empty.");
        return Ok(());
    }

    print!("Clear {} saved chat turns? [y/N] ", store.len());
    std::io::stdout().flush().ok();
    let mut answer = String::new();
    std::io::stdin()
        .read_line(&mut answer)
        .context("Failed to read confirmation")?;

    if answer.trim().eq_ignore_ascii_case("y") {
        store.clear()?;
        println!("Chat history cleared.");
    } else {
        println!("Aborted.");
    }

    Ok(())
}

async fn print_schema(config: &Config) {
    let client = BackendClient::new(config.backend_url.clone());
    let (tables, offline) = client.fetch_schema().await;
    if offline {
        println!("(backend not reachable; showing the default schema)\n");
    }
    for table in tables {
        println!("{}({})", table.name, table.columns.join(", "));
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(url) = cli.backend_url {
        config.backend_url = url;
    }

    init_logging(&config)?;

    match cli.command {
        None => {
            let (tx, rx) = mpsc::unbounded_channel();
            let app = App::new(config, tx);
            app.run(rx).await?;
        }
        Some(Commands::History) => {
            print_history(&config);
        }
        Some(Commands::ClearHistory) => {
            clear_history(&config)?;
        }
        Some(Commands::Schema) => {
            print_schema(&config).await;
        }
    }

    Ok(())
}
