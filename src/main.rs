use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod app;
mod ask;
mod config;
mod handler;
mod transcript;
mod tui;
mod ui;
mod welcome;

use app::App;
use ask::{AskClient, QueryService};
use config::Config;

#[derive(Parser)]
#[command(name = "ragchat")]
#[command(about = "Terminal chat client for a local RAG answering service", version)]
struct Cli {
    /// Answering service base URL (overrides the saved config)
    #[arg(short, long)]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a single question and print the answer
    Ask {
        /// Your question
        question: String,
    },
    /// Show the effective endpoint, or persist a new default
    Endpoint {
        /// New default endpoint URL
        url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load().unwrap_or_else(|_| Config::new());
    let endpoint = cli
        .endpoint
        .unwrap_or_else(|| config.endpoint_or_default());

    match cli.command {
        None => run_tui(endpoint).await,
        Some(Commands::Ask { question }) => {
            init_stderr_logging();
            ask_once(&endpoint, &question).await
        }
        Some(Commands::Endpoint { url }) => match url {
            Some(url) => {
                Config::save_endpoint(&url)?;
                println!("Default endpoint set to {url}");
                Ok(())
            }
            None => {
                println!("{endpoint}");
                Ok(())
            }
        },
    }
}

async fn run_tui(endpoint: String) -> Result<()> {
    init_file_logging()?;
    tracing::info!(%endpoint, "starting chat session");

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new();

    let client = AskClient::new(&endpoint);
    let mut app = App::new(endpoint, Arc::new(client), events.sender());

    let result = main_loop(&mut terminal, &mut events, &mut app).await;
    tui::restore()?;
    result
}

async fn main_loop(
    terminal: &mut tui::Tui,
    events: &mut tui::EventHandler,
    app: &mut App,
) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event),
            None => break,
        }
    }
    Ok(())
}

async fn ask_once(endpoint: &str, question: &str) -> Result<()> {
    let client = AskClient::new(endpoint);
    let answer = client
        .ask(question)
        .await
        .with_context(|| format!("query against {endpoint} failed"))?;
    println!("{answer}");
    Ok(())
}

/// The TUI owns stderr, so its log lines go to a file beside the config.
fn init_file_logging() -> Result<()> {
    let path = config::log_file_path()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = fs::OpenOptions::new().create(true).append(true).open(&path)?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=info", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Arc::new(file))
                .with_ansi(false),
        )
        .init();
    Ok(())
}

fn init_stderr_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=warn", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
