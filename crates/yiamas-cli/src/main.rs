use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod chat;
mod prompt;
mod render;

use chat::ChatLoop;
use prompt::cliclack::CliclackPrompt;
use yiamas::adapter::{ConversationAdapter, DeliveryMode};
use yiamas::configuration::Settings;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Show replies as they are written instead of all at once
    #[arg(long)]
    streaming: bool,

    /// Model to use (can also be set via YIAMAS_MODEL environment variable)
    #[arg(short, long)]
    model: Option<String>,

    /// Answer without web search grounding
    #[arg(long)]
    no_search: bool,
}

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();

    let mut settings = Settings::new().context("Failed to load settings")?;
    if cli.streaming {
        settings.delivery = DeliveryMode::Streaming;
    }
    if let Some(model) = cli.model {
        settings.model = model;
    }
    if cli.no_search {
        settings.search_grounding = false;
    }

    let adapter = ConversationAdapter::initialize(&settings)?;
    let mut chat = ChatLoop::new(adapter, Box::new(CliclackPrompt::new()));
    chat.start().await
}
