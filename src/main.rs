mod bot;
mod openai_client;
mod task_store;

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use dotenv::dotenv;
use eyre::Result;
use teloxide::Bot;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;
use url::Url;

use crate::bot::TodoBot;
use crate::openai_client::{OpenAiClient, DEFAULT_API_URL, DEFAULT_MODEL};
use crate::task_store::TaskStore;

const BOT_TOKEN_VAR: &str = "TELEGRAM_BOT_TOKEN";

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON file holding every user's tasks
    #[arg(long, env = "TODO_DATA_FILE", default_value = "todo_data.json")]
    data_file: PathBuf,

    /// Chat completion endpoint used by /organize
    #[arg(long, env = "CHATGPT_API_URL", default_value = DEFAULT_API_URL)]
    api_url: Url,

    /// Model used by /organize
    #[arg(long, env = "CHATGPT_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// Give up on an /organize request after this many seconds
    #[arg(long, env = "CHATGPT_TIMEOUT_SECS", default_value_t = 60)]
    timeout_secs: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load environment variables from .env file
    dotenv().ok();

    let cli = Cli::parse();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let token = match env::var(BOT_TOKEN_VAR) {
        Ok(token) if !token.trim().is_empty() => token,
        _ => {
            error!("{} environment variable not set", BOT_TOKEN_VAR);
            return Ok(ExitCode::FAILURE);
        }
    };

    let store = TaskStore::new(cli.data_file);
    info!("Storing tasks in {}", store.path().display());

    let organizer = OpenAiClient::from_env(cli.api_url, cli.model, Duration::from_secs(cli.timeout_secs))?;
    let todo = Arc::new(TodoBot::new(store, Arc::new(organizer)));

    info!("Starting to-do bot");
    bot::telegram::run(Bot::new(token), todo).await?;

    Ok(ExitCode::SUCCESS)
}
