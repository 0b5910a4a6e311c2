use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use rag_chat::app::App;
use rag_chat::config::API_BASE_ENV;
use rag_chat::credential::mask_key;
use rag_chat::session::ERROR_PREFIX;
use rag_chat::{handler, logging, tui, ui};
use rag_chat::{ChatSession, Config, CredentialStore, RagClient};

#[derive(Parser)]
#[command(name = "rag-chat")]
#[command(version, about = "Terminal client for a retrieval-augmented chat assistant")]
struct Cli {
    /// Backend base URL (default: config file, then http://localhost:8000)
    #[arg(long, global = true, env = API_BASE_ENV)]
    api_base: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the interactive chat (default)
    Chat,
    /// Send a single question and print the answer
    Ask {
        /// Your question
        question: Vec<String>,
    },
    /// Clear the backend's conversation history
    Clear,
    /// Manage the stored API key
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },
    /// Manage persistent settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Check whether the backend is reachable
    Health,
}

#[derive(Subcommand)]
enum KeyAction {
    /// Store a key to send as X-API-Key
    Set { key: String },
    /// Show the stored key (masked)
    Show,
    /// Remove the stored key
    Unset,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Persist the backend base URL
    SetBase { url: String },
    /// Print the resolved settings
    Show,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Ignoring unreadable config: {e:#}");
        Config::new()
    });
    let api_base = config.resolve_api_base(cli.api_base.as_deref());
    let credentials = CredentialStore::default_location();

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => run_tui(RagClient::new(&api_base), credentials).await,
        Commands::Ask { question } => {
            logging::init_stderr();
            ask(&RagClient::new(&api_base), &credentials, &question.join(" ")).await
        }
        Commands::Clear => {
            logging::init_stderr();
            clear(&RagClient::new(&api_base), &credentials).await
        }
        Commands::Key { action } => {
            logging::init_stderr();
            manage_key(&credentials, action);
            Ok(())
        }
        Commands::Config { action } => manage_config(config, action, &api_base),
        Commands::Health => {
            logging::init_stderr();
            health(&RagClient::new(&api_base)).await
        }
    }
}

async fn run_tui(client: RagClient, credentials: CredentialStore) -> Result<()> {
    let log_path = logging::init_file();

    let mut app = App::new(client, credentials);
    app.log_path = log_path;
    app.check_health();

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new();

    let result = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;
            match events.next().await {
                Some(event) => handler::handle_event(&mut app, event).await?,
                None => break,
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    tui::restore()?;
    info!("chat UI closed");
    result
}

async fn ask(client: &RagClient, credentials: &CredentialStore, question: &str) -> Result<()> {
    let mut session = ChatSession::new(credentials.load());
    session.input = question.to_string();

    match session.send_query(client).await {
        None => bail!("Nothing to ask: the question is empty"),
        Some(Ok(answer)) => {
            println!("{answer}");
            Ok(())
        }
        Some(Err(e)) => bail!("{ERROR_PREFIX} at {}: {e}", client.base_url()),
    }
}

async fn clear(client: &RagClient, credentials: &CredentialStore) -> Result<()> {
    let mut session = ChatSession::new(credentials.load());
    if session.clear_history(client).await {
        println!("Conversation history cleared");
        Ok(())
    } else {
        bail!("Could not clear history at {}", client.base_url())
    }
}

fn manage_key(credentials: &CredentialStore, action: KeyAction) {
    match action {
        KeyAction::Set { key } => {
            credentials.save(&key);
            println!("API key saved to {}", credentials.path().display());
        }
        KeyAction::Show => match credentials.load() {
            Some(key) => println!("{}", mask_key(&key)),
            None => println!("No API key set"),
        },
        KeyAction::Unset => {
            credentials.save("");
            println!("API key removed");
        }
    }
}

fn manage_config(mut config: Config, action: ConfigAction, resolved_base: &str) -> Result<()> {
    match action {
        ConfigAction::SetBase { url } => {
            config.api_base = Some(url.trim().trim_end_matches('/').to_string());
            config.save()?;
            println!("Backend set to {}", config.resolve_api_base(None));
        }
        ConfigAction::Show => {
            println!("api_base: {resolved_base}");
        }
    }
    Ok(())
}

async fn health(client: &RagClient) -> Result<()> {
    match client.health().await {
        Ok(health) => {
            println!("Backend {} is {}", client.base_url(), health.status);
            if let Some(model) = health.model {
                println!("  model:    {model}");
            }
            if let Some(url) = health.weaviate_url {
                println!("  weaviate: {url}");
            }
            Ok(())
        }
        Err(e) => bail!("Backend {} unreachable: {e}", client.base_url()),
    }
}
