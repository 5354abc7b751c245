mod repl;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::auth::IdentityProvider;
use crate::chat::{ChatSettings, SessionManager};
use crate::core::config::AppConfig;
use crate::core::provider::CompletionProvider;
use crate::storage::{KvStore, MemoryStore, SqliteStore};

/// Identity used by `--ephemeral` runs, which have nothing to restore
const GUEST_EMAIL: &str = "guest@localhost";

#[derive(Parser, Debug)]
#[command(name = "parley", version, about = "Chat with a language model from the terminal")]
struct Cli {
    /// Directory holding config.json (defaults to the platform config dir)
    #[arg(short = 'c', long = "config-dir", env = "PARLEY_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// Keep everything in memory for this run, signed in as a guest
    #[arg(long)]
    ephemeral: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in with an email address
    Login { email: String },

    /// Create an account with an email and display name
    Signup {
        email: String,
        #[arg(short, long)]
        name: String,
    },

    /// Sign out and forget the stored identity
    Logout,

    /// Show the signed-in identity
    Whoami,

    /// Manage the API key used for completions
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },

    /// List conversation sessions
    Sessions,

    /// Start chatting (interactive unless --prompt is given)
    Chat {
        /// Resume a session by ID
        #[arg(long)]
        session: Option<String>,

        /// Send a single message and print the reply
        #[arg(short, long)]
        prompt: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum KeyAction {
    /// Store your own API key
    Set { key: String },
    /// Show the key in use, masked
    Show,
}

pub struct App {
    pub config: AppConfig,
    pub store: Arc<dyn KvStore>,
    pub auth: Arc<IdentityProvider>,
    pub provider: Arc<dyn CompletionProvider>,
}

impl App {
    pub async fn open_manager(&self) -> Result<SessionManager> {
        if self.auth.current().is_none() {
            anyhow::bail!("Not signed in. Run `parley login <email>` first.");
        }
        let manager = SessionManager::open(
            self.auth.clone(),
            self.store.clone(),
            self.provider.clone(),
            ChatSettings::from(&self.config),
        )
        .await?;
        Ok(manager)
    }
}

pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    let config = crate::core::config::load_config(cli.config_dir.clone())?;

    let filter = if cli.debug || config.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let app = build_app(config, cli.ephemeral).await?;

    match cli.command {
        Command::Login { email } => {
            let identity = app.auth.sign_in(&email).await?;
            println!("Signed in as {} ({})", identity.display_name(), identity.email);
        }
        Command::Signup { email, name } => {
            let identity = app.auth.sign_up(&email, &name).await?;
            println!("Welcome, {}! You are on the {} plan.", identity.display_name(), identity.plan);
        }
        Command::Logout => {
            app.auth.sign_out().await?;
            println!("Signed out.");
        }
        Command::Whoami => match app.auth.current() {
            Some(identity) => {
                println!("{} <{}>", identity.display_name(), identity.email);
                println!("  id:      {}", identity.id);
                println!("  plan:    {}", identity.plan);
                println!("  api key: {}", app.auth.masked_api_key());
                println!("  since:   {}", identity.created_at.format("%Y-%m-%d"));
            }
            None => println!("Not signed in."),
        },
        Command::Key { action } => match action {
            KeyAction::Set { key } => {
                if app.auth.update_api_key(&key).await? {
                    println!("API key saved.");
                } else {
                    anyhow::bail!("Not signed in. Run `parley login <email>` first.");
                }
            }
            KeyAction::Show => println!("{}", app.auth.masked_api_key()),
        },
        Command::Sessions => {
            let manager = app.open_manager().await?;
            repl::print_sessions(&manager);
        }
        Command::Chat { session, prompt } => {
            let mut manager = app.open_manager().await?;
            if let Some(id) = session {
                manager.select_session(&id).await?;
            }
            match prompt {
                Some(prompt) => repl::send_once(&mut manager, &prompt).await?,
                None => repl::run(&mut manager).await?,
            }
        }
    }

    Ok(())
}

async fn build_app(config: AppConfig, ephemeral: bool) -> Result<App> {
    let store: Arc<dyn KvStore> = if ephemeral {
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(SqliteStore::open(&config.database_path()).await?)
    };

    let auth = Arc::new(IdentityProvider::new(
        store.clone(),
        config.default_api_key.clone(),
    ));
    if ephemeral {
        auth.sign_in(GUEST_EMAIL).await?;
    } else {
        auth.restore().await?;
    }

    let provider = crate::providers::create_provider(&config)?;

    Ok(App {
        config,
        store,
        auth,
        provider,
    })
}
