use std::net::SocketAddr;
use std::sync::Arc;
use anyhow::Context;
use clap::{Parser, Subcommand};
use rl_core::config::{AppConfig, ModelKind, StorageKind};
use rl_core::DocumentStore;
use rl_scrapers::{init_logging, IngestArgs, IngestManager};
use rl_storage::RecommendationService;
use rl_web::{AppState, StaticTokenVerifier};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Curates technical articles from your browsing history", long_about = None)]
pub struct Cli {
    /// Overrides RL_STORAGE
    #[arg(long, value_enum)]
    storage: Option<StorageKind>,
    /// Overrides RL_MODEL
    #[arg(long, value_enum)]
    model: Option<ModelKind>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API
    Serve {
        /// Overrides RL_BIND_ADDRESS
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
    /// Ingest a browsing-history JSON file and wait for the job to finish
    Ingest(IngestArgs),
    /// Pick this week's recommendations for a user
    Recommend {
        #[arg(long, short)]
        user: String,
    },
}

impl Cli {
    fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(storage) = self.storage {
            config.storage = storage;
        }
        if let Some(model) = self.model {
            config.model = model;
        }
        if let Commands::Serve { bind: Some(bind) } = &self.command {
            config.bind_address = *bind;
        }
    }
}

fn ingest_manager(config: &AppConfig, store: Arc<dyn DocumentStore>) -> anyhow::Result<IngestManager> {
    let model = rl_inference::create_model(config);
    info!("🧠 Inference model initialized (using {})", model.name());
    Ok(IngestManager::from_config(config, store, model)?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::from_env().context("invalid configuration")?;
    cli.apply_overrides(&mut config);
    init_logging(config.log_level);

    let store = rl_storage::create_storage(&config).await?;
    info!("💾 Storage initialized (using {})", store.name());

    match cli.command {
        Commands::Serve { .. } => {
            let ingest = ingest_manager(&config, store.clone())?;
            let verifier = Arc::new(StaticTokenVerifier::new(config.api_tokens.clone()));
            let state = AppState::new(store, ingest, verifier);
            rl_web::serve(config.bind_address, state).await?;
        }
        Commands::Ingest(args) => {
            let manager = ingest_manager(&config, store)?;
            rl_scrapers::handle_command(args, &manager).await?;
        }
        Commands::Recommend { user } => {
            let outcome = RecommendationService::new(store).generate(&user).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
    }

    Ok(())
}
