//! Command-line entry points.

use crate::config::load_config;
use crate::relay::RelayService;
use crate::search::ImageSearcher;
use crate::transport::{StdioTransport, supervise_sessions};
use crate::tts::TtsPipeline;
use crate::tts::providers::default_chain;
use crate::utils::default_http_client;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "voxrelay", version, about = "Group chat relay with voice replies")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the relay against the stdio transport
    Run {
        /// Path to config.json
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Load and validate the configuration, then report what is active
    CheckConfig {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command.unwrap_or(Commands::Run { config: None }) {
        Commands::Run { config } => run_relay(config).await,
        Commands::CheckConfig { config } => check_config(config),
    }
}

async fn run_relay(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path.as_deref())?;
    config
        .validate()
        .context("configuration is incomplete; see `voxrelay check-config`")?;

    let client = default_http_client();
    let chain = default_chain(&config.tts.resolve_credentials(), &client);
    let pipeline = TtsPipeline::new(chain);
    let searcher = ImageSearcher::new(config.search.clone(), client);

    let self_id = if config.self_id.is_empty() {
        "voxrelay".to_string()
    } else {
        config.self_id.clone()
    };
    let transport = Arc::new(StdioTransport::new(self_id));

    let (tx, rx) = mpsc::channel(128);
    let mut service = RelayService::new(config, transport, pipeline, searcher);
    let dispatcher = tokio::spawn(async move { service.run(rx).await });

    supervise_sessions(|| StdioTransport::read_session(tx.clone())).await;
    drop(tx);
    dispatcher.await.context("relay dispatcher panicked")?;
    Ok(())
}

fn check_config(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path.as_deref())?;
    config.validate()?;

    let client = default_http_client();
    let chain = default_chain(&config.tts.resolve_credentials(), &client);
    println!("configuration OK");
    println!("  operator: {}", config.operator_id);
    println!("  group:    {}", config.group_id);
    println!(
        "  allow list: {}",
        if config.allow_list.is_empty() {
            "open".to_string()
        } else {
            format!("{} entries", config.allow_list.len())
        }
    );
    println!("  speech providers in chain: {}", chain.len());
    Ok(())
}
