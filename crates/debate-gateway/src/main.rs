//! Debate gateway CLI.
//!
//! ```bash
//! # Serve the homepage and proxy on 127.0.0.1:8000 (or an ephemeral port)
//! debate-gateway serve
//!
//! # Run three rounds from the terminal
//! debate-gateway debate --topic "Monorepo or polyrepo?" --rounds 3
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use debate_coordination::client::{BackendConnector, OllamaConnector};
use debate_coordination::debate::{
    ContextMode, DebateOrchestrator, DebateRound, DebateSettings, RunOutcome,
};
use debate_coordination::events::EventBus;
use debate_coordination::health::HealthMonitor;
use debate_coordination::normalize::OutputMode;
use debate_gateway::{Gateway, GatewayConfig};
use tracing::info;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the homepage, health endpoint, and backend proxy until Ctrl-C
    Serve {
        /// Interface to bind (overrides DEBATE_GATEWAY_HOST)
        #[arg(long)]
        host: Option<String>,

        /// Preferred port (overrides DEBATE_GATEWAY_PORT)
        #[arg(long)]
        port: Option<u16>,

        /// Backend base URL (overrides DEBATE_BACKEND_URL)
        #[arg(long)]
        backend_url: Option<String>,

        /// HTML file served at / (overrides DEBATE_HOMEPAGE)
        #[arg(long)]
        homepage: Option<PathBuf>,
    },

    /// Run a debate in the terminal and print each committed round
    Debate {
        #[arg(long)]
        topic: String,

        /// Total rounds, including the opening one
        #[arg(long, default_value_t = 1)]
        rounds: u32,

        /// History carried into continuation rounds: auto, manual, cross-reply
        #[arg(long, default_value = "auto")]
        context: ContextMode,

        /// Free paragraphs instead of outcome bullets
        #[arg(long, default_value_t = false)]
        paragraphs: bool,

        /// Skip model resolution and use this model
        #[arg(long)]
        model: Option<String>,

        #[arg(long)]
        temperature: Option<f64>,

        #[arg(long)]
        max_tokens: Option<u32>,

        /// Backend base URL (overrides DEBATE_SERVER_URL)
        #[arg(long)]
        server_url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Command::Serve {
            host,
            port,
            backend_url,
            homepage,
        } => {
            let mut config = GatewayConfig::default();
            if let Some(host) = host {
                config.bind_host = host;
            }
            if let Some(port) = port {
                config.preferred_port = port;
            }
            if let Some(url) = backend_url {
                config.backend_url = url;
            }
            if let Some(path) = homepage {
                config.homepage_path = Some(path);
            }
            serve(config).await
        }
        Command::Debate {
            topic,
            rounds,
            context,
            paragraphs,
            model,
            temperature,
            max_tokens,
            server_url,
        } => {
            let mut settings = DebateSettings {
                context_mode: context,
                ..DebateSettings::default()
            };
            if paragraphs {
                settings.output_mode = OutputMode::FreeParagraphs;
            }
            if let Some(model) = model {
                settings.model_override = model;
            }
            if let Some(t) = temperature {
                settings.temperature = t;
            }
            if let Some(n) = max_tokens {
                settings.max_tokens = n;
            }
            if let Some(url) = server_url {
                settings.server_url = url;
            }
            debate(&topic, rounds.max(1), settings).await
        }
    }
}

async fn serve(config: GatewayConfig) -> Result<()> {
    let backend_url = config.backend_url.clone();
    let gateway = Gateway::from_config(config);

    gateway.start().await.context("gateway failed to start")?;
    if let Some(url) = gateway.homepage_url() {
        info!(%url, "homepage ready");
    }

    gateway.health().refresh(&backend_url);

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    info!("shutting down");
    gateway.stop().await;
    Ok(())
}

async fn debate(topic: &str, rounds: u32, settings: DebateSettings) -> Result<()> {
    let connector: Arc<dyn BackendConnector> = Arc::new(OllamaConnector::new());
    let events = EventBus::new().shared();
    let health = HealthMonitor::new(Arc::clone(&connector))
        .with_events(Arc::clone(&events))
        .shared();
    let orchestrator = DebateOrchestrator::spawn(connector, Arc::clone(&health), events);

    health
        .refresh(&settings.server_url)
        .await
        .context("health probe task panicked")?;
    info!(
        "{}",
        health
            .status()
            .status_line(&settings.server_url, settings.context_mode)
    );

    for n in 0..rounds {
        if n == 0 {
            orchestrator.start_round(topic, settings.clone()).await?;
        } else {
            orchestrator.next_round(settings.clone()).await?;
        }

        let snapshot = orchestrator.wait_until_idle().await?;
        if snapshot.last_outcome != Some(RunOutcome::Succeeded) {
            let message = snapshot
                .last_error
                .unwrap_or_else(|| "debate run did not complete".to_string());
            bail!(message);
        }
        if let Some(round) = snapshot.rounds.last() {
            print_round(snapshot.rounds.len(), round);
        }
    }

    Ok(())
}

fn print_round(number: usize, round: &DebateRound) {
    println!("## Round {number} ({})", round.model);
    println!();
    println!("Agent X:\n{}", round.persona_a);
    println!();
    println!("Agent C:\n{}", round.persona_b);
    println!();
}
