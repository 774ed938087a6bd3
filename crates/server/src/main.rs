//! Conductor Server
//!
//! `conductor serve` starts the HTTP API; `conductor run` streams a run to the
//! terminal; `conductor files` lists the workspace.

use clap::{Parser, Subcommand};
use conductor_core::swarm::{RunRequest, StreamEvent};
use conductor_core::ConductorConfig;
use conductor_server::{router, AppState};
use futures::StreamExt;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "conductor", version, about = "Streams multi-agent pipeline runs")]
struct Args {
    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand, Clone)]
enum CliCommand {
    /// Start the HTTP server (default)
    Serve {
        /// Port to listen on, overrides the configured port
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Run the pipeline on a goal and print its events
    Run {
        /// The goal to accomplish
        goal: String,
        /// Maximum number of pipeline rounds
        #[arg(long)]
        n_round: Option<u32>,
        /// Spending cap in dollars
        #[arg(long)]
        investment: Option<f64>,
    },
    /// List the files in the workspace
    Files,
}

async fn run_server(config: ConductorConfig, port: u16) -> anyhow::Result<()> {
    let workspace = config.workspace.clone();
    let provider = config.model.provider.display_name();
    let model = config.model.model.clone();
    let key_var = config.model.provider.env_var();
    if std::env::var(key_var).is_err() {
        tracing::warn!("{} is not set, LLM calls to {} will fail", key_var, provider);
    }
    let state = Arc::new(AppState::from_config(config));
    let app = router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    println!("🚀 Conductor Server running at http://{}", addr);
    println!("   Workspace: {}", workspace.display());
    println!("   LLM:       {} / {}", provider, model);
    println!("   API v1 Routes:");
    println!("   Run:       /api/v1/run/stream (POST, SSE)");
    println!("   Files:     /api/v1/files, /api/v1/files/{{path}}");
    println!("   Chat:      /api/v1/chat (POST), /api/v1/chat/stream (POST, SSE)");
    println!("   Docs:      /api/v1/openapi.json");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn run_cli(
    mut config: ConductorConfig,
    goal: String,
    n_round: Option<u32>,
    investment: Option<f64>,
) -> anyhow::Result<()> {
    if let Some(n_round) = n_round {
        config.n_round = n_round;
    }
    if let Some(investment) = investment {
        config.investment = investment;
    }

    println!("🚀 Running pipeline with goal: {}", goal);
    let request = RunRequest::new(goal).with_budget(config.budget());
    let state = AppState::from_config(config);

    let mut events = state.bridge.stream_run(request);
    let mut failed = false;
    while let Some(event) = events.next().await {
        match &event {
            StreamEvent::Reasoning(text) => println!("💭 {}", text),
            StreamEvent::Content(text) => println!("\n{}\n", text),
            StreamEvent::Status(status) => println!("✅ Status: {}", status),
            StreamEvent::Error(error) => {
                failed = true;
                eprintln!("❌ Pipeline failed: {}", error);
            }
            StreamEvent::Done => {}
        }
    }

    if failed {
        anyhow::bail!("pipeline run failed");
    }
    Ok(())
}

fn list_files(config: &ConductorConfig) {
    let catalog = conductor_core::workspace::FileCatalog::new(config.workspace.clone());
    let files = catalog.list();
    if files.is_empty() {
        println!("No files in {}", catalog.root().display());
        return;
    }
    for file in &files {
        println!("{:>10}  {}", file.size, file.path);
    }
    println!("{} files", files.len());
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = ConductorConfig::load().await?;

    match args.command {
        Some(CliCommand::Run {
            goal,
            n_round,
            investment,
        }) => run_cli(config, goal, n_round, investment).await,
        Some(CliCommand::Files) => {
            list_files(&config);
            Ok(())
        }
        Some(CliCommand::Serve { port }) => {
            print_banner();
            let port = port.unwrap_or(config.port);
            run_server(config, port).await
        }
        None => {
            print_banner();
            let port = config.port;
            run_server(config, port).await
        }
    }
}

fn print_banner() {
    println!("╔══════════════════════════════════════╗");
    println!("║         CONDUCTOR SERVER             ║");
    println!("╚══════════════════════════════════════╝");
}
