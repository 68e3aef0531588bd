mod init;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use medassist_core::config::Config;
use medassist_core::{ProgressEvent, RagAnswer};
use medassist_gateway::GatewayServer;
use tokio::sync::{mpsc, watch};

#[derive(Parser, Debug)]
#[command(
    name = "medassist",
    version,
    about = "Hospital assistant answering questions from the hospital's own documents"
)]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Answer a single question and exit
    Ask {
        question: String,
        /// Document namespace to search (defaults to index.namespace)
        #[arg(long)]
        namespace: Option<String>,
        /// Hits to fetch per sub-query
        #[arg(long)]
        top_k: Option<usize>,
        /// Print the raw JSON answer
        #[arg(long)]
        json: bool,
        /// Print pipeline stages to stderr
        #[arg(long)]
        progress: bool,
    },
    /// Serve the HTTP endpoint until Ctrl-C
    Serve,
    /// Print the effective configuration without secrets
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init::init_subscriber();

    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config.as_deref());
    let mut config = Config::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    config.resolve_secrets();

    match cli.command {
        Command::Ask {
            question,
            namespace,
            top_k,
            json,
            progress,
        } => ask(&config, &question, namespace, top_k, json, progress).await,
        Command::Serve => serve(&config).await,
        Command::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn resolve_config_path(flag: Option<&Path>) -> PathBuf {
    if let Some(path) = flag {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("MEDASSIST_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from("config/default.toml")
}

async fn ask(
    config: &Config,
    question: &str,
    namespace: Option<String>,
    top_k: Option<usize>,
    json: bool,
    progress: bool,
) -> anyhow::Result<()> {
    let orchestrator = init::build_orchestrator(config)?;
    let namespace = namespace.unwrap_or_else(|| config.index.namespace.clone());

    let (tx, mut rx) = mpsc::unbounded_channel::<ProgressEvent>();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if progress {
                eprintln!(
                    "[{}] {}",
                    event.stage(),
                    serde_json::to_string(&event).unwrap_or_default()
                );
            }
        }
    });

    let answer = orchestrator
        .answer(question, &namespace, top_k, Some(&tx))
        .await;
    drop(tx);
    let _ = printer.await;

    if json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
    } else {
        print!("{}", render_answer(&answer));
    }
    Ok(())
}

fn render_answer(answer: &RagAnswer) -> String {
    let mut out = format!("{}\n", answer.assistant_content.answer);
    if !answer.assistant_content.suggestions.is_empty() {
        out.push_str("\nYou could also ask:\n");
        for s in &answer.assistant_content.suggestions {
            out.push_str("  - ");
            out.push_str(s);
            out.push('\n');
        }
    }
    if !answer.context_used.is_empty() {
        let sources: Vec<String> = answer
            .context_used
            .iter()
            .map(|c| match c.page {
                Some(page) => format!("{} (p. {page})", c.id),
                None => c.id.clone(),
            })
            .collect();
        out.push_str(&format!("\nSources: {}\n", sources.join(", ")));
    }
    out
}

async fn serve(config: &Config) -> anyhow::Result<()> {
    let orchestrator = init::build_orchestrator(config)?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    GatewayServer::new(&config.gateway, orchestrator, shutdown_rx)
        .with_default_namespace(config.index.namespace.clone())
        .serve()
        .await?;
    Ok(())
}
