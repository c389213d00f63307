use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use docqa_cli::{build_index, init_logging, QaPipeline};
use docqa_core::config::Config;
use docqa_core::types::ConversationTurn;
use docqa_relay::{AskRequest, Frame};
use docqa_vector::IndexManager;

#[derive(Parser)]
#[command(name = "docqa")]
#[command(version)]
#[command(about = "Ask questions about a local document collection", long_about = None)]
struct Cli {
    /// Directory holding config.toml; relative paths in it resolve from here.
    #[arg(long, global = true, env = "DOCQA_CONFIG_DIR", default_value = ".")]
    config_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chunk and embed the source documents and write the index artifacts.
    Index {
        /// Overrides ingest.source_dir.
        source_dir: Option<PathBuf>,
        #[arg(long)]
        no_progress: bool,
    },
    /// Answer a question, streaming the reply to stdout.
    Ask {
        question: String,
        /// JSON file holding an array of `{role, content}` turns.
        #[arg(long)]
        history: Option<PathBuf>,
        #[arg(long)]
        temperature: Option<f32>,
        /// Print raw server-sent-event frames instead of plain text.
        #[arg(long)]
        sse: bool,
    },
    /// Load the index and print the health payload as JSON.
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging("info");
    let cli = Cli::parse();
    let config = Config::load_from(&cli.config_dir)?;
    let mut settings = config.settings()?;

    match cli.command {
        Commands::Index { source_dir, no_progress } => {
            if let Some(dir) = source_dir {
                settings.ingest.source_dir = dir;
            }
            println!("Data directory: {}", settings.ingest.source_dir.display());
            let summary = tokio::task::spawn_blocking(move || build_index(&settings, !no_progress))
                .await
                .context("indexing task panicked")??;
            println!("\n✅ Indexing completed successfully!");
            println!("📊 {} chunks embedded with {} (dim {})", summary.num_chunks, summary.embedding_model_id, summary.dim);
            println!("📁 {}", summary.index_path.display());
            println!("📁 {}", summary.metadata_path.display());
        }
        Commands::Ask { question, history, temperature, sse } => {
            let pipeline = QaPipeline::from_settings(&settings, Arc::new(IndexManager::new(settings.index.k_neighbors)))?;
            if let Err(e) = pipeline.load_index(&settings).await {
                tracing::error!(error = %e, "index unavailable");
            }
            let history = match history {
                Some(path) => read_history(&path)?,
                None => Vec::new(),
            };
            let request = AskRequest { question, history, temperature };
            let frames = pipeline.ask(request).await?;
            print_frames(frames, sse).await?;
        }
        Commands::Status => {
            let pipeline = QaPipeline::from_settings(&settings, Arc::new(IndexManager::new(settings.index.k_neighbors)))?;
            if let Err(e) = pipeline.load_index(&settings).await {
                tracing::warn!(error = %e, "index unavailable");
            }
            println!("{}", serde_json::to_string_pretty(&pipeline.health())?);
        }
    }
    Ok(())
}

fn read_history(path: &std::path::Path) -> Result<Vec<ConversationTurn>> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing history in {}", path.display()))
}

/// Write frames as they arrive. Ctrl-C drops the stream, which closes the
/// backend connection.
async fn print_frames(mut frames: docqa_relay::FrameStream, sse: bool) -> Result<()> {
    let mut stdout = std::io::stdout();
    loop {
        let frame = tokio::select! {
            frame = frames.next() => frame,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted; closing stream");
                break;
            }
        };
        let Some(frame) = frame else { break };
        if sse {
            write!(stdout, "{}", frame.to_sse())?;
        } else {
            match &frame {
                Frame::Content(text) => write!(stdout, "{text}")?,
                Frame::Done => writeln!(stdout)?,
                Frame::Error(message) => {
                    writeln!(stdout)?;
                    eprintln!("error: {message}");
                }
            }
        }
        stdout.flush()?;
    }
    Ok(())
}
