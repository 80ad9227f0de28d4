mod bootstrap;

use std::path::Path;

use clap::Parser;
use common::utils::config::get_config;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::error;

/// Interactive terminal tutor.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Session id the conversation is stored under
    #[arg(long, default_value = "cli")]
    session_id: String,

    /// Documents directory to ingest before the first prompt
    #[arg(long, env = "DOCS_DIR")]
    docs_dir: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    bootstrap::init_tracing();
    let args = Args::parse();

    let mut config = get_config()?;
    if args.docs_dir.is_some() {
        config.docs_dir = args.docs_dir;
    }

    let db = bootstrap::connect_db(&config).await?;
    let state = bootstrap::build_state(config, db, None).await?;
    bootstrap::ingest_configured_docs(&state).await;

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    stdout
        .write_all(b"Tutor ready. Type a question, /ingest <dir>, /reset, /career, or exit.\n")
        .await?;

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if matches!(input.to_lowercase().as_str(), "exit" | "quit") {
            break;
        }

        let output = if let Some(dir) = input.strip_prefix("/ingest ") {
            match state.ingestion.ingest_directory(Path::new(dir.trim())).await {
                Ok(summary) => format!(
                    "Indexed {} chunks from {} documents.",
                    summary.chunks, summary.documents
                ),
                Err(err) => format!("Ingestion failed: {err}"),
            }
        } else {
            match state.tutor.handle_message(&args.session_id, input).await {
                Ok(reply) => reply,
                Err(err) => {
                    error!(error = %err, "message rejected");
                    format!("Error: {err}")
                }
            }
        };

        stdout.write_all(output.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
    }

    Ok(())
}
