//! # Docent CLI (`docent`)
//!
//! ## Usage
//!
//! ```bash
//! docent --config ./config/docent.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docent init` | Create the SQLite database and run schema migrations |
//! | `docent import <file>` | Embed and store documents from a JSONL file |
//! | `docent ask "<question>"` | Answer one question |
//! | `docent chat` | Interactive session on stdin |
//! | `docent serve` | Start the HTTP server |
//! | `docent stats` | Knowledge-base statistics |

use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use docent::assistant::{build_assistant, Assistant};
use docent::{config, import, logging, migrate, server, stats};
use docent_core::Outcome;

/// Docent answers product questions from retrieved documentation.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/docent.example.toml` for a full example.
#[derive(Parser)]
#[command(name = "docent", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docent.toml")]
    config: PathBuf,

    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent: running it multiple times is safe.
    Init,

    /// Import documents from a JSON Lines file.
    ///
    /// Each line is `{"page_content": "...", "metadata": {"url": "..."}}`.
    Import {
        /// Path to the `.jsonl` file.
        file: PathBuf,
    },

    /// Answer a single question in a fresh session.
    ///
    /// History lives in memory, so nothing carries over between runs. Use
    /// `chat` or the HTTP server for follow-ups.
    Ask { question: String },

    /// Ask questions interactively in one session. End with Ctrl-D.
    Chat,

    /// Start the HTTP server on `[server].bind`.
    Serve,

    /// Show knowledge-base statistics.
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Import { file } => {
            let result = import::run_import(&cfg, &file).await?;
            println!("import {}", file.display());
            println!("  documents read: {}", result.read);
            println!("  documents written: {}", result.written);
        }
        Commands::Ask { question } => {
            let assistant = build_assistant(&cfg).await?;
            let session = uuid::Uuid::new_v4().to_string();
            let outcome = assistant.ask(&session, &question).await?;
            print_outcome(&outcome);
        }
        Commands::Chat => {
            let assistant = build_assistant(&cfg).await?;
            run_chat(&assistant).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}

async fn run_chat(assistant: &Assistant) -> Result<()> {
    let session = uuid::Uuid::new_v4().to_string();
    println!(
        "Ask about {} (session {}). Ctrl-D to quit.",
        assistant.settings().product_name,
        session
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }

        // Keep the session alive after an upstream failure.
        match assistant.ask(&session, question).await {
            Ok(outcome) => print_outcome(&outcome),
            Err(e) => eprintln!("error: {}", e),
        }
    }
    Ok(())
}

fn print_outcome(outcome: &Outcome) {
    println!("{}", outcome.text());
    let sources = outcome.sources();
    if !sources.is_empty() {
        println!();
        println!("Sources:");
        for url in sources {
            println!("  - {}", url);
        }
    }
    println!();
}
