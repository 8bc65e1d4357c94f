use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use feedback_lens::api::{self, middleware::SecurityConfig, AppState, DEFAULT_MAX_SESSIONS};
use feedback_lens::classify::{BatchRunner, ClassifyOutcome};
use feedback_lens::config::{self, AppConfig};
use feedback_lens::export::{self, ExportKind, Workbook};
use feedback_lens::gemini::GeminiClassifier;
use feedback_lens::input;
use feedback_lens::models::AnalysisSession;

#[derive(Parser)]
#[command(name = "flens", version)]
#[command(about = "Classify customer feedback in batches and export labeled spreadsheets")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify feedback from a file (or stdin) and write a workbook
    Classify {
        /// Text or CSV file; reads stdin when omitted
        input: Option<PathBuf>,

        /// Feedback lines per classification call
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Gemini model id
        #[arg(short, long)]
        model: Option<String>,

        /// Custom system instruction
        #[arg(long, conflicts_with = "instruction_file")]
        instruction: Option<String>,

        /// Read the system instruction from a file
        #[arg(long, value_name = "FILE")]
        instruction_file: Option<PathBuf>,

        /// Comma-separated labels the classifier should prefer
        #[arg(short, long, value_delimiter = ',')]
        labels: Vec<String>,

        /// Directory for the exported workbook
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,

        /// Write the detailed workbook (exploded, compiled and counts sheets)
        #[arg(short, long)]
        detailed: bool,

        /// Print records as JSON on stdout instead of the label summary
        #[arg(long)]
        json: bool,
    },
    /// Start the review/edit HTTP API
    Serve {
        /// Port for HTTP API
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Sessions kept in memory before the oldest is evicted
        #[arg(long, default_value_t = DEFAULT_MAX_SESSIONS)]
        max_sessions: usize,
    },
    /// Show the effective configuration
    Config {
        /// Print only the config file path
        #[arg(long)]
        path: bool,

        /// Write the effective configuration (minus the API key) to the config file
        #[arg(long, conflicts_with = "path")]
        save: bool,
    },
}

/// Initialize tracing with output to stderr (when stdout carries data) or stdout
fn init_tracing(use_stderr: bool) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "feedback_lens=info,tower_http=info".into()),
    );

    if use_stderr {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let use_stderr = matches!(cli.command, Commands::Classify { json: true, .. })
        || matches!(cli.command, Commands::Config { .. });
    init_tracing(use_stderr);

    let mut config = AppConfig::load();

    match cli.command {
        Commands::Classify {
            input,
            batch_size,
            model,
            instruction,
            instruction_file,
            labels,
            out_dir,
            detailed,
            json,
        } => {
            if let Some(batch_size) = batch_size {
                config.batch_size = batch_size;
            }
            if let Some(model) = model {
                config.model = model;
            }
            if let Some(path) = instruction_file {
                let text = std::fs::read_to_string(&path).with_context(|| {
                    format!("Failed to read instruction file {}", path.display())
                })?;
                config.system_instruction = Some(text);
            } else if instruction.is_some() {
                config.system_instruction = instruction;
            }
            if !labels.is_empty() {
                config.suggested_labels = labels;
            }

            let kind = if detailed {
                ExportKind::Detailed
            } else {
                ExportKind::Basic
            };
            run_classify(&config, input, out_dir, kind, json).await?;
        }
        Commands::Serve {
            port,
            host,
            max_sessions,
        } => {
            let classifier = GeminiClassifier::from_config(&config)?;
            if config.api_key.is_none() {
                tracing::warn!("GEMINI_API_KEY is not set; classification requests will fail");
            }
            let state =
                AppState::gemini(classifier, config.batch_size).with_session_limit(max_sessions);
            let app = api::create_router_with_security(state, SecurityConfig::from_env());

            let addr = format!("{}:{}", host, port);
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            tracing::info!(
                "Feedback Lens API listening on http://{} (model {})",
                addr,
                config.model
            );

            axum::serve(listener, app).await?;
        }
        Commands::Config { path, save } => {
            if save {
                let saved = AppConfig {
                    api_key: None,
                    ..config
                }
                .save()?;
                println!("Saved configuration to {}", saved.display());
            } else if path {
                println!("{}", config::config_path()?.display());
            } else {
                println!("{}", serde_json::to_string_pretty(&config.redacted())?);
            }
        }
    }

    Ok(())
}

/// First Ctrl-C stops the run once the in-flight batch resolves; a second one exits.
fn watch_interrupts(cancel: Arc<AtomicBool>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        eprintln!("Interrupted; stopping after the current batch (Ctrl-C again to quit)");
        cancel.store(true, Ordering::SeqCst);

        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    })
}

async fn run_classify(
    config: &AppConfig,
    input: Option<PathBuf>,
    out_dir: PathBuf,
    kind: ExportKind,
    json: bool,
) -> anyhow::Result<()> {
    let lines = match &input {
        Some(path) => {
            tracing::info!("Reading feedback from {}", path.display());
            input::read_feedback_file(path)?
        }
        None => input::read_feedback_stdin()?,
    };

    let classifier = GeminiClassifier::from_config(config)?;
    tracing::info!("Model: {}, batch size: {}", classifier.model(), config.batch_size);

    let cancel = Arc::new(AtomicBool::new(false));
    let interrupts = watch_interrupts(cancel.clone());
    let outcome = BatchRunner::new(&classifier)
        .batch_size(config.batch_size)
        .cancel_flag(cancel)
        .run(&lines, |progress| tracing::debug!("{}", progress))
        .await;
    interrupts.abort();
    let outcome = outcome?;

    let session = match outcome {
        ClassifyOutcome::Records(records) => AnalysisSession::new(records),
        ClassifyOutcome::Empty => {
            eprintln!("Classification returned no results; nothing to export.");
            return Ok(());
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&session.records)?);
    } else {
        println!("{} records classified", session.records.len());
        for count in session.summary() {
            println!("{:>6}  {}", count.count, count.label);
        }
    }

    let workbook = Workbook::build(kind, &session.records);
    let path = export::write_workbook(&workbook, &out_dir)?;
    eprintln!("Wrote {}", path.display());

    Ok(())
}
