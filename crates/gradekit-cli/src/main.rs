//! gradekit CLI: the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use gradekit_core::model::ScoringMode;

mod commands;

#[derive(Parser)]
#[command(name = "gradekit", version, about = "Exam answer grading aid")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read answer sheets from images, optionally grading them against a key
    Scan {
        /// Sheet images (png, jpg, jpeg, webp)
        #[arg(long = "image", required = true, num_args = 1..)]
        images: Vec<PathBuf>,

        /// Answer key TOML to grade the sheets against
        #[arg(long)]
        answer_key: Option<PathBuf>,

        /// Scoring mode: model or hybrid
        #[arg(long, default_value = "hybrid")]
        mode: ScoringMode,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Score a single candidate answer against a reference
    Score {
        /// Reference answer
        #[arg(long)]
        reference: String,

        /// Candidate answer
        #[arg(long)]
        candidate: String,

        /// Scoring mode: model or hybrid
        #[arg(long, default_value = "hybrid")]
        mode: ScoringMode,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,

        /// Print the full score as JSON
        #[arg(long)]
        json: bool,
    },

    /// Grade every topic of a topic set
    Evaluate {
        /// Path to a topic set .toml file or directory
        #[arg(long)]
        topic_set: PathBuf,

        /// Grade only this topic
        #[arg(long)]
        topic: Option<String>,

        /// Scoring mode: model or hybrid
        #[arg(long, default_value = "hybrid")]
        mode: ScoringMode,

        /// Output directory (defaults to `output_dir` from the config)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Output format: json, html, all
        #[arg(long, default_value = "json")]
        format: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Validate topic set and answer key TOML files
    Validate {
        /// Path to a set file or directory
        #[arg(long)]
        file: PathBuf,
    },

    /// List available models
    ListModels {
        /// Filter to specific provider
        #[arg(long)]
        provider: Option<String>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Create starter config, example topic set and answer key
    Init,
}

#[tokio::main]
async fn main() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("gradekit=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Scan {
            images,
            answer_key,
            mode,
            config,
        } => commands::scan::execute(images, answer_key, mode, config).await,
        Commands::Score {
            reference,
            candidate,
            mode,
            config,
            json,
        } => commands::score::execute(reference, candidate, mode, config, json).await,
        Commands::Evaluate {
            topic_set,
            topic,
            mode,
            output,
            format,
            config,
        } => commands::evaluate::execute(topic_set, topic, mode, output, format, config).await,
        Commands::Validate { file } => commands::validate::execute(file),
        Commands::ListModels { provider, config } => {
            commands::list_models::execute(provider, config).await
        }
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
