// Crate-level lint configuration for pedantic clippy
#![allow(clippy::doc_markdown)] // Missing backticks - low priority
#![allow(clippy::uninlined_format_args)] // Named args are clearer

//! Conjecturer command-line driver
//!
//! Runs the conjecture search against a kimina Lean server and three model
//! endpoints, and reports on the persisted archive, ledger and operator
//! statistics.

use clap::{Parser, Subcommand};
use conjecturer_cli::commands::{run_elites, run_operators, run_results, run_search, RunCmdConfig};
use conjecturer_cli::http::{VerifierOptions, DEFAULT_KIMINA_URL};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "conjecturer")]
#[command(about = "Feedback-driven conjecture search over Lean 4")]
#[command(version)]
struct Cli {
    /// Search configuration file (JSON)
    #[arg(long, global = true, env = "CONJECTURER_CONFIG")]
    config: Option<String>,

    /// Directory for the archive, ledger and operator catalogue
    #[arg(long, global = true, env = "CONJECTURER_DATA_DIR")]
    data_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the search loop
    Run {
        /// File listing the Lean context files, one path per line
        #[arg(long, env = "CONJECTURER_CONTEXT_FILE")]
        context_file: PathBuf,

        /// Iterations per context
        #[arg(long)]
        max_iterations: Option<u64>,

        /// Proof completions sampled per statement
        #[arg(short, long)]
        k: Option<usize>,

        /// Clear the archive before every iteration
        #[arg(long)]
        island: bool,

        /// Ignore state persisted by earlier runs
        #[arg(long)]
        fresh: bool,

        /// Add proved statements to the context for later iterations
        #[arg(long)]
        grow_context: bool,

        /// Seed for parent and operator selection
        #[arg(long, env = "CONJECTURER_SEED")]
        seed: Option<u64>,

        /// Kimina Lean server URL
        #[arg(long, default_value = DEFAULT_KIMINA_URL, env = "KIMINA_SERVER_URL")]
        verifier_url: String,

        /// Proof-completion service URL
        #[arg(long, env = "CONJECTURER_PROVER_URL")]
        prover_url: String,

        /// Statement generator URL
        #[arg(long, env = "CONJECTURER_GENERATOR_URL")]
        generator_url: String,

        /// Quality judge URL
        #[arg(long, env = "CONJECTURER_JUDGE_URL")]
        judge_url: String,

        /// Snippets per Lean server request
        #[arg(long, default_value = "32")]
        batch_size: usize,

        /// Lean server requests in flight
        #[arg(long, default_value = "16")]
        max_workers: usize,

        /// Per-snippet Lean timeout in seconds
        #[arg(long, default_value = "120")]
        lean_timeout: u64,

        /// Model request timeout in seconds
        #[arg(long, default_value = "600")]
        model_timeout: u64,
    },

    /// List archive elites, best first
    Elites {
        /// Maximum rows to show
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },

    /// Show proved and likely false statements from the ledger
    Results {
        /// Maximum records to show
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },

    /// Show operator statistics rebuilt from the ledger
    Operators,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = cli.config.as_deref();
    let data_dir = cli.data_dir.as_deref();

    match cli.command {
        Commands::Run {
            context_file,
            max_iterations,
            k,
            island,
            fresh,
            grow_context,
            seed,
            verifier_url,
            prover_url,
            generator_url,
            judge_url,
            batch_size,
            max_workers,
            lean_timeout,
            model_timeout,
        } => {
            run_search(RunCmdConfig {
                context_file,
                config: cli.config.clone(),
                data_dir: cli.data_dir.clone(),
                max_iterations,
                k,
                island,
                fresh,
                grow_context,
                seed,
                verifier_url,
                prover_url,
                generator_url,
                judge_url,
                verifier: VerifierOptions {
                    batch_size,
                    max_workers,
                    timeout_secs: lean_timeout,
                },
                model_timeout_secs: model_timeout,
            })
            .await
        }
        Commands::Elites { limit } => run_elites(config, data_dir, limit),
        Commands::Results { limit } => run_results(config, data_dir, limit),
        Commands::Operators => run_operators(config, data_dir),
    }
}
