//! Search command implementation

use crate::commands::common::{load_contexts, load_search_config};
use crate::commands::report::format_summary;
use crate::http::{HttpGenerator, HttpJudge, HttpProver, KiminaVerifier, VerifierOptions};
use conjecturer::{SearchLoop, SearchServices};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Configuration for the run command
#[derive(Debug, Clone)]
pub struct RunCmdConfig {
    pub context_file: PathBuf,
    pub config: Option<String>,
    pub data_dir: Option<String>,
    pub max_iterations: Option<u64>,
    pub k: Option<usize>,
    pub island: bool,
    pub fresh: bool,
    pub grow_context: bool,
    pub seed: Option<u64>,
    pub verifier_url: String,
    pub prover_url: String,
    pub generator_url: String,
    pub judge_url: String,
    pub verifier: VerifierOptions,
    /// Request timeout for the model services
    pub model_timeout_secs: u64,
}

/// Run the search over every context in the list
pub async fn run_search(cmd: RunCmdConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_search_config(cmd.config.as_deref(), cmd.data_dir.as_deref())?;
    if let Some(iterations) = cmd.max_iterations {
        config.max_iterations = iterations;
    }
    if let Some(k) = cmd.k {
        config.cascade.k = k;
    }
    if cmd.island {
        config.archive.reset_each_iteration = true;
    }
    if cmd.grow_context {
        config.grow_context = true;
    }
    if cmd.seed.is_some() {
        config.seed = cmd.seed;
    }
    config.validate()?;

    let contexts = load_contexts(&cmd.context_file)?;
    println!("Loaded {} context(s) from {}", contexts.len(), cmd.context_file.display());

    let model_timeout = Duration::from_secs(cmd.model_timeout_secs);
    let services = SearchServices {
        generator: Arc::new(HttpGenerator::new(&cmd.generator_url, model_timeout)?),
        verifier: Arc::new(KiminaVerifier::new(&cmd.verifier_url, cmd.verifier)?),
        prover: Arc::new(HttpProver::new(&cmd.prover_url, model_timeout)?),
        judge: Arc::new(HttpJudge::new(&cmd.judge_url, model_timeout)?),
    };

    let max_iterations = config.max_iterations;
    let mut search = SearchLoop::new(config, services)?;
    if !cmd.fresh {
        let restored = search.restore().await?;
        println!(
            "Restored {} elite(s) and {} ledger record(s); resuming at step {}",
            restored.elites, restored.ledger_records, restored.next_step
        );
    }

    info!(contexts = contexts.len(), max_iterations, "search starting");
    let summaries = search.run(&contexts, max_iterations).await?;
    for summary in &summaries {
        println!("{}", format_summary(summary));
    }

    let state = search.state().lock().await;
    println!(
        "\nArchive: {} elite(s), coverage {:.1}%",
        state.archive.len(),
        state.archive.coverage() * 100.0
    );
    println!("Ledger: {}", search.ledger().path().display());
    Ok(())
}
