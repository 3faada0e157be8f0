//! Read-only reports over the persisted run state

use crate::commands::common::{load_search_config, one_line};
use conjecturer::archive::{EliteRecord, FeatureArchive};
use conjecturer::ledger::{LedgerRecord, RunLedger};
use conjecturer::scheduler::OperatorTable;
use conjecturer::IterationSummary;
use std::fmt::Write as _;

/// Width statements are cut to in tables
const STATEMENT_WIDTH: usize = 72;

/// Archive elites, best first
pub fn format_elites(elites: &[EliteRecord], limit: usize) -> String {
    let mut sorted: Vec<&EliteRecord> = elites.iter().collect();
    sorted.sort_by(|a, b| b.fitness_score.total_cmp(&a.fitness_score));

    let mut out = String::new();
    let _ = writeln!(out, "=== Archive Elites ({}) ===", elites.len());
    for elite in sorted.into_iter().take(limit) {
        let features: Vec<String> = elite
            .feature_vector
            .iter()
            .map(|(name, score)| format!("{name}={score:.0}"))
            .collect();
        let _ = writeln!(
            out,
            "{:.3}  [{}]  {:<16} {}",
            elite.fitness_score,
            features.join(" "),
            elite.operator_id,
            one_line(&elite.payload, STATEMENT_WIDTH)
        );
    }
    out
}

/// Proved and likely false ledger records, best first
pub fn format_results(records: &[LedgerRecord], limit: usize) -> String {
    let mut settled: Vec<&LedgerRecord> = records
        .iter()
        .filter(|r| r.outcome.is_settled())
        .collect();
    settled.sort_by(|a, b| b.fitness_score.total_cmp(&a.fitness_score));

    let mut out = String::new();
    let _ = writeln!(
        out,
        "=== Results: {} of {} candidates ===",
        settled.len(),
        records.len()
    );
    for record in settled.into_iter().take(limit) {
        let _ = writeln!(
            out,
            "\n[{}] {:.3} {} (iteration {}, operator {})",
            record.outcome,
            record.fitness_score,
            record.context_id,
            record.iteration,
            record.operator_id
        );
        let _ = writeln!(out, "{}", record.statement.trim_end());
        if let Some(proof) = record.outcome.proof() {
            let _ = writeln!(out, "  {}", proof.trim());
        }
        if let Some(justification) = record.justification.as_deref() {
            let _ = writeln!(out, "  -- {}", one_line(justification, STATEMENT_WIDTH));
        }
    }
    out
}

/// Operator posteriors, most promising first
pub fn format_operators(table: &OperatorTable) -> String {
    let mut stats: Vec<_> = table.stats().collect();
    stats.sort_by(|a, b| b.1.mean().total_cmp(&a.1.mean()));

    let mut out = String::new();
    let _ = writeln!(out, "=== Operators ({}) ===", stats.len());
    let _ = writeln!(out, "{:<24} {:>9} {:>7} {:>6}", "operator", "successes", "trials", "mean");
    for (name, s) in stats {
        let _ = writeln!(
            out,
            "{:<24} {:>9} {:>7} {:>6.3}",
            name,
            s.successes,
            s.trials,
            s.mean()
        );
    }
    out
}

/// One line per finished iteration
pub fn format_summary(summary: &IterationSummary) -> String {
    let best = summary
        .best_fitness
        .map_or_else(|| "-".to_string(), |f| format!("{f:.3}"));
    format!(
        "step {:>4}  {:<24} op={:<16} n={} failed={} trivial={} proved={} false={} open={} new_elites={} best={}",
        summary.step,
        one_line(&summary.context_id, 24),
        summary.operator,
        summary.candidates,
        summary.compile_failed,
        summary.trivially_provable,
        summary.non_trivially_provable,
        summary.likely_false,
        summary.inconclusive,
        summary.archive_updates,
        best
    )
}

/// Run elites command
pub fn run_elites(
    config: Option<&str>,
    data_dir: Option<&str>,
    limit: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_search_config(config, data_dir)?;
    println!("Loading archive from: {}", config.archive.file_path.display());
    let archive = FeatureArchive::open(config.archive)?;
    print!("{}", format_elites(&archive.elites(), limit));
    println!("Coverage: {:.1}%", archive.coverage() * 100.0);
    Ok(())
}

/// Run results command
pub fn run_results(
    config: Option<&str>,
    data_dir: Option<&str>,
    limit: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_search_config(config, data_dir)?;
    let ledger = RunLedger::new(&config.ledger_path);
    println!("Loading ledger from: {}", ledger.path().display());
    let records = ledger.load()?;
    print!("{}", format_results(&records, limit));
    Ok(())
}

/// Run operators command
pub fn run_operators(config: Option<&str>, data_dir: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_search_config(config, data_dir)?;
    let records = RunLedger::new(&config.ledger_path).load()?;
    let table = OperatorTable::from_ledger(&records, config.exploration);
    print!("{}", format_operators(&table));
    Ok(())
}
