//! JSONL storage
//!
//! One JSON object per line, appended in evaluation order. Appends go
//! through a fresh append-mode handle per batch, so a crash can at worst
//! leave a truncated final line, which readers skip.

use chrono::Utc;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::record::LedgerRecord;
use crate::LedgerError;

/// Default ledger location relative to the data directory
pub const DEFAULT_LEDGER_FILE: &str = "program_db.jsonl";

/// Append-only log of every evaluated candidate
#[derive(Debug, Clone)]
pub struct RunLedger {
    path: PathBuf,
}

impl RunLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Ledger at `data_dir/program_db.jsonl`
    pub fn in_dir(data_dir: impl AsRef<Path>) -> Self {
        Self::new(data_dir.as_ref().join(DEFAULT_LEDGER_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record, filling `id` and `timestamp` when absent
    ///
    /// Returns the record as written.
    pub fn append(&self, record: LedgerRecord) -> Result<LedgerRecord, LedgerError> {
        let mut written = self.append_all(vec![record])?;
        Ok(written.remove(0))
    }

    /// Append several records in one write
    pub fn append_all(&self, records: Vec<LedgerRecord>) -> Result<Vec<LedgerRecord>, LedgerError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = BufWriter::new(file);

        let now = Utc::now().timestamp();
        let mut written = Vec::with_capacity(records.len());
        for mut record in records {
            record
                .id
                .get_or_insert_with(|| uuid::Uuid::new_v4().to_string());
            record.timestamp.get_or_insert(now);
            serde_json::to_writer(&mut writer, &record)?;
            writer.write_all(b"\n")?;
            written.push(record);
        }
        writer.flush()?;
        writer.get_ref().sync_data()?;
        debug!(path = %self.path.display(), count = written.len(), "ledger append");
        Ok(written)
    }

    /// All records; a missing file is an empty ledger
    ///
    /// Blank lines are ignored and malformed lines are skipped with a
    /// warning.
    pub fn load(&self) -> Result<Vec<LedgerRecord>, LedgerError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for (lineno, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<LedgerRecord>(&line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(
                    path = %self.path.display(),
                    line = lineno + 1,
                    error = %e,
                    "skipping malformed ledger line"
                ),
            }
        }
        Ok(records)
    }

    /// Records with `fitness_score >= min_score`
    pub fn load_min_score(&self, min_score: f64) -> Result<Vec<LedgerRecord>, LedgerError> {
        Ok(self
            .load()?
            .into_iter()
            .filter(|r| r.fitness_score >= min_score)
            .collect())
    }
}
