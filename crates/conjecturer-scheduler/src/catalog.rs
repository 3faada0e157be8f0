//! Mutation operator catalogue
//!
//! Operators are natural-language rewrite instructions, kept per context:
//!
//! ```json
//! {
//!   "Nat/Basic": {
//!     "generalize": "Replace a concrete constant by a universally quantified variable",
//!     "negate_hypothesis": "Flip one hypothesis and look for a surprising consequence"
//!   }
//! }
//! ```
//!
//! When the novel arm is chosen the generator invents a new operator; it is
//! registered here so later iterations can select it as a known arm.

use conjecturer_archive::persist::clean_stale_temp;
use conjecturer_archive::write_json_atomic;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::operators::NOVEL_OPERATOR;
use crate::SchedulerError;

/// Default catalogue location relative to the data directory
pub const DEFAULT_CATALOG_FILE: &str = "mutations.json";

/// A named operator with its instruction text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl OperatorDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }

    pub fn is_novel(&self) -> bool {
        self.name == NOVEL_OPERATOR
    }
}

type ContextOperators = BTreeMap<String, String>;

/// Per-context operator map with atomic persistence
#[derive(Debug, Clone)]
pub struct OperatorCatalog {
    path: PathBuf,
    contexts: BTreeMap<String, ContextOperators>,
    dirty: bool,
}

impl OperatorCatalog {
    /// Empty catalogue persisted at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            contexts: BTreeMap::new(),
            dirty: false,
        }
    }

    /// Catalogue at `path` with whatever the file already holds
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let mut catalog = Self::new(path);
        let path = catalog.path.clone();
        clean_stale_temp(&path);
        let added = catalog.merge_file(&path);
        catalog.dirty = false;
        debug!(path = %path.display(), operators = added, "operator catalogue opened");
        catalog
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Add operators from a seed file without overriding existing entries
    ///
    /// Missing or unreadable files add nothing. Returns how many operators
    /// were added.
    pub fn merge_file(&mut self, path: &Path) -> usize {
        if !path.exists() {
            return 0;
        }
        let document: BTreeMap<String, ContextOperators> = match std::fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|text| serde_json::from_str(&text).map_err(|e| e.to_string()))
        {
            Ok(doc) => doc,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read operator catalogue");
                return 0;
            }
        };

        let mut added = 0;
        for (context, operators) in document {
            let entry = self.contexts.entry(context).or_default();
            for (name, description) in operators {
                if name.trim().is_empty() || name == NOVEL_OPERATOR {
                    warn!(%name, "ignoring reserved operator name");
                    continue;
                }
                if !entry.contains_key(&name) {
                    entry.insert(name, description);
                    added += 1;
                }
            }
        }
        if added > 0 {
            self.dirty = true;
        }
        added
    }

    /// Operators registered for `context`, sorted by name
    pub fn operators(&self, context: &str) -> Vec<OperatorDescriptor> {
        self.contexts
            .get(context)
            .map(|ops| {
                ops.iter()
                    .map(|(name, desc)| OperatorDescriptor::new(name, desc))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Operator names for `context`
    pub fn names(&self, context: &str) -> Vec<String> {
        self.contexts
            .get(context)
            .map(|ops| ops.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn get(&self, context: &str, name: &str) -> Option<OperatorDescriptor> {
        let description = self.contexts.get(context)?.get(name)?;
        Some(OperatorDescriptor::new(name, description))
    }

    /// Register or update an operator
    ///
    /// The novel arm and blank names are refused. Returns whether the
    /// catalogue changed.
    pub fn register(&mut self, context: &str, operator: &OperatorDescriptor) -> bool {
        let name = operator.name.trim();
        if name.is_empty() || operator.is_novel() {
            return false;
        }
        let ops = self.contexts.entry(context.to_string()).or_default();
        if ops.get(name) == Some(&operator.description) {
            return false;
        }
        let is_new = ops
            .insert(name.to_string(), operator.description.clone())
            .is_none();
        if is_new {
            info!(context, operator = name, "registered new operator");
        }
        self.dirty = true;
        true
    }

    /// Write the catalogue if it changed; returns whether a write happened
    pub fn persist(&mut self) -> Result<bool, SchedulerError> {
        if !self.dirty {
            return Ok(false);
        }
        write_json_atomic(&self.path, &self.contexts)?;
        self.dirty = false;
        Ok(true)
    }
}
