//! Common utilities shared across CLI commands

use conjecturer::{SearchConfig, SearchContext, DEFAULT_DATA_DIR};
use std::path::{Path, PathBuf};

/// Resolve the data directory, falling back to `./data`
pub fn resolve_data_dir(data_dir: Option<&str>) -> PathBuf {
    data_dir.map_or_else(|| PathBuf::from(DEFAULT_DATA_DIR), PathBuf::from)
}

/// Search configuration from an optional JSON file, rebased onto the data
/// directory when one is given
pub fn load_search_config(
    config_path: Option<&str>,
    data_dir: Option<&str>,
) -> Result<SearchConfig, Box<dyn std::error::Error>> {
    let config = match (config_path, data_dir) {
        (Some(path), Some(dir)) => SearchConfig::from_file(path)?.with_data_dir(dir),
        (Some(path), None) => SearchConfig::from_file(path)?,
        (None, dir) => SearchConfig::in_data_dir(resolve_data_dir(dir)),
    };
    Ok(config)
}

/// Paths listed in a context file
///
/// One Lean file per line. Blank lines and `#` comments are skipped.
pub fn parse_context_list(text: &str) -> Vec<PathBuf> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(PathBuf::from)
        .collect()
}

/// Read every Lean file named in the context list at `path`
pub fn load_contexts(path: &Path) -> Result<Vec<SearchContext>, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read context list {}: {}", path.display(), e))?;
    let files = parse_context_list(&text);
    if files.is_empty() {
        return Err(format!("Context list {} names no Lean files", path.display()).into());
    }
    let mut contexts = Vec::with_capacity(files.len());
    for file in &files {
        let context = SearchContext::from_file(file)
            .map_err(|e| format!("Failed to load context {}: {}", file.display(), e))?;
        contexts.push(context);
    }
    Ok(contexts)
}

/// Shorten `text` to its first line, at most `width` characters
pub fn one_line(text: &str, width: usize) -> String {
    let first = text.trim().lines().next().unwrap_or_default();
    if first.chars().count() <= width {
        first.to_string()
    } else {
        let cut: String = first.chars().take(width.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}
