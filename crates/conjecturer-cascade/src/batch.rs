//! Batch identities
//!
//! Stage batches address candidates by their position (`"i"`); pass@k
//! batches flatten an `n × k` grid of completions into one request with
//! composite ids `"i:j"`. Replies are regrouped by parsing those ids back.
//! Any id that does not parse, points outside the submitted grid, repeats,
//! or is missing is a [`ProtocolError`]: a misassigned result would attach
//! a proof to the wrong candidate.

use std::fmt;
use thiserror::Error;

use crate::response::CheckResult;

/// Fatal violations of the batch contract
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Result id is not of the expected form
    #[error("Unexpected batch id shape: {0:?}")]
    MalformedId(String),
    /// Result id parses but addresses no submitted snippet
    #[error("Batch id {0:?} is outside the submitted batch")]
    UnknownId(String),
    /// The same id was answered twice
    #[error("Batch id {0:?} answered more than once")]
    DuplicateId(String),
    /// A submitted snippet got no answer
    #[error("No result for batch id {0:?}")]
    MissingResult(String),
    /// A per-statement reply list has the wrong length
    #[error("{service} returned {got} entries for {expected} statements")]
    ArityMismatch {
        service: &'static str,
        expected: usize,
        got: usize,
    },
}

/// Address of completion `completion` of open candidate `candidate`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompositeId {
    pub candidate: usize,
    pub completion: usize,
}

impl CompositeId {
    pub fn new(candidate: usize, completion: usize) -> Self {
        Self {
            candidate,
            completion,
        }
    }

    /// Parse `"i:j"` with both parts plain decimal digits
    pub fn parse(id: &str) -> Result<Self, ProtocolError> {
        let malformed = || ProtocolError::MalformedId(id.to_string());
        let (i, j) = id.split_once(':').ok_or_else(malformed)?;
        Ok(Self {
            candidate: parse_index(i).ok_or_else(malformed)?,
            completion: parse_index(j).ok_or_else(malformed)?,
        })
    }
}

impl fmt::Display for CompositeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.candidate, self.completion)
    }
}

fn parse_index(s: &str) -> Option<usize> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Align stage results (ids `"0".."n-1"`) with the submitted order
pub fn align_by_index(
    results: Vec<CheckResult>,
    n: usize,
) -> Result<Vec<CheckResult>, ProtocolError> {
    let mut slots: Vec<Option<CheckResult>> = vec![None; n];
    for result in results {
        let idx = parse_index(&result.id)
            .ok_or_else(|| ProtocolError::MalformedId(result.id.clone()))?;
        let slot = slots
            .get_mut(idx)
            .ok_or_else(|| ProtocolError::UnknownId(result.id.clone()))?;
        if slot.is_some() {
            return Err(ProtocolError::DuplicateId(result.id));
        }
        *slot = Some(result);
    }
    slots
        .into_iter()
        .enumerate()
        .map(|(i, slot)| slot.ok_or_else(|| ProtocolError::MissingResult(i.to_string())))
        .collect()
}

/// Regroup flat `"i:j"` results into a jagged grid shaped like `shape`
///
/// `shape[i]` is the number of completions submitted for candidate `i`.
pub fn regroup(
    results: Vec<CheckResult>,
    shape: &[usize],
) -> Result<Vec<Vec<CheckResult>>, ProtocolError> {
    let mut grid: Vec<Vec<Option<CheckResult>>> =
        shape.iter().map(|&k| vec![None; k]).collect();

    for result in results {
        let id = CompositeId::parse(&result.id)?;
        let slot = grid
            .get_mut(id.candidate)
            .and_then(|row| row.get_mut(id.completion))
            .ok_or_else(|| ProtocolError::UnknownId(result.id.clone()))?;
        if slot.is_some() {
            return Err(ProtocolError::DuplicateId(result.id));
        }
        *slot = Some(result);
    }

    grid.into_iter()
        .enumerate()
        .map(|(i, row)| {
            row.into_iter()
                .enumerate()
                .map(|(j, slot)| {
                    slot.ok_or_else(|| {
                        ProtocolError::MissingResult(CompositeId::new(i, j).to_string())
                    })
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(id: &str) -> CheckResult {
        CheckResult::ok(id, vec![])
    }

    #[test]
    fn test_composite_id_parse() {
        assert_eq!(CompositeId::parse("3:12").unwrap(), CompositeId::new(3, 12));
        assert_eq!(CompositeId::new(3, 12).to_string(), "3:12");
        for bad in ["abc", "1", "1:", ":2", "1:2:3", "-1:2", "+1:2", " 1:2", "1:x"] {
            assert_eq!(
                CompositeId::parse(bad),
                Err(ProtocolError::MalformedId(bad.to_string())),
                "{bad}"
            );
        }
    }

    #[test]
    fn test_regroup_jagged_out_of_order() {
        let results = vec![ok("1:0"), ok("0:1"), ok("2:2"), ok("0:0"), ok("2:0"), ok("2:1")];
        let grid = regroup(results, &[2, 1, 3]).unwrap();
        assert_eq!(grid.len(), 3);
        assert_eq!(grid[0][1].id, "0:1");
        assert_eq!(grid[1].len(), 1);
        assert_eq!(grid[2][2].id, "2:2");
    }

    #[test]
    fn test_regroup_rejects_bad_ids() {
        assert!(matches!(
            regroup(vec![ok("abc")], &[1]),
            Err(ProtocolError::MalformedId(_))
        ));
        assert!(matches!(
            regroup(vec![ok("0:5")], &[1]),
            Err(ProtocolError::UnknownId(_))
        ));
        assert!(matches!(
            regroup(vec![ok("0:0"), ok("0:0")], &[1]),
            Err(ProtocolError::DuplicateId(_))
        ));
        assert!(matches!(
            regroup(vec![ok("0:0")], &[2]),
            Err(ProtocolError::MissingResult(_))
        ));
    }

    #[test]
    fn test_align_by_index() {
        let aligned = align_by_index(vec![ok("1"), ok("0")], 2).unwrap();
        assert_eq!(aligned[0].id, "0");
        assert!(matches!(
            align_by_index(vec![ok("x")], 1),
            Err(ProtocolError::MalformedId(_))
        ));
        assert!(matches!(
            align_by_index(vec![ok("0")], 2),
            Err(ProtocolError::MissingResult(_))
        ));
    }
}
