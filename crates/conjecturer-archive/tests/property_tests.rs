//! Property-based tests for conjecturer-archive
//!
//! Uses proptest to verify:
//! - Niche keys stay inside the grid for any score, including NaN
//! - Replaying an identical record never changes the incumbent
//! - persist -> load reproduces the same elite map

use conjecturer_archive::{
    ArchiveConfig, Dimension, EliteRecord, FeatureArchive, FeatureSpace, FeatureVector,
};
use proptest::prelude::*;

// ============================================================================
// Generators
// ============================================================================

/// Any f64, weighted towards the interesting edges
fn score_strategy() -> impl Strategy<Value = f64> {
    prop_oneof![
        -1000.0f64..1000.0,
        0.0f64..=100.0,
        Just(f64::NAN),
        Just(f64::INFINITY),
        Just(f64::NEG_INFINITY),
        Just(100.0),
        Just(0.0),
    ]
}

fn space_strategy() -> impl Strategy<Value = FeatureSpace> {
    prop::collection::vec(1usize..20, 1..5).prop_map(|bins| {
        FeatureSpace::new(
            bins.into_iter()
                .enumerate()
                .map(|(i, b)| Dimension::new(format!("d{i}"), b))
                .collect(),
        )
    })
}

fn record_strategy() -> impl Strategy<Value = EliteRecord> {
    (
        0.0f64..100.0,
        0.0f64..100.0,
        0.0f64..100.0,
        0.0f64..1.0,
        0i64..1_000_000,
        "[a-z_]{1,12}",
    )
        .prop_map(|(n, d, p, fitness, ts, op)| {
            EliteRecord::new(
                op,
                "theorem t : True := by\n",
                fitness,
                FeatureVector::from([
                    ("novelty", n),
                    ("difficulty", d),
                    ("provability_estimate", p),
                ]),
            )
            .with_timestamp(ts)
        })
}

proptest! {
    #[test]
    fn niche_key_within_bounds(space in space_strategy(), scores in prop::collection::vec(score_strategy(), 5)) {
        let mut fv = FeatureVector::new();
        for (i, dim) in space.dimensions.iter().enumerate() {
            fv.set(dim.name.clone(), scores[i % scores.len()]);
        }
        let key = space.key_for(&fv).expect("all dimensions present");
        prop_assert_eq!(key.indices().len(), space.arity());
        for (idx, dim) in key.indices().iter().zip(&space.dimensions) {
            prop_assert!(*idx < dim.bins);
        }
    }

    #[test]
    fn replay_never_changes_incumbent(records in prop::collection::vec(record_strategy(), 1..30)) {
        let mut archive = FeatureArchive::new(ArchiveConfig::default()).unwrap();
        for rec in &records {
            archive.insert(rec.clone());
        }
        let before = archive.entries();
        for rec in &records {
            prop_assert!(!archive.insert(rec.clone()).is_accepted());
        }
        prop_assert_eq!(before, archive.entries());
    }

    #[test]
    fn persist_load_round_trip(records in prop::collection::vec(record_strategy(), 1..30)) {
        let dir = tempfile::tempdir().unwrap();
        let config = ArchiveConfig::at(dir.path().join("program_map.json"));

        let mut archive = FeatureArchive::new(config.clone()).unwrap();
        for rec in records {
            archive.insert(rec);
        }
        prop_assert!(archive.persist().unwrap());

        let reloaded = FeatureArchive::open(config).unwrap();
        prop_assert_eq!(archive.entries(), reloaded.entries());
    }
}
