//! Top-K selection between phases

use fluxtune_core::{CandidateId, CandidateTracker};
use std::cmp::Ordering;

/// Rank successfully benchmarked trackers by ascending latency and keep the
/// best `k` (all when `k` is `None`). Ties go to the lower id, so the result
/// does not depend on the order of `trackers`.
pub fn select_top_k(trackers: &[CandidateTracker], k: Option<usize>) -> Vec<CandidateId> {
    let mut measured: Vec<(f64, CandidateId)> = trackers
        .iter()
        .filter_map(|t| t.latency_ms().map(|latency| (latency, t.id())))
        .collect();
    measured.sort_by(|a, b| match a.0.total_cmp(&b.0) {
        Ordering::Equal => a.1.cmp(&b.1),
        ord => ord,
    });
    if let Some(k) = k {
        measured.truncate(k);
    }
    measured.into_iter().map(|(_, id)| id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluxtune_core::{BenchmarkResult, CandidateStore, CompileResult, JobStatus, NewCandidate};
    use std::path::PathBuf;
    use std::time::Duration;

    fn measured(latencies: &[Option<f64>]) -> Vec<CandidateTracker> {
        let store = CandidateStore::new();
        for (i, latency) in latencies.iter().enumerate() {
            let id = store.add(NewCandidate::dispatch(format!("{i}_spec.mlir")));
            store
                .record_compile_result(
                    id,
                    CompileResult {
                        status: JobStatus::Success,
                        artifact: Some(PathBuf::from(format!("dispatch_{i}.vmfb"))),
                        diagnostics: String::new(),
                        duration: Duration::ZERO,
                    },
                )
                .unwrap();
            store
                .record_benchmark_result(
                    id,
                    BenchmarkResult {
                        status: if latency.is_some() {
                            JobStatus::Success
                        } else {
                            JobStatus::Failure
                        },
                        latency_ms: *latency,
                        diagnostics: String::new(),
                        duration: Duration::ZERO,
                    },
                )
                .unwrap();
        }
        store.trackers()
    }

    #[test]
    fn test_ties_go_to_lower_id() {
        let trackers = measured(&[Some(5.0), Some(3.0), Some(3.0), Some(9.0)]);
        assert_eq!(
            select_top_k(&trackers, Some(2)),
            vec![CandidateId(1), CandidateId(2)]
        );
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let mut trackers = measured(&[Some(5.0), Some(3.0), Some(3.0), Some(9.0)]);
        trackers.reverse();
        assert_eq!(
            select_top_k(&trackers, Some(2)),
            vec![CandidateId(1), CandidateId(2)]
        );
    }

    #[test]
    fn test_unset_k_keeps_all_successful() {
        let trackers = measured(&[Some(2.0), None, Some(1.0)]);
        assert_eq!(
            select_top_k(&trackers, None),
            vec![CandidateId(2), CandidateId(0)]
        );
    }

    #[test]
    fn test_k_larger_than_survivors() {
        let trackers = measured(&[Some(2.0), None]);
        assert_eq!(select_top_k(&trackers, Some(10)), vec![CandidateId(0)]);
        assert!(select_top_k(&measured(&[None, None]), Some(1)).is_empty());
    }
}
