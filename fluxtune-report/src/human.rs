//! Output Formatting
//!
//! Terminal summary of a tuning run: outcome, per-kind counts with status
//! icons (✓/✗/⏱), the ranked survivors and the first line of every failure.

use crate::report::TuningReport;
use fluxtune_core::{CandidateTracker, JobStatus, RunOutcome};

fn status_icon(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Success => "✓",
        JobStatus::Failure => "✗",
        JobStatus::Timeout => "⏱",
    }
}

fn first_line(diagnostics: &str) -> &str {
    diagnostics
        .lines()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("")
}

/// Format a report for human-readable terminal display
pub fn format_human_output(report: &TuningReport) -> String {
    let mut output = String::new();

    output.push('\n');
    output.push_str("fluxtune Results\n");
    output.push_str(&"=".repeat(60));
    output.push_str("\n\n");

    output.push_str(&format!("  base dir: {}\n", report.meta.base_dir.display()));
    output.push_str(&format!("  devices:  {}\n", report.meta.devices.join(", ")));
    match &report.outcome {
        RunOutcome::Completed { phase, survivors } => output.push_str(&format!(
            "  outcome:  completed after {} ({} survivors)\n",
            phase,
            survivors.len()
        )),
        RunOutcome::Empty { phase } => output.push_str(&format!(
            "  outcome:  no candidate survived {}\n",
            phase
        )),
    }
    output.push('\n');

    for counts in &report.summary {
        output.push_str(&format!("{} candidates: {}\n", counts.kind, counts.total));
        output.push_str(&"-".repeat(60));
        output.push('\n');
        output.push_str(&format!(
            "  compile:   {} {}  {} {}  {} {}\n",
            status_icon(JobStatus::Success),
            counts.compiled,
            status_icon(JobStatus::Failure),
            counts.compile_failures,
            status_icon(JobStatus::Timeout),
            counts.compile_timeouts
        ));
        output.push_str(&format!(
            "  benchmark: {} {}  {} {}  {} {}\n\n",
            status_icon(JobStatus::Success),
            counts.benchmarked,
            status_icon(JobStatus::Failure),
            counts.benchmark_failures,
            status_icon(JobStatus::Timeout),
            counts.benchmark_timeouts
        ));
    }

    if !report.survivors.is_empty() {
        output.push_str("Top candidates\n");
        output.push_str(&"-".repeat(60));
        output.push('\n');
        for entry in &report.survivors {
            let latency = entry
                .latency_ms
                .map(|ms| format!("{:.3} ms", ms))
                .unwrap_or_else(|| "-".to_string());
            output.push_str(&format!(
                "  {:>3}. {} #{:<5} {:>12}  {}",
                entry.rank,
                entry.kind,
                entry.id.0,
                latency,
                entry.spec.display()
            ));
            if let Some(source) = entry.derived_from {
                output.push_str(&format!("  (from dispatch #{})", source));
            }
            output.push('\n');
        }
        output.push('\n');
    }

    let failures: Vec<&CandidateTracker> = report
        .history
        .iter()
        .filter(|t| {
            t.compile.as_ref().is_some_and(|r| !r.status.is_success())
                || t.benchmark.as_ref().is_some_and(|r| !r.status.is_success())
        })
        .collect();
    if !failures.is_empty() {
        output.push_str(&format!("Failures ({})\n", failures.len()));
        output.push_str(&"-".repeat(60));
        output.push('\n');
        for tracker in failures {
            let (job, status, diagnostics) = match (&tracker.compile, &tracker.benchmark) {
                (_, Some(bench)) if !bench.status.is_success() => {
                    ("benchmark", bench.status, bench.diagnostics.as_str())
                }
                (Some(compile), _) => ("compile", compile.status, compile.diagnostics.as_str()),
                _ => continue,
            };
            output.push_str(&format!(
                "  {} {} #{} {} {}: {}\n",
                status_icon(status),
                tracker.candidate.kind,
                tracker.id(),
                job,
                status,
                first_line(diagnostics)
            ));
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{ReportMeta, build_report};
    use fluxtune_core::{
        BenchmarkResult, CandidateId, CandidateStore, CompileResult, NewCandidate, Phase,
    };
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn test_human_output_lists_survivors_and_failures() {
        let store = CandidateStore::new();
        let good = store.add(NewCandidate::dispatch("0_spec.mlir"));
        let bad = store.add(NewCandidate::dispatch("1_spec.mlir"));
        store
            .record_compile_result(
                good,
                CompileResult {
                    status: JobStatus::Success,
                    artifact: Some(PathBuf::from("compiled/dispatch_0.vmfb")),
                    diagnostics: String::new(),
                    duration: Duration::from_millis(5),
                },
            )
            .unwrap();
        store
            .record_benchmark_result(
                good,
                BenchmarkResult {
                    status: JobStatus::Success,
                    latency_ms: Some(1.25),
                    diagnostics: String::new(),
                    duration: Duration::from_millis(5),
                },
            )
            .unwrap();
        store
            .record_compile_result(
                bad,
                CompileResult {
                    status: JobStatus::Timeout,
                    artifact: None,
                    diagnostics: "timed out after 60s\n".to_string(),
                    duration: Duration::from_secs(60),
                },
            )
            .unwrap();

        let outcome = RunOutcome::Completed {
            phase: Phase::BenchmarkDispatches,
            survivors: vec![CandidateId(0)],
        };
        let meta = ReportMeta::new(
            "tuning",
            vec!["hip://0".to_string()],
            Phase::BenchmarkDispatches,
        );
        let output = format_human_output(&build_report(meta, &outcome, store.trackers()));

        assert!(output.contains("completed after benchmark_dispatches (1 survivors)"));
        assert!(output.contains("1.250 ms"));
        assert!(output.contains("Failures (1)"));
        assert!(output.contains("⏱ dispatch #1 compile timeout: timed out after 60s"));
    }

    #[test]
    fn test_human_output_empty_run() {
        let meta = ReportMeta::new(
            "tuning",
            vec!["local-task".to_string()],
            Phase::BenchmarkModels,
        );
        let outcome = RunOutcome::Empty {
            phase: Phase::GenerateCandidates,
        };
        let output = format_human_output(&build_report(meta, &outcome, Vec::new()));

        assert!(output.contains("no candidate survived generate_candidates"));
        assert!(!output.contains("Top candidates"));
    }
}
