//! Integration tests for fluxtune
//!
//! These tests drive complete tuning runs with `sh` standing in for the
//! compiler and the benchmark tool. Each candidate spec holds the latency the
//! fake benchmark reports for it, or a keyword that makes a job misbehave.

use fluxtune::{
    CandidateGenerator, CandidateId, CandidateKind, CandidateStore, Device, DeviceError,
    DeviceValidator, JobStatus, Phase, Pipeline, PipelineConfig, PipelineError, RunOutcome,
    StaticStrategy, TuneConfig,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// `hang` sleeps past the timeout, `fail` exits non-zero, anything else is
/// copied into the artifact
const COMPILE_SCRIPT: &str = r#"v=$(cat {spec}); test -f {input} || exit 2; case "$v" in hang) sleep 30;; fail) echo "error: bad tile size" >&2; exit 1;; esac; printf '%s' "$v" > {artifact}"#;

/// Reports the artifact's content as the latency in ms
const BENCHMARK_SCRIPT: &str = r#"v=$(cat {artifact}); case "$v" in bench-hang) sleep 30;; bench-fail) exit 3;; esac; echo "BM_main/real_time $v ms $v ms 1""#;

fn config(base: &Path, devices: &[&str], stop_after: &str) -> TuneConfig {
    let mut config = TuneConfig::default();
    config.runner.devices = devices.iter().map(|d| d.to_string()).collect();
    config.runner.stop_after = stop_after.to_string();
    config.runner.compile_timeout = "1s".to_string();
    config.runner.progress = false;
    config.paths.base_dir = Some(base.to_string_lossy().into_owned());
    config.tools.compiler = "sh".to_string();
    config.tools.compile_args = vec!["-c".to_string(), COMPILE_SCRIPT.to_string()];
    config.tools.benchmark = "sh".to_string();
    config.tools.benchmark_args = vec!["-c".to_string(), BENCHMARK_SCRIPT.to_string()];
    config
}

fn strategy() -> StaticStrategy {
    StaticStrategy {
        benchmark_timeout: Duration::from_secs(1),
        ..Default::default()
    }
}

/// Writes one spec per entry of `contents` and reports them in order
fn generator(contents: &[&str]) -> impl CandidateGenerator + 'static {
    let contents: Vec<String> = contents.iter().map(|c| c.to_string()).collect();
    move |specs_dir: &Path| -> anyhow::Result<Vec<PathBuf>> {
        let mut specs = Vec::new();
        for (i, content) in contents.iter().enumerate() {
            let spec = specs_dir.join(format!("{i}_spec.mlir"));
            std::fs::write(&spec, content)?;
            specs.push(spec);
        }
        Ok(specs)
    }
}

fn model_inputs(dir: &Path) -> Vec<String> {
    ["model_a.mlir", "model_b.mlir"]
        .iter()
        .map(|name| {
            let path = dir.join(name);
            std::fs::write(&path, "module {}").unwrap();
            path.to_string_lossy().into_owned()
        })
        .collect()
}

fn assert_benchmarks_follow_compiles(store: &CandidateStore) {
    for tracker in store.trackers() {
        if tracker.benchmark.is_some() {
            assert!(
                tracker.compiled_artifact().is_some(),
                "candidate {} was benchmarked without a successful compile",
                tracker.id()
            );
        }
    }
}

#[test]
fn test_zero_devices_aborts_before_generation() {
    let dir = tempfile::tempdir().unwrap();
    let called = Arc::new(AtomicBool::new(false));
    let seen = Arc::clone(&called);
    let generator = move |_: &Path| -> anyhow::Result<Vec<PathBuf>> {
        seen.store(true, Ordering::SeqCst);
        Ok(Vec::new())
    };

    let config =
        PipelineConfig::from_config(&config(&dir.path().join("run"), &[], "benchmark_models"))
            .unwrap();
    let pipeline = Pipeline::new(config, strategy(), generator);

    let err = pipeline.run().unwrap_err();
    assert!(matches!(err, PipelineError::Device(DeviceError::NoDevices)));
    assert!(pipeline.store().is_empty());
    assert!(!called.load(Ordering::SeqCst));
    assert!(!dir.path().join("run").exists());
}

#[test]
fn test_device_validation_failure_aborts() {
    struct RejectSecond;

    impl DeviceValidator for RejectSecond {
        fn validate(&self, device: &Device) -> Result<(), String> {
            if device.id() == "hip://1" {
                Err("no such device".to_string())
            } else {
                Ok(())
            }
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::from_config(&config(
        dir.path(),
        &["hip://0", "hip://1"],
        "compile_dispatches",
    ))
    .unwrap();
    let pipeline = Pipeline::new(config, strategy(), generator(&["1.0"])).with_validator(RejectSecond);

    let err = pipeline.run().unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Device(DeviceError::Unreachable { ref device, .. }) if device == "hip://1"
    ));
    assert!(pipeline.store().is_empty());
}

#[test]
fn test_dry_run_skips_device_validation() {
    struct RejectAll;

    impl DeviceValidator for RejectAll {
        fn validate(&self, _device: &Device) -> Result<(), String> {
            Err("no such device".to_string())
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let mut tune = config(dir.path(), &["hip://0", "hip://1"], "compile_dispatches");
    tune.runner.dry_run = true;
    let config = PipelineConfig::from_config(&tune).unwrap();
    assert!(config.dry_run);
    let pipeline =
        Pipeline::new(config, strategy(), generator(&["1.0", "2.0"])).with_validator(RejectAll);

    let report = pipeline.run().unwrap();
    assert!(matches!(report.outcome, RunOutcome::Completed { .. }));
    assert_eq!(pipeline.store().len(), 2);
}

#[test]
fn test_dry_run_still_needs_a_device() {
    let dir = tempfile::tempdir().unwrap();
    let mut tune = config(dir.path(), &[], "compile_dispatches");
    tune.runner.dry_run = true;
    let config = PipelineConfig::from_config(&tune).unwrap();
    let pipeline = Pipeline::new(config, strategy(), generator(&["1.0"]));

    assert!(matches!(
        pipeline.run().unwrap_err(),
        PipelineError::Device(DeviceError::NoDevices)
    ));
}

#[test]
fn test_full_run_keeps_best_candidates() {
    let dir = tempfile::tempdir().unwrap();
    let mut tune = config(&dir.path().join("run"), &["d0", "d1"], "benchmark_models");
    tune.runner.num_dispatch_candidates = Some(2);
    tune.runner.num_model_candidates = Some(1);
    tune.paths.model_inputs = model_inputs(dir.path());
    let config = PipelineConfig::from_config(&tune).unwrap();
    let summary = config.paths.summary.clone();

    let pipeline = Pipeline::new(
        config,
        strategy(),
        generator(&["5.0", "3.0", "3.0", "9.0", "fail", "hang"]),
    );
    let report = pipeline.run().unwrap();
    let store = pipeline.store();

    // Dispatches 1 and 2 tie at 3.0 and survive; each yields two model candidates
    let dispatch_survivors: Vec<CandidateId> = store
        .list_by_kind(CandidateKind::Model)
        .iter()
        .filter_map(|t| t.candidate.derived_from)
        .collect();
    assert_eq!(
        dispatch_survivors,
        vec![CandidateId(1), CandidateId(1), CandidateId(2), CandidateId(2)]
    );
    assert_eq!(
        report.outcome,
        RunOutcome::Completed {
            phase: Phase::BenchmarkModels,
            survivors: vec![CandidateId(6)],
        }
    );
    assert_eq!(report.survivors[0].latency_ms, Some(3.0));
    assert_eq!(report.survivors[0].derived_from, Some(CandidateId(1)));

    // Failures stay in the history
    let failed = store.get(CandidateId(4)).unwrap();
    let compile = failed.compile.unwrap();
    assert_eq!(compile.status, JobStatus::Failure);
    assert!(compile.diagnostics.contains("bad tile size"));
    let hung = store.get(CandidateId(5)).unwrap();
    assert_eq!(hung.compile.unwrap().status, JobStatus::Timeout);
    assert!(hung.benchmark.is_none());

    // Dispatch 3 compiled and benchmarked but was not selected
    assert_eq!(store.get(CandidateId(3)).unwrap().latency_ms(), Some(9.0));
    assert_eq!(store.len(), 10);
    assert_benchmarks_follow_compiles(store);

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(summary).unwrap()).unwrap();
    assert_eq!(json["outcome"]["status"], "completed");
    assert_eq!(json["history"].as_array().unwrap().len(), 10);
}

#[test]
fn test_model_candidates_derive_from_dispatch_survivors() {
    let dir = tempfile::tempdir().unwrap();
    let mut tune = config(&dir.path().join("run"), &["d0", "d1", "d2"], "compile_models");
    tune.runner.num_dispatch_candidates = Some(3);
    tune.paths.model_inputs = model_inputs(dir.path());
    let pipeline = Pipeline::new(
        PipelineConfig::from_config(&tune).unwrap(),
        strategy(),
        generator(&["4.0", "bench-fail", "2.0", "8.0", "1.0", "bench-hang"]),
    );

    let report = pipeline.run().unwrap();
    let store = pipeline.store();

    // Benchmark ranking: 4 (1.0), 2 (2.0), 0 (4.0); 3 is cut by K, 1 and 5 failed
    let survivors: Vec<CandidateId> = vec![CandidateId(4), CandidateId(2), CandidateId(0)];
    let models = store.list_by_kind(CandidateKind::Model);
    assert_eq!(models.len(), survivors.len() * 2);
    for model in &models {
        let source = model.candidate.derived_from.unwrap();
        assert!(survivors.contains(&source));
        let dispatch = store.get(source).unwrap();
        assert_eq!(dispatch.candidate.kind, CandidateKind::Dispatch);
        assert_eq!(model.candidate.spec, dispatch.candidate.spec);
        assert!(model.compiled_artifact().is_some());
    }

    assert_eq!(
        store.get(CandidateId(1)).unwrap().benchmark.unwrap().status,
        JobStatus::Failure
    );
    assert_eq!(
        store.get(CandidateId(5)).unwrap().benchmark.unwrap().status,
        JobStatus::Timeout
    );
    assert_eq!(report.outcome.phase(), Phase::CompileModels);
    assert_eq!(report.outcome.survivors().len(), 6);
    assert_benchmarks_follow_compiles(store);
}

#[test]
fn test_stop_after_compile_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let specs = ["2.0", "fail", "1.0", "hang", "3.0"];

    let run = |name: &str| {
        let tune = config(&dir.path().join(name), &["d0", "d1"], "compile_dispatches");
        let pipeline = Pipeline::new(
            PipelineConfig::from_config(&tune).unwrap(),
            strategy(),
            generator(&specs),
        );
        let report = pipeline.run().unwrap();
        assert!(
            pipeline
                .store()
                .trackers()
                .iter()
                .all(|t| t.benchmark.is_none())
        );
        report.outcome
    };

    let first = run("first");
    let second = run("second");
    assert_eq!(first, second);
    assert_eq!(
        first,
        RunOutcome::Completed {
            phase: Phase::CompileDispatches,
            survivors: vec![CandidateId(0), CandidateId(2), CandidateId(4)],
        }
    );
}

#[test]
fn test_stop_after_generate_runs_no_jobs() {
    let dir = tempfile::tempdir().unwrap();
    let tune = config(&dir.path().join("run"), &["d0"], "generate-candidates");
    let pipeline = Pipeline::new(
        PipelineConfig::from_config(&tune).unwrap(),
        strategy(),
        generator(&["1.0", "2.0"]),
    );

    let report = pipeline.run().unwrap();
    assert_eq!(report.outcome.phase(), Phase::GenerateCandidates);
    assert_eq!(report.outcome.survivors().len(), 2);
    assert!(pipeline.store().trackers().iter().all(|t| t.compile.is_none()));
}

#[test]
fn test_nothing_compiles_ends_empty() {
    let dir = tempfile::tempdir().unwrap();
    let mut tune = config(&dir.path().join("run"), &["d0", "d1"], "benchmark_models");
    tune.paths.model_inputs = model_inputs(dir.path());
    let pipeline = Pipeline::new(
        PipelineConfig::from_config(&tune).unwrap(),
        strategy(),
        generator(&["fail", "fail", "fail"]),
    );

    let report = pipeline.run().unwrap();
    assert_eq!(
        report.outcome,
        RunOutcome::Empty {
            phase: Phase::CompileDispatches
        }
    );
    assert_eq!(pipeline.store().len(), 3);
    assert!(pipeline.store().list_by_kind(CandidateKind::Model).is_empty());
    assert!(report.survivors.is_empty());
}

#[test]
fn test_unknown_stop_after_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let tune = config(dir.path(), &["d0"], "benchmark_everything");
    assert!(matches!(
        PipelineConfig::from_config(&tune),
        Err(PipelineError::UnknownPhase(_))
    ));
}

#[test]
fn test_generator_errors_are_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let tune = config(&dir.path().join("run"), &["d0"], "compile_dispatches");
    let failing = |_: &Path| -> anyhow::Result<Vec<PathBuf>> { anyhow::bail!("search space exhausted") };
    let pipeline = Pipeline::new(PipelineConfig::from_config(&tune).unwrap(), strategy(), failing);

    let err = pipeline.run().unwrap_err();
    assert!(matches!(err, PipelineError::Generator(_)));
    assert!(err.to_string().contains("search space exhausted"));
    assert!(pipeline.store().is_empty());
}

#[test]
fn test_missing_spec_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let tune = config(&dir.path().join("run"), &["d0"], "compile_dispatches");
    let phantom = |specs_dir: &Path| -> anyhow::Result<Vec<PathBuf>> {
        Ok(vec![specs_dir.join("never_written.mlir")])
    };
    let pipeline = Pipeline::new(PipelineConfig::from_config(&tune).unwrap(), strategy(), phantom);

    assert!(matches!(pipeline.run(), Err(PipelineError::MissingSpec(_))));
    assert!(pipeline.store().is_empty());
}

#[test]
fn test_abort_before_first_phase() {
    let dir = tempfile::tempdir().unwrap();
    let tune = config(&dir.path().join("run"), &["d0"], "compile_dispatches");
    let pipeline = Pipeline::new(
        PipelineConfig::from_config(&tune).unwrap(),
        strategy(),
        generator(&["1.0"]),
    );
    pipeline.abort_handle().store(true, Ordering::SeqCst);

    let err = pipeline.run().unwrap_err();
    assert!(matches!(err, PipelineError::Aborted(Phase::GenerateCandidates)));
    assert!(pipeline.store().is_empty());
}

#[test]
fn test_pipeline_runs_once() {
    let dir = tempfile::tempdir().unwrap();
    let tune = config(&dir.path().join("run"), &["d0"], "generate_candidates");
    let pipeline = Pipeline::new(
        PipelineConfig::from_config(&tune).unwrap(),
        strategy(),
        generator(&["1.0"]),
    );

    pipeline.run().unwrap();
    assert!(matches!(pipeline.run(), Err(PipelineError::AlreadyRun)));
}
