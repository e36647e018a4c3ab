//! Caller-supplied strategies
//!
//! A tuning use case plugs into the pipeline through two small traits:
//! [`TuningStrategy`] supplies tool flags and the benchmark timeout per phase,
//! [`CandidateGenerator`] writes candidate specs for the first phase.

use crate::phase::Phase;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Flags and timeouts for one tuning use case
pub trait TuningStrategy: Send + Sync {
    /// Extra compiler flags for a compile phase
    fn compile_flags(&self, phase: Phase) -> Vec<String>;

    /// Extra benchmark tool flags for a benchmark phase
    fn benchmark_flags(&self, phase: Phase) -> Vec<String>;

    /// Upper bound on a single benchmark job
    fn benchmark_timeout(&self) -> Duration;
}

/// Produces the dispatch candidates of a run
pub trait CandidateGenerator: Send + Sync {
    /// Write candidate specs below `specs_dir` and return their paths in a stable order.
    fn generate(&self, specs_dir: &Path) -> anyhow::Result<Vec<PathBuf>>;
}

impl<F> CandidateGenerator for F
where
    F: Fn(&Path) -> anyhow::Result<Vec<PathBuf>> + Send + Sync,
{
    fn generate(&self, specs_dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
        self(specs_dir)
    }
}

/// Fixed per-phase flag lists
#[derive(Debug, Clone)]
pub struct StaticStrategy {
    /// Flags for `compile_dispatches`
    pub dispatch_compile_flags: Vec<String>,
    /// Flags for `compile_models`
    pub model_compile_flags: Vec<String>,
    /// Flags for `benchmark_dispatches`
    pub dispatch_benchmark_flags: Vec<String>,
    /// Flags for `benchmark_models`
    pub model_benchmark_flags: Vec<String>,
    /// Benchmark timeout for both benchmark phases
    pub benchmark_timeout: Duration,
}

impl Default for StaticStrategy {
    fn default() -> Self {
        Self {
            dispatch_compile_flags: Vec::new(),
            model_compile_flags: Vec::new(),
            dispatch_benchmark_flags: Vec::new(),
            model_benchmark_flags: Vec::new(),
            benchmark_timeout: Duration::from_secs(10),
        }
    }
}

impl TuningStrategy for StaticStrategy {
    fn compile_flags(&self, phase: Phase) -> Vec<String> {
        match phase {
            Phase::CompileDispatches => self.dispatch_compile_flags.clone(),
            Phase::CompileModels => self.model_compile_flags.clone(),
            _ => Vec::new(),
        }
    }

    fn benchmark_flags(&self, phase: Phase) -> Vec<String> {
        match phase {
            Phase::BenchmarkDispatches => self.dispatch_benchmark_flags.clone(),
            Phase::BenchmarkModels => self.model_benchmark_flags.clone(),
            _ => Vec::new(),
        }
    }

    fn benchmark_timeout(&self) -> Duration {
        self.benchmark_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_strategy_flags_per_phase() {
        let strategy = StaticStrategy {
            dispatch_compile_flags: vec!["--compile-from=executable-sources".to_string()],
            dispatch_benchmark_flags: vec!["--benchmark_repetitions=3".to_string()],
            ..Default::default()
        };

        assert_eq!(
            strategy.compile_flags(Phase::CompileDispatches),
            vec!["--compile-from=executable-sources"]
        );
        assert!(strategy.compile_flags(Phase::CompileModels).is_empty());
        assert!(strategy.compile_flags(Phase::BenchmarkDispatches).is_empty());
        assert_eq!(
            strategy.benchmark_flags(Phase::BenchmarkDispatches),
            vec!["--benchmark_repetitions=3"]
        );
        assert_eq!(strategy.benchmark_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_closure_generator() {
        let generator = |dir: &Path| -> anyhow::Result<Vec<PathBuf>> { Ok(vec![dir.join("0.mlir")]) };
        let specs = generator.generate(Path::new("/tmp/specs")).unwrap();
        assert_eq!(specs, vec![PathBuf::from("/tmp/specs/0.mlir")]);
    }
}
