//! Compile and benchmark results

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// How an external job ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Exited with status 0 and produced what was expected
    Success,
    /// Non-zero exit, spawn error, missing artifact or unparsable output
    Failure,
    /// Killed after exceeding its timeout
    Timeout,
}

impl JobStatus {
    /// Whether the job succeeded
    pub fn is_success(self) -> bool {
        matches!(self, JobStatus::Success)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JobStatus::Success => "success",
            JobStatus::Failure => "failure",
            JobStatus::Timeout => "timeout",
        })
    }
}

/// Kind of external job run for a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    /// Run the compiler, producing an artifact
    Compile,
    /// Run the benchmark tool on a compiled artifact
    Benchmark,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JobKind::Compile => "compile",
            JobKind::Benchmark => "benchmark",
        })
    }
}

/// Result of compiling one candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompileResult {
    /// Final status
    pub status: JobStatus,
    /// Compiled artifact, present only on success
    pub artifact: Option<PathBuf>,
    /// Captured compiler output on failure or timeout
    pub diagnostics: String,
    /// Wall-clock time of the job
    pub duration: Duration,
}

/// Result of benchmarking one compiled candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    /// Final status
    pub status: JobStatus,
    /// Measured latency in milliseconds, lower is better
    pub latency_ms: Option<f64>,
    /// Captured benchmark output on failure or timeout
    pub diagnostics: String,
    /// Wall-clock time of the job
    pub duration: Duration,
}

/// Either kind of result, as returned by the parallel executor
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    /// Outcome of a compile job
    Compile(CompileResult),
    /// Outcome of a benchmark job
    Benchmark(BenchmarkResult),
}

impl JobOutcome {
    /// Status of the underlying result
    pub fn status(&self) -> JobStatus {
        match self {
            JobOutcome::Compile(result) => result.status,
            JobOutcome::Benchmark(result) => result.status,
        }
    }

    /// Wall-clock time of the underlying job
    pub fn duration(&self) -> Duration {
        match self {
            JobOutcome::Compile(result) => result.duration,
            JobOutcome::Benchmark(result) => result.duration,
        }
    }
}
