//! Benchmark Output Parsing
//!
//! Benchmark tools print Google Benchmark style rows:
//!
//! ```text
//! BM_main/process_time/real_time          3.51 ms         3.64 ms          193 items_per_second=284.7/s
//! BM_main/process_time/real_time          3.49 ms         3.61 ms          193 items_per_second=286.2/s
//! BM_main/process_time/real_time_mean     3.50 ms         3.62 ms            2 items_per_second=285.4/s
//! ```
//!
//! Latency is the mean of the per-repetition rows (first time column). When a
//! tool only prints aggregates, the `_mean` row is used instead.

use regex::Regex;
use std::sync::LazyLock;

static ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(BM_\S+)\s+([0-9]*\.?[0-9]+(?:[eE][-+]?[0-9]+)?)\s*(ns|us|µs|ms|s)\b")
        .unwrap_or_else(|e| unreachable!("benchmark row pattern is valid: {e}"))
});

const AGGREGATE_SUFFIXES: [&str; 4] = ["_mean", "_median", "_stddev", "_cv"];

/// Latency parsed from one benchmark run
#[derive(Debug, Clone, PartialEq)]
pub struct LatencySummary {
    /// Mean latency in milliseconds
    pub mean_ms: f64,
    /// Fastest repetition in milliseconds
    pub min_ms: f64,
    /// Number of rows the mean was taken over
    pub samples: usize,
}

fn to_millis(value: f64, unit: &str) -> f64 {
    match unit {
        "ns" => value / 1_000_000.0,
        "us" | "µs" => value / 1_000.0,
        "s" => value * 1_000.0,
        _ => value,
    }
}

/// Parse benchmark stdout into a latency summary, or explain why it could not.
pub fn parse_benchmark_output(stdout: &str) -> Result<LatencySummary, String> {
    let mut repetitions = Vec::new();
    let mut aggregate_mean = None;

    for line in stdout.lines() {
        let Some(caps) = ROW.captures(line) else {
            continue;
        };
        let name = &caps[1];
        let Ok(value) = caps[2].parse::<f64>() else {
            continue;
        };
        let millis = to_millis(value, &caps[3]);

        if name.ends_with("_mean") {
            aggregate_mean.get_or_insert(millis);
        } else if !AGGREGATE_SUFFIXES.iter().any(|suffix| name.ends_with(suffix)) {
            repetitions.push(millis);
        }
    }

    if !repetitions.is_empty() {
        let mean_ms = repetitions.iter().sum::<f64>() / repetitions.len() as f64;
        let min_ms = repetitions.iter().copied().fold(f64::INFINITY, f64::min);
        return Ok(LatencySummary {
            mean_ms,
            min_ms,
            samples: repetitions.len(),
        });
    }

    match aggregate_mean {
        Some(mean_ms) => Ok(LatencySummary {
            mean_ms,
            min_ms: mean_ms,
            samples: 1,
        }),
        None => Err("no benchmark rows found in output".to_string()),
    }
}
