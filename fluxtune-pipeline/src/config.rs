//! Configuration loading from fluxtune.toml
//!
//! A tuning run can be configured in a `fluxtune.toml` file in the project root.
//! The configuration is automatically discovered by walking up from the current directory.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// File name looked up by [`TuneConfig::discover`]
pub const CONFIG_FILE: &str = "fluxtune.toml";

/// fluxtune configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TuneConfig {
    /// Runner configuration
    #[serde(default)]
    pub runner: RunnerConfig,
    /// Working directory layout
    #[serde(default)]
    pub paths: PathsConfig,
    /// Compiler and benchmark tool invocations
    #[serde(default)]
    pub tools: ToolsConfig,
    /// Device health checks
    #[serde(default)]
    pub devices: DevicesConfig,
}

/// Runner configuration for phase execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Device identifiers, e.g. `["hip://0", "hip://1"]`
    #[serde(default = "default_devices")]
    pub devices: Vec<String>,
    /// Cap on concurrent jobs; the device count applies when lower or unset
    #[serde(default)]
    pub jobs: Option<usize>,
    /// Timeout for a single compile job (e.g., "60s", "2m")
    #[serde(default = "default_compile_timeout")]
    pub compile_timeout: String,
    /// Last phase to run
    #[serde(default = "default_stop_after")]
    pub stop_after: String,
    /// Dispatch candidates kept after benchmarking (unset keeps all)
    #[serde(default)]
    pub num_dispatch_candidates: Option<usize>,
    /// Model candidates kept after benchmarking (unset keeps all)
    #[serde(default)]
    pub num_model_candidates: Option<usize>,
    /// Show a progress bar per phase
    #[serde(default = "default_progress")]
    pub progress: bool,
    /// Skip device validation
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            devices: default_devices(),
            jobs: None,
            compile_timeout: default_compile_timeout(),
            stop_after: default_stop_after(),
            num_dispatch_candidates: None,
            num_model_candidates: None,
            progress: default_progress(),
            dry_run: false,
        }
    }
}

fn default_devices() -> Vec<String> {
    vec!["local-task".to_string()]
}
fn default_compile_timeout() -> String {
    "60s".to_string()
}
fn default_stop_after() -> String {
    "benchmark_models".to_string()
}
fn default_progress() -> bool {
    true
}

/// Working directory layout
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Base working directory (default: `tuning_<YYYY_MM_DD_HH_MM>`)
    #[serde(default)]
    pub base_dir: Option<String>,
    /// Name of the candidate spec directory under the base directory
    #[serde(default = "default_specs_dir")]
    pub specs_dir: String,
    /// Full-program inputs every surviving dispatch candidate is applied to
    #[serde(default)]
    pub model_inputs: Vec<String>,
}

fn default_specs_dir() -> String {
    "specs".to_string()
}

/// Compiler and benchmark tool invocations.
///
/// Argument templates may use `{input}`, `{spec}`, `{artifact}`, `{device}`,
/// `{candidate}` and `{kind}`; an argument that is exactly `{flags}` expands
/// to the strategy's flags for the phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Compiler program
    #[serde(default = "default_compiler")]
    pub compiler: String,
    /// Compiler argument templates
    #[serde(default = "default_compile_args")]
    pub compile_args: Vec<String>,
    /// Benchmark program
    #[serde(default = "default_benchmark")]
    pub benchmark: String,
    /// Benchmark argument templates
    #[serde(default = "default_benchmark_args")]
    pub benchmark_args: Vec<String>,
    /// File extension of compiled artifacts
    #[serde(default = "default_artifact_extension")]
    pub artifact_extension: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            compiler: default_compiler(),
            compile_args: default_compile_args(),
            benchmark: default_benchmark(),
            benchmark_args: default_benchmark_args(),
            artifact_extension: default_artifact_extension(),
        }
    }
}

fn default_compiler() -> String {
    "iree-compile".to_string()
}
fn default_compile_args() -> Vec<String> {
    ["{input}", "{flags}", "-o", "{artifact}"]
        .map(String::from)
        .to_vec()
}
fn default_benchmark() -> String {
    "iree-benchmark-module".to_string()
}
fn default_benchmark_args() -> Vec<String> {
    ["--device={device}", "--module={artifact}", "{flags}"]
        .map(String::from)
        .to_vec()
}
fn default_artifact_extension() -> String {
    "vmfb".to_string()
}

/// Device health checks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevicesConfig {
    /// Program run once per device before the run; exit 0 means healthy
    #[serde(default)]
    pub probe: Option<String>,
    /// Probe argument templates, `{device}` is substituted
    #[serde(default)]
    pub probe_args: Vec<String>,
    /// Timeout for one probe (e.g., "10s")
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout: String,
}

impl Default for DevicesConfig {
    fn default() -> Self {
        Self {
            probe: None,
            probe_args: Vec::new(),
            probe_timeout: default_probe_timeout(),
        }
    }
}

fn default_probe_timeout() -> String {
    "10s".to_string()
}

impl TuneConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Self =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    /// Discover and load configuration by walking up from the current directory.
    /// `Ok(None)` when no `fluxtune.toml` exists; a file that fails to load is an error.
    pub fn discover() -> anyhow::Result<Option<Self>> {
        let dir = std::env::current_dir().context("reading current directory")?;
        Self::discover_from(&dir)
    }

    /// Like [`TuneConfig::discover`], starting at `start`
    pub fn discover_from(start: &Path) -> anyhow::Result<Option<Self>> {
        let mut dir = start.to_path_buf();
        loop {
            let config_path = dir.join(CONFIG_FILE);
            if config_path.exists() {
                return Self::load(&config_path).map(Some);
            }
            if !dir.pop() {
                break;
            }
        }
        Ok(None)
    }

    /// Generate a default configuration as TOML string
    pub fn default_toml() -> String {
        r#"# fluxtune Configuration

[runner]
# Devices to run jobs on; one job per device at a time
devices = ["local-task"]
# Cap on concurrent jobs (uncomment to enable)
# jobs = 4
# Timeout for a single compile job
compile_timeout = "60s"
# Last phase to run: generate_candidates, compile_dispatches,
# benchmark_dispatches, compile_models, benchmark_models
stop_after = "benchmark_models"
# Candidates kept after each benchmark phase (uncomment to enable)
# num_dispatch_candidates = 8
# num_model_candidates = 3
# Show a progress bar per phase
progress = true
# Skip device validation
dry_run = false

[paths]
# Base working directory (uncomment to pin; default is timestamped)
# base_dir = "tuning"
# Candidate spec directory under the base directory
specs_dir = "specs"
# Full-program inputs for the model phases
model_inputs = []

[tools]
compiler = "iree-compile"
compile_args = ["{input}", "{flags}", "-o", "{artifact}"]
benchmark = "iree-benchmark-module"
benchmark_args = ["--device={device}", "--module={artifact}", "{flags}"]
artifact_extension = "vmfb"

[devices]
# Health check run once per device before tuning (uncomment to enable)
# probe = "iree-run-module"
# probe_args = ["--device={device}", "--help"]
probe_timeout = "10s"
"#
        .to_string()
    }

    /// Parse duration string (e.g., "3s", "500ms", "2m")
    pub fn parse_duration(s: &str) -> anyhow::Result<Duration> {
        let s = s.trim();
        if s.is_empty() {
            return Err(anyhow::anyhow!("Empty duration string"));
        }

        // Find where the number ends and unit begins
        let (num_part, unit_part) = s
            .char_indices()
            .find(|(_, c)| c.is_alphabetic())
            .map(|(i, _)| s.split_at(i))
            .unwrap_or((s, "s"));

        let value: f64 = num_part
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid duration number: {}", num_part))?;
        if !value.is_finite() || value < 0.0 {
            return Err(anyhow::anyhow!("Invalid duration number: {}", num_part));
        }

        let multiplier: u64 = match unit_part.to_lowercase().as_str() {
            "ns" => 1,
            "us" | "µs" => 1_000,
            "ms" => 1_000_000,
            "s" | "" => 1_000_000_000,
            "m" | "min" => 60_000_000_000,
            "h" => 3_600_000_000_000,
            _ => return Err(anyhow::anyhow!("Unknown duration unit: {}", unit_part)),
        };

        Ok(Duration::from_nanos((value * multiplier as f64) as u64))
    }
}
