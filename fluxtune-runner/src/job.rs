//! Job Runner
//!
//! Runs one external process per job. The process is bound to its device
//! through the environment and the rendered command line, its output is
//! captured verbatim, and a job exceeding its timeout is terminated:
//! SIGTERM to the whole process group, a grace period, then SIGKILL.
//!
//! Nothing that goes wrong inside a job escapes as an error. Spawn failures,
//! non-zero exits and timeouts all come back as a [`JobOutput`] with a status,
//! which keeps one bad candidate from aborting its siblings.

use crate::command::CommandSpec;
use crate::device::Device;
use crate::output::parse_benchmark_output;
use crate::{CANDIDATE_ENV, DEVICE_ENV};
use crossbeam_channel::Receiver;
use fluxtune_core::{BenchmarkResult, Candidate, CompileResult, JobStatus};
use std::io::Read;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Raw result of one process run
#[derive(Debug, Clone)]
pub struct JobOutput {
    /// Final status
    pub status: JobStatus,
    /// Exit code, `None` when killed by a signal or never started
    pub exit_code: Option<i32>,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
    /// Wall-clock time from spawn to reap
    pub duration: Duration,
}

impl JobOutput {
    fn spawn_failed(command: &CommandSpec, err: std::io::Error, duration: Duration) -> Self {
        Self {
            status: JobStatus::Failure,
            exit_code: None,
            stdout: String::new(),
            stderr: format!("failed to spawn `{}`: {}", command.program, err),
            duration,
        }
    }

    /// Exit information and both output streams, verbatim
    pub fn diagnostics(&self) -> String {
        let mut text = match (self.status, self.exit_code) {
            (JobStatus::Timeout, _) => {
                format!("timed out after {:.3}s\n", self.duration.as_secs_f64())
            }
            (_, Some(code)) => format!("exit code: {}\n", code),
            (_, None) => "terminated without exit code\n".to_string(),
        };
        if !self.stdout.is_empty() {
            text.push_str("--- stdout ---\n");
            text.push_str(&self.stdout);
            if !self.stdout.ends_with('\n') {
                text.push('\n');
            }
        }
        if !self.stderr.is_empty() {
            text.push_str("--- stderr ---\n");
            text.push_str(&self.stderr);
            if !self.stderr.ends_with('\n') {
                text.push('\n');
            }
        }
        text
    }
}

/// Send `signal` to every process in the group led by `pid`.
fn signal_group(pid: u32, signal: libc::c_int) -> Result<(), std::io::Error> {
    let ret = unsafe { libc::kill(-(pid as libc::pid_t), signal) };
    if ret == -1 {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(())
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> Receiver<String> {
    let (tx, rx) = crossbeam_channel::bounded(1);
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
    });
    rx
}

/// Output of a reader, or empty if the pipe is still open after `wait`.
/// A reader left behind exits once the last writer closes the pipe.
fn collect_reader(reader: Option<Receiver<String>>, wait: Duration) -> String {
    reader
        .and_then(|rx| rx.recv_timeout(wait).ok())
        .unwrap_or_default()
}

/// Spawns and supervises job processes
#[derive(Debug, Clone)]
pub struct JobRunner {
    poll_interval: Duration,
    grace_period: Duration,
}

impl Default for JobRunner {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(20),
            grace_period: Duration::from_millis(500),
        }
    }
}

impl JobRunner {
    /// Runner with default polling and a 500ms SIGTERM grace period
    pub fn new() -> Self {
        Self::default()
    }

    /// Time a timed-out job gets between SIGTERM and SIGKILL
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Run `command` for `candidate` on `device`.
    pub fn run(
        &self,
        candidate: &Candidate,
        device: &Device,
        command: &CommandSpec,
        timeout: Duration,
    ) -> JobOutput {
        let command = command
            .clone()
            .env(DEVICE_ENV, device.id())
            .env(CANDIDATE_ENV, candidate.id.to_string());
        debug!(
            candidate = %candidate.id,
            device = device.id(),
            command = %command,
            "starting job"
        );

        let output = self.execute(&command, timeout);
        if output.status == JobStatus::Timeout {
            warn!(
                candidate = %candidate.id,
                device = device.id(),
                timeout_ms = timeout.as_millis() as u64,
                "job timed out"
            );
        }
        output
    }

    /// Compile `candidate` into `artifact`. An exit status of 0 without the
    /// artifact on disk counts as a failure.
    pub fn compile(
        &self,
        candidate: &Candidate,
        device: &Device,
        command: &CommandSpec,
        artifact: &Path,
        timeout: Duration,
    ) -> CompileResult {
        // A leftover from an earlier run must not pass for this compile's output
        if let Err(e) = std::fs::remove_file(artifact) {
            if e.kind() != std::io::ErrorKind::NotFound {
                return CompileResult {
                    status: JobStatus::Failure,
                    artifact: None,
                    diagnostics: format!("cannot clear {}: {}", artifact.display(), e),
                    duration: Duration::ZERO,
                };
            }
        }

        let output = self.run(candidate, device, command, timeout);
        match output.status {
            JobStatus::Success if artifact.is_file() => CompileResult {
                status: JobStatus::Success,
                artifact: Some(artifact.to_path_buf()),
                diagnostics: String::new(),
                duration: output.duration,
            },
            JobStatus::Success => CompileResult {
                status: JobStatus::Failure,
                artifact: None,
                diagnostics: format!(
                    "compiler exited successfully but did not write {}\n{}",
                    artifact.display(),
                    output.diagnostics()
                ),
                duration: output.duration,
            },
            status => CompileResult {
                status,
                artifact: None,
                diagnostics: output.diagnostics(),
                duration: output.duration,
            },
        }
    }

    /// Benchmark a compiled candidate and parse its latency from stdout.
    pub fn benchmark(
        &self,
        candidate: &Candidate,
        device: &Device,
        command: &CommandSpec,
        timeout: Duration,
    ) -> BenchmarkResult {
        let output = self.run(candidate, device, command, timeout);
        if output.status != JobStatus::Success {
            return BenchmarkResult {
                status: output.status,
                latency_ms: None,
                diagnostics: output.diagnostics(),
                duration: output.duration,
            };
        }

        match parse_benchmark_output(&output.stdout) {
            Ok(summary) => BenchmarkResult {
                status: JobStatus::Success,
                latency_ms: Some(summary.mean_ms),
                diagnostics: String::new(),
                duration: output.duration,
            },
            Err(reason) => BenchmarkResult {
                status: JobStatus::Failure,
                latency_ms: None,
                diagnostics: format!("{}\n{}", reason, output.diagnostics()),
                duration: output.duration,
            },
        }
    }

    /// Run a command without candidate or device context.
    pub fn execute(&self, command: &CommandSpec, timeout: Duration) -> JobOutput {
        let start = Instant::now();

        let mut process = Command::new(&command.program);
        process
            .args(&command.args)
            .envs(command.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Own process group, so a timeout also reaches grandchildren
            .process_group(0);

        let mut child = match process.spawn() {
            Ok(child) => child,
            Err(e) => return JobOutput::spawn_failed(command, e, start.elapsed()),
        };

        let stdout = child.stdout.take().map(spawn_reader);
        let stderr = child.stderr.take().map(spawn_reader);

        let (status, exit_code, wait_error) = match self.wait_with_timeout(&mut child, timeout) {
            Ok(Some(exit)) => {
                let status = if exit.success() {
                    JobStatus::Success
                } else {
                    JobStatus::Failure
                };
                (status, exit.code(), None)
            }
            Ok(None) => {
                self.terminate(&mut child);
                (JobStatus::Timeout, None, None)
            }
            Err(e) => {
                self.terminate(&mut child);
                (JobStatus::Failure, None, Some(e))
            }
        };
        let duration = start.elapsed();

        // Background processes the job left behind would hold the pipes open
        let _ = signal_group(child.id(), libc::SIGKILL);
        let stdout = collect_reader(stdout, self.grace_period);
        let mut stderr = collect_reader(stderr, self.grace_period);
        if let Some(e) = wait_error {
            stderr.push_str(&format!("\nfailed to wait for job: {}", e));
        }

        JobOutput {
            status,
            exit_code,
            stdout,
            stderr,
            duration,
        }
    }

    /// `Ok(None)` once `timeout` elapses with the process still running
    fn wait_with_timeout(
        &self,
        child: &mut Child,
        timeout: Duration,
    ) -> Result<Option<ExitStatus>, std::io::Error> {
        let start = Instant::now();
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(Some(status));
            }
            let remaining = timeout.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                return Ok(None);
            }
            std::thread::sleep(remaining.min(self.poll_interval));
        }
    }

    /// SIGTERM → grace period → SIGKILL, then reap.
    fn terminate(&self, child: &mut Child) {
        let pid = child.id();
        // Ignore errors: the group may already be gone
        let _ = signal_group(pid, libc::SIGTERM);

        let deadline = Instant::now() + self.grace_period;
        while Instant::now() < deadline {
            match child.try_wait() {
                Ok(Some(_)) | Err(_) => break,
                Ok(None) => std::thread::sleep(self.poll_interval),
            }
        }

        // Stragglers in the group keep the output pipes open
        let _ = signal_group(pid, libc::SIGKILL);
        let _ = child.kill();
        let _ = child.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluxtune_core::{CandidateId, CandidateKind};
    use std::path::PathBuf;

    fn sh(script: &str) -> CommandSpec {
        CommandSpec::new("sh").arg("-c").arg(script)
    }

    fn candidate(id: u32) -> Candidate {
        Candidate {
            id: CandidateId(id),
            kind: CandidateKind::Dispatch,
            spec: PathBuf::from("spec.mlir"),
            input: PathBuf::from("spec.mlir"),
            derived_from: None,
        }
    }

    #[test]
    fn test_captures_output_and_exit_code() {
        let runner = JobRunner::new();
        let output = runner.execute(
            &sh("echo out; echo err >&2; exit 3"),
            Duration::from_secs(10),
        );
        assert_eq!(output.status, JobStatus::Failure);
        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
        let diagnostics = output.diagnostics();
        assert!(diagnostics.contains("exit code: 3"));
        assert!(diagnostics.contains("err"));
    }

    #[test]
    fn test_timeout_kills_process_tree() {
        let runner = JobRunner::new().with_grace_period(Duration::from_millis(100));
        let start = Instant::now();
        let output = runner.execute(
            &sh("sleep 30 & sleep 30; wait"),
            Duration::from_millis(200),
        );
        assert_eq!(output.status, JobStatus::Timeout);
        assert!(output.exit_code.is_none());
        assert!(start.elapsed() < Duration::from_secs(10));
        assert!(output.diagnostics().starts_with("timed out"));
    }

    #[test]
    fn test_background_process_does_not_hold_the_job() {
        let runner = JobRunner::new().with_grace_period(Duration::from_millis(100));
        let start = Instant::now();
        let output = runner.execute(&sh("sleep 30 & echo done"), Duration::from_millis(500));
        assert_eq!(output.status, JobStatus::Success);
        assert_eq!(output.stdout, "done\n");
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn test_spawn_failure_is_a_failed_job() {
        let runner = JobRunner::new();
        let output = runner.execute(
            &CommandSpec::new("/nonexistent/fluxtune-compiler"),
            Duration::from_secs(1),
        );
        assert_eq!(output.status, JobStatus::Failure);
        assert!(output.stderr.contains("failed to spawn"));
    }

    #[test]
    fn test_device_and_candidate_are_exported() {
        let runner = JobRunner::new();
        let device = Device::new("hip://1");
        let output = runner.run(
            &candidate(5),
            &device,
            &sh("echo $FLUXTUNE_DEVICE $FLUXTUNE_CANDIDATE"),
            Duration::from_secs(10),
        );
        assert_eq!(output.status, JobStatus::Success);
        assert_eq!(output.stdout.trim(), "hip://1 5");
    }

    #[test]
    fn test_compile_requires_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("dispatch_0.vmfb");
        let runner = JobRunner::new();
        let device = Device::new("cpu");

        let missing = runner.compile(
            &candidate(0),
            &device,
            &sh("true"),
            &artifact,
            Duration::from_secs(10),
        );
        assert_eq!(missing.status, JobStatus::Failure);
        assert!(missing.diagnostics.contains("did not write"));

        let script = format!("printf vmfb > {}", artifact.display());
        let written = runner.compile(
            &candidate(0),
            &device,
            &sh(&script),
            &artifact,
            Duration::from_secs(10),
        );
        assert_eq!(written.status, JobStatus::Success);
        assert_eq!(written.artifact.as_deref(), Some(artifact.as_path()));
    }

    #[test]
    fn test_benchmark_parses_latency() {
        let runner = JobRunner::new();
        let device = Device::new("cpu");
        let result = runner.benchmark(
            &candidate(1),
            &device,
            &sh("echo 'BM_main/process_time/real_time  2.00 ms  2.10 ms  100'; \
                 echo 'BM_main/process_time/real_time  4.00 ms  4.10 ms  100'"),
            Duration::from_secs(10),
        );
        assert_eq!(result.status, JobStatus::Success);
        assert_eq!(result.latency_ms, Some(3.0));
    }

    #[test]
    fn test_benchmark_without_rows_fails() {
        let runner = JobRunner::new();
        let device = Device::new("cpu");
        let result = runner.benchmark(
            &candidate(1),
            &device,
            &sh("echo nothing to see"),
            Duration::from_secs(10),
        );
        assert_eq!(result.status, JobStatus::Failure);
        assert!(result.latency_ms.is_none());
        assert!(result.diagnostics.contains("nothing to see"));
    }
}
