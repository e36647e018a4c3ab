//! Command Templates
//!
//! Tool invocations are configured as templates. Placeholders are substituted
//! per job once the candidate, its artifact path and the granted device are known:
//!
//! | placeholder   | value                                             |
//! |---------------|---------------------------------------------------|
//! | `{input}`     | file handed to the compiler                       |
//! | `{spec}`      | tuning spec of the candidate                      |
//! | `{artifact}`  | compiled artifact (written or benchmarked)        |
//! | `{device}`    | id of the device granted to the job               |
//! | `{candidate}` | candidate id                                      |
//! | `{kind}`      | `dispatch` or `model`                             |
//! | `{flags}`     | whole argument: expands to the strategy's flags   |
//!
//! Unknown `{...}` sequences are left untouched.

use fluxtune_core::Candidate;
use std::fmt;
use std::path::{Path, PathBuf};

/// A fully rendered process invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program to execute, looked up in `PATH` when not a path
    pub program: String,
    /// Arguments, already substituted
    pub args: Vec<String>,
    /// Extra environment variables
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    /// Command without arguments
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add an environment variable
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.contains(char::is_whitespace) {
                write!(f, " '{}'", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Values substituted into a [`ToolCommand`]
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    /// Candidate the job runs for
    pub candidate: &'a Candidate,
    /// Artifact written by a compile job or read by a benchmark job
    pub artifact: &'a Path,
    /// Device granted to the job
    pub device: &'a str,
    /// Strategy flags for the current phase
    pub flags: &'a [String],
}

impl RenderContext<'_> {
    fn substitute(&self, template: &str) -> String {
        if !template.contains('{') {
            return template.to_string();
        }
        template
            .replace("{input}", &self.candidate.input.to_string_lossy())
            .replace("{spec}", &self.candidate.spec.to_string_lossy())
            .replace("{artifact}", &self.artifact.to_string_lossy())
            .replace("{device}", self.device)
            .replace("{candidate}", &self.candidate.id.to_string())
            .replace("{kind}", self.candidate.kind.as_str())
    }
}

/// Program plus argument template for one tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    /// Program to execute
    pub program: String,
    /// Argument templates
    pub args: Vec<String>,
}

impl ToolCommand {
    /// Create a template
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Substitute placeholders for one job
    pub fn render(&self, ctx: &RenderContext<'_>) -> CommandSpec {
        let mut args = Vec::with_capacity(self.args.len() + ctx.flags.len());
        for arg in &self.args {
            if arg == "{flags}" {
                args.extend(ctx.flags.iter().map(|flag| ctx.substitute(flag)));
            } else {
                args.push(ctx.substitute(arg));
            }
        }
        CommandSpec {
            program: ctx.substitute(&self.program),
            args,
            env: Vec::new(),
        }
    }
}

/// Where compiled artifacts go: one file per candidate id, never shared
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    /// Directory holding every artifact of the run
    pub dir: PathBuf,
    /// File extension without the dot
    pub extension: String,
}

impl ArtifactLayout {
    /// Create a layout
    pub fn new(dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.into(),
        }
    }

    /// Artifact path of `candidate`, e.g. `compiled/model_12.vmfb`
    pub fn path_for(&self, candidate: &Candidate) -> PathBuf {
        self.dir.join(format!(
            "{}_{}.{}",
            candidate.kind, candidate.id, self.extension
        ))
    }
}
