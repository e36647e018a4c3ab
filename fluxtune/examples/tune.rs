//! fluxtune Example Driver
//!
//! Tunes with the candidate specs found in a directory: every `*.mlir` file
//! there is copied into the run's specs directory and becomes one dispatch
//! candidate. Tools, devices and the model input come from `fluxtune.toml`.
//!
//! Run with:
//!   cargo run --example tune -- <candidates-dir> [compile-flags-file]
//!
//! Print a starting configuration with:
//!   cargo run --example tune -- --print-config

use anyhow::Context;
use fluxtune::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Duration;

fn read_flags_file(path: Option<&str>) -> anyhow::Result<Vec<String>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading flags file {path}"))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect())
}

fn copy_candidates(from: &Path, specs_dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut sources: Vec<PathBuf> = std::fs::read_dir(from)
        .with_context(|| format!("listing {}", from.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "mlir"))
        .collect();
    sources.sort();

    let mut specs = Vec::with_capacity(sources.len());
    for (i, source) in sources.iter().enumerate() {
        let spec = specs_dir.join(format!("{i}_spec.mlir"));
        std::fs::copy(source, &spec).with_context(|| format!("copying {}", source.display()))?;
        specs.push(spec);
    }
    Ok(specs)
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.first().map(String::as_str) == Some("--print-config") {
        print!("{}", TuneConfig::default_toml());
        return Ok(());
    }

    let candidates_dir = PathBuf::from(
        args.first()
            .context("usage: tune <candidates-dir> [compile-flags-file]")?,
    );
    let compile_flags = read_flags_file(args.get(1).map(String::as_str))?;

    let mut dispatch_compile_flags = compile_flags.clone();
    dispatch_compile_flags.push("--compile-from=executable-sources".to_string());
    let strategy = StaticStrategy {
        dispatch_compile_flags,
        model_compile_flags: compile_flags,
        dispatch_benchmark_flags: vec![
            "--input=1".to_string(),
            "--benchmark_repetitions=3".to_string(),
        ],
        model_benchmark_flags: Vec::new(),
        benchmark_timeout: Duration::from_secs(10),
    };

    let report = fluxtune::run(strategy, move |specs_dir: &Path| {
        copy_candidates(&candidates_dir, specs_dir)
    })?;

    match report.outcome {
        RunOutcome::Completed { phase, survivors } => {
            println!("Top candidates after {phase}: {survivors:?}");
        }
        RunOutcome::Empty { phase } => println!("No candidate survived {phase}"),
    }
    println!("Details: {}", report.meta.base_dir.join("summary.json").display());
    println!(
        "Check the detailed execution logs in: {}",
        report.meta.base_dir.join("run.log").display()
    );
    Ok(())
}
