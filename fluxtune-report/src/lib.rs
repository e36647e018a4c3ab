#![warn(missing_docs)]
//! fluxtune Report - Run Summaries
//!
//! Turns the candidate history of a tuning run into:
//! - JSON (machine-readable, written as `summary.json`)
//! - Human-readable terminal output

mod human;
mod json;
mod report;

pub use human::format_human_output;
pub use json::generate_json_report;
pub use report::{KindSummary, ReportMeta, SurvivorEntry, TuningReport, build_report};
