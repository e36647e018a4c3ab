//! JSON Output

use crate::report::TuningReport;

/// Generate a prettified JSON report.
pub fn generate_json_report(report: &TuningReport) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}
