//! Text summary builder for CLI output.
//!
//! This module formats one human-readable line per aggregated mode curve.

use crate::metrics;
use crate::model::RunReport;

/// Pre-formatted lines for text output.
pub struct TextSummary {
    pub lines: Vec<String>,
}

/// Build a text summary of the aggregated curves.
pub fn build_text_summary(report: &RunReport) -> TextSummary {
    let mut lines = Vec::new();

    lines.push(format!(
        "Run {}: {} trial(s) per mode, threshold {}",
        report.run_id, report.trials, report.threshold
    ));
    if let Some(cpu) = report.cpu {
        lines.push(format!("Pinned to CPU {cpu}"));
    }
    if let Some(comments) = report.comments.as_deref() {
        if !comments.trim().is_empty() {
            lines.push(format!("Comments: {comments}"));
        }
    }

    for curve in &report.curves {
        match metrics::compute_metrics(&curve.values) {
            Some((mean, median, p25, p75)) => {
                lines.push(format!(
                    "{}: {} positions, runtime avg {:.1} med {:.1} p25 {:.1} p75 {:.1} ns",
                    curve.label,
                    curve.values.len(),
                    mean,
                    median,
                    p25,
                    p75
                ));
            }
            None => {
                lines.push(format!(
                    "{}: {} position(s), too few for summary metrics",
                    curve.label,
                    curve.values.len()
                ));
            }
        }
    }

    TextSummary { lines }
}
