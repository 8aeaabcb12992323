//! Persistence of run reports: auto-saved history plus explicit exports.

use crate::model::RunReport;
use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Directory where runs are auto-saved.
pub fn data_dir() -> Result<PathBuf> {
    let base = dirs::data_dir().context("could not determine platform data directory")?;
    Ok(base.join("fib-bench"))
}

/// Save a report under the data dir, named by timestamp and run id.
pub fn save_report(report: &RunReport) -> Result<PathBuf> {
    let dir = data_dir()?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;

    let stamp = time::OffsetDateTime::now_utc()
        .format(&time::macros::format_description!(
            "[year][month][day]-[hour][minute][second]"
        ))
        .unwrap_or_else(|_| "unknown".into());
    let path = dir.join(format!("run-{}-{}.json", stamp, report.run_id));
    export_json(&path, report)?;
    Ok(path)
}

/// Write a report as pretty JSON.
pub fn export_json(path: &Path, report: &RunReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

/// Write the aggregated curves as CSV: one position column, one column per
/// mode label. Curves of unequal length leave trailing cells blank.
pub fn export_csv(path: &Path, report: &RunReport) -> Result<()> {
    let mut out = Vec::new();
    let mut header = vec!["position".to_string()];
    header.extend(report.curves.iter().map(|curve| curve.label.clone()));
    writeln!(out, "{}", header.join(","))?;

    let positions = report
        .curves
        .iter()
        .map(|curve| curve.values.len())
        .max()
        .unwrap_or(0);
    for position in 0..positions {
        let mut cells = vec![position.to_string()];
        for curve in &report.curves {
            cells.push(
                curve
                    .values
                    .get(position)
                    .map(|value| value.to_string())
                    .unwrap_or_default(),
            );
        }
        writeln!(out, "{}", cells.join(","))?;
    }

    std::fs::write(path, out).with_context(|| format!("failed to write {}", path.display()))
}
