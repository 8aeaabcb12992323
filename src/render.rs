//! Plot rendering: one denoised runtime curve per mode, written as a
//! single PNG.

use crate::model::ModeCurve;
use anyhow::{anyhow, bail, Result};
use plotters::prelude::*;
use std::error::Error;
use std::path::Path;

const PLOT_SIZE: (u32, u32) = (1200, 700);

/// Render every curve into one labeled chart at `out_path`.
pub fn render_curves(curves: &[ModeCurve], out_path: &Path) -> Result<()> {
    if curves.iter().all(|curve| curve.values.is_empty()) {
        bail!("nothing to plot: no curve has any values");
    }
    draw(curves, out_path)
        .map_err(|e| anyhow!("failed to render plot {}: {e}", out_path.display()))
}

fn draw(curves: &[ModeCurve], out_path: &Path) -> Result<(), Box<dyn Error>> {
    let positions = curves.iter().map(|curve| curve.values.len()).max().unwrap_or(0);
    let mut y_min = f64::INFINITY;
    let mut y_max = f64::NEG_INFINITY;
    for value in curves.iter().flat_map(|curve| curve.values.iter()) {
        y_min = y_min.min(*value);
        y_max = y_max.max(*value);
    }
    // Flat data still needs a non-degenerate y range.
    if y_max - y_min < 1e-9 {
        y_min -= 1.0;
        y_max += 1.0;
    }
    let x_max = (positions.saturating_sub(1)).max(1) as f64;

    let root = BitMapBackend::new(out_path, PLOT_SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption("kernel runtime", ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0f64..x_max, y_min..y_max)?;

    chart
        .configure_mesh()
        .x_desc("F(n)")
        .y_desc("kernel runtime (ns)")
        .draw()?;

    for (index, curve) in curves.iter().enumerate() {
        let color = Palette99::pick(index).to_rgba();
        let points = curve
            .values
            .iter()
            .enumerate()
            .map(|(position, &value)| (position as f64, value));
        chart
            .draw_series(LineSeries::new(points.clone(), &color))?
            .label(curve.label.clone())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
        chart.draw_series(
            points.map(|(x, y)| Cross::new((x, y), 3, color)),
        )?;
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}
