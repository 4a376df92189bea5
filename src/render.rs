//! SVG charts of smoothed curves and of the raw grade/speed cloud.

use anyhow::Result;
use plotters::prelude::*;
use plotters::style::{FontDesc, FontFamily, FontStyle};
use std::ops::Range;
use std::path::Path;
use tracing::{debug, warn};

use crate::analyzers::smoothing::Curve;
use crate::analyzers::types::{PercentileBand, Row};

/// Axes of the grade/speed line charts.
pub const CURVE_GRADES: Range<f64> = 0.0..20.0;
pub const CURVE_SPEEDS: Range<f64> = 0.0..30.0;

const DIAGNOSTIC_GRADES: Range<f64> = -5.0..25.0;
const DIAGNOSTIC_SPEEDS: Range<f64> = 0.0..50.0;
const HISTOGRAM_BIN: f64 = 0.3;

/// One labelled curve on a chart.
pub struct Series<'a> {
    pub label: &'a str,
    pub curve: &'a Curve,
    pub color: RGBColor,
}

fn font(size: f64) -> FontDesc<'static> {
    FontDesc::new(FontFamily::SansSerif, size, FontStyle::Normal)
}

/// `"<names> (top lb-ub% of riders)"`, names joined in the order given.
pub fn band_title(names: &[&str], band: PercentileBand) -> String {
    format!("{} (top {band}% of riders)", names.join(", "))
}

/// Draws speed against gradient for every series. NaN points and points
/// off the axes leave gaps in the line. A legend is drawn when there is
/// more than one series.
pub fn render_curves(path: &Path, title: &str, series: &[Series<'_>]) -> Result<()> {
    let root = SVGBackend::new(path, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, font(22.0))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(CURVE_GRADES, CURVE_SPEEDS)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc("Gradient")
        .y_desc("Speed (kph)")
        .label_style(font(14.0))
        .draw()?;

    for s in series {
        let runs = s.curve.runs(|x, y| CURVE_GRADES.contains(&x) && CURVE_SPEEDS.contains(&y));
        if runs.is_empty() {
            warn!(series = s.label, path = %path.display(), "Curve has no drawable points");
            continue;
        }

        let color = s.color;
        for (k, run) in runs.into_iter().enumerate() {
            let drawn = chart.draw_series(LineSeries::new(run, color.stroke_width(2)))?;
            if k == 0 {
                drawn.label(s.label).legend(move |(x, y)| {
                    PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2))
                });
            }
        }
    }

    if series.len() > 1 {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .label_font(font(14.0))
            .draw()?;
    }

    root.present()?;
    debug!(path = %path.display(), "Chart written");
    Ok(())
}

/// Normalized histogram of `grade_smooth` next to a grade/speed scatter.
pub fn render_diagnostics(path: &Path, title: &str, rows: &[Row], color: RGBColor) -> Result<()> {
    let root = SVGBackend::new(path, (1600, 600)).into_drawing_area();
    root.fill(&WHITE)?;
    let panels = root.split_evenly((1, 2));

    let bins = grade_histogram(rows);
    let peak = bins.iter().map(|(_, d)| *d).fold(0.0, f64::max);
    let y_top = if peak > 0.0 { peak * 1.1 } else { 1.0 };

    let mut hist = ChartBuilder::on(&panels[0])
        .caption(title, font(22.0))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(DIAGNOSTIC_GRADES, 0.0..y_top)?;
    hist.configure_mesh()
        .disable_mesh()
        .x_desc("Gradient")
        .y_desc("Frequency (normalised)")
        .label_style(font(14.0))
        .draw()?;
    hist.draw_series(bins.iter().map(|&(lo, density)| {
        Rectangle::new([(lo, 0.0), (lo + HISTOGRAM_BIN, density)], color.filled())
    }))?;

    let mut scatter = ChartBuilder::on(&panels[1])
        .caption(title, font(22.0))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(DIAGNOSTIC_GRADES, DIAGNOSTIC_SPEEDS)?;
    scatter
        .configure_mesh()
        .disable_mesh()
        .x_desc("Gradient")
        .y_desc("Speed (kph)")
        .label_style(font(14.0))
        .draw()?;
    scatter.draw_series(
        rows.iter()
            .map(|row| (row.grade_smooth, row.speed_kph()))
            .filter(|(g, v)| DIAGNOSTIC_GRADES.contains(g) && DIAGNOSTIC_SPEEDS.contains(v))
            .map(|point| Circle::new(point, 1, color.filled())),
    )?;

    root.present()?;
    debug!(path = %path.display(), "Diagnostics chart written");
    Ok(())
}

/// `(bin start, density)` over the diagnostic grade range. Densities are
/// relative to the rows inside the range, so they integrate to one unless
/// no row falls inside it.
fn grade_histogram(rows: &[Row]) -> Vec<(f64, f64)> {
    let n_bins = ((DIAGNOSTIC_GRADES.end - DIAGNOSTIC_GRADES.start) / HISTOGRAM_BIN).round() as usize;
    let mut counts = vec![0usize; n_bins];
    for row in rows {
        let offset = (row.grade_smooth - DIAGNOSTIC_GRADES.start) / HISTOGRAM_BIN;
        if offset >= 0.0 && (offset as usize) < n_bins {
            counts[offset as usize] += 1;
        }
    }

    let binned: usize = counts.iter().sum();
    let scale = if binned == 0 {
        0.0
    } else {
        1.0 / (binned as f64 * HISTOGRAM_BIN)
    };
    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| {
            (
                DIAGNOSTIC_GRADES.start + i as f64 * HISTOGRAM_BIN,
                count as f64 * scale,
            )
        })
        .collect()
}

/// Converts a validated `#RRGGBB` triple.
pub fn rgb((r, g, b): (u8, u8, u8)) -> RGBColor {
    RGBColor(r, g, b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::env;
    use std::fs;

    fn graded(grades: &[f64]) -> Vec<Row> {
        grades
            .iter()
            .map(|&grade_smooth| Row {
                grade_smooth,
                velocity_smooth: 4.0,
                ..Default::default()
            })
            .collect()
    }

    #[test]
    fn test_histogram_density_integrates_to_one() {
        let rows = graded(&[0.0, 0.1, 5.0, 7.5, 24.9]);
        let bins = grade_histogram(&rows);

        assert_eq!(bins.len(), 100);
        let total: f64 = bins.iter().map(|(_, d)| d * HISTOGRAM_BIN).sum();
        assert_relative_eq!(total, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_histogram_normalizes_over_binned_rows() {
        let rows = graded(&[-10.0, 2.0, 2.1, 30.0]);
        let bins = grade_histogram(&rows);

        let total: f64 = bins.iter().map(|(_, d)| d * HISTOGRAM_BIN).sum();
        assert_relative_eq!(total, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_band_title_lists_segments_in_order() {
        let band = PercentileBand::new(10, 20).unwrap();
        assert_eq!(
            band_title(&["Stocking Lane", "Col du Tourmalet", "L'Alpe d'Huez"], band),
            "Stocking Lane, Col du Tourmalet, L'Alpe d'Huez (top 10-20% of riders)"
        );
        assert_eq!(
            band_title(&["Stocking Lane"], band),
            "Stocking Lane (top 10-20% of riders)"
        );
    }

    #[test]
    fn test_histogram_ignores_out_of_range() {
        let rows = graded(&[-10.0, 30.0]);
        assert!(grade_histogram(&rows).iter().all(|(_, d)| *d == 0.0));
        assert!(grade_histogram(&[]).iter().all(|(_, d)| *d == 0.0));
    }

    #[test]
    fn test_render_curves_writes_svg() {
        let path = env::temp_dir().join("segment_curves_test_chart.svg");
        let curve = Curve {
            grades: vec![1.0, 2.0, 3.0, 4.0],
            speeds_kph: vec![20.0, f64::NAN, 15.0, 14.0],
        };
        let series = [
            Series {
                label: "Stocking Lane",
                curve: &curve,
                color: RGBColor(0xFF, 0x69, 0x61),
            },
            Series {
                label: "Col du Tourmalet",
                curve: &curve,
                color: RGBColor(0xC2, 0x3B, 0x22),
            },
        ];

        render_curves(&path, "Stocking Lane (top 0-10% of riders)", &series).unwrap();

        let svg = fs::read_to_string(&path).unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("Col du Tourmalet"));
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_render_diagnostics_writes_svg() {
        let path = env::temp_dir().join("segment_curves_test_diagnostics.svg");
        render_diagnostics(&path, "Col du Tourmalet", &graded(&[3.0, 6.0, 9.0]), RGBColor(1, 2, 3))
            .unwrap();
        assert!(fs::read_to_string(&path).unwrap().contains("<svg"));
        fs::remove_file(&path).unwrap();
    }
}
