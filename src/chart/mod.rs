//! Chart rendering: consumes a summary table and a chart-type selector,
//! writes an image artifact. An opaque sink as far as the aggregation
//! pipeline is concerned; drawing stays on library defaults.

use std::path::Path;

use thiserror::Error;

use crate::table::{summary::Summary, TableError};

mod render;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Bar,
    Line,
    Pie,
    StackedPercent,
}

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("chart rendering failed: {0}")]
    Render(String),

    #[error("nothing to chart for '{0}'")]
    Empty(String),

    #[error("stacked chart needs a two-key summary, got {0} key column(s)")]
    NotTwoKeys(usize),

    #[error(transparent)]
    Table(#[from] TableError),
}

/// Two-key summary pivoted for stacked rendering: primary key on the
/// x-axis (sorted ascending), secondary key as series, each x column
/// normalized to percentage shares.
#[derive(Debug)]
pub(crate) struct PivotTable {
    pub x_labels: Vec<String>,
    pub series_labels: Vec<String>,
    /// series-major: `shares[series][x]`, each x column sums to 100
    /// (or to 0 when the column total is 0; never NaN)
    pub shares: Vec<Vec<f64>>,
}

/// Draws the first measure of `summary` as `kind` into a PNG at `path`.
pub fn render(
    summary: &Summary,
    kind: ChartKind,
    title: &str,
    path: &Path,
) -> Result<(), ChartError> {
    if summary.is_empty() {
        return Err(ChartError::Empty(title.to_string()));
    }

    match kind {
        ChartKind::Bar => {
            let (labels, values) = first_measure_series(summary);
            render::bar(&labels, &values, title, measure_name(summary), path)
        }
        ChartKind::Line => {
            let (labels, values) = first_measure_series(summary);
            render::line(&labels, &values, title, measure_name(summary), path)
        }
        ChartKind::Pie => {
            let (labels, values) = first_measure_series(summary);
            render::pie(&labels, &values, title, path)
        }
        ChartKind::StackedPercent => {
            let pivot = pivot_two_keys(summary)?;
            render::stacked_percent(&pivot, title, path)
        }
    }
}

fn measure_name(summary: &Summary) -> &str {
    summary
        .measure_columns()
        .first()
        .map(String::as_str)
        .unwrap_or("value")
}

/// Row labels and first-measure values in row order. `Missing` cells
/// draw as zero; the sentinel text never becomes a NaN label.
fn first_measure_series(summary: &Summary) -> (Vec<String>, Vec<f64>) {
    let labels = summary.rows().iter().map(|row| row.keys.join(" / ")).collect();
    let values = summary
        .rows()
        .iter()
        .map(|row| {
            row.measures
                .first()
                .map(|m| m.chart_value())
                .unwrap_or(0.0)
        })
        .collect();
    (labels, values)
}

fn pivot_two_keys(summary: &Summary) -> Result<PivotTable, ChartError> {
    if summary.key_columns().len() != 2 {
        return Err(ChartError::NotTwoKeys(summary.key_columns().len()));
    }

    let mut x_labels: Vec<String> = Vec::new();
    let mut series_labels: Vec<String> = Vec::new();
    for row in summary.rows() {
        if !x_labels.contains(&row.keys[0]) {
            x_labels.push(row.keys[0].clone());
        }
        if !series_labels.contains(&row.keys[1]) {
            series_labels.push(row.keys[1].clone());
        }
    }
    x_labels.sort();

    let mut totals = vec![0.0; x_labels.len()];
    let mut values = vec![vec![0.0; x_labels.len()]; series_labels.len()];
    for row in summary.rows() {
        let x = x_labels.iter().position(|l| *l == row.keys[0]).unwrap();
        let s = series_labels.iter().position(|l| *l == row.keys[1]).unwrap();
        let v = row.measures.first().map(|m| m.chart_value()).unwrap_or(0.0);
        values[s][x] += v;
        totals[x] += v;
    }

    let shares = values
        .into_iter()
        .map(|series| {
            series
                .into_iter()
                .zip(&totals)
                .map(|(v, total)| if *total > 0.0 { v / total * 100.0 } else { 0.0 })
                .collect()
        })
        .collect();

    Ok(PivotTable {
        x_labels,
        series_labels,
        shares,
    })
}
