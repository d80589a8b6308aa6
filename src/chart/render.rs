use std::fmt::Display;
use std::path::Path;

use plotters::prelude::*;

use super::{ChartError, PivotTable};

const CHART_SIZE: (u32, u32) = (1024, 768);

const SERIES_COLORS: [RGBColor; 8] = [
    RGBColor(68, 114, 196),
    RGBColor(237, 125, 49),
    RGBColor(112, 173, 71),
    RGBColor(255, 192, 0),
    RGBColor(91, 155, 213),
    RGBColor(165, 165, 165),
    RGBColor(38, 68, 120),
    RGBColor(158, 72, 14),
];

fn series_color(idx: usize) -> RGBColor {
    SERIES_COLORS[idx % SERIES_COLORS.len()]
}

fn render_err(err: impl Display) -> ChartError {
    ChartError::Render(err.to_string())
}

fn axis_max(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(0.0, f64::max);
    if max > 0.0 {
        max * 1.1
    } else {
        1.0
    }
}

fn segment_label(labels: &[String], segment: &SegmentValue<usize>) -> String {
    match segment {
        SegmentValue::Exact(i) | SegmentValue::CenterOf(i) => {
            labels.get(*i).cloned().unwrap_or_default()
        }
        SegmentValue::Last => String::new(),
    }
}

pub(super) fn bar(
    labels: &[String],
    values: &[f64],
    title: &str,
    y_desc: &str,
    path: &Path,
) -> Result<(), ChartError> {
    let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(render_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 28))
        .margin(12)
        .x_label_area_size(64)
        .y_label_area_size(90)
        .build_cartesian_2d((0..labels.len()).into_segmented(), 0f64..axis_max(values))
        .map_err(render_err)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(labels.len() + 1)
        .x_label_formatter(&|segment| segment_label(labels, segment))
        .y_desc(y_desc)
        .label_style(("sans-serif", 13))
        .draw()
        .map_err(render_err)?;

    chart
        .draw_series(
            Histogram::vertical(&chart)
                .style(series_color(0).filled())
                .margin(6)
                .data(values.iter().enumerate().map(|(i, v)| (i, *v))),
        )
        .map_err(render_err)?;

    root.present().map_err(render_err)?;
    Ok(())
}

pub(super) fn line(
    labels: &[String],
    values: &[f64],
    title: &str,
    y_desc: &str,
    path: &Path,
) -> Result<(), ChartError> {
    let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(render_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 28))
        .margin(12)
        .x_label_area_size(64)
        .y_label_area_size(90)
        .build_cartesian_2d(0..labels.len().saturating_sub(1).max(1), 0f64..axis_max(values))
        .map_err(render_err)?;

    chart
        .configure_mesh()
        .x_labels(labels.len())
        .x_label_formatter(&|i| labels.get(*i).cloned().unwrap_or_default())
        .y_desc(y_desc)
        .label_style(("sans-serif", 13))
        .draw()
        .map_err(render_err)?;

    let color = series_color(0);
    chart
        .draw_series(LineSeries::new(
            values.iter().enumerate().map(|(i, v)| (i, *v)),
            &color,
        ))
        .map_err(render_err)?;
    chart
        .draw_series(
            values
                .iter()
                .enumerate()
                .map(|(i, v)| Circle::new((i, *v), 4, color.filled())),
        )
        .map_err(render_err)?;

    root.present().map_err(render_err)?;
    Ok(())
}

pub(super) fn pie(
    labels: &[String],
    values: &[f64],
    title: &str,
    path: &Path,
) -> Result<(), ChartError> {
    let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(render_err)?;
    let root = root
        .titled(title, ("sans-serif", 28))
        .map_err(render_err)?;

    let (width, height) = root.dim_in_pixel();
    let center = (width as i32 / 2, height as i32 / 2);
    let radius = (width.min(height) as f64 / 2.0 - 60.0).max(50.0);
    let colors: Vec<RGBColor> = (0..labels.len()).map(series_color).collect();
    let owned_labels: Vec<String> = labels.to_vec();

    let mut pie = Pie::new(&center, &radius, values, &colors, &owned_labels);
    pie.label_style(("sans-serif", 18).into_font().color(&BLACK));
    pie.percentages(("sans-serif", 14).into_font().color(&BLACK));
    root.draw(&pie).map_err(render_err)?;

    root.present().map_err(render_err)?;
    Ok(())
}

pub(super) fn stacked_percent(
    pivot: &PivotTable,
    title: &str,
    path: &Path,
) -> Result<(), ChartError> {
    let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(render_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 28))
        .margin(12)
        .x_label_area_size(64)
        .y_label_area_size(90)
        .build_cartesian_2d((0..pivot.x_labels.len()).into_segmented(), 0f64..100f64)
        .map_err(render_err)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(pivot.x_labels.len() + 1)
        .x_label_formatter(&|segment| segment_label(&pivot.x_labels, segment))
        .y_desc("share of sales (%)")
        .label_style(("sans-serif", 13))
        .draw()
        .map_err(render_err)?;

    // cumulative base per x column so each series stacks on the last
    let mut base = vec![0.0f64; pivot.x_labels.len()];
    for (s, series) in pivot.shares.iter().enumerate() {
        let color = series_color(s);
        let segments: Vec<(usize, f64, f64)> = series
            .iter()
            .enumerate()
            .map(|(x, share)| {
                let lo = base[x];
                base[x] += share;
                (x, lo, base[x])
            })
            .collect();

        chart
            .draw_series(segments.into_iter().map(|(x, lo, hi)| {
                Rectangle::new(
                    [
                        (SegmentValue::Exact(x), lo),
                        (SegmentValue::Exact(x + 1), hi),
                    ],
                    color.filled(),
                )
            }))
            .map_err(render_err)?
            .label(pivot.series_labels[s].as_str())
            .legend(move |(x, y)| {
                Rectangle::new([(x - 12, y - 5), (x, y + 5)], color.filled())
            });
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()
        .map_err(render_err)?;

    root.present().map_err(render_err)?;
    Ok(())
}
