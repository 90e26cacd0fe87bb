//! Static PNG rendering of a recorded series.

use anyhow::{anyhow, Result};
use plotters::prelude::*;
use std::fmt;
use std::path::Path;

use crate::chart::ChartData;

pub const DEFAULT_CHART_PATH: &str = "report.png";

/// 10 x 4 inches at 100 dpi.
pub const IMAGE_SIZE: (u32, u32) = (1000, 400);

const DOWNLOAD_COLOR: RGBColor = BLUE;
const UPLOAD_COLOR: RGBColor = RED;

fn drawing<E: fmt::Display>(err: E) -> anyhow::Error {
    anyhow!("failed to draw chart: {err}")
}

/// Draws download and upload against seconds since the first sample and writes
/// the image to `path`.
pub fn render(data: &ChartData, path: &Path) -> Result<()> {
    let root = BitMapBackend::new(path, IMAGE_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(drawing)?;

    let [x_min, x_max] = data.x_bounds;
    let [y_min, y_max] = data.y_bounds;
    let mut chart = ChartBuilder::on(&root)
        .caption("Bandwidth measurement", ("sans-serif", 22))
        .margin(12)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)
        .map_err(drawing)?;

    chart
        .configure_mesh()
        .x_labels(10)
        .x_desc("Time (s)")
        .y_desc("Speed (Mbps)")
        .draw()
        .map_err(drawing)?;

    chart
        .draw_series(LineSeries::new(data.download.iter().copied(), &DOWNLOAD_COLOR))
        .map_err(drawing)?
        .label("Download")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 25, y)], &DOWNLOAD_COLOR));

    chart
        .draw_series(LineSeries::new(data.upload.iter().copied(), &UPLOAD_COLOR))
        .map_err(drawing)?
        .label("Upload")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 25, y)], &UPLOAD_COLOR));

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()
        .map_err(drawing)?;

    root.present()
        .map_err(|err| anyhow!("failed to write chart image {}: {err}", path.display()))
}
