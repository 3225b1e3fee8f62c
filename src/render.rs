use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, ImageFormat, RgbImage};
use plotters::prelude::*;
use thiserror::Error;

use crate::report::Series;

pub const CHART_WIDTH_PX: u32 = 1000;
const CHART_HEIGHT_PX: u32 = 600;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("nothing to render: series has no checks or no intervals")]
    NothingToRender,
    #[error("render backend failure: {0}")]
    Backend(String),
    #[error("png encoding failure: {0}")]
    PngEncoding(String),
    #[error("failed to write chart to {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
}

struct ChartStyle;

impl ChartStyle {
    const MARGIN: i32 = 20;
    const CAPTION_FONT_FAMILY: &'static str = "sans-serif";
    const CAPTION_FONT_SIZE: i32 = 28;
    const X_LABEL_AREA_SIZE: u32 = 40;
    const Y_LABEL_AREA_SIZE: u32 = 56;
    const Y_LABEL_COUNT: usize = 8;
    const LINE_WIDTH: u32 = 2;
    const LEGEND_SWATCH_PX: i32 = 20;
    const BACKGROUND: RGBColor = WHITE;
    const LEGEND_ALPHA: f64 = 0.8;
}

fn backend(error: impl std::fmt::Debug) -> RenderError {
    RenderError::Backend(format!("{error:?}"))
}

/// Vertical axis bounds: always shows the 100% line, widened to fit outliers.
fn y_bounds(series: &Series) -> (f64, f64) {
    let values = series.lines.iter().flat_map(|line| line.values.iter().copied());
    let (min, max) = values
        .filter(|v| v.is_finite())
        .fold((100.0_f64, 100.0_f64), |(lo, hi), v| (lo.min(v), hi.max(v)));
    ((min - 1.0).floor(), (max + 1.0).ceil())
}

fn x_bounds(points: usize) -> (f64, f64) {
    if points <= 1 {
        (-0.5, 0.5)
    } else {
        (0.0, (points - 1) as f64)
    }
}

fn label_at(labels: &[String], x: f64) -> String {
    let index = x.round();
    if (x - index).abs() > f64::EPSILON || index < 0.0 {
        return String::new();
    }
    labels.get(index as usize).cloned().unwrap_or_default()
}

/// Draws one line per check and returns the PNG bytes.
pub fn render_chart_png(series: &Series, title: &str) -> Result<Vec<u8>, RenderError> {
    if series.is_empty() || series.labels.is_empty() {
        return Err(RenderError::NothingToRender);
    }

    let width = CHART_WIDTH_PX;
    let height = CHART_HEIGHT_PX;
    let mut rgb_buffer = vec![255u8; width as usize * height as usize * 3];

    {
        let drawing_area =
            BitMapBackend::with_buffer(&mut rgb_buffer, (width, height)).into_drawing_area();
        drawing_area.fill(&ChartStyle::BACKGROUND).map_err(backend)?;

        let labels = &series.labels;
        let (x_start, x_end) = x_bounds(labels.len());
        let (y_min, y_max) = y_bounds(series);

        let mut chart = ChartBuilder::on(&drawing_area)
            .margin(ChartStyle::MARGIN)
            .caption(
                title,
                (ChartStyle::CAPTION_FONT_FAMILY, ChartStyle::CAPTION_FONT_SIZE),
            )
            .x_label_area_size(ChartStyle::X_LABEL_AREA_SIZE)
            .y_label_area_size(ChartStyle::Y_LABEL_AREA_SIZE)
            .build_cartesian_2d(x_start..x_end, y_min..y_max)
            .map_err(backend)?;

        chart
            .configure_mesh()
            .x_labels(labels.len())
            .x_label_formatter(&|x| label_at(labels, *x))
            .y_labels(ChartStyle::Y_LABEL_COUNT)
            .y_desc("Uptime %")
            .draw()
            .map_err(backend)?;

        for (index, line) in series.lines.iter().enumerate() {
            let color = Palette99::pick(index).to_rgba();
            chart
                .draw_series(LineSeries::new(
                    line.values.iter().enumerate().map(|(i, v)| (i as f64, *v)),
                    color.stroke_width(ChartStyle::LINE_WIDTH),
                ))
                .map_err(backend)?
                .label(line.check.clone())
                .legend(move |(x, y)| {
                    PathElement::new(vec![(x, y), (x + ChartStyle::LEGEND_SWATCH_PX, y)], color)
                });
        }

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::LowerLeft)
            .background_style(WHITE.mix(ChartStyle::LEGEND_ALPHA))
            .border_style(BLACK)
            .draw()
            .map_err(backend)?;

        drawing_area.present().map_err(backend)?;
    }

    let rgb_image = RgbImage::from_raw(width, height, rgb_buffer)
        .ok_or_else(|| RenderError::PngEncoding("image buffer conversion failed".to_string()))?;
    let mut output = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(rgb_image)
        .write_to(&mut output, ImageFormat::Png)
        .map_err(|error| RenderError::PngEncoding(error.to_string()))?;

    Ok(output.into_inner())
}

/// Renders the chart and writes it to `path`.
pub fn render_chart(series: &Series, title: &str, path: impl AsRef<Path>) -> Result<(), RenderError> {
    let path = path.as_ref();
    let png = render_chart_png(series, title)?;
    std::fs::write(path, png).map_err(|source| RenderError::Write {
        path: path.display().to_string(),
        source,
    })
}
