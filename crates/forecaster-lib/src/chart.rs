//! Consumption trend charts for usage reports

use crate::error::{ForecastError, Result};
use base64::Engine as _;
use chrono::NaiveDateTime;
use image::{ImageFormat, RgbImage};
use plotters::prelude::*;
use std::io::Cursor;

pub const TREND_WIDTH: u32 = 800;
pub const TREND_HEIGHT: u32 = 400;

/// Render consumption over time as a line chart, returned as base64-encoded PNG.
///
/// The x axis is hours elapsed since the first reading. Text is not drawn, so
/// the chart carries no captions or tick labels.
///
/// # Errors
/// Returns [`ForecastError::Render`] if drawing or PNG encoding fails, or if
/// `points` is empty.
pub fn render_trend_png(points: &[(NaiveDateTime, f64)], width: u32, height: u32) -> Result<String> {
    let mut points = points.to_vec();
    points.sort_by_key(|(ts, _)| *ts);
    let (first, _) = *points
        .first()
        .ok_or_else(|| ForecastError::render("no readings to plot"))?;

    let series: Vec<(f64, f64)> = points
        .iter()
        .map(|(ts, energy)| ((*ts - first).num_minutes() as f64 / 60.0, *energy))
        .collect();

    // A single reading still needs a non-empty x range
    let x_max = series.last().map_or(0.0, |(x, _)| *x).max(1.0);
    let min_energy = series.iter().map(|(_, y)| *y).fold(f64::INFINITY, f64::min);
    let max_energy = series.iter().map(|(_, y)| *y).fold(f64::NEG_INFINITY, f64::max);
    let y_min = min_energy.min(0.0);
    let y_max = if max_energy > y_min {
        max_energy + (max_energy - y_min) * 0.1
    } else {
        y_min + 1.0
    };

    let mut pixels = vec![0u8; (width * height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut pixels, (width, height)).into_drawing_area();
        root.fill(&WHITE).map_err(ForecastError::render)?;

        let mut chart = ChartBuilder::on(&root)
            .margin(15)
            .x_label_area_size(30)
            .y_label_area_size(40)
            .build_cartesian_2d(0.0..x_max, y_min..y_max)
            .map_err(ForecastError::render)?;

        chart
            .configure_mesh()
            .light_line_style(RGBColor(235, 235, 235))
            .axis_style(RGBColor(120, 120, 120))
            .draw()
            .map_err(ForecastError::render)?;

        chart
            .draw_series(LineSeries::new(series, RGBColor(33, 150, 243).stroke_width(2)))
            .map_err(ForecastError::render)?;

        root.present().map_err(ForecastError::render)?;
    }

    let frame = RgbImage::from_raw(width, height, pixels)
        .ok_or_else(|| ForecastError::render("pixel buffer does not match chart size"))?;
    let mut png = Cursor::new(Vec::new());
    frame
        .write_to(&mut png, ImageFormat::Png)
        .map_err(ForecastError::render)?;

    Ok(base64::engine::general_purpose::STANDARD.encode(png.into_inner()))
}
