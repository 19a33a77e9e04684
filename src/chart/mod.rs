//! Offscreen chart rendering.
//!
//! Each render owns a private RGB buffer for the lifetime of one call; the
//! buffer is released on every exit path, including draw failures. Nothing is
//! shared between renders, so they may run concurrently.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use plotters::coord::Shift;
use plotters::prelude::*;
use std::error::Error;
use std::io::Cursor;

use crate::data::ExperimentData;
use crate::error::{ReportError, ReportResult};
use crate::logging::{log, obj, v_num, v_str, Domain, Level, StageScope};

pub mod spec;

pub use spec::{comparison_spec, impact_bar_spec, kpi_line_spec, Bar, ChartBody, ChartSpec};

/// Largest edge accepted for a render surface, in pixels.
pub const MAX_SURFACE_EDGE: u32 = 4096;

/// Charts carry captions and axis text only when built with a font backend.
const DRAW_TEXT: bool = cfg!(feature = "chart-text");

const GRID: RGBColor = RGBColor(225, 225, 225);
const AXIS: RGBColor = RGBColor(90, 90, 90);

type Area<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl EncodedImage {
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.png)
    }

    pub fn to_data_url(&self) -> String {
        format!("data:image/png;base64,{}", self.to_base64())
    }

    /// Accepts raw base64 or a `data:image/png;base64,` URL.
    pub fn from_base64_png(payload: &str) -> ReportResult<Self> {
        let raw = payload
            .split_once("base64,")
            .map(|(_, rest)| rest)
            .unwrap_or(payload)
            .trim();
        let png = STANDARD
            .decode(raw)
            .map_err(|e| ReportError::Compose(format!("image payload is not base64: {}", e)))?;
        let (width, height) = png_dimensions(&png)
            .ok_or_else(|| ReportError::Compose("image payload is not a PNG".to_string()))?;
        Ok(Self { png, width, height })
    }
}

/// Width and height of an encoded PNG, read from its header.
pub fn png_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    image::io::Reader::with_format(Cursor::new(bytes), image::ImageFormat::Png)
        .into_dimensions()
        .ok()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartImages {
    pub bar_chart: EncodedImage,
    pub line_chart: EncodedImage,
    pub comparison_chart: EncodedImage,
}

/// A disposable pixel buffer sized for one chart.
pub struct RenderSurface {
    chart: &'static str,
    buf: Vec<u8>,
    width: u32,
    height: u32,
}

impl RenderSurface {
    pub fn acquire(chart: &'static str, width: u32, height: u32) -> ReportResult<Self> {
        if width == 0 || height == 0 || width > MAX_SURFACE_EDGE || height > MAX_SURFACE_EDGE {
            return Err(ReportError::Render {
                chart,
                reason: format!("invalid surface size {}x{}", width, height),
            });
        }
        log(
            Level::Trace,
            Domain::Chart,
            "surface_acquired",
            obj(&[
                ("chart", v_str(chart)),
                ("width", v_num(width as f64)),
                ("height", v_num(height as f64)),
            ]),
        );
        Ok(Self {
            chart,
            buf: vec![255u8; width as usize * height as usize * 3],
            width,
            height,
        })
    }

    pub fn draw<F>(&mut self, draw: F) -> ReportResult<()>
    where
        F: FnOnce(&Area<'_>) -> Result<(), Box<dyn Error>>,
    {
        let chart = self.chart;
        let root = BitMapBackend::with_buffer(&mut self.buf, (self.width, self.height))
            .into_drawing_area();
        draw(&root)
            .and_then(|_| root.present().map_err(|e| Box::new(e) as Box<dyn Error>))
            .map_err(|e| ReportError::Render {
                chart,
                reason: e.to_string(),
            })
    }

    pub fn into_png(mut self) -> ReportResult<EncodedImage> {
        let buf = std::mem::take(&mut self.buf);
        let (width, height) = (self.width, self.height);
        let img = image::RgbImage::from_raw(width, height, buf).ok_or_else(|| ReportError::Render {
            chart: self.chart,
            reason: "pixel buffer does not match surface size".to_string(),
        })?;
        let mut out = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut out, image::ImageOutputFormat::Png)
            .map_err(|e| ReportError::Render {
                chart: self.chart,
                reason: e.to_string(),
            })?;
        Ok(EncodedImage {
            png: out.into_inner(),
            width,
            height,
        })
    }
}

impl Drop for RenderSurface {
    fn drop(&mut self) {
        log(
            Level::Trace,
            Domain::Chart,
            "surface_released",
            obj(&[("chart", v_str(self.chart))]),
        );
    }
}

fn rgb((r, g, b): spec::Rgb) -> RGBColor {
    RGBColor(r, g, b)
}

fn padded_range(lo: f64, hi: f64) -> (f64, f64) {
    if !lo.is_finite() || !hi.is_finite() {
        return (0.0, 1.0);
    }
    if (hi - lo).abs() < 1e-9 {
        return (lo - 1.0, hi + 1.0);
    }
    let pad = (hi - lo) * 0.1;
    (lo - pad, hi + pad)
}

fn draw_horizontal_bars(
    root: &Area<'_>,
    spec: &ChartSpec,
    rows: &[Option<Bar>],
) -> Result<(), Box<dyn Error>> {
    root.fill(&WHITE)?;
    let n = rows.len().max(1) as f64;
    let values = rows.iter().flatten().map(|b| b.value);
    let lo = values.clone().fold(0.0f64, f64::min);
    let hi = values.fold(0.0f64, f64::max);
    let x_min = lo * 1.1;
    let x_max = if hi > 0.0 || lo < 0.0 { hi * 1.1 } else { 1.0 };

    let mut builder = ChartBuilder::on(root);
    builder.margin(20);
    if DRAW_TEXT {
        builder
            .caption(&spec.title, ("sans-serif", 22).into_font())
            .x_label_area_size(40)
            .y_label_area_size(20);
    }
    let mut chart = builder.build_cartesian_2d(x_min..x_max, 0.0..n)?;

    if DRAW_TEXT {
        chart
            .configure_mesh()
            .disable_y_mesh()
            .y_labels(0)
            .x_desc(spec.x_label.as_str())
            .draw()?;
    } else {
        let steps = 5;
        for i in 0..=steps {
            let x = x_min + (x_max - x_min) * i as f64 / steps as f64;
            chart.draw_series(std::iter::once(PathElement::new(
                vec![(x, 0.0), (x, n)],
                GRID.stroke_width(1),
            )))?;
        }
    }

    chart.draw_series(rows.iter().enumerate().filter_map(|(i, row)| {
        row.as_ref().map(|bar| {
            let top = n - i as f64 - 0.15;
            let bottom = n - i as f64 - 0.85;
            let (a, b) = (bar.value.min(0.0), bar.value.max(0.0));
            Rectangle::new([(a, bottom), (b, top)], rgb(bar.color).filled())
        })
    }))?;

    chart.draw_series(std::iter::once(PathElement::new(
        vec![(0.0, 0.0), (0.0, n)],
        AXIS.stroke_width(1),
    )))?;

    if DRAW_TEXT {
        chart.draw_series(rows.iter().enumerate().filter_map(|(i, row)| {
            row.as_ref().map(|bar| {
                Text::new(
                    bar.label.clone(),
                    (x_min, n - i as f64 - 0.35),
                    ("sans-serif", 12).into_font(),
                )
            })
        }))?;
    }
    Ok(())
}

fn draw_line(
    root: &Area<'_>,
    spec: &ChartSpec,
    points: &[(String, f64)],
    color: spec::Rgb,
) -> Result<(), Box<dyn Error>> {
    root.fill(&WHITE)?;
    let lo = points.iter().map(|(_, v)| *v).fold(f64::INFINITY, f64::min);
    let hi = points.iter().map(|(_, v)| *v).fold(f64::NEG_INFINITY, f64::max);
    let (y_min, y_max) = padded_range(lo, hi);
    let x_max = points.len().max(1) as f64 - 0.5;

    let mut builder = ChartBuilder::on(root);
    builder.margin(20);
    if DRAW_TEXT {
        builder
            .caption(&spec.title, ("sans-serif", 22).into_font())
            .x_label_area_size(40)
            .y_label_area_size(60);
    }
    let mut chart = builder.build_cartesian_2d(-0.5..x_max, y_min..y_max)?;

    if DRAW_TEXT {
        chart
            .configure_mesh()
            .x_desc(spec.x_label.as_str())
            .y_desc(spec.y_label.as_str())
            .draw()?;
    } else {
        let steps = 5;
        for i in 0..=steps {
            let y = y_min + (y_max - y_min) * i as f64 / steps as f64;
            chart.draw_series(std::iter::once(PathElement::new(
                vec![(-0.5, y), (x_max, y)],
                GRID.stroke_width(1),
            )))?;
        }
    }

    let series: Vec<(f64, f64)> = points
        .iter()
        .enumerate()
        .map(|(i, (_, v))| (i as f64, *v))
        .collect();
    chart.draw_series(LineSeries::new(series.iter().copied(), rgb(color).stroke_width(2)))?;
    chart.draw_series(
        series
            .iter()
            .map(|&(x, y)| Circle::new((x, y), 3, rgb(color).filled())),
    )?;
    Ok(())
}

/// Render `spec` to a PNG of the requested size.
pub fn render_to_image(spec: &ChartSpec, width: u32, height: u32) -> ReportResult<EncodedImage> {
    let mut surface = RenderSurface::acquire(spec.id, width, height)?;
    surface.draw(|root| match &spec.body {
        ChartBody::HorizontalBars { rows } => draw_horizontal_bars(root, spec, rows),
        ChartBody::Line { points, color } => draw_line(root, spec, points, *color),
    })?;
    surface.into_png()
}

async fn render_task(spec: ChartSpec) -> ReportResult<EncodedImage> {
    let chart = spec.id;
    tokio::task::spawn_blocking(move || {
        let (w, h) = spec.size;
        render_to_image(&spec, w, h)
    })
    .await
    .map_err(|e| ReportError::Render {
        chart,
        reason: format!("render task aborted: {}", e),
    })?
}

/// Render the three report charts concurrently; all must succeed.
pub async fn render_report_charts(
    data: &ExperimentData,
    comparison_count: usize,
) -> ReportResult<ChartImages> {
    let mut scope = StageScope::new(Domain::Chart, "report_charts");
    let result = tokio::try_join!(
        render_task(impact_bar_spec(data)),
        render_task(kpi_line_spec(data)),
        render_task(comparison_spec(data, comparison_count)),
    );
    match result {
        Ok((bar_chart, line_chart, comparison_chart)) => Ok(ChartImages {
            bar_chart,
            line_chart,
            comparison_chart,
        }),
        Err(err) => {
            scope.fail();
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixture::mock_experiment;

    #[test]
    fn renders_png_of_requested_size() {
        let spec = kpi_line_spec(&mock_experiment(12));
        let img = render_to_image(&spec, 320, 200).unwrap();
        assert_eq!((img.width, img.height), (320, 200));
        assert_eq!(png_dimensions(&img.png), Some((320, 200)));
        assert_eq!(png_dimensions(&img.png[..12]), None);
        assert_eq!(png_dimensions(b"GIF89a"), None);
    }

    #[test]
    fn zero_sized_surface_is_a_render_error() {
        let spec = impact_bar_spec(&mock_experiment(3));
        match render_to_image(&spec, 0, 400) {
            Err(ReportError::Render { chart, .. }) => assert_eq!(chart, "impact_bar"),
            other => panic!("expected render error, got {:?}", other.map(|i| i.width)),
        }
    }

    #[test]
    fn failed_draw_still_releases_and_reports() {
        let mut surface = RenderSurface::acquire("failing", 16, 16).unwrap();
        let err = surface
            .draw(|_| Err("backend exploded".into()))
            .unwrap_err();
        assert!(err.to_string().contains("backend exploded"));
        drop(surface);
    }

    #[test]
    fn empty_dataset_renders_blank_charts() {
        let mut data = mock_experiment(0);
        data.setpoint_impact_summary.clear();
        data.condition_impact_summary.clear();
        assert!(render_to_image(&impact_bar_spec(&data), 100, 100).is_ok());
        assert!(render_to_image(&kpi_line_spec(&data), 100, 100).is_ok());
        assert!(render_to_image(&comparison_spec(&data, 10), 100, 100).is_ok());
    }

    #[test]
    fn base64_payload_round_trip() {
        let img = render_to_image(&kpi_line_spec(&mock_experiment(4)), 64, 48).unwrap();
        let back = EncodedImage::from_base64_png(&img.to_data_url()).unwrap();
        assert_eq!(back, img);
        assert!(EncodedImage::from_base64_png("bm90IGEgcG5n").is_err());
    }

    #[tokio::test]
    async fn report_charts_render_concurrently() {
        let images = render_report_charts(&mock_experiment(25), 10).await.unwrap();
        assert_eq!((images.bar_chart.width, images.bar_chart.height), (800, 600));
        assert_eq!((images.line_chart.width, images.line_chart.height), (800, 400));
        assert_eq!(images.comparison_chart.height, 600);
    }
}
