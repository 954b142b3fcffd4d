//! Contribution charts
//!
//! Charts go through the [`ChartRenderer`] trait so the report can be produced with any
//! backend. The default [`SvgDonutRenderer`] draws a donut with plotters' SVG backend from
//! plain shapes (polygons, circles, rectangles and text), which needs no system fonts.

use crate::buckets::{Bucket, OTHER_LABEL, total};
use crate::error::{Error, Result};
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::f64::consts::{FRAC_PI_2, TAU};
use std::path::Path;

/// Renders one proportional chart to a file
pub trait ChartRenderer {
    /// File extension of the produced images, without the dot
    fn extension(&self) -> &'static str;

    /// Draw `buckets` with `title`, listing them under `legend_title`
    fn render(&self, title: &str, legend_title: &str, buckets: &[Bucket], path: &Path)
    -> Result<()>;
}

/// Donut chart with a legend, written as SVG
#[derive(Clone, Debug)]
pub struct SvgDonutRenderer {
    width: u32,
    height: u32,
}

impl SvgDonutRenderer {
    /// Create a renderer producing `width` x `height` images
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(200),
            height: height.max(200),
        }
    }
}

impl Default for SvgDonutRenderer {
    fn default() -> Self {
        Self::new(1000, 800)
    }
}

const OTHER_COLOR: RGBColor = RGBColor(160, 160, 160);
// Ends of a cool-to-warm ramp
const COOL: RGBColor = RGBColor(59, 76, 192);
const WARM: RGBColor = RGBColor(180, 4, 38);
// Fraction of the outer radius left empty in the middle
const HOLE_RATIO: f64 = 0.4;

/// Color of the `index`-th of `count` slices
pub(crate) fn slice_color(index: usize, count: usize, label: &str) -> RGBColor {
    if label == OTHER_LABEL {
        return OTHER_COLOR;
    }
    let t = if count <= 1 {
        0.0
    } else {
        index as f64 / (count - 1) as f64
    };
    let lerp = |a: u8, b: u8| (f64::from(a) + (f64::from(b) - f64::from(a)) * t).round() as u8;
    RGBColor(lerp(COOL.0, WARM.0), lerp(COOL.1, WARM.1), lerp(COOL.2, WARM.2))
}

/// Points of an annulus sector between `start` and `end` radians
fn wedge(center: (i32, i32), outer: f64, inner: f64, start: f64, end: f64) -> Vec<(i32, i32)> {
    let steps = (((end - start) / TAU) * 180.0).ceil().max(2.0) as usize;
    let point = |radius: f64, angle: f64| {
        (
            center.0 + (radius * angle.cos()).round() as i32,
            center.1 + (radius * angle.sin()).round() as i32,
        )
    };

    let mut points = Vec::with_capacity(2 * (steps + 1));
    for step in 0..=steps {
        let angle = start + (end - start) * step as f64 / steps as f64;
        points.push(point(outer, angle));
    }
    for step in (0..=steps).rev() {
        let angle = start + (end - start) * step as f64 / steps as f64;
        points.push(point(inner, angle));
    }
    points
}

/// Legend line for one bucket, e.g. `alice - 40 (27.21%)`
pub(crate) fn legend_label(bucket: &Bucket) -> String {
    format!("{} - {} ({:.2}%)", bucket.label, bucket.value, bucket.percent)
}

impl ChartRenderer for SvgDonutRenderer {
    fn extension(&self) -> &'static str {
        "svg"
    }

    fn render(
        &self,
        title: &str,
        legend_title: &str,
        buckets: &[Bucket],
        path: &Path,
    ) -> Result<()> {
        let chart_err = |e: DrawingAreaErrorKind<std::io::Error>| {
            Error::Chart(format!("{}: {e}", path.display()))
        };

        let root = SVGBackend::new(path, (self.width, self.height)).into_drawing_area();
        root.fill(&WHITE).map_err(chart_err)?;

        let (w, h) = (self.width as i32, self.height as i32);
        let centered = Pos::new(HPos::Center, VPos::Center);
        let left = Pos::new(HPos::Left, VPos::Center);

        root.draw(&Text::new(
            title.to_string(),
            (w / 2, 30),
            ("sans-serif", 28).into_font().color(&BLACK).pos(centered),
        ))
        .map_err(chart_err)?;

        // Donut on the left 60%, legend on the right
        let plot_width = f64::from(self.width) * 0.6;
        let plot_height = f64::from(self.height) - 70.0;
        let outer = (plot_width.min(plot_height) / 2.0 - 10.0).max(10.0);
        let inner = outer * HOLE_RATIO;
        let center = ((plot_width / 2.0) as i32, 60 + (plot_height / 2.0) as i32);

        let sum = total(buckets);
        if sum == 0 {
            root.draw(&Text::new(
                "No contributions".to_string(),
                center,
                ("sans-serif", 20).into_font().color(&BLACK).pos(centered),
            ))
            .map_err(chart_err)?;
        } else {
            // Clockwise from twelve o'clock
            let mut angle = -FRAC_PI_2;
            for (index, bucket) in buckets.iter().enumerate() {
                let span = TAU * bucket.value as f64 / sum as f64;
                if span <= 0.0 {
                    continue;
                }
                let color = slice_color(index, buckets.len(), &bucket.label);
                root.draw(&Polygon::new(
                    wedge(center, outer, inner, angle, angle + span),
                    color.filled(),
                ))
                .map_err(chart_err)?;

                if bucket.percent >= 3.0 {
                    let mid = angle + span / 2.0;
                    let radius = (outer + inner) / 2.0;
                    root.draw(&Text::new(
                        format!("{:.2}%", bucket.percent),
                        (
                            center.0 + (radius * mid.cos()) as i32,
                            center.1 + (radius * mid.sin()) as i32,
                        ),
                        ("sans-serif", 14).into_font().color(&WHITE).pos(centered),
                    ))
                    .map_err(chart_err)?;
                }
                angle += span;
            }
            root.draw(&Circle::new(center, inner as i32, WHITE.filled()))
                .map_err(chart_err)?;
        }

        // Legend
        let legend_x = plot_width as i32 + 10;
        let mut y = 80;
        root.draw(&Text::new(
            legend_title.to_string(),
            (legend_x, y),
            ("sans-serif", 18).into_font().color(&BLACK).pos(left),
        ))
        .map_err(chart_err)?;
        y += 26;
        root.draw(&Text::new(
            format!("Total Contributions: {sum}"),
            (legend_x, y),
            ("sans-serif", 14).into_font().color(&BLACK).pos(left),
        ))
        .map_err(chart_err)?;

        for (index, bucket) in buckets.iter().enumerate() {
            y += 22;
            if y > h - 10 {
                break;
            }
            let color = slice_color(index, buckets.len(), &bucket.label);
            root.draw(&Rectangle::new(
                [(legend_x, y - 6), (legend_x + 12, y + 6)],
                color.filled(),
            ))
            .map_err(chart_err)?;
            root.draw(&Text::new(
                legend_label(bucket),
                (legend_x + 20, y),
                ("sans-serif", 14).into_font().color(&BLACK).pos(left),
            ))
            .map_err(chart_err)?;
        }

        root.present().map_err(chart_err)?;
        tracing::info!(path = %path.display(), slices = buckets.len(), "Rendered chart");
        Ok(())
    }
}
