//! Horizontal VIP bar charts

use crate::structs::{HighlightedFeature, Result, VipError};
use plotters::prelude::*;
use plotters::style::{register_font, FontStyle};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Fixed x-axis range of every chart
pub const VIP_AXIS_MAX: f64 = 5.0;

const HIGHLIGHT_COLOR: RGBColor = RGBColor(214, 39, 40);
const DEFAULT_COLOR: RGBColor = RGBColor(120, 144, 156);
const FONT_FAMILY: &str = "sans-serif";

const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/Library/Fonts/Arial.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

static FONT_READY: OnceLock<bool> = OnceLock::new();

/// Register a TrueType font for chart text, once per process
///
/// Tries `preferred` first, then common system locations. Returns whether a
/// font is available; without one, charts are drawn without text.
pub fn init_font(preferred: Option<&Path>) -> bool {
    *FONT_READY.get_or_init(|| {
        let candidates = preferred
            .map(Path::to_path_buf)
            .into_iter()
            .chain(SYSTEM_FONTS.iter().map(PathBuf::from));

        for path in candidates {
            let Ok(bytes) = std::fs::read(&path) else {
                continue;
            };
            // plotters keeps a 'static reference to registered font data
            let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
            match register_font(FONT_FAMILY, FontStyle::Normal, bytes) {
                Ok(()) => {
                    log::debug!("Chart font: {}", path.display());
                    return true;
                }
                Err(_) => log::debug!("Unusable font {}", path.display()),
            }
        }
        log::warn!("No TrueType font found, charts will be drawn without text");
        false
    })
}

/// Render a ranked horizontal bar chart, top-ranked feature at the top
///
/// Bars longer than the axis are clipped at `VIP_AXIS_MAX`.
///
/// # Errors
/// Returns `VipError::Write` if drawing or encoding the image fails
#[allow(clippy::cast_possible_truncation)]
pub fn render_bar_chart(path: &Path, title: &str, bars: &[HighlightedFeature]) -> Result<()> {
    let with_text = init_font(None);
    let to_write_error = |e: &dyn std::fmt::Display| {
        VipError::Write(format!("{}: {e}", path.display()))
    };

    let rows = bars.len().max(1);
    let height = 120 + 28 * rows as u32;
    let root = BitMapBackend::new(path, (900, height)).into_drawing_area();
    root.fill(&WHITE).map_err(|e| to_write_error(&e))?;

    let mut builder = ChartBuilder::on(&root);
    builder.margin(20u32);
    if with_text {
        builder
            .caption(title, (FONT_FAMILY, 22))
            .x_label_area_size(40u32)
            .y_label_area_size(200u32);
    }
    let mut chart = builder
        .build_cartesian_2d(0f64..VIP_AXIS_MAX, (0..rows).into_segmented())
        .map_err(|e| to_write_error(&e))?;

    // Segment 0 is the bottom row
    let label_at = |row: usize| bars.get(rows - 1 - row).map(|b| b.feature.clone());

    if with_text {
        chart
            .configure_mesh()
            .disable_y_mesh()
            .y_labels(rows)
            .y_label_formatter(&|v| match v {
                SegmentValue::CenterOf(row) | SegmentValue::Exact(row) => {
                    label_at(*row).unwrap_or_default()
                }
                SegmentValue::Last => String::new(),
            })
            .x_desc("VIP")
            .label_style((FONT_FAMILY, 14))
            .draw()
            .map_err(|e| to_write_error(&e))?;
    }

    chart
        .draw_series(bars.iter().enumerate().map(|(rank, bar)| {
            let row = rows - 1 - rank;
            let color = if bar.highlight {
                HIGHLIGHT_COLOR
            } else {
                DEFAULT_COLOR
            };
            let mut rect = Rectangle::new(
                [
                    (0.0, SegmentValue::Exact(row)),
                    (bar.score.clamp(0.0, VIP_AXIS_MAX), SegmentValue::Exact(row + 1)),
                ],
                color.filled(),
            );
            rect.set_margin(4, 4, 0, 0);
            rect
        }))
        .map_err(|e| to_write_error(&e))?;

    root.present().map_err(|e| to_write_error(&e))?;
    Ok(())
}
