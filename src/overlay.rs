//! Overlay rendering.
//!
//! Detections arrive in the detector's fixed input space (416x416 by
//! default); the live display has its own pixel size that can change at
//! runtime. This module projects boxes from one space to the other and draws
//! them, with labels, onto a transparent surface aligned with the video.
//!
//! Every render starts from a fresh fully-transparent surface, so drawing the
//! same batch at the same display size is bit-identical. The renderer applies
//! the confidence threshold itself; the client hands batches through
//! unfiltered.

use ab_glyph::FontArc;
use anyhow::{Context, Result};
use image::{imageops, Rgba, RgbaImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::path::Path;

use crate::config::{BoxOrigin, DetectorSettings, OverlaySettings};
use crate::detect::{Detection, DetectionBatch};
use crate::frame::Frame;

/// Box outline, in RGBA.
const BOX_COLOR: Rgba<u8> = Rgba([46, 204, 64, 255]);
/// Outline thickness in pixels.
const BOX_THICKNESS: u32 = 2;
/// Label text height in pixels.
const LABEL_PX: f32 = 16.0;
/// Labels never draw closer than this to the top edge.
const MIN_LABEL_TOP: f32 = 10.0;

/// Pixel dimensions of the current render target.
///
/// Re-read from the latest captured frame before each draw; the feed's native
/// resolution is not fixed at mount time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisplayFrame {
    pub width: u32,
    pub height: u32,
}

impl DisplayFrame {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_drawable(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// A detection box projected into display space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProjectedBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Draws detection batches onto transparent overlay surfaces.
pub struct OverlayRenderer {
    detector: DetectorSettings,
    confidence_threshold: f32,
    font: Option<FontArc>,
}

impl OverlayRenderer {
    pub fn new(detector: DetectorSettings, confidence_threshold: f32) -> Self {
        Self {
            detector,
            confidence_threshold,
            font: None,
        }
    }

    /// Builds a renderer from settings, loading the label font if configured.
    pub fn from_settings(detector: &DetectorSettings, overlay: &OverlaySettings) -> Result<Self> {
        let mut renderer = Self::new(detector.clone(), overlay.confidence_threshold);
        if let Some(path) = &overlay.font_path {
            renderer.load_font(path)?;
        } else {
            log::warn!("no label font configured; overlay will draw boxes only");
        }
        Ok(renderer)
    }

    pub fn with_font(mut self, font: FontArc) -> Self {
        self.font = Some(font);
        self
    }

    pub fn load_font(&mut self, path: &Path) -> Result<()> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("read label font {}", path.display()))?;
        self.font = Some(
            FontArc::try_from_vec(bytes)
                .with_context(|| format!("parse label font {}", path.display()))?,
        );
        Ok(())
    }

    /// Projects one detection into display space.
    pub fn project(&self, detection: &Detection, display: DisplayFrame) -> ProjectedBox {
        let scale_x = display.width as f32 / self.detector.input_width as f32;
        let scale_y = display.height as f32 / self.detector.input_height as f32;
        let (x, y) = match self.detector.box_origin {
            BoxOrigin::TopLeft => (detection.x, detection.y),
            BoxOrigin::Center => (
                detection.x - detection.width / 2.0,
                detection.y - detection.height / 2.0,
            ),
        };
        ProjectedBox {
            x: x * scale_x,
            y: y * scale_y,
            width: detection.width * scale_x,
            height: detection.height * scale_y,
        }
    }

    /// Draws the batch onto a fresh transparent surface sized to `display`.
    ///
    /// Detections below the confidence threshold are not drawn. A
    /// non-drawable display yields an empty surface; callers normally skip
    /// the render entirely until the feed has reported its size.
    pub fn render(&self, batch: &DetectionBatch, display: DisplayFrame) -> RgbaImage {
        let mut surface = RgbaImage::new(display.width, display.height);
        if !display.is_drawable() {
            return surface;
        }

        for detection in batch.iter() {
            if detection.confidence < self.confidence_threshold {
                continue;
            }
            let projected = self.project(detection, display);
            self.draw_box(&mut surface, projected);
            if let Some(font) = &self.font {
                let text = format_label(&detection.label, detection.confidence);
                let x = projected.x.round() as i32;
                let y = label_anchor(projected.y, LABEL_PX).round() as i32;
                draw_text_mut(&mut surface, BOX_COLOR, x, y, LABEL_PX, font, &text);
            }
        }
        surface
    }

    fn draw_box(&self, surface: &mut RgbaImage, projected: ProjectedBox) {
        let x = projected.x.round() as i32;
        let y = projected.y.round() as i32;
        let width = projected.width.round() as u32;
        let height = projected.height.round() as u32;

        for inset in 0..BOX_THICKNESS {
            let w = width.saturating_sub(inset * 2);
            let h = height.saturating_sub(inset * 2);
            if w == 0 || h == 0 {
                break;
            }
            let rect = Rect::at(x + inset as i32, y + inset as i32).of_size(w, h);
            draw_hollow_rect_mut(surface, rect, BOX_COLOR);
        }
    }
}

/// Label text: name plus confidence as a percentage with two decimals.
pub fn format_label(label: &str, confidence: f32) -> String {
    format!("{} ({:.2}%)", label, confidence * 100.0)
}

/// Vertical anchor for a label above its box, clamped to the visible area.
fn label_anchor(box_y: f32, label_px: f32) -> f32 {
    (box_y - label_px).max(MIN_LABEL_TOP)
}

/// Composites an overlay surface onto a captured frame, for previews and
/// annotated exports.
pub fn composite(frame: &Frame, overlay: &RgbaImage) -> Result<RgbaImage> {
    let rgb = image::RgbImage::from_raw(frame.width(), frame.height(), frame.pixels().to_vec())
        .context("frame pixels do not match dimensions")?;
    let mut base = image::DynamicImage::ImageRgb8(rgb).into_rgba8();
    imageops::overlay(&mut base, overlay, 0, 0);
    Ok(base)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn detector_416() -> DetectorSettings {
        DetectorSettings {
            input_width: 416,
            input_height: 416,
            box_origin: BoxOrigin::TopLeft,
        }
    }

    fn detection(x: f32, y: f32, w: f32, h: f32, confidence: f32) -> Detection {
        Detection {
            x,
            y,
            width: w,
            height: h,
            label: "recyclable".to_string(),
            confidence,
        }
    }

    fn assert_close(actual: f32, expected: f32) {
        assert!(
            (actual - expected).abs() < 0.1,
            "expected {} to be within 0.1 of {}",
            actual,
            expected
        );
    }

    #[test]
    fn full_extent_detection_fills_the_display() {
        let renderer = OverlayRenderer::new(detector_416(), 0.5);
        let display = DisplayFrame::new(640, 480);
        let projected = renderer.project(&detection(0.0, 0.0, 416.0, 416.0, 0.9), display);

        assert_eq!(projected.x, 0.0);
        assert_eq!(projected.y, 0.0);
        assert_eq!(projected.width, 640.0);
        assert_eq!(projected.height, 480.0);
    }

    #[test]
    fn projection_scales_linearly() {
        // 640/416 = 1.538..., 480/416 = 1.154...
        let renderer = OverlayRenderer::new(detector_416(), 0.5);
        let display = DisplayFrame::new(640, 480);
        let projected = renderer.project(&detection(100.0, 50.0, 50.0, 50.0, 0.92), display);

        assert_close(projected.x, 153.8);
        assert_close(projected.y, 57.7);
        assert_close(projected.width, 76.9);
        assert_close(projected.height, 57.7);
    }

    #[test]
    fn center_origin_shifts_to_top_left_before_scaling() {
        let detector = DetectorSettings {
            box_origin: BoxOrigin::Center,
            ..detector_416()
        };
        let renderer = OverlayRenderer::new(detector, 0.5);
        let display = DisplayFrame::new(416, 416);
        let projected = renderer.project(&detection(208.0, 208.0, 100.0, 50.0, 0.9), display);

        assert_eq!(projected.x, 158.0);
        assert_eq!(projected.y, 183.0);
        assert_eq!(projected.width, 100.0);
        assert_eq!(projected.height, 50.0);
    }

    #[test]
    fn low_confidence_detections_are_not_drawn() {
        let renderer = OverlayRenderer::new(detector_416(), 0.5);
        let display = DisplayFrame::new(320, 240);
        let batch = DetectionBatch::new(vec![detection(50.0, 50.0, 100.0, 100.0, 0.49)]);

        let surface = renderer.render(&batch, display);
        assert!(surface.pixels().all(|p| p.0[3] == 0), "surface must stay clear");
    }

    #[test]
    fn at_threshold_detections_are_drawn() {
        let renderer = OverlayRenderer::new(detector_416(), 0.5);
        let display = DisplayFrame::new(320, 240);
        let batch = DetectionBatch::new(vec![detection(50.0, 50.0, 100.0, 100.0, 0.5)]);

        let surface = renderer.render(&batch, display);
        assert!(surface.pixels().any(|p| p.0[3] != 0));
    }

    #[test]
    fn render_is_idempotent() {
        let renderer = OverlayRenderer::new(detector_416(), 0.5);
        let display = DisplayFrame::new(640, 480);
        let batch = DetectionBatch::new(vec![
            detection(0.0, 0.0, 416.0, 416.0, 0.9),
            detection(100.0, 50.0, 50.0, 50.0, 0.92),
        ]);

        let first = renderer.render(&batch, display);
        let second = renderer.render(&batch, display);
        assert_eq!(first.as_raw(), second.as_raw());
    }

    #[test]
    fn empty_batch_renders_a_clear_surface() {
        let renderer = OverlayRenderer::new(detector_416(), 0.5);
        let surface = renderer.render(&DetectionBatch::empty(), DisplayFrame::new(64, 64));
        assert!(surface.pixels().all(|p| p.0 == [0, 0, 0, 0]));
    }

    #[test]
    fn non_drawable_display_yields_empty_surface() {
        let renderer = OverlayRenderer::new(detector_416(), 0.5);
        let batch = DetectionBatch::new(vec![detection(0.0, 0.0, 416.0, 416.0, 0.9)]);
        let surface = renderer.render(&batch, DisplayFrame::new(0, 480));
        assert_eq!(surface.dimensions(), (0, 480));
    }

    #[test]
    fn full_extent_box_touches_the_corners() {
        let renderer = OverlayRenderer::new(detector_416(), 0.5);
        let display = DisplayFrame::new(64, 64);
        let batch = DetectionBatch::new(vec![detection(0.0, 0.0, 416.0, 416.0, 0.9)]);

        let surface = renderer.render(&batch, display);
        assert_eq!(surface.get_pixel(0, 0), &BOX_COLOR);
        assert_eq!(surface.get_pixel(63, 63), &BOX_COLOR);
        assert_eq!(surface.get_pixel(32, 32).0[3], 0, "interior stays clear");
    }

    #[test]
    fn label_formats_confidence_as_percentage() {
        assert_eq!(format_label("recyclable", 0.92), "recyclable (92.00%)");
        assert_eq!(format_label("compost", 1.0), "compost (100.00%)");
        assert_eq!(format_label("garbage", 0.505), "garbage (50.50%)");
    }

    #[test]
    fn label_anchor_clamps_near_the_top_edge() {
        assert_eq!(label_anchor(5.0, LABEL_PX), MIN_LABEL_TOP);
        assert_eq!(label_anchor(0.0, LABEL_PX), MIN_LABEL_TOP);
        assert_eq!(label_anchor(100.0, LABEL_PX), 100.0 - LABEL_PX);
    }
}
