//! Skeleton renderer for pose conditioning images.
//!
//! Draws every skeleton of a [`PoseData`] onto a solid canvas: colored
//! connection segments first, then white joint markers, both anti-aliased.
//! Output depends only on the pose and the [`CanvasConfig`].

use std::io::Cursor;

use image::{ImageFormat, Rgb, RgbImage};
use tiny_skia::{FillRule, LineCap, Paint, PathBuilder, Pixmap, Rect, Stroke, Transform};

use crate::canvas::CanvasConfig;
use crate::coords::to_pixel;
use crate::error::CoreError;
use crate::pose::{PoseData, Skeleton};
use crate::skeleton::{
    keypoint_index, CONNECTIONS, CONNECTION_COLORS, JOINT_COLOR, KEYPOINT_COUNT,
};

/// A rendered conditioning image (RGB, 8 bits per channel).
#[derive(Debug, Clone, PartialEq)]
pub struct ConditioningImage {
    image: RgbImage,
}

impl ConditioningImage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        self.image.get_pixel(x, y).0
    }

    pub fn as_image(&self) -> &RgbImage {
        &self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }

    /// Encode as PNG, ready for upload to the engine.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>, CoreError> {
        let mut buf = Cursor::new(Vec::new());
        self.image
            .write_to(&mut buf, ImageFormat::Png)
            .map_err(|e| CoreError::Image(e.to_string()))?;
        Ok(buf.into_inner())
    }
}

/// Position and confidence of one canonical joint.
#[derive(Debug, Clone, Copy)]
struct JointSample {
    x: f32,
    y: f32,
    confidence: f32,
}

/// Render `pose` onto a fresh canvas described by `config`.
///
/// Fails only when `config` is invalid; pose input is sanitized instead of
/// rejected (coordinates clamp, unknown labels and weak joints are skipped).
pub fn render(pose: &PoseData, config: &CanvasConfig) -> Result<ConditioningImage, CoreError> {
    config.validate()?;

    let mut pixmap = Pixmap::new(config.width, config.height).ok_or_else(|| {
        CoreError::Configuration(format!(
            "cannot allocate a {}x{} canvas",
            config.width, config.height
        ))
    })?;
    let [r, g, b] = config.background_color;
    pixmap.fill(tiny_skia::Color::from_rgba8(r, g, b, 255));

    for skeleton in &pose.skeletons {
        draw_skeleton(&mut pixmap, skeleton, config);
    }

    tracing::debug!(
        skeletons = pose.skeletons.len(),
        width = config.width,
        height = config.height,
        "Rendered pose conditioning image",
    );

    Ok(ConditioningImage {
        image: to_rgb_image(&pixmap),
    })
}

/// Index a skeleton's joints by canonical position. Unknown labels are
/// dropped; a repeated label keeps its last occurrence.
fn index_joints(skeleton: &Skeleton) -> [Option<JointSample>; KEYPOINT_COUNT] {
    let mut samples = [None; KEYPOINT_COUNT];
    for joint in &skeleton.joints {
        if let Some(idx) = keypoint_index(&joint.label) {
            samples[idx] = Some(JointSample {
                x: joint.x,
                y: joint.y,
                confidence: joint.confidence,
            });
        }
    }
    samples
}

fn draw_skeleton(pixmap: &mut Pixmap, skeleton: &Skeleton, config: &CanvasConfig) {
    let samples = index_joints(skeleton);
    let visible = |sample: Option<JointSample>| -> Option<JointSample> {
        sample.filter(|s| s.confidence >= config.conf_threshold)
    };

    let stroke = Stroke {
        width: config.line_thickness as f32,
        line_cap: LineCap::Round,
        ..Stroke::default()
    };

    for (conn_idx, &(a, b)) in CONNECTIONS.iter().enumerate() {
        let (Some(start), Some(end)) = (visible(samples[a]), visible(samples[b])) else {
            continue;
        };
        let (x0, y0) = pixel_center(start, config);
        let (x1, y1) = pixel_center(end, config);

        let mut builder = PathBuilder::new();
        builder.move_to(x0, y0);
        builder.line_to(x1, y1);
        let Some(path) = builder.finish() else {
            continue;
        };
        let paint = solid_paint(CONNECTION_COLORS[conn_idx]);
        pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
    }

    let mut joint_paint = solid_paint(JOINT_COLOR);
    // A zero radius marks exactly the joint's own pixel.
    joint_paint.anti_alias = config.joint_radius > 0;
    for sample in samples.into_iter().filter_map(visible) {
        let (cx, cy) = pixel_center(sample, config);
        if let Some(marker) = joint_marker(cx, cy, config.joint_radius) {
            pixmap.fill_path(
                &marker,
                &joint_paint,
                FillRule::Winding,
                Transform::identity(),
                None,
            );
        }
    }
}

fn joint_marker(cx: f32, cy: f32, radius: u32) -> Option<tiny_skia::Path> {
    if radius == 0 {
        Rect::from_xywh(cx - 0.5, cy - 0.5, 1.0, 1.0).map(PathBuilder::from_rect)
    } else {
        PathBuilder::from_circle(cx, cy, radius as f32)
    }
}

/// Canvas-space center of the pixel a joint maps to.
fn pixel_center(sample: JointSample, config: &CanvasConfig) -> (f32, f32) {
    let (px, py) = to_pixel(sample.x, sample.y, config.width, config.height);
    (px as f32 + 0.5, py as f32 + 0.5)
}

fn solid_paint([r, g, b]: [u8; 3]) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(r, g, b, 255);
    paint.anti_alias = true;
    paint
}

/// Drop the alpha channel. Everything drawn is opaque over an opaque
/// background, so demultiplying is exact.
fn to_rgb_image(pixmap: &Pixmap) -> RgbImage {
    let mut image = RgbImage::new(pixmap.width(), pixmap.height());
    for (dst, src) in image.pixels_mut().zip(pixmap.pixels()) {
        let color = src.demultiply();
        *dst = Rgb([color.red(), color.green(), color.blue()]);
    }
    image
}
