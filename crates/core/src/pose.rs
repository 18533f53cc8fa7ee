//! Pose data model.
//!
//! Coordinates are normalized to `[0, 1]` relative to the source frame.
//! Values outside that range are accepted here and clamped at render time.

use serde::{Deserialize, Serialize};

use crate::skeleton::KEYPOINT_NAMES;

/// A single detected joint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Joint {
    pub x: f32,
    pub y: f32,
    pub confidence: f32,
    /// Canonical joint name, e.g. `"left_wrist"`. Unknown labels are ignored
    /// by the renderer.
    pub label: String,
}

impl Joint {
    pub fn new(label: impl Into<String>, x: f32, y: f32, confidence: f32) -> Self {
        Self {
            x,
            y,
            confidence,
            label: label.into(),
        }
    }
}

/// Axis-aligned box in normalized coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

/// One detected person.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skeleton {
    pub joints: Vec<Joint>,
    pub confidence: f32,
    pub bounding_box: BoundingBox,
}

/// All skeletons detected in one frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoseData {
    #[serde(default)]
    pub skeletons: Vec<Skeleton>,
}

/// Padding added around the reference pose's joints for its bounding box.
const REFERENCE_BOX_PADDING: f32 = 0.02;

impl PoseData {
    pub fn new(skeletons: Vec<Skeleton>) -> Self {
        Self { skeletons }
    }

    pub fn is_empty(&self) -> bool {
        self.skeletons.is_empty()
    }

    /// A single upright person facing the camera, every canonical joint at
    /// full confidence. Handy for eyeballing the renderer and as a default
    /// conditioning pose.
    pub fn reference() -> Self {
        let cx = 0.5;
        let nose_y = 0.18;
        let shoulder_y = 0.30;
        let elbow_y = 0.42;
        let wrist_y = 0.55;
        let hip_y = 0.45;
        let knee_y = 0.65;
        let ankle_y = 0.85;

        let position = |name: &str| -> (f32, f32) {
            match name {
                "nose" => (cx, nose_y),
                "left_eye" => (cx - 0.02, nose_y + 0.01),
                "right_eye" => (cx + 0.02, nose_y + 0.01),
                "left_ear" => (cx - 0.06, nose_y + 0.02),
                "right_ear" => (cx + 0.06, nose_y + 0.02),
                "left_shoulder" => (cx - 0.12, shoulder_y),
                "right_shoulder" => (cx + 0.12, shoulder_y),
                "left_elbow" => (cx - 0.18, elbow_y),
                "right_elbow" => (cx + 0.18, elbow_y),
                "left_wrist" => (cx - 0.22, wrist_y),
                "right_wrist" => (cx + 0.22, wrist_y),
                "left_hip" => (cx - 0.09, hip_y),
                "right_hip" => (cx + 0.09, hip_y),
                "left_knee" => (cx - 0.08, knee_y),
                "right_knee" => (cx + 0.08, knee_y),
                "left_ankle" => (cx - 0.07, ankle_y),
                "right_ankle" => (cx + 0.07, ankle_y),
                _ => (cx, shoulder_y),
            }
        };

        let joints: Vec<Joint> = KEYPOINT_NAMES
            .iter()
            .map(|name| {
                let (x, y) = position(name);
                Joint::new(*name, x.clamp(0.0, 1.0), y.clamp(0.0, 1.0), 1.0)
            })
            .collect();

        let bounding_box = bounding_box_of(&joints, REFERENCE_BOX_PADDING);

        Self::new(vec![Skeleton {
            joints,
            confidence: 0.95,
            bounding_box,
        }])
    }
}

/// Smallest box containing every joint, grown by `padding` and clamped to
/// the unit square.
fn bounding_box_of(joints: &[Joint], padding: f32) -> BoundingBox {
    let (mut x_min, mut y_min) = (f32::MAX, f32::MAX);
    let (mut x_max, mut y_max) = (f32::MIN, f32::MIN);
    for joint in joints {
        x_min = x_min.min(joint.x);
        y_min = y_min.min(joint.y);
        x_max = x_max.max(joint.x);
        y_max = y_max.max(joint.y);
    }
    BoundingBox {
        x_min: (x_min - padding).max(0.0),
        y_min: (y_min - padding).max(0.0),
        x_max: (x_max + padding).min(1.0),
        y_max: (y_max + padding).min(1.0),
    }
}
