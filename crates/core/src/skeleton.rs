//! Canonical COCO-17 skeleton tables.
//!
//! These tables are a versioned contract: the rendered conditioning image
//! depends on their exact contents and order, so any edit here changes
//! every output and must ship as a breaking change.

/// Number of canonical joints.
pub const KEYPOINT_COUNT: usize = 17;

/// Joint names in canonical index order.
pub const KEYPOINT_NAMES: [&str; KEYPOINT_COUNT] = [
    "nose",
    "left_eye",
    "right_eye",
    "left_ear",
    "right_ear",
    "left_shoulder",
    "right_shoulder",
    "left_elbow",
    "right_elbow",
    "left_wrist",
    "right_wrist",
    "left_hip",
    "right_hip",
    "left_knee",
    "right_knee",
    "left_ankle",
    "right_ankle",
];

/// Number of drawn connections.
pub const CONNECTION_COUNT: usize = 19;

/// Joint index pairs forming the skeleton, drawn in this order.
pub const CONNECTIONS: [(usize, usize); CONNECTION_COUNT] = [
    (15, 13), // left ankle to left knee
    (13, 11), // left knee to left hip
    (16, 14), // right ankle to right knee
    (14, 12), // right knee to right hip
    (11, 12), // left hip to right hip
    (5, 11),  // left shoulder to left hip
    (6, 12),  // right shoulder to right hip
    (5, 6),   // left shoulder to right shoulder
    (5, 7),   // left shoulder to left elbow
    (6, 8),   // right shoulder to right elbow
    (7, 9),   // left elbow to left wrist
    (8, 10),  // right elbow to right wrist
    (1, 2),   // left eye to right eye
    (0, 1),   // nose to left eye
    (0, 2),   // nose to right eye
    (1, 3),   // left eye to left ear
    (2, 4),   // right eye to right ear
    (3, 5),   // left ear to left shoulder
    (4, 6),   // right ear to right shoulder
];

/// RGB color of each connection; entry `i` colors `CONNECTIONS[i]`.
pub const CONNECTION_COLORS: [[u8; 3]; CONNECTION_COUNT] = [
    [0, 255, 255],
    [0, 255, 170],
    [0, 170, 255],
    [0, 85, 255],
    [0, 255, 85],
    [85, 255, 0],
    [0, 255, 0],
    [255, 0, 0],
    [255, 85, 0],
    [255, 170, 0],
    [255, 255, 0],
    [170, 255, 0],
    [170, 0, 255],
    [255, 0, 170],
    [255, 0, 255],
    [85, 0, 255],
    [0, 0, 255],
    [255, 0, 85],
    [0, 85, 255],
];

/// Fill color of joint markers.
pub const JOINT_COLOR: [u8; 3] = [255, 255, 255];

/// Canonical index of a joint label, or `None` for labels outside the table.
pub fn keypoint_index(label: &str) -> Option<usize> {
    KEYPOINT_NAMES.iter().position(|name| *name == label)
}
