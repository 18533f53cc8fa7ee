//! Normalized-to-pixel coordinate mapping.

/// Map a normalized `(x, y)` pair onto a `width` x `height` canvas.
///
/// Inputs are clamped to `[0, 1]` first, then scaled by `width - 1` /
/// `height - 1` and truncated, so the result always lies inside the canvas.
/// NaN maps to 0.
pub fn to_pixel(x_norm: f32, y_norm: f32, width: u32, height: u32) -> (u32, u32) {
    (scale_axis(x_norm, width), scale_axis(y_norm, height))
}

fn scale_axis(value: f32, extent: u32) -> u32 {
    let max = extent.saturating_sub(1);
    let clamped = if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    };
    // `as` saturates, and the clamp keeps the product within [0, max].
    ((clamped as f64 * max as f64) as u32).min(max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corners_map_to_canvas_edges() {
        assert_eq!(to_pixel(0.0, 0.0, 640, 480), (0, 0));
        assert_eq!(to_pixel(1.0, 1.0, 640, 480), (639, 479));
    }

    #[test]
    fn truncates_toward_zero() {
        // 0.5 * 99 = 49.5
        assert_eq!(to_pixel(0.5, 0.5, 100, 100), (49, 49));
    }

    #[test]
    fn out_of_range_input_clamps_to_boundary() {
        assert_eq!(to_pixel(-0.5, 1.5, 512, 256), (0, 255));
        assert_eq!(to_pixel(1.5, -0.5, 512, 256), (511, 0));
    }

    #[test]
    fn nan_maps_to_origin() {
        assert_eq!(to_pixel(f32::NAN, f32::NAN, 10, 10), (0, 0));
    }

    #[test]
    fn output_always_inside_canvas() {
        let samples = [-3.0, -0.01, 0.0, 0.1, 0.333, 0.5, 0.999, 1.0, 1.01, 7.5];
        for &(w, h) in &[(1, 1), (2, 3), (512, 512), (1920, 1080)] {
            for &x in &samples {
                for &y in &samples {
                    let (px, py) = to_pixel(x, y, w, h);
                    assert!(px < w, "px {px} outside width {w}");
                    assert!(py < h, "py {py} outside height {h}");
                }
            }
        }
    }
}
