//! Angle and distance primitives on the image plane.
//!
//! All functions take 2D points (normalized image coordinates, y pointing
//! down); z is ignored. A `None` result means the geometry was degenerate
//! (a zero-length vector), never "0 degrees".

/// ベクトル長がこれ未満なら退化とみなす
pub const DEGENERATE_EPSILON: f32 = 1e-6;

fn sub(a: [f32; 2], b: [f32; 2]) -> [f32; 2] {
    [a[0] - b[0], a[1] - b[1]]
}

fn norm(v: [f32; 2]) -> f32 {
    (v[0] * v[0] + v[1] * v[1]).sqrt()
}

/// 2点間の距離
pub fn distance(a: [f32; 2], b: [f32; 2]) -> f32 {
    norm(sub(a, b))
}

/// 2点の中点
pub fn midpoint(a: [f32; 2], b: [f32; 2]) -> [f32; 2] {
    [(a[0] + b[0]) / 2.0, (a[1] + b[1]) / 2.0]
}

/// Unsigned angle between two vectors in degrees, `[0, 180]`.
fn vector_angle(u: [f32; 2], v: [f32; 2]) -> Option<f32> {
    if norm(u) < DEGENERATE_EPSILON || norm(v) < DEGENERATE_EPSILON {
        return None;
    }
    let cross = u[0] * v[1] - u[1] * v[0];
    let dot = u[0] * v[0] + u[1] * v[1];
    Some(cross.abs().atan2(dot).to_degrees())
}

/// Angle at vertex `b` formed by `a-b-c`, in degrees.
pub fn angle(a: [f32; 2], b: [f32; 2], c: [f32; 2]) -> Option<f32> {
    vector_angle(sub(a, b), sub(c, b))
}

/// Deviation of the segment `top -> bottom` from pointing straight down, in degrees.
///
/// 0° for a hanging upper arm, 90° for a horizontal one.
pub fn vertical_angle(top: [f32; 2], bottom: [f32; 2]) -> Option<f32> {
    vector_angle(sub(bottom, top), [0.0, 1.0])
}

/// Signed trunk angle around a 180° upright baseline.
///
/// `< 180` leans toward +x of the profile camera (forward for a subject facing
/// right in the image), `> 180` leans the other way.
pub fn trunk_angle(shoulder_mid: [f32; 2], hip_mid: [f32; 2]) -> Option<f32> {
    let spine = sub(shoulder_mid, hip_mid);
    if norm(spine) < DEGENERATE_EPSILON {
        return None;
    }
    // 直立: spine ≈ (0, 負) → 0°
    let from_vertical = spine[0].atan2(-spine[1]).to_degrees();
    Some(180.0 - from_vertical)
}

/// Elbow distance from the shoulder center, in shoulder widths.
pub fn elbow_to_torso_distance(
    elbow: [f32; 2],
    left_shoulder: [f32; 2],
    right_shoulder: [f32; 2],
) -> Option<f32> {
    let width = distance(left_shoulder, right_shoulder);
    if width < DEGENERATE_EPSILON {
        return None;
    }
    let center = midpoint(left_shoulder, right_shoulder);
    Some(distance(elbow, center) / width)
}

/// Height of the wrist above the shoulder (positive when the wrist is higher).
pub fn wrist_height(wrist: [f32; 2], shoulder: [f32; 2]) -> f32 {
    shoulder[1] - wrist[1]
}
