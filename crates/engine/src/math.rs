//! Projection matrices and small vector helpers on top of `cgmath`.

use cgmath::{Matrix3, Rad, Vector3};

pub type Vec3 = Vector3<f64>;

/// Isometric-style view: 45° yaw followed by a 30° downward tilt.
pub fn dimetric_projection() -> Matrix3<f64> {
    let alpha = std::f64::consts::PI / 6.0;
    let beta = std::f64::consts::PI / 4.0;
    Matrix3::from_angle_x(Rad(-alpha)) * Matrix3::from_angle_y(Rad(-beta))
}

/// Straight-down view, scaled so one node spans the same pixel width as in
/// the dimetric view.
pub fn top_down_projection() -> Matrix3<f64> {
    let alpha = std::f64::consts::FRAC_PI_2;
    Matrix3::from_scale(std::f64::consts::SQRT_2) * Matrix3::from_angle_x(Rad(-alpha))
}

pub fn rotate_xz(v: Vec3, angle: f64) -> Vec3 {
    let (sin, cos) = angle.sin_cos();
    Vec3::new(v.x * cos - v.z * sin, v.y, v.x * sin + v.z * cos)
}

pub fn rotate_yz(v: Vec3, angle: f64) -> Vec3 {
    let (sin, cos) = angle.sin_cos();
    Vec3::new(v.x, v.y * cos - v.z * sin, v.y * sin + v.z * cos)
}

pub fn rotate_xy(v: Vec3, angle: f64) -> Vec3 {
    let (sin, cos) = angle.sin_cos();
    Vec3::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos, v.z)
}

pub fn max_component(v: Vec3) -> f64 {
    v.x.max(v.y).max(v.z)
}
