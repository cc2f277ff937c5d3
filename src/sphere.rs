// sphere.rs - direction vectors <-> equirectangular pixel coordinates
//
// Three axis conventions meet here, all describing the same sphere:
// - z-up (cube faces): longitude = atan2(y, x), latitude = atan2(z, hypot(x, y))
// - y-up lon/lat (rotation baking): longitude = atan2(z, x), co-latitude = acos(y)
// - y-up view (perspective cameras): longitude = atan2(x, z), latitude = asin(y)
//
// Every `*_to_pixel` function returns fractional (u, v) in source pixel units,
// unwrapped and unclamped: u in [0, W], v in [0, H]. Boundary handling is the
// resampler's job.

use glam::DVec3;
use std::f64::consts::{FRAC_PI_2, PI, TAU};

/// Map a z-up direction to source pixel coordinates.
///
/// `u` is scaled by the height, which is only correct for `width == 2 * height`;
/// other sizes are not rejected here and simply come out distorted. The
/// direction does not need to be normalised but must be non-zero; a zero
/// vector maps to the image centre.
#[inline]
pub fn direction_to_pixel(dir: DVec3, _width: u32, height: u32) -> (f64, f64) {
    let h = height as f64;
    let theta = dir.y.atan2(dir.x);
    let r = (dir.x * dir.x + dir.y * dir.y).sqrt();
    let phi = dir.z.atan2(r);
    ((theta + PI) / PI * h, (FRAC_PI_2 - phi) / PI * h)
}

/// Unit y-up direction of destination pixel `(u, v)` in lon/lat form.
#[inline]
pub fn pixel_to_direction(u: f64, v: f64, width: u32, height: u32) -> DVec3 {
    let lon = u / width as f64 * TAU - PI;
    let colat = v / height as f64 * PI;
    let (sin_c, cos_c) = colat.sin_cos();
    let (sin_l, cos_l) = lon.sin_cos();
    DVec3::new(sin_c * cos_l, cos_c, sin_c * sin_l)
}

/// Inverse of [`pixel_to_direction`]. Expects a unit vector; the `acos`
/// argument is clamped so rounding drift never produces NaN.
#[inline]
pub fn lonlat_direction_to_pixel(dir: DVec3, width: u32, height: u32) -> (f64, f64) {
    let colat = dir.y.clamp(-1.0, 1.0).acos();
    let lon = dir.z.atan2(dir.x);
    (
        (lon + PI) / TAU * width as f64,
        colat / PI * height as f64,
    )
}

/// Map a unit camera-space (y-up, z-forward) direction to source pixels.
#[inline]
pub fn view_direction_to_pixel(dir: DVec3, width: u32, height: u32) -> (f64, f64) {
    let theta = dir.x.atan2(dir.z);
    let phi = dir.y.clamp(-1.0, 1.0).asin();
    (
        (theta + PI) / TAU * width as f64,
        (FRAC_PI_2 - phi) / PI * height as f64,
    )
}

/// Re-express a y-up lon/lat direction in the z-up convention.
#[inline]
pub fn lonlat_to_zup(dir: DVec3) -> DVec3 {
    DVec3::new(dir.x, dir.z, dir.y)
}

/// Re-express a y-up lon/lat direction in the camera (view) convention.
#[inline]
pub fn lonlat_to_view(dir: DVec3) -> DVec3 {
    DVec3::new(dir.z, dir.y, dir.x)
}

/// Face-local coordinate of pixel index `i` along an edge of `edge` pixels,
/// scaled by `tan(fov / 2)`: 0 at `edge / 2`, `-tan(fov / 2)` at index 0.
#[inline]
pub fn face_coordinate(i: u32, edge: u32, fov_deg: f64) -> f64 {
    let scale = (fov_deg.to_radians() / 2.0).tan();
    (2.0 * i as f64 / edge as f64 - 1.0) * scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn forward_axis_hits_image_centre() {
        let (u, v) = direction_to_pixel(DVec3::X, 1024, 512);
        assert_abs_diff_eq!(u, 512.0, epsilon = 1e-9);
        assert_abs_diff_eq!(v, 256.0, epsilon = 1e-9);
    }

    #[test]
    fn zup_poles_and_seam() {
        let (_, v) = direction_to_pixel(DVec3::Z, 1024, 512);
        assert_abs_diff_eq!(v, 0.0, epsilon = 1e-9);
        let (_, v) = direction_to_pixel(-DVec3::Z, 1024, 512);
        assert_abs_diff_eq!(v, 512.0, epsilon = 1e-9);
        // +y is longitude +90°, three quarters across
        let (u, _) = direction_to_pixel(DVec3::Y, 1024, 512);
        assert_abs_diff_eq!(u, 768.0, epsilon = 1e-9);
        // magnitude does not matter
        let (u1, v1) = direction_to_pixel(DVec3::new(0.3, -0.2, 0.5), 1024, 512);
        let (u2, v2) = direction_to_pixel(DVec3::new(3.0, -2.0, 5.0), 1024, 512);
        assert_abs_diff_eq!(u1, u2, epsilon = 1e-9);
        assert_abs_diff_eq!(v1, v2, epsilon = 1e-9);
    }

    #[test]
    fn zero_direction_is_finite() {
        let (u, v) = direction_to_pixel(DVec3::ZERO, 64, 32);
        assert!(u.is_finite() && v.is_finite());
    }

    #[test]
    fn non_equirect_sizes_distort_without_panicking() {
        let (u, v) = direction_to_pixel(DVec3::X, 300, 200);
        assert_abs_diff_eq!(u, 200.0, epsilon = 1e-9);
        assert_abs_diff_eq!(v, 100.0, epsilon = 1e-9);
    }

    #[test]
    fn lonlat_round_trip() {
        let (w, h) = (360, 180);
        for v in (1..h).step_by(7) {
            for u in (0..w).step_by(11) {
                let d = pixel_to_direction(u as f64, v as f64, w, h);
                assert_abs_diff_eq!(d.length(), 1.0, epsilon = 1e-12);
                let (u2, v2) = lonlat_direction_to_pixel(d, w, h);
                assert_abs_diff_eq!(u2.rem_euclid(w as f64), u as f64, epsilon = 1e-9);
                assert_abs_diff_eq!(v2, v as f64, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn conventions_agree_on_the_same_point() {
        let (w, h) = (400, 200);
        for v in (3..h).step_by(13) {
            for u in (5..w).step_by(17) {
                let d = pixel_to_direction(u as f64 + 0.25, v as f64 + 0.5, w, h);

                let (zu, zv) = direction_to_pixel(lonlat_to_zup(d), w, h);
                assert_abs_diff_eq!(zu, u as f64 + 0.25, epsilon = 1e-9);
                assert_abs_diff_eq!(zv, v as f64 + 0.5, epsilon = 1e-9);

                let (vu, vv) = view_direction_to_pixel(lonlat_to_view(d), w, h);
                assert_abs_diff_eq!(vu, u as f64 + 0.25, epsilon = 1e-9);
                assert_abs_diff_eq!(vv, v as f64 + 0.5, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn view_direction_clamps_overshoot() {
        let (_, v) = view_direction_to_pixel(DVec3::new(0.0, 1.0 + 1e-12, 0.0), 64, 32);
        assert_abs_diff_eq!(v, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn face_coordinates_span_fov() {
        assert_abs_diff_eq!(face_coordinate(0, 64, 90.0), -1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(face_coordinate(32, 64, 90.0), 0.0, epsilon = 1e-12);
        let wide = face_coordinate(0, 64, 120.0);
        assert_abs_diff_eq!(wide, -(60f64.to_radians().tan()), epsilon = 1e-12);
    }
}
