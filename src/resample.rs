// resample.rs - bilinear sampling of a panorama at fractional coordinates

use crate::panorama::Panorama;
use crate::parallel::Workers;
use serde::{Deserialize, Serialize};

/// What happens to sample coordinates that fall outside the source grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryPolicy {
    /// Columns wrap modulo the width (the ±180° seam is continuous), rows
    /// clamp to `[0, H - 1]`. Used for perspective views and rotation baking.
    WrapUClampV,
    /// Both axes clamp to the last valid index. Used for axis-aligned cube
    /// faces, which never straddle the seam.
    ClampBoth,
}

/// Channel layout written for every destination pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// First three source channels.
    Rgb,
    /// First three source channels plus alpha fixed at 255.
    OpaqueRgba,
    /// Same channels as the source, alpha interpolated when present.
    Source,
}

impl Layout {
    pub fn channels(self, src: &Panorama) -> usize {
        match self {
            Layout::Rgb => 3,
            Layout::OpaqueRgba => 4,
            Layout::Source => src.channels(),
        }
    }
}

/// Per-destination-pixel source coordinates, row-major.
#[derive(Debug, Clone)]
pub struct CoordMap {
    width: u32,
    height: u32,
    coords: Vec<[f64; 2]>,
}

impl CoordMap {
    /// Evaluate `f(x, y) -> (u, v)` for every destination pixel.
    pub fn build<F>(width: u32, height: u32, workers: &Workers, f: F) -> Self
    where
        F: Fn(u32, u32) -> (f64, f64) + Sync,
    {
        let mut coords = vec![[0.0f64; 2]; width as usize * height as usize];
        workers.fill_rows(&mut coords, width as usize, |y, row| {
            for (x, c) in row.iter_mut().enumerate() {
                let (u, v) = f(x as u32, y as u32);
                *c = [u, v];
            }
        });
        Self {
            width,
            height,
            coords,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> (f64, f64) {
        let [u, v] = self.coords[y as usize * self.width as usize + x as usize];
        (u, v)
    }
}

/// Bilinear sample at `(u, v)`. Only the first `src.channels()` entries of
/// the result are meaningful; values are unquantised.
#[inline]
pub fn sample(src: &Panorama, u: f64, v: f64, policy: BoundaryPolicy) -> [f64; 4] {
    let w = src.width() as i64;
    let h = src.height() as i64;
    let (max_u, max_v) = ((w - 1) as f64, (h - 1) as f64);

    let (u, v) = match policy {
        BoundaryPolicy::WrapUClampV => (u.rem_euclid(w as f64), v.clamp(0.0, max_v)),
        BoundaryPolicy::ClampBoth => (u.clamp(0.0, max_u), v.clamp(0.0, max_v)),
    };

    let (u_floor, v_floor) = (u.floor(), v.floor());
    let (fu, fv) = (u - u_floor, v - v_floor);

    let (x0, x1) = match policy {
        BoundaryPolicy::WrapUClampV => {
            // rem_euclid can round up to exactly w
            let x0 = (u_floor as i64).rem_euclid(w);
            (x0, (x0 + 1) % w)
        }
        BoundaryPolicy::ClampBoth => {
            let x0 = (u_floor as i64).min(w - 1);
            (x0, (x0 + 1).min(w - 1))
        }
    };
    let y0 = (v_floor as i64).min(h - 1);
    let y1 = (y0 + 1).min(h - 1);

    let a = src.pixel(x0 as u32, y0 as u32);
    let b = src.pixel(x1 as u32, y0 as u32);
    let c = src.pixel(x0 as u32, y1 as u32);
    let d = src.pixel(x1 as u32, y1 as u32);

    let mut out = [0.0f64; 4];
    for ch in 0..src.channels() {
        let (a, b, c, d) = (a[ch] as f64, b[ch] as f64, c[ch] as f64, d[ch] as f64);
        let top = a + (b - a) * fu;
        let bottom = c + (d - c) * fu;
        out[ch] = top + (bottom - top) * fv;
    }
    out
}

/// Round a blended value back into the 8-bit range.
#[inline]
pub fn quantize(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

#[inline]
pub(crate) fn write_pixel(layout: Layout, src_channels: usize, s: &[f64; 4], dst: &mut [u8]) {
    match layout {
        Layout::Rgb => {
            for ch in 0..3 {
                dst[ch] = quantize(s[ch]);
            }
        }
        Layout::OpaqueRgba => {
            for ch in 0..3 {
                dst[ch] = quantize(s[ch]);
            }
            dst[3] = u8::MAX;
        }
        Layout::Source => {
            for ch in 0..src_channels {
                dst[ch] = quantize(s[ch]);
            }
        }
    }
}

/// Resample `src` through a coordinate map into a fresh row-major buffer of
/// `map.width() x map.height()` pixels with `layout.channels(src)` channels.
pub fn remap(
    src: &Panorama,
    map: &CoordMap,
    policy: BoundaryPolicy,
    layout: Layout,
    workers: &Workers,
) -> Vec<u8> {
    let out_channels = layout.channels(src);
    let row_len = map.width() as usize * out_channels;
    let mut out = vec![0u8; row_len * map.height() as usize];
    workers.fill_rows(&mut out, row_len, |y, row| {
        for (x, dst) in row.chunks_exact_mut(out_channels).enumerate() {
            let (u, v) = map.get(x as u32, y as u32);
            let s = sample(src, u, v, policy);
            write_pixel(layout, src.channels(), &s, dst);
        }
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    // 8x4 RGB panorama whose red channel is 10 * column and green 50 * row
    fn ramp() -> Panorama {
        let mut data = Vec::new();
        for y in 0..4u8 {
            for x in 0..8u8 {
                data.extend_from_slice(&[x * 10, y * 50, 7]);
            }
        }
        Panorama::new(8, 4, 3, data).unwrap()
    }

    #[test]
    fn integer_coordinates_hit_pixels() {
        let p = ramp();
        let s = sample(&p, 3.0, 2.0, BoundaryPolicy::ClampBoth);
        assert_eq!(&s[..3], &[30.0, 100.0, 7.0]);
    }

    #[test]
    fn bilinear_blend() {
        let p = ramp();
        let s = sample(&p, 2.25, 1.5, BoundaryPolicy::WrapUClampV);
        assert_abs_diff_eq!(s[0], 22.5, epsilon = 1e-12);
        assert_abs_diff_eq!(s[1], 75.0, epsilon = 1e-12);
    }

    #[test]
    fn wrap_blends_last_and_first_column() {
        let p = ramp();
        // halfway between column 7 (70) and column 0 (0)
        let s = sample(&p, 7.5, 0.0, BoundaryPolicy::WrapUClampV);
        assert_abs_diff_eq!(s[0], 35.0, epsilon = 1e-12);
        // u == W is column 0 again
        let s = sample(&p, 8.0, 0.0, BoundaryPolicy::WrapUClampV);
        assert_abs_diff_eq!(s[0], 0.0, epsilon = 1e-12);
        let s = sample(&p, -0.5, 0.0, BoundaryPolicy::WrapUClampV);
        assert_abs_diff_eq!(s[0], 35.0, epsilon = 1e-12);
    }

    #[test]
    fn clamp_holds_the_edge() {
        let p = ramp();
        let s = sample(&p, 7.5, 9.0, BoundaryPolicy::ClampBoth);
        assert_abs_diff_eq!(s[0], 70.0, epsilon = 1e-12);
        assert_abs_diff_eq!(s[1], 150.0, epsilon = 1e-12);
        let s = sample(&p, 8.0, -3.0, BoundaryPolicy::ClampBoth);
        assert_abs_diff_eq!(s[0], 70.0, epsilon = 1e-12);
        assert_abs_diff_eq!(s[1], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn rows_clamp_under_wrap_policy() {
        let p = ramp();
        let s = sample(&p, 1.0, 3.75, BoundaryPolicy::WrapUClampV);
        assert_abs_diff_eq!(s[1], 150.0, epsilon = 1e-12);
    }

    #[test]
    fn quantize_rounds_and_clamps() {
        assert_eq!(quantize(-3.0), 0);
        assert_eq!(quantize(254.6), 255);
        assert_eq!(quantize(300.0), 255);
        assert_eq!(quantize(12.49), 12);
        assert_eq!(quantize(f64::NAN), 0);
    }

    #[test]
    fn remap_layouts() {
        let p = ramp();
        let map = CoordMap::build(2, 1, &Workers::single(), |x, _| (x as f64 * 4.0, 1.0));
        let rgb = remap(&p, &map, BoundaryPolicy::ClampBoth, Layout::Rgb, &Workers::single());
        assert_eq!(rgb, vec![0, 50, 7, 40, 50, 7]);
        let rgba = remap(
            &p,
            &map,
            BoundaryPolicy::ClampBoth,
            Layout::OpaqueRgba,
            &Workers::single(),
        );
        assert_eq!(rgba, vec![0, 50, 7, 255, 40, 50, 7, 255]);
    }

    #[test]
    fn remap_is_thread_count_independent() {
        let p = ramp();
        let map = CoordMap::build(13, 9, &Workers::new(3), |x, y| {
            (x as f64 * 0.77 - 1.3, y as f64 * 0.41)
        });
        let one = remap(&p, &map, BoundaryPolicy::WrapUClampV, Layout::Source, &Workers::single());
        let many = remap(&p, &map, BoundaryPolicy::WrapUClampV, Layout::Source, &Workers::new(4));
        assert_eq!(one, many);
    }
}
