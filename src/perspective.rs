// perspective.rs - rectilinear views cut out of an equirectangular panorama

use crate::error::{ProjectionError, Result};
use crate::io;
use crate::panorama::{Panorama, ViewSpec};
use crate::parallel::Workers;
use crate::resample::{self, BoundaryPolicy, CoordMap, Layout};
use crate::sphere;
use glam::DVec3;
use image::RgbImage;
use std::f64::consts::{PI, TAU};
use std::path::{Path, PathBuf};

/// Pitch about X followed by yaw about Y, trig evaluated once per view.
#[derive(Debug, Clone, Copy)]
pub struct CameraRotation {
    cos_pitch: f64,
    sin_pitch: f64,
    cos_yaw: f64,
    sin_yaw: f64,
}

impl CameraRotation {
    pub fn new(yaw_deg: f64, pitch_deg: f64) -> Self {
        let (sin_pitch, cos_pitch) = pitch_deg.to_radians().sin_cos();
        let (sin_yaw, cos_yaw) = yaw_deg.to_radians().sin_cos();
        Self {
            cos_pitch,
            sin_pitch,
            cos_yaw,
            sin_yaw,
        }
    }

    #[inline]
    pub fn apply(&self, d: DVec3) -> DVec3 {
        let y = d.y * self.cos_pitch - d.z * self.sin_pitch;
        let z = d.y * self.sin_pitch + d.z * self.cos_pitch;
        DVec3::new(
            d.x * self.cos_yaw + z * self.sin_yaw,
            y,
            -d.x * self.sin_yaw + z * self.cos_yaw,
        )
    }
}

/// Pinhole camera: focal length from the horizontal fov, principal point at
/// the image centre.
#[derive(Debug, Clone, Copy)]
pub struct Pinhole {
    focal: f64,
    half_width: f64,
    half_height: f64,
}

impl Pinhole {
    pub fn new(view: &ViewSpec) -> Self {
        // focal = w / (2 * tan(fov / 2))
        let width = view.output_width as f64;
        Self {
            focal: width / (2.0 * (view.fov.to_radians() / 2.0).tan()),
            half_width: width / 2.0,
            half_height: view.output_height as f64 / 2.0,
        }
    }

    /// Normalised screen coordinates `(nx, ny)` of pixel `(x, y)`.
    #[inline]
    pub fn screen(&self, x: u32, y: u32) -> (f64, f64) {
        (
            (x as f64 - self.half_width) / self.focal,
            (y as f64 - self.half_height) / self.focal,
        )
    }
}

/// Unit camera-space ray for normalised screen coordinates: x to the right,
/// y up, z forward. Screen y grows downward, hence the sign flip.
#[inline]
pub fn camera_ray(nx: f64, ny: f64) -> DVec3 {
    DVec3::new(nx, -ny, 1.0).normalize()
}

/// World-space direction seen by pixel `(x, y)` of `view`.
pub fn ray_direction(view: &ViewSpec, x: u32, y: u32) -> DVec3 {
    let (nx, ny) = Pinhole::new(view).screen(x, y);
    CameraRotation::new(view.yaw, view.pitch).apply(camera_ray(nx, ny))
}

/// A rendered view together with the parameters that produced it.
#[derive(Debug, Clone)]
pub struct RenderedView {
    pub view: ViewSpec,
    pub image: RgbImage,
}

/// Renders rectilinear views. Holds no image state; the panorama is passed
/// to every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct PerspectiveRenderer {
    workers: Workers,
}

impl PerspectiveRenderer {
    pub fn new(workers: Workers) -> Self {
        Self { workers }
    }

    /// Source coordinates for every pixel of `view`.
    pub fn coord_map(&self, pano: &Panorama, view: &ViewSpec) -> Result<CoordMap> {
        view.validate()?;
        let pinhole = Pinhole::new(view);
        let rotation = CameraRotation::new(view.yaw, view.pitch);
        let (w, h) = (pano.width(), pano.height());

        // screen coordinates are separable, compute them once per column/row
        let nx: Vec<f64> = (0..view.output_width)
            .map(|x| pinhole.screen(x, 0).0)
            .collect();
        let ny: Vec<f64> = (0..view.output_height)
            .map(|y| pinhole.screen(0, y).1)
            .collect();

        Ok(CoordMap::build(
            view.output_width,
            view.output_height,
            &self.workers,
            |x, y| {
                let dir = rotation.apply(camera_ray(nx[x as usize], ny[y as usize]));
                sphere::view_direction_to_pixel(dir, w, h)
            },
        ))
    }

    /// Bulk path: build the whole coordinate map, then resample it in one pass.
    pub fn render(&self, pano: &Panorama, view: &ViewSpec) -> Result<RgbImage> {
        let map = self.coord_map(pano, view)?;
        let buf = resample::remap(
            pano,
            &map,
            BoundaryPolicy::WrapUClampV,
            Layout::Rgb,
            &self.workers,
        );
        RgbImage::from_raw(view.output_width, view.output_height, buf)
            .ok_or_else(|| ProjectionError::invalid("rendered buffer size mismatch"))
    }

    /// Per-pixel reference path, one ray and one bilinear lookup at a time.
    /// Slow; kept to cross-check [`render`](Self::render).
    pub fn render_scalar(&self, pano: &Panorama, view: &ViewSpec) -> Result<RgbImage> {
        view.validate()?;
        let (yaw, pitch) = (view.yaw.to_radians(), view.pitch.to_radians());
        let (out_w, out_h) = (view.output_width as f64, view.output_height as f64);
        let f = out_w / (2.0 * (view.fov.to_radians() / 2.0).tan());
        let (src_w, src_h) = (pano.width() as i64, pano.height() as i64);

        Ok(RgbImage::from_fn(view.output_width, view.output_height, |x, y| {
            let nx = (x as f64 - out_w / 2.0) / f;
            let ny = (y as f64 - out_h / 2.0) / f;
            let (mut dx, mut dy, mut dz) = (nx, -ny, 1.0);
            let len = (dx * dx + dy * dy + dz * dz).sqrt();
            dx /= len;
            dy /= len;
            dz /= len;

            // pitch (X axis)
            let dy2 = dy * pitch.cos() - dz * pitch.sin();
            let dz2 = dy * pitch.sin() + dz * pitch.cos();
            // yaw (Y axis)
            let dx3 = dx * yaw.cos() + dz2 * yaw.sin();
            let dz3 = -dx * yaw.sin() + dz2 * yaw.cos();

            let theta = dx3.atan2(dz3);
            let phi = dy2.clamp(-1.0, 1.0).asin();
            let src_x = (theta + PI) / TAU * src_w as f64;
            let src_y = (PI / 2.0 - phi) / PI * src_h as f64;

            let x0 = (src_x.trunc() as i64).rem_euclid(src_w);
            let x1 = (x0 + 1) % src_w;
            let y0 = (src_y.trunc() as i64).clamp(0, src_h - 1);
            let y1 = (y0 + 1).min(src_h - 1);
            let fx = src_x - src_x.trunc();
            let fy = src_y - src_y.trunc();

            let p00 = pano.pixel(x0 as u32, y0 as u32);
            let p10 = pano.pixel(x1 as u32, y0 as u32);
            let p01 = pano.pixel(x0 as u32, y1 as u32);
            let p11 = pano.pixel(x1 as u32, y1 as u32);

            let mut rgb = [0u8; 3];
            for (c, out) in rgb.iter_mut().enumerate() {
                let v0 = p00[c] as f64 * (1.0 - fx) + p10[c] as f64 * fx;
                let v1 = p01[c] as f64 * (1.0 - fx) + p11[c] as f64 * fx;
                *out = resample::quantize(v0 * (1.0 - fy) + v1 * fy);
            }
            image::Rgb(rgb)
        }))
    }

    /// Render `h_count * v_count` square views, row by row from the first
    /// pitch band down to the last.
    pub fn generate_grid(
        &self,
        pano: &Panorama,
        h_count: u32,
        v_count: u32,
        fov: f64,
        view_size: u32,
    ) -> Result<Vec<RenderedView>> {
        let views = grid_views(h_count, v_count, fov, view_size)?;
        self.render_all(pano, views)
    }

    /// Render `count` square views evenly spaced around the horizon.
    pub fn generate_equator_band(
        &self,
        pano: &Panorama,
        count: u32,
        fov: f64,
        view_size: u32,
    ) -> Result<Vec<RenderedView>> {
        let views = equator_views(count, fov, view_size)?;
        self.render_all(pano, views)
    }

    fn render_all(&self, pano: &Panorama, views: Vec<ViewSpec>) -> Result<Vec<RenderedView>> {
        let total = views.len();
        views
            .into_iter()
            .enumerate()
            .map(|(i, view)| {
                let image = self.render(pano, &view)?;
                log::debug!(
                    "rendered view {}/{total}: yaw={:.0}°, pitch={:.0}°",
                    i + 1,
                    view.yaw,
                    view.pitch
                );
                Ok(RenderedView { view, image })
            })
            .collect()
    }
}

/// Uniform yaw/pitch grid. Pitch bands split 180° into `v_count + 1` equal
/// steps and skip both ends, so the poles are never a view centre.
pub fn grid_views(h_count: u32, v_count: u32, fov: f64, view_size: u32) -> Result<Vec<ViewSpec>> {
    if h_count == 0 || v_count == 0 {
        return Err(ProjectionError::invalid(format!(
            "grid needs at least one view per axis, got {h_count}x{v_count}"
        )));
    }
    let yaw_step = 360.0 / h_count as f64;
    let pitch_step = 180.0 / (v_count as f64 + 1.0);

    let views: Vec<ViewSpec> = (0..v_count)
        .flat_map(|v| {
            let pitch = 90.0 - pitch_step * (v as f64 + 1.0);
            (0..h_count).map(move |h| ViewSpec::square(h as f64 * yaw_step, pitch, fov, view_size))
        })
        .collect();
    views.iter().try_for_each(ViewSpec::validate)?;
    Ok(views)
}

/// `count` views at pitch 0 starting from yaw 0.
pub fn equator_views(count: u32, fov: f64, view_size: u32) -> Result<Vec<ViewSpec>> {
    if count == 0 {
        return Err(ProjectionError::invalid("equator band needs at least one view"));
    }
    let yaw_step = 360.0 / count as f64;
    let views: Vec<ViewSpec> = (0..count)
        .map(|i| ViewSpec::square(i as f64 * yaw_step, 0.0, fov, view_size))
        .collect();
    views.iter().try_for_each(ViewSpec::validate)?;
    Ok(views)
}

/// `view_{n:03}_y{yaw:03}_p{pitch:+03}.png`, `n` counted from 1.
pub fn grid_file_name(n: usize, view: &ViewSpec) -> String {
    format!(
        "view_{n:03}_y{:03}_p{:+03}.png",
        view.yaw as i64, view.pitch as i64
    )
}

/// `equator_{n:02}_y{yaw:03}.png`, `n` counted from 1.
pub fn equator_file_name(n: usize, view: &ViewSpec) -> String {
    format!("equator_{n:02}_y{:03}.png", view.yaw as i64)
}

/// Write grid views into `dir` (created if missing).
pub fn save_grid(views: &[RenderedView], dir: &Path) -> Result<Vec<PathBuf>> {
    save_views(views, dir, grid_file_name)
}

/// Write equator views into `dir` (created if missing).
pub fn save_equator_band(views: &[RenderedView], dir: &Path) -> Result<Vec<PathBuf>> {
    save_views(views, dir, equator_file_name)
}

fn save_views(
    views: &[RenderedView],
    dir: &Path,
    name: fn(usize, &ViewSpec) -> String,
) -> Result<Vec<PathBuf>> {
    io::ensure_dir(dir)?;
    let total = views.len();
    let mut paths = Vec::with_capacity(total);
    for (i, rendered) in views.iter().enumerate() {
        let path = dir.join(name(i + 1, &rendered.view));
        io::write_image(&image::DynamicImage::ImageRgb8(rendered.image.clone()), &path)?;
        log::info!(
            "generated view {}/{total}: yaw={:.0}°, pitch={:.0}°",
            i + 1,
            rendered.view.yaw,
            rendered.view.pitch
        );
        paths.push(path);
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    // Smooth panorama: red follows longitude (continuous across the seam),
    // green follows latitude, blue is a fine checker.
    fn test_panorama(width: u32) -> Panorama {
        let height = width / 2;
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                let lon = x as f64 / width as f64 * TAU;
                data.push((127.5 + 127.5 * lon.cos()) as u8);
                data.push((y * 255 / (height - 1)) as u8);
                data.push(if (x / 4 + y / 4) % 2 == 0 { 40 } else { 210 });
            }
        }
        Panorama::new(width, height, 3, data).unwrap()
    }

    #[test]
    fn centre_ray_follows_yaw_and_pitch() {
        let view = ViewSpec::square(0.0, 0.0, 90.0, 64);
        let d = ray_direction(&view, 32, 32);
        assert_abs_diff_eq!(d.z, 1.0, epsilon = 1e-12);

        let view = ViewSpec::square(90.0, 0.0, 90.0, 64);
        let d = ray_direction(&view, 32, 32);
        assert_abs_diff_eq!(d.x, 1.0, epsilon = 1e-12);

        // positive pitch tilts toward the nadir
        let view = ViewSpec::square(0.0, 90.0, 90.0, 64);
        let d = ray_direction(&view, 32, 32);
        assert_abs_diff_eq!(d.y, -1.0, epsilon = 1e-12);
    }

    #[test]
    fn bulk_and_scalar_paths_agree() {
        let pano = test_panorama(256);
        let renderer = PerspectiveRenderer::new(Workers::new(3));
        for view in [
            ViewSpec::new(35.0, -20.0, 75.0, 48, 32),
            ViewSpec::new(-170.0, 60.0, 110.0, 40, 40),
            ViewSpec::new(179.0, 0.0, 90.0, 33, 21),
        ] {
            let bulk = renderer.render(&pano, &view).unwrap();
            let scalar = renderer.render_scalar(&pano, &view).unwrap();
            for (a, b) in bulk.as_raw().iter().zip(scalar.as_raw()) {
                assert!(
                    (*a as i16 - *b as i16).abs() <= 1,
                    "bulk {a} vs scalar {b} for {view:?}"
                );
            }
        }
    }

    #[test]
    fn seam_views_sample_both_edges() {
        let pano = test_panorama(256);
        let renderer = PerspectiveRenderer::new(Workers::single());
        let w = pano.width() as f64;

        let right = renderer
            .coord_map(&pano, &ViewSpec::square(179.0, 0.0, 20.0, 32))
            .unwrap();
        let left = renderer
            .coord_map(&pano, &ViewSpec::square(-179.0, 0.0, 20.0, 32))
            .unwrap();
        let (u_right, _) = right.get(16, 16);
        let (u_left, _) = left.get(16, 16);
        assert!(u_right > w - 2.0, "yaw 179 centre at u={u_right}");
        assert!(u_left < 2.0, "yaw -179 centre at u={u_left}");

        // along the centre row of a view straddling the seam, consecutive
        // source columns stay adjacent once taken modulo W
        let straddle = renderer
            .coord_map(&pano, &ViewSpec::square(180.0, 0.0, 20.0, 32))
            .unwrap();
        for x in 1..32 {
            let (a, _) = straddle.get(x - 1, 16);
            let (b, _) = straddle.get(x, 16);
            let step = (b - a).rem_euclid(w);
            assert!(step < 1.0, "column jump {a} -> {b}");
        }
    }

    #[test]
    fn seam_render_has_no_break() {
        let pano = test_panorama(256);
        let renderer = PerspectiveRenderer::new(Workers::single());
        let img = renderer
            .render(&pano, &ViewSpec::square(180.0, 0.0, 30.0, 64))
            .unwrap();
        for x in 1..64 {
            let a = img.get_pixel(x - 1, 32)[0] as i16;
            let b = img.get_pixel(x, 32)[0] as i16;
            assert!((a - b).abs() <= 3, "seam break at column {x}: {a} -> {b}");
        }
    }

    #[test]
    fn grid_covers_sphere_without_poles() {
        let views = grid_views(8, 4, 90.0, 512).unwrap();
        assert_eq!(views.len(), 32);
        for (i, v) in views.iter().enumerate() {
            assert!(v.pitch > -90.0 && v.pitch < 90.0);
            assert_abs_diff_eq!(v.yaw, (i % 8) as f64 * 45.0, epsilon = 1e-12);
        }
        let pitches: Vec<f64> = views.iter().step_by(8).map(|v| v.pitch).collect();
        assert_eq!(pitches, vec![54.0, 18.0, -18.0, -54.0]);
        assert!(grid_views(0, 4, 90.0, 512).is_err());
    }

    #[test]
    fn equator_band_is_level() {
        let views = equator_views(4, 90.0, 256).unwrap();
        let yaws: Vec<f64> = views.iter().map(|v| v.yaw).collect();
        assert_eq!(yaws, vec![0.0, 90.0, 180.0, 270.0]);
        assert!(views.iter().all(|v| v.pitch == 0.0));
        assert!(equator_views(0, 90.0, 256).is_err());
    }

    #[test]
    fn file_names_match_layout() {
        let v = ViewSpec::square(45.0, -54.0, 90.0, 8);
        assert_eq!(grid_file_name(3, &v), "view_003_y045_p-54.png");
        let v = ViewSpec::square(0.0, 18.0, 90.0, 8);
        assert_eq!(grid_file_name(12, &v), "view_012_y000_p+18.png");
        let v = ViewSpec::square(0.0, 0.0, 90.0, 8);
        assert_eq!(grid_file_name(1, &v), "view_001_y000_p+00.png");
        let v = ViewSpec::square(270.0, 0.0, 90.0, 8);
        assert_eq!(equator_file_name(4, &v), "equator_04_y270.png");
    }

    #[test]
    fn rejects_bad_views() {
        let pano = test_panorama(64);
        let renderer = PerspectiveRenderer::default();
        assert!(renderer
            .render(&pano, &ViewSpec::square(0.0, 0.0, 180.0, 8))
            .is_err());
        assert!(renderer
            .render_scalar(&pano, &ViewSpec::new(0.0, 0.0, 90.0, 8, 0))
            .is_err());
    }
}
