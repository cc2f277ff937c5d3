// cubemap.rs - six cube faces and the collage layouts built from them

use crate::error::{ProjectionError, Result};
use crate::io;
use crate::panorama::{validate_fov, Panorama};
use crate::parallel::Workers;
use crate::perspective::{camera_ray, CameraRotation};
use crate::resample::{self, BoundaryPolicy, CoordMap, Layout};
use crate::sphere;
use glam::DVec3;
use image::{DynamicImage, Rgb, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CubeFace {
    Back = 0,
    Left = 1,
    Front = 2,
    Right = 3,
    Top = 4,
    Bottom = 5,
}

impl CubeFace {
    pub const ALL: [CubeFace; 6] = [
        CubeFace::Back,
        CubeFace::Left,
        CubeFace::Front,
        CubeFace::Right,
        CubeFace::Top,
        CubeFace::Bottom,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Result<Self> {
        Self::ALL.get(index).copied().ok_or_else(|| {
            ProjectionError::invalid(format!("cube face index must be 0..6, got {index}"))
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            CubeFace::Back => "back",
            CubeFace::Left => "left",
            CubeFace::Front => "front",
            CubeFace::Right => "right",
            CubeFace::Top => "top",
            CubeFace::Bottom => "bottom",
        }
    }

    /// `(column, row)` of this face in the 4x3 cross layout.
    pub fn cross_cell(self) -> (u32, u32) {
        match self {
            CubeFace::Top => (1, 0),
            CubeFace::Left => (0, 1),
            CubeFace::Front => (1, 1),
            CubeFace::Right => (2, 1),
            CubeFace::Back => (3, 1),
            CubeFace::Bottom => (1, 2),
        }
    }

    /// `(column, row)` of this face in the 3x2 grid layout:
    /// back, left, front on top; right, top, bottom below.
    pub fn grid_cell(self) -> (u32, u32) {
        let i = self.index() as u32;
        (i % 3, i / 3)
    }
}

/// Maps face-local coordinates `(a, b)`, both in `[-tan(fov/2), tan(fov/2)]`,
/// to a direction and that direction to source pixels. `a` grows with the
/// face column, `b` with the face row.
pub trait FaceDirection: Sync {
    fn direction(&self, face: CubeFace, a: f64, b: f64) -> DVec3;

    fn source_pixel(&self, dir: DVec3, width: u32, height: u32) -> (f64, f64);

    /// Boundary policy this convention was designed with.
    fn boundary(&self) -> BoundaryPolicy;

    /// File stem used when the face is written to disk.
    fn file_stem(&self, face: CubeFace) -> String;
}

/// Closed-form z-up face table, one axis fixed at ±1 per face.
#[derive(Debug, Clone, Copy, Default)]
pub struct AxisAligned;

impl FaceDirection for AxisAligned {
    fn direction(&self, face: CubeFace, a: f64, b: f64) -> DVec3 {
        match face {
            CubeFace::Back => DVec3::new(-1.0, -a, -b),
            CubeFace::Left => DVec3::new(a, -1.0, -b),
            CubeFace::Front => DVec3::new(1.0, a, -b),
            CubeFace::Right => DVec3::new(-a, 1.0, -b),
            CubeFace::Top => DVec3::new(b, a, 1.0),
            CubeFace::Bottom => DVec3::new(-b, a, -1.0),
        }
    }

    fn source_pixel(&self, dir: DVec3, width: u32, height: u32) -> (f64, f64) {
        sphere::direction_to_pixel(dir, width, height)
    }

    fn boundary(&self) -> BoundaryPolicy {
        BoundaryPolicy::ClampBoth
    }

    fn file_stem(&self, face: CubeFace) -> String {
        face.name().to_string()
    }
}

/// Faces rendered as perspective cameras aimed at fixed yaw/pitch pairs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ViewAligned;

impl ViewAligned {
    /// Camera `(yaw, pitch)` in degrees. Positive pitch looks down.
    pub fn yaw_pitch(face: CubeFace) -> (f64, f64) {
        match face {
            CubeFace::Back => (180.0, 0.0),
            CubeFace::Left => (-90.0, 0.0),
            CubeFace::Front => (0.0, 0.0),
            CubeFace::Right => (90.0, 0.0),
            CubeFace::Top => (0.0, -90.0),
            CubeFace::Bottom => (0.0, 90.0),
        }
    }
}

impl FaceDirection for ViewAligned {
    fn direction(&self, face: CubeFace, a: f64, b: f64) -> DVec3 {
        let (yaw, pitch) = Self::yaw_pitch(face);
        CameraRotation::new(yaw, pitch).apply(camera_ray(a, b))
    }

    fn source_pixel(&self, dir: DVec3, width: u32, height: u32) -> (f64, f64) {
        sphere::view_direction_to_pixel(dir, width, height)
    }

    fn boundary(&self) -> BoundaryPolicy {
        BoundaryPolicy::WrapUClampV
    }

    // numbered by grid slot, 1 = back ... 6 = bottom
    fn file_stem(&self, face: CubeFace) -> String {
        (face.index() + 1).to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaceStrategy {
    #[default]
    AxisAligned,
    ViewAligned,
}

impl FaceStrategy {
    pub fn faces(self) -> &'static dyn FaceDirection {
        match self {
            FaceStrategy::AxisAligned => &AxisAligned,
            FaceStrategy::ViewAligned => &ViewAligned,
        }
    }
}

const DEFAULT_BORDER: u32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CubeMapConfig {
    /// Edge length of every face in pixels.
    pub face_size: u32,
    /// 90 tiles the sphere exactly; wider faces overlap, narrower ones leave gaps.
    pub fov_deg: f64,
    pub strategy: FaceStrategy,
    /// Overrides the strategy's own boundary policy.
    pub boundary: Option<BoundaryPolicy>,
    /// White gap between faces in `collage_border.png`.
    pub border_px: u32,
}

impl Default for CubeMapConfig {
    fn default() -> Self {
        Self {
            face_size: 1024,
            fov_deg: 90.0,
            strategy: FaceStrategy::AxisAligned,
            boundary: None,
            border_px: DEFAULT_BORDER,
        }
    }
}

impl CubeMapConfig {
    pub fn validate(&self) -> Result<()> {
        if self.face_size == 0 {
            return Err(ProjectionError::invalid("cube face size must be non-zero"));
        }
        grid_canvas(self.face_size, self.border_px)?;
        cross_canvas(self.face_size)?;
        validate_fov(self.fov_deg)
    }

    pub fn boundary(&self) -> BoundaryPolicy {
        self.boundary
            .unwrap_or_else(|| self.strategy.faces().boundary())
    }
}

/// Produces the six faces of a cube map from a panorama.
#[derive(Debug, Clone, Default)]
pub struct CubeMapGenerator {
    config: CubeMapConfig,
    workers: Workers,
}

impl CubeMapGenerator {
    pub fn new(config: CubeMapConfig, workers: Workers) -> Self {
        Self { config, workers }
    }

    pub fn config(&self) -> &CubeMapConfig {
        &self.config
    }

    pub fn generate_face(&self, pano: &Panorama, face: CubeFace) -> Result<RgbaImage> {
        self.config.validate()?;
        let edge = self.config.face_size;
        let faces = self.config.strategy.faces();
        let coords: Vec<f64> = (0..edge)
            .map(|i| sphere::face_coordinate(i, edge, self.config.fov_deg))
            .collect();
        let (w, h) = (pano.width(), pano.height());

        let map = CoordMap::build(edge, edge, &self.workers, |x, y| {
            let dir = faces.direction(face, coords[x as usize], coords[y as usize]);
            faces.source_pixel(dir, w, h)
        });
        let buf = resample::remap(
            pano,
            &map,
            self.config.boundary(),
            Layout::OpaqueRgba,
            &self.workers,
        );
        RgbaImage::from_raw(edge, edge, buf)
            .ok_or_else(|| ProjectionError::invalid("cube face buffer size mismatch"))
    }

    /// Same as [`generate_face`](Self::generate_face), addressed by index 0..6.
    pub fn generate_face_index(&self, pano: &Panorama, index: usize) -> Result<RgbaImage> {
        self.generate_face(pano, CubeFace::from_index(index)?)
    }

    pub fn generate(&self, pano: &Panorama) -> Result<CubeMap> {
        let mut faces = Vec::with_capacity(6);
        for face in CubeFace::ALL {
            log::debug!("processing face {} ({})", face.index(), face.name());
            faces.push(self.generate_face(pano, face)?);
        }
        let cube = CubeMap::from_faces(self.config.strategy, faces)?;
        Ok(cube.with_border(self.config.border_px))
    }
}

/// Six square faces indexed by [`CubeFace`].
#[derive(Debug, Clone)]
pub struct CubeMap {
    strategy: FaceStrategy,
    border: u32,
    faces: Vec<RgbaImage>,
}

impl CubeMap {
    /// `faces` in [`CubeFace::ALL`] order, all square and the same size.
    pub fn from_faces(strategy: FaceStrategy, faces: Vec<RgbaImage>) -> Result<Self> {
        if faces.len() != 6 {
            return Err(ProjectionError::invalid(format!(
                "a cube map has 6 faces, got {}",
                faces.len()
            )));
        }
        let (w, h) = faces[0].dimensions();
        if w == 0 || w != h || faces.iter().any(|f| f.dimensions() != (w, h)) {
            return Err(ProjectionError::invalid(
                "cube faces must be non-empty squares of equal size",
            ));
        }
        Ok(Self {
            strategy,
            border: DEFAULT_BORDER,
            faces,
        })
    }

    /// Border used for `collage_border.png` by [`save`](Self::save).
    pub fn with_border(mut self, border: u32) -> Self {
        self.border = border;
        self
    }

    pub fn face(&self, face: CubeFace) -> &RgbaImage {
        &self.faces[face.index()]
    }

    pub fn face_size(&self) -> u32 {
        self.faces[0].width()
    }

    pub fn strategy(&self) -> FaceStrategy {
        self.strategy
    }

    /// Borderless 4x3 cross on black:
    ///
    /// ```text
    ///         [top]
    /// [left] [front] [right] [back]
    ///         [bottom]
    /// ```
    pub fn cross_collage(&self) -> Result<RgbImage> {
        let s = self.face_size();
        let (width, height) = cross_canvas(s)?;
        let mut canvas = RgbImage::new(width, height);
        for face in CubeFace::ALL {
            let (col, row) = face.cross_cell();
            paste(&mut canvas, self.face(face), col * s, row * s);
        }
        Ok(canvas)
    }

    /// 3x2 grid on white with `border` pixels around and between faces.
    /// `border = 0` gives the plain grid.
    pub fn grid_collage(&self, border: u32) -> Result<RgbImage> {
        let s = self.face_size();
        let (width, height) = grid_canvas(s, border)?;
        let mut canvas = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
        for face in CubeFace::ALL {
            let (col, row) = face.grid_cell();
            let x = border * (col + 1) + col * s;
            let y = border * (row + 1) + row * s;
            paste(&mut canvas, self.face(face), x, y);
        }
        Ok(canvas)
    }

    /// Write every face plus `collage.png`, `collage_border.png` and
    /// `collage_cross.png` into `dir`, creating it if needed.
    pub fn save(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        io::ensure_dir(dir)?;
        let stems = self.strategy.faces();
        let mut written = Vec::with_capacity(9);

        for face in CubeFace::ALL {
            let path = dir.join(format!("{}.png", stems.file_stem(face)));
            io::write_image(&DynamicImage::ImageRgba8(self.face(face).clone()), &path)?;
            log::info!("generated {} face", face.name());
            written.push(path);
        }

        let collages = [
            ("collage.png", self.grid_collage(0)?),
            ("collage_border.png", self.grid_collage(self.border)?),
            ("collage_cross.png", self.cross_collage()?),
        ];
        for (name, img) in collages {
            let path = dir.join(name);
            io::write_image(&DynamicImage::ImageRgb8(img), &path)?;
            log::info!("generated cube map {}", path.display());
            written.push(path);
        }
        Ok(written)
    }
}

/// `(width, height)` of the 3x2 grid collage.
fn grid_canvas(face: u32, border: u32) -> Result<(u32, u32)> {
    let width = face
        .checked_mul(3)
        .zip(border.checked_mul(4))
        .and_then(|(f, b)| f.checked_add(b));
    let height = face
        .checked_mul(2)
        .zip(border.checked_mul(3))
        .and_then(|(f, b)| f.checked_add(b));
    checked_canvas(width.zip(height), "grid collage", face, border)
}

/// `(width, height)` of the 4x3 cross collage.
fn cross_canvas(face: u32) -> Result<(u32, u32)> {
    let size = face.checked_mul(4).zip(face.checked_mul(3));
    checked_canvas(size, "cross collage", face, 0)
}

// the RGB buffer length must fit in usize as well
fn checked_canvas(
    size: Option<(u32, u32)>,
    what: &str,
    face: u32,
    border: u32,
) -> Result<(u32, u32)> {
    size.filter(|&(w, h)| {
        (w as usize)
            .checked_mul(h as usize)
            .and_then(|n| n.checked_mul(3))
            .is_some()
    })
    .ok_or_else(|| {
        ProjectionError::invalid(format!(
            "{what} too large for faces of {face}px with a {border}px border"
        ))
    })
}

// alpha is dropped, not composited
fn paste(canvas: &mut RgbImage, face: &RgbaImage, x0: u32, y0: u32) {
    for (x, y, p) in face.enumerate_pixels() {
        canvas.put_pixel(x0 + x, y0 + y, Rgb([p[0], p[1], p[2]]));
    }
}
