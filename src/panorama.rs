// panorama.rs - equirectangular buffer, view and rotation parameters

use crate::error::{ProjectionError, Result};
use image::{DynamicImage, GenericImageView, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};

/// How a decoded image that is not exactly 2:1 gets turned into a panorama.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AspectPolicy {
    /// Reject anything other than `width == 2 * height`.
    #[default]
    Strict,
    /// Partial panoramas (height below `width / 2`) are padded with black rows
    /// at the top, the source content stays at the bottom.
    PadTop,
}

/// A full-sphere equirectangular image with 8-bit RGB or RGBA pixels.
///
/// Longitude runs from -180° at the left edge to +180° at the right edge,
/// latitude from +90° on the top row to -90° on the bottom row. The
/// `width == 2 * height` layout is checked on construction, so every mapping
/// function downstream can rely on it.
#[derive(Debug, Clone, PartialEq)]
pub struct Panorama {
    width: u32,
    height: u32,
    channels: usize,
    data: Vec<u8>,
}

impl Panorama {
    /// Wrap a raw row-major pixel buffer.
    pub fn new(width: u32, height: u32, channels: usize, data: Vec<u8>) -> Result<Self> {
        if channels != 3 && channels != 4 {
            return Err(ProjectionError::invalid(format!(
                "panorama must have 3 or 4 channels, got {channels}"
            )));
        }
        if height == 0 || width != height * 2 {
            return Err(ProjectionError::AspectRatio { width, height });
        }
        let expected = width as usize * height as usize * channels;
        if data.len() != expected {
            return Err(ProjectionError::invalid(format!(
                "buffer holds {} bytes, {width}x{height}x{channels} needs {expected}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    pub fn from_rgb(img: RgbImage) -> Result<Self> {
        let (w, h) = img.dimensions();
        Self::new(w, h, 3, img.into_raw())
    }

    pub fn from_rgba(img: RgbaImage) -> Result<Self> {
        let (w, h) = img.dimensions();
        Self::new(w, h, 4, img.into_raw())
    }

    /// Convert a decoded image, keeping alpha only when the source has it.
    pub fn from_dynamic(img: DynamicImage, policy: AspectPolicy) -> Result<Self> {
        let img = match policy {
            AspectPolicy::Strict => img,
            AspectPolicy::PadTop => pad_to_equirect(img)?,
        };
        if img.color().has_alpha() {
            Self::from_rgba(img.into_rgba8())
        } else {
            Self::from_rgb(img.into_rgb8())
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    /// Channel values of the pixel at column `x`, row `y`.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let idx = (y as usize * self.width as usize + x as usize) * self.channels;
        &self.data[idx..idx + self.channels]
    }

    pub fn into_dynamic(self) -> DynamicImage {
        let Self {
            width,
            height,
            channels,
            data,
        } = self;
        // sizes were checked on construction, from_raw cannot fail here
        let img = if channels == 4 {
            RgbaImage::from_raw(width, height, data).map(DynamicImage::ImageRgba8)
        } else {
            RgbImage::from_raw(width, height, data).map(DynamicImage::ImageRgb8)
        };
        img.unwrap_or_else(|| DynamicImage::new_rgb8(width, height))
    }
}

// Partial panoramas: use the width as reference (target_h = width / 2) and
// paste the source at the bottom of a black canvas.
fn pad_to_equirect(img: DynamicImage) -> Result<DynamicImage> {
    let (src_w, src_h) = img.dimensions();
    if src_w % 2 != 0 || src_h == 0 {
        return Err(ProjectionError::AspectRatio {
            width: src_w,
            height: src_h,
        });
    }
    let target_h = src_w / 2;
    if src_h == target_h {
        return Ok(img);
    }
    if src_h > target_h {
        return Err(ProjectionError::AspectRatio {
            width: src_w,
            height: src_h,
        });
    }

    let y_offset = target_h - src_h;
    log::debug!("padding {src_w}x{src_h} panorama with {y_offset} rows at the top");
    let img = if img.color().has_alpha() {
        let src = img.into_rgba8();
        let mut canvas = RgbaImage::from_pixel(src_w, target_h, image::Rgba([0, 0, 0, 255]));
        for (x, y, p) in src.enumerate_pixels() {
            canvas.put_pixel(x, y + y_offset, *p);
        }
        DynamicImage::ImageRgba8(canvas)
    } else {
        let src = img.into_rgb8();
        let mut canvas = RgbImage::new(src_w, target_h);
        for (x, y, p) in src.enumerate_pixels() {
            canvas.put_pixel(x, y + y_offset, *p);
        }
        DynamicImage::ImageRgb8(canvas)
    };
    Ok(img)
}

/// A rectilinear camera: where it looks, how wide, and the output size.
///
/// Angles are degrees. Positive pitch tilts the view toward the nadir.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewSpec {
    pub yaw: f64,
    pub pitch: f64,
    pub fov: f64,
    pub output_width: u32,
    pub output_height: u32,
}

impl ViewSpec {
    pub fn new(yaw: f64, pitch: f64, fov: f64, output_width: u32, output_height: u32) -> Self {
        Self {
            yaw,
            pitch,
            fov,
            output_width,
            output_height,
        }
    }

    pub fn square(yaw: f64, pitch: f64, fov: f64, size: u32) -> Self {
        Self::new(yaw, pitch, fov, size, size)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.yaw.is_finite() || !self.pitch.is_finite() {
            return Err(ProjectionError::invalid(format!(
                "view angles must be finite (yaw={}, pitch={})",
                self.yaw, self.pitch
            )));
        }
        validate_fov(self.fov)?;
        if self.output_width == 0 || self.output_height == 0 {
            return Err(ProjectionError::invalid(format!(
                "view output size must be non-zero, got {}x{}",
                self.output_width, self.output_height
            )));
        }
        Ok(())
    }
}

/// Rectilinear projections blow up at tan(90°), so fov must stay inside (0, 180).
pub(crate) fn validate_fov(fov: f64) -> Result<()> {
    if !(fov > 0.0 && fov < 180.0) {
        return Err(ProjectionError::invalid(format!(
            "field of view must be within (0, 180) degrees, got {fov}"
        )));
    }
    Ok(())
}

/// Euler angles (degrees) of a captured panorama's orientation.
///
/// `pitch = 90, yaw = 0, roll = 0` is the canonical orientation: the baker
/// subtracts 90° from pitch before building the rotation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RotationSpec {
    pub pitch: f64,
    pub yaw: f64,
    pub roll: f64,
}

impl RotationSpec {
    pub fn new(pitch: f64, yaw: f64, roll: f64) -> Self {
        Self { pitch, yaw, roll }
    }

    /// The orientation that bakes to an unchanged image.
    pub fn identity() -> Self {
        Self::new(90.0, 0.0, 0.0)
    }

    pub fn validate(&self) -> Result<()> {
        if [self.pitch, self.yaw, self.roll].iter().all(|a| a.is_finite()) {
            Ok(())
        } else {
            Err(ProjectionError::invalid(format!(
                "rotation angles must be finite, got {self:?}"
            )))
        }
    }
}

impl From<[f64; 3]> for RotationSpec {
    fn from([pitch, yaw, roll]: [f64; 3]) -> Self {
        Self::new(pitch, yaw, roll)
    }
}
