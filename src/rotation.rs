// rotation.rs - bake a pitch/yaw/roll orientation into an equirectangular image

use crate::error::{ProjectionError, Result};
use crate::io;
use crate::panorama::{AspectPolicy, Panorama, RotationSpec};
use crate::parallel::Workers;
use crate::resample::{self, BoundaryPolicy, CoordMap, Layout};
use crate::sphere;
use glam::DMat3;
use std::path::{Path, PathBuf};

pub const DEFAULT_SUFFIX: &str = "_aligned";

/// `Rx(pitch - 90) * Ry(yaw) * Rz(roll)`, angles in degrees.
///
/// Pitch 90 is the canonical level orientation, hence the offset.
pub fn rotation_matrix(spec: &RotationSpec) -> DMat3 {
    DMat3::from_rotation_x((spec.pitch - 90.0).to_radians())
        * DMat3::from_rotation_y(spec.yaw.to_radians())
        * DMat3::from_rotation_z(spec.roll.to_radians())
}

/// Re-expresses panoramas as if they had been captured at the canonical
/// orientation.
#[derive(Debug, Clone)]
pub struct RotationBaker {
    workers: Workers,
    suffix: String,
    aspect: AspectPolicy,
}

impl Default for RotationBaker {
    fn default() -> Self {
        Self::new(Workers::default())
    }
}

impl RotationBaker {
    pub fn new(workers: Workers) -> Self {
        Self {
            workers,
            suffix: DEFAULT_SUFFIX.to_string(),
            aspect: AspectPolicy::Strict,
        }
    }

    /// Suffix inserted before the extension when no output path is given.
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    pub fn with_aspect(mut self, aspect: AspectPolicy) -> Self {
        self.aspect = aspect;
        self
    }

    /// Source coordinates for every destination pixel. Each destination
    /// direction is multiplied as a row vector by `R`, which walks back from
    /// the output to the captured image.
    pub fn coord_map(&self, width: u32, height: u32, spec: &RotationSpec) -> Result<CoordMap> {
        spec.validate()?;
        let inverse = rotation_matrix(spec).transpose();
        Ok(CoordMap::build(width, height, &self.workers, |x, y| {
            let dst = sphere::pixel_to_direction(x as f64, y as f64, width, height);
            sphere::lonlat_direction_to_pixel(inverse * dst, width, height)
        }))
    }

    /// Same size and channel count as `pano`.
    pub fn bake(&self, pano: &Panorama, spec: &RotationSpec) -> Result<Panorama> {
        let (w, h) = (pano.width(), pano.height());
        let map = self.coord_map(w, h, spec)?;
        let buf = resample::remap(
            pano,
            &map,
            BoundaryPolicy::WrapUClampV,
            Layout::Source,
            &self.workers,
        );
        Panorama::new(w, h, pano.channels(), buf)
    }

    /// Read `input`, bake `spec` and write the result to `output`, or next
    /// to the input with the configured suffix. Returns the written path.
    pub fn bake_file(
        &self,
        input: &Path,
        spec: &RotationSpec,
        output: Option<&Path>,
    ) -> Result<PathBuf> {
        spec.validate()?;
        let out = self.output_path(input, output)?;
        let pano = io::open_panorama(input, self.aspect)?;
        let baked = self.bake(&pano, spec)?;
        io::write_image(&baked.into_dynamic(), &out)?;
        log_baked(spec, &out);
        Ok(out)
    }

    fn output_path(&self, input: &Path, output: Option<&Path>) -> Result<PathBuf> {
        let out = match output {
            Some(p) => p.to_path_buf(),
            None => io::derived_path(input, &self.suffix),
        };
        if out == input {
            return Err(ProjectionError::invalid(format!(
                "refusing to overwrite the source image {}",
                input.display()
            )));
        }
        Ok(out)
    }

    /// Bring two panoramas into the shared canonical orientation, each with
    /// its own rotation.
    pub fn align_pair(
        &self,
        first: (&Panorama, &RotationSpec),
        second: (&Panorama, &RotationSpec),
    ) -> Result<(Panorama, Panorama)> {
        Ok((
            self.bake(first.0, first.1)?,
            self.bake(second.0, second.1)?,
        ))
    }

    /// File form of [`align_pair`](Self::align_pair). Both inputs are
    /// decoded and baked before anything is written; if the second write
    /// fails the first output is removed again.
    pub fn align_pair_files(
        &self,
        first: (&Path, &RotationSpec),
        second: (&Path, &RotationSpec),
    ) -> Result<(PathBuf, PathBuf)> {
        first.1.validate()?;
        second.1.validate()?;
        let out_a = self.output_path(first.0, None)?;
        let out_b = self.output_path(second.0, None)?;
        if out_a == out_b {
            return Err(ProjectionError::invalid(format!(
                "both panoramas would be written to {}",
                out_a.display()
            )));
        }

        let pano_a = io::open_panorama(first.0, self.aspect)?;
        let pano_b = io::open_panorama(second.0, self.aspect)?;
        let (baked_a, baked_b) = self.align_pair((&pano_a, first.1), (&pano_b, second.1))?;

        io::write_image(&baked_a.into_dynamic(), &out_a)?;
        if let Err(e) = io::write_image(&baked_b.into_dynamic(), &out_b) {
            let _ = std::fs::remove_file(&out_a);
            return Err(e);
        }
        log_baked(first.1, &out_a);
        log_baked(second.1, &out_b);
        Ok((out_a, out_b))
    }
}

fn log_baked(spec: &RotationSpec, out: &Path) {
    log::info!(
        "baked pitch={} yaw={} roll={} into {}",
        spec.pitch,
        spec.yaw,
        spec.roll,
        out.display()
    );
}
