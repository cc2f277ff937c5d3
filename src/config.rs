// config.rs - projector settings
//
// Settings live in a single JSON file, every field optional:
//   { "threads": 0, "aspect": "strict", "cube": { "face_size": 1024, ... }, ... }
//
// Lookup:
// - CLI: --config <path>
// - Env: PANORAMA_PROJECTOR_CONFIG
// - <exe_dir>/projector.json
// - ./projector.json
// - Default: built-in values
//
// An explicit path (flag or env) that does not exist is an error; a file that
// exists but does not parse is always an error.

use crate::cubemap::CubeMapConfig;
use crate::error::{ProjectionError, Result};
use crate::panorama::{validate_fov, AspectPolicy};
use crate::parallel::Workers;
use crate::rotation::DEFAULT_SUFFIX;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "PANORAMA_PROJECTOR_CONFIG";
pub const CONFIG_FILE: &str = "projector.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub h_count: u32,
    pub v_count: u32,
    pub fov_deg: f64,
    pub view_size: u32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            h_count: 8,
            v_count: 4,
            fov_deg: 90.0,
            view_size: 512,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EquatorConfig {
    pub count: u32,
    pub fov_deg: f64,
    pub view_size: u32,
}

impl Default for EquatorConfig {
    fn default() -> Self {
        Self {
            count: 4,
            fov_deg: 90.0,
            view_size: 512,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    pub suffix: String,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            suffix: DEFAULT_SUFFIX.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectorConfig {
    /// Worker threads for pixel loops, 0 = one per logical core.
    pub threads: usize,
    pub aspect: AspectPolicy,
    pub cube: CubeMapConfig,
    pub grid: GridConfig,
    pub equator: EquatorConfig,
    pub rotation: RotationConfig,
}

impl ProjectorConfig {
    /// Parse and validate a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ProjectionError::NotFound(path.to_path_buf())
            } else {
                ProjectionError::io(path, e)
            }
        })?;
        let cfg: Self = serde_json::from_str(&text).map_err(|source| ProjectionError::Config {
            path: path.to_path_buf(),
            source,
        })?;
        cfg.validate()?;
        log::debug!("loaded config from {}", path.display());
        Ok(cfg)
    }

    /// Load from the first location in the lookup chain, or fall back to the
    /// built-in defaults when nothing is found.
    pub fn resolve(cli: Option<&Path>) -> Result<Self> {
        let env = std::env::var(CONFIG_ENV).ok();
        match locate(cli, env.as_deref()) {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.cube.validate()?;

        let g = &self.grid;
        if g.h_count == 0 || g.v_count == 0 || g.view_size == 0 {
            return Err(ProjectionError::invalid(format!(
                "grid counts and view size must be non-zero, got {}x{} at {}px",
                g.h_count, g.v_count, g.view_size
            )));
        }
        validate_fov(g.fov_deg)?;

        let e = &self.equator;
        if e.count == 0 || e.view_size == 0 {
            return Err(ProjectionError::invalid(format!(
                "equator count and view size must be non-zero, got {} at {}px",
                e.count, e.view_size
            )));
        }
        validate_fov(e.fov_deg)
    }

    pub fn workers(&self) -> Workers {
        Workers::new(self.threads)
    }
}

/// Explicit paths are returned whether or not they exist, so a typo surfaces
/// as `NotFound` instead of silently using defaults.
fn locate(cli: Option<&Path>, env: Option<&str>) -> Option<PathBuf> {
    if let Some(p) = cli {
        return Some(p.to_path_buf());
    }
    if let Some(v) = env {
        if !v.trim().is_empty() {
            return Some(PathBuf::from(v));
        }
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let p = dir.join(CONFIG_FILE);
            if p.is_file() {
                return Some(p);
            }
        }
    }

    let p = PathBuf::from(CONFIG_FILE);
    if p.is_file() {
        return Some(p);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cubemap::FaceStrategy;
    use crate::resample::BoundaryPolicy;
    use std::io::Write;

    #[test]
    fn defaults() {
        let cfg = ProjectorConfig::default();
        assert_eq!(cfg.threads, 0);
        assert_eq!(cfg.aspect, AspectPolicy::Strict);
        assert_eq!(cfg.cube.face_size, 1024);
        assert_eq!(cfg.cube.border_px, 2);
        assert_eq!(cfg.cube.strategy, FaceStrategy::AxisAligned);
        assert_eq!((cfg.grid.h_count, cfg.grid.v_count), (8, 4));
        assert_eq!(cfg.equator.count, 4);
        assert_eq!(cfg.rotation.suffix, "_aligned");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let cfg: ProjectorConfig = serde_json::from_str(
            r#"{
                "aspect": "pad_top",
                "cube": { "face_size": 256, "strategy": "view_aligned", "boundary": "clamp_both" },
                "grid": { "h_count": 12 }
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.aspect, AspectPolicy::PadTop);
        assert_eq!(cfg.cube.face_size, 256);
        assert_eq!(cfg.cube.fov_deg, 90.0);
        assert_eq!(cfg.cube.strategy, FaceStrategy::ViewAligned);
        assert_eq!(cfg.cube.boundary, Some(BoundaryPolicy::ClampBoth));
        assert_eq!(cfg.grid.h_count, 12);
        assert_eq!(cfg.grid.v_count, 4);
        assert_eq!(cfg.equator, EquatorConfig::default());
    }

    #[test]
    fn load_reports_parse_errors_and_bad_values() {
        let mut bad = tempfile::NamedTempFile::new().unwrap();
        write!(bad, "{{ \"threads\": \"many\" }}").unwrap();
        assert!(matches!(
            ProjectorConfig::load(bad.path()),
            Err(ProjectionError::Config { .. })
        ));

        let mut zero = tempfile::NamedTempFile::new().unwrap();
        write!(zero, "{{ \"equator\": {{ \"count\": 0 }} }}").unwrap();
        assert!(matches!(
            ProjectorConfig::load(zero.path()),
            Err(ProjectionError::InvalidInput(_))
        ));

        let mut wide = tempfile::NamedTempFile::new().unwrap();
        write!(wide, "{{ \"cube\": {{ \"fov_deg\": 180 }} }}").unwrap();
        assert!(ProjectorConfig::load(wide.path()).is_err());
    }

    #[test]
    fn load_round_trips_a_written_config() {
        let mut cfg = ProjectorConfig::default();
        cfg.threads = 3;
        cfg.rotation.suffix = "_level".into();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(serde_json::to_string_pretty(&cfg).unwrap().as_bytes())
            .unwrap();
        let loaded = ProjectorConfig::load(file.path()).unwrap();
        assert_eq!(loaded, cfg);
        assert_eq!(loaded.workers().threads(), 3);
    }

    #[test]
    fn explicit_locations_win() {
        let cli = Path::new("/tmp/a.json");
        assert_eq!(locate(Some(cli), Some("/tmp/b.json")), Some(cli.to_path_buf()));
        assert_eq!(locate(None, Some("/tmp/b.json")), Some(PathBuf::from("/tmp/b.json")));
        assert!(matches!(
            ProjectorConfig::load(Path::new("/no/such/projector.json")),
            Err(ProjectionError::NotFound(_))
        ));
    }
}
