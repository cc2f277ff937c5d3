// lib.rs - equirectangular panorama projection engine
//
// Every projection runs destination -> sphere -> source: each output pixel is
// turned into a direction, the direction into fractional source coordinates,
// and the source is sampled bilinearly there.

pub mod config;
pub mod cubemap;
pub mod error;
pub mod io;
pub mod panorama;
pub mod parallel;
pub mod perspective;
pub mod resample;
pub mod rotation;
pub mod sphere;

pub use config::ProjectorConfig;
pub use cubemap::{CubeFace, CubeMap, CubeMapConfig, CubeMapGenerator, FaceStrategy};
pub use error::{ProjectionError, Result};
pub use panorama::{AspectPolicy, Panorama, RotationSpec, ViewSpec};
pub use parallel::Workers;
pub use perspective::{PerspectiveRenderer, RenderedView};
pub use resample::BoundaryPolicy;
pub use rotation::RotationBaker;
