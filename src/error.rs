// error.rs - error taxonomy for the projection engine

use std::path::PathBuf;

/// Errors raised by panorama loading, projection and file output.
#[derive(Debug, thiserror::Error)]
pub enum ProjectionError {
    /// Malformed view/rotation parameters, buffer sizes or face indices.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Panorama does not follow the full-sphere `width == 2 * height` layout.
    #[error("unsupported panorama size {width}x{height} (expected width == 2 * height)")]
    AspectRatio { width: u32, height: u32 },

    #[error("image not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("image codec error on {}: {source}", path.display())]
    Codec {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("bad config {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ProjectionError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn codec(path: impl Into<PathBuf>, source: image::ImageError) -> Self {
        Self::Codec {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = ProjectionError> = std::result::Result<T, E>;
