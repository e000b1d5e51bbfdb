//! Model and texture import.

pub use self::model_loader::{smooth_normals, LoadedModel, ModelLoader, TextureKind};
pub use self::texture_loader::TextureLoader;

use std::path::PathBuf;

mod model_loader;
mod texture_loader;

/// Why an import failed. Logged by the loaders, never returned to callers.
#[derive(Debug, thiserror::Error)]
pub(crate) enum LoadError {
    #[error("{} is not a file", .0.display())]
    NotFound(PathBuf),

    #[error(transparent)]
    Gltf(#[from] gltf::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error("mesh {0} has a primitive without positions")]
    MissingPositions(usize),

    #[error(transparent)]
    Graphics(#[from] crate::error::GraphicsError),
}
