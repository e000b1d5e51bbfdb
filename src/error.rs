//! Error types shared by the renderer, the GPU context and the resources.

use crate::resource::ShadingModel;
use std::path::PathBuf;

/// Result alias used throughout the crate.
pub type Result<T, E = GraphicsError> = std::result::Result<T, E>;

/// Errors raised by GPU resource management and drawing.
#[derive(Debug, thiserror::Error)]
pub enum GraphicsError {
    #[error("geometry is already initialized")]
    AlreadyInitialized,

    #[error("geometry has not been initialized")]
    NotInitialized,

    #[error("no shader program registered for the {0:?} shading model")]
    NoProgram(ShadingModel),

    #[error("a shader program is already registered for the {0:?} shading model")]
    DuplicateProgram(ShadingModel),

    #[error("shader program `{0}` is not linked")]
    ProgramNotLinked(String),

    #[error("shader program `{0}` has no attached stage")]
    MissingStage(String),

    #[error("could not locate shader file {0}")]
    ShaderNotFound(PathBuf),

    #[error("failed to read shader file {path}: {source}")]
    ShaderIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to compile shader program `{label}`: {message}")]
    Compile { label: String, message: String },

    #[error("uniform `{name}` expects a {expected} value")]
    UniformType { name: String, expected: &'static str },

    #[error("invalid geometry: {0}")]
    InvalidGeometry(#[from] GeometryError),

    #[error("unknown {0} handle")]
    UnknownHandle(&'static str),

    #[error("{0} is not supported by this device")]
    Unsupported(&'static str),

    #[error("surface error: {0}")]
    Surface(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Reasons a draw strategy refuses a piece of geometry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeometryError {
    #[error("missing {0} data")]
    Missing(&'static str),

    #[error("{attribute} count {found} does not match the {expected} positions")]
    LengthMismatch {
        attribute: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("index {index} is out of range for {vertex_count} vertices")]
    IndexOutOfRange { index: u32, vertex_count: usize },

    #[error("vertex count {0} is not a multiple of three")]
    NotTriangles(usize),

    #[error("indexed geometry cannot be drawn as an array")]
    UnexpectedIndices,

    #[error("expected one or two points, found {0}")]
    PointLineCount(usize),
}
