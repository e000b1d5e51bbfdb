//! Scene objects: meshes and the arenas owning cameras and materials.

pub use self::arena::{Arena, CameraHandle, Handle, MaterialHandle};
pub use self::mesh::{Mesh, MeshMetadata};

mod arena;
mod mesh;
