//! Drawing geometry, meshes and markers with the built-in programs.

pub use self::artist::{shear_matrix, DrawStrategy};
pub use self::programs::{lit_layout, load_program, solid_layout};
pub use self::renderer::{Renderer, POINT_SIZE};

pub mod artist;
pub mod programs;
mod renderer;
