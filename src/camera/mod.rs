//! Cameras and the controls driving them.

pub use self::camera::{Camera, OrthographicExtents, Projection, ProjectionKind};
pub use self::orbital_controls::{DragState, OrbitalControls, SENSITIVITY};

mod camera;
mod orbital_controls;
