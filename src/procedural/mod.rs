//! Procedurally generated geometry.

pub use self::cuboid::Cuboid;
pub use self::marker::{Line, Point};
pub use self::plane::Plane;

mod cuboid;
mod marker;
mod plane;
