use crate::resource::{GpuGeometry, PrimitiveType, VertexBuffer};
use glamx::Vec3;

/// A flat quad given by three of its corners.
///
/// The fourth corner is derived from the other three: it lies above the lower-left
/// corner, at the height of the right edge.
#[derive(Clone, Debug)]
pub struct Plane {
    u: Vec3,
    v: Vec3,
    width: f32,
    height: f32,
    buffer: VertexBuffer,
}

impl Plane {
    /// An indexed quad: four vertices, two triangles.
    pub fn new(lower_left: Vec3, lower_right: Vec3, upper_right: Vec3) -> Self {
        let mut plane = Self::frame(lower_left, lower_right, upper_right);
        let upper_left = lower_left + plane.v * plane.height;
        let normal = plane.normal();

        for vertex in [upper_right, lower_right, lower_left, upper_left].iter() {
            plane.buffer.add_vertex(*vertex);
            plane.buffer.add_normal(normal);
        }

        // ul (3) ---- ur (0)
        //   |      /    |
        // ll (2) ---- lr (1)
        for index in [0, 2, 3, 0, 1, 2].iter() {
            plane.buffer.add_index(*index);
        }

        plane
    }

    /// The same quad as six unshared vertices.
    pub fn non_indexed(lower_left: Vec3, lower_right: Vec3, upper_right: Vec3) -> Self {
        let mut plane = Self::frame(lower_left, lower_right, upper_right);
        let upper_left = lower_left + plane.v * plane.height;
        let normal = plane.normal();

        for vertex in [
            upper_right,
            lower_right,
            lower_left,
            lower_left,
            upper_left,
            upper_right,
        ]
        .iter()
        {
            plane.buffer.add_vertex(*vertex);
            plane.buffer.add_normal(normal);
        }

        plane
    }

    fn frame(lower_left: Vec3, lower_right: Vec3, upper_right: Vec3) -> Self {
        Plane {
            u: (lower_left - lower_right).normalize(),
            v: (upper_right - lower_right).normalize(),
            width: lower_left.distance(lower_right),
            height: lower_right.distance(upper_right),
            buffer: VertexBuffer::new(),
        }
    }

    pub fn normal(&self) -> Vec3 {
        self.v.cross(self.u)
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn buffer(&self) -> &VertexBuffer {
        &self.buffer
    }

    pub fn into_geometry(self) -> GpuGeometry {
        GpuGeometry::new(self.buffer, PrimitiveType::Triangles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_plane() -> Plane {
        Plane::new(
            Vec3::new(-1.0, -1.0, 0.0),
            Vec3::new(1.0, -1.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
        )
    }

    #[test]
    fn quad_faces_positive_z() {
        let plane = unit_plane();
        assert!((plane.normal() - Vec3::Z).length() < 1.0e-6);
        assert_eq!(plane.width(), 2.0);
        assert_eq!(plane.height(), 2.0);
    }

    #[test]
    fn fourth_corner_is_derived() {
        let plane = unit_plane();
        let vertices = plane.buffer().vertices().unwrap();
        assert_eq!(vertices.len(), 4);
        assert!((vertices[3] - Vec3::new(-1.0, 1.0, 0.0)).length() < 1.0e-6);
        assert_eq!(plane.buffer().indices().unwrap(), &[0, 2, 3, 0, 1, 2]);
    }

    #[test]
    fn non_indexed_quad_has_two_triangles() {
        let plane = Plane::non_indexed(
            Vec3::new(-1.0, -1.0, 0.0),
            Vec3::new(1.0, -1.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
        );
        assert_eq!(plane.buffer().vertex_count(), 6);
        assert!(plane.buffer().indices().is_none());
        assert_eq!(plane.buffer().normals().unwrap().len(), 6);
    }
}
