use crate::resource::{GpuGeometry, PrimitiveType, VertexBuffer};
use glamx::{Vec2, Vec3};

/// An axis-aligned box centered at the origin.
///
/// Each face has its own four vertices so normals and texture coordinates stay
/// flat per face: 24 vertices and 36 indices in total.
#[derive(Clone, Debug)]
pub struct Cuboid {
    width: f32,
    height: f32,
    length: f32,
    buffer: VertexBuffer,
}

impl Cuboid {
    /// A box spanning `width` along x, `height` along y and `length` along z.
    pub fn new(width: f32, height: f32, length: f32) -> Self {
        let half = Vec3::new(width, height, length) * 0.5;
        let mut buffer = VertexBuffer::new();

        // (normal, u, v) with cross(u, v) == normal so every face winds counter-clockwise.
        let faces = [
            (Vec3::X, -Vec3::Z, Vec3::Y),
            (-Vec3::X, Vec3::Z, Vec3::Y),
            (Vec3::Y, Vec3::X, -Vec3::Z),
            (-Vec3::Y, Vec3::X, Vec3::Z),
            (Vec3::Z, Vec3::X, Vec3::Y),
            (-Vec3::Z, -Vec3::X, Vec3::Y),
        ];
        let corners = [
            (-1.0, -1.0, Vec2::new(0.0, 1.0)),
            (1.0, -1.0, Vec2::new(1.0, 1.0)),
            (1.0, 1.0, Vec2::new(1.0, 0.0)),
            (-1.0, 1.0, Vec2::new(0.0, 0.0)),
        ];

        for (normal, u, v) in faces.iter() {
            let base = buffer.vertex_count() as u32;
            for (su, sv, texel) in corners.iter() {
                buffer.add_vertex((*normal + *u * *su + *v * *sv) * half);
                buffer.add_normal(*normal);
                buffer.add_texel(*texel);
            }
            for offset in [0, 1, 2, 0, 2, 3].iter() {
                buffer.add_index(base + offset);
            }
        }

        Cuboid {
            width,
            height,
            length,
            buffer,
        }
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn length(&self) -> f32 {
        self.length
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

    #[test]
    fn faces_are_flat_and_indexed() {
        let cuboid = Cuboid::new(2.0, 4.0, 6.0);
        let buffer = cuboid.buffer();
        let vertices = buffer.vertices().unwrap();
        let normals = buffer.normals().unwrap();

        assert_eq!(vertices.len(), 24);
        assert_eq!(buffer.texels().unwrap().len(), 24);
        assert_eq!(buffer.indices().unwrap().len(), 36);
        assert!(buffer.indices().unwrap().iter().all(|i| (*i as usize) < 24));

        let half = Vec3::new(1.0, 2.0, 3.0);
        for (vertex, normal) in vertices.iter().zip(normals.iter()) {
            assert!((vertex.dot(*normal) - half.dot(normal.abs())).abs() < 1.0e-6);
            assert!(vertex.abs().cmple(half + 1.0e-6).all());
        }
    }

    #[test]
    fn triangles_face_outward() {
        let cuboid = Cuboid::new(1.0, 1.0, 1.0);
        let buffer = cuboid.buffer();
        let vertices = buffer.vertices().unwrap();
        let normals = buffer.normals().unwrap();

        for triangle in buffer.indices().unwrap().chunks(3) {
            let [a, b, c] = [
                vertices[triangle[0] as usize],
                vertices[triangle[1] as usize],
                vertices[triangle[2] as usize],
            ];
            let face_normal = (b - a).cross(c - a).normalize();
            assert!(face_normal.dot(normals[triangle[0] as usize]) > 0.99);
        }
    }
}
