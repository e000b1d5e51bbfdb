//! CPU-side vertex data of one drawable piece.

use glamx::{Vec2, Vec3, Vec4};

/// How the vertices of a piece of geometry are assembled.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveType {
    Points,
    Lines,
    LineLoop,
    LineStrip,
    #[default]
    Triangles,
    TriangleStrip,
    TriangleFan,
}

/// Per-vertex attributes and an optional index list.
///
/// Every attribute list is independently present (non-empty) or absent. Nothing is
/// validated on append: the draw path checks the cross-attribute invariants
/// (matching lengths, in-range indices) and refuses geometry that breaks them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VertexBuffer {
    vertices: Vec<Vec3>,
    normals: Vec<Vec3>,
    colors: Vec<Vec4>,
    texels: Vec<Vec2>,
    indices: Vec<u32>,
}

fn present<T>(v: &[T]) -> Option<&[T]> {
    if v.is_empty() {
        None
    } else {
        Some(v)
    }
}

impl VertexBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn add_vertex(&mut self, vertex: Vec3) {
        self.vertices.push(vertex);
    }

    #[inline]
    pub fn add_normal(&mut self, normal: Vec3) {
        self.normals.push(normal);
    }

    #[inline]
    pub fn add_color(&mut self, color: Vec4) {
        self.colors.push(color);
    }

    #[inline]
    pub fn add_texel(&mut self, texel: Vec2) {
        self.texels.push(texel);
    }

    #[inline]
    pub fn add_index(&mut self, index: u32) {
        self.indices.push(index);
    }

    /// The positions, or `None` if there are none.
    pub fn vertices(&self) -> Option<&[Vec3]> {
        present(&self.vertices)
    }

    /// The normals, or `None` if there are none.
    pub fn normals(&self) -> Option<&[Vec3]> {
        present(&self.normals)
    }

    /// The colors, or `None` if there are none.
    pub fn colors(&self) -> Option<&[Vec4]> {
        present(&self.colors)
    }

    /// The texture coordinates, or `None` if there are none.
    pub fn texels(&self) -> Option<&[Vec2]> {
        present(&self.texels)
    }

    /// The indices, or `None` if this buffer is not indexed.
    pub fn indices(&self) -> Option<&[u32]> {
        present(&self.indices)
    }

    pub fn vertices_mut(&mut self) -> &mut Vec<Vec3> {
        &mut self.vertices
    }

    pub fn normals_mut(&mut self) -> &mut Vec<Vec3> {
        &mut self.normals
    }

    pub fn colors_mut(&mut self) -> &mut Vec<Vec4> {
        &mut self.colors
    }

    pub fn texels_mut(&mut self) -> &mut Vec<Vec2> {
        &mut self.texels
    }

    pub fn indices_mut(&mut self) -> &mut Vec<u32> {
        &mut self.indices
    }

    /// Number of positions.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of triangles described by the index list.
    #[inline]
    pub fn face_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Removes every attribute and index.
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.normals.clear();
        self.colors.clear();
        self.texels.clear();
        self.indices.clear();
    }
}
