use crate::resource::{GpuGeometry, PrimitiveType, VertexBuffer};
use glamx::Vec3;

/// A single point, drawn as a small square marker.
#[derive(Clone, Debug)]
pub struct Point {
    buffer: VertexBuffer,
}

impl Point {
    pub fn new(position: Vec3) -> Self {
        let mut buffer = VertexBuffer::new();
        buffer.add_vertex(position);
        Point { buffer }
    }

    pub fn position(&self) -> Vec3 {
        self.buffer.vertices().map_or(Vec3::ZERO, |v| v[0])
    }

    pub fn buffer(&self) -> &VertexBuffer {
        &self.buffer
    }

    pub fn into_geometry(self) -> GpuGeometry {
        GpuGeometry::new(self.buffer, PrimitiveType::Points)
    }
}

/// A segment between two points.
#[derive(Clone, Debug)]
pub struct Line {
    buffer: VertexBuffer,
}

impl Line {
    pub fn new(start: Vec3, end: Vec3) -> Self {
        let mut buffer = VertexBuffer::new();
        buffer.add_vertex(start);
        buffer.add_vertex(end);
        Line { buffer }
    }

    pub fn start(&self) -> Vec3 {
        self.buffer.vertices().map_or(Vec3::ZERO, |v| v[0])
    }

    pub fn end(&self) -> Vec3 {
        self.buffer.vertices().map_or(Vec3::ZERO, |v| v[v.len() - 1])
    }

    pub fn buffer(&self) -> &VertexBuffer {
        &self.buffer
    }

    pub fn into_geometry(self) -> GpuGeometry {
        GpuGeometry::new(self.buffer, PrimitiveType::Lines)
    }
}
