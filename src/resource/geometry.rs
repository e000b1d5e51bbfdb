//! Geometry whose vertex data lives both on the CPU and in GPU buffers.

use crate::context::{BufferId, BufferKind, GraphicsContext, VertexArrayId};
use crate::error::{GraphicsError, Result};
use crate::resource::{PrimitiveType, VertexBuffer};

/// The per-vertex attributes a [`VertexBuffer`] can hold.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    Position,
    Normal,
    Color,
    Texel,
}

impl AttributeKind {
    /// Every attribute kind, in buffer order.
    pub const ALL: [AttributeKind; 4] = [
        AttributeKind::Position,
        AttributeKind::Normal,
        AttributeKind::Color,
        AttributeKind::Texel,
    ];

    /// Name of the matching shader attribute.
    pub fn name(self) -> &'static str {
        match self {
            AttributeKind::Position => "position",
            AttributeKind::Normal => "normal",
            AttributeKind::Color => "color",
            AttributeKind::Texel => "texel",
        }
    }

    /// Number of `f32` components per vertex.
    pub fn components(self) -> u32 {
        match self {
            AttributeKind::Position | AttributeKind::Normal => 3,
            AttributeKind::Color => 4,
            AttributeKind::Texel => 2,
        }
    }
}

/// GPU objects owned by an initialized geometry.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GeometryHandles {
    pub vertex_array: VertexArrayId,
    pub positions: BufferId,
    pub normals: BufferId,
    pub colors: BufferId,
    pub texels: BufferId,
    pub indices: BufferId,
    /// Whether the vertex data has been copied to the buffers.
    pub uploaded: bool,
}

impl GeometryHandles {
    /// The buffer holding the given attribute.
    pub fn buffer(&self, kind: AttributeKind) -> BufferId {
        match kind {
            AttributeKind::Position => self.positions,
            AttributeKind::Normal => self.normals,
            AttributeKind::Color => self.colors,
            AttributeKind::Texel => self.texels,
        }
    }
}

/// Lifecycle of the GPU side of a geometry.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum GeometryState {
    #[default]
    Uninitialized,
    Initialized(GeometryHandles),
}

/// A vertex buffer, the primitive it is drawn as, and its GPU objects.
///
/// The GPU side is created once by [`GpuGeometry::initialize`] and freed by
/// [`GpuGeometry::release`]. Dropping an initialized geometry without releasing it
/// leaks its GPU objects until the device is destroyed.
#[derive(Clone, Debug, Default)]
pub struct GpuGeometry {
    buffer: VertexBuffer,
    primitive: PrimitiveType,
    state: GeometryState,
}

impl GpuGeometry {
    pub fn new(buffer: VertexBuffer, primitive: PrimitiveType) -> Self {
        GpuGeometry {
            buffer,
            primitive,
            state: GeometryState::Uninitialized,
        }
    }

    pub fn buffer(&self) -> &VertexBuffer {
        &self.buffer
    }

    /// Mutable access to the vertex data.
    ///
    /// Any change marks the geometry for re-upload on its next draw.
    pub fn buffer_mut(&mut self) -> &mut VertexBuffer {
        if let GeometryState::Initialized(handles) = &mut self.state {
            handles.uploaded = false;
        }
        &mut self.buffer
    }

    pub fn primitive(&self) -> PrimitiveType {
        self.primitive
    }

    pub fn set_primitive(&mut self, primitive: PrimitiveType) {
        self.primitive = primitive;
    }

    pub fn state(&self) -> &GeometryState {
        &self.state
    }

    pub fn is_initialized(&self) -> bool {
        matches!(self.state, GeometryState::Initialized(_))
    }

    pub fn is_uploaded(&self) -> bool {
        matches!(self.state, GeometryState::Initialized(h) if h.uploaded)
    }

    /// The GPU objects, once initialized.
    pub fn handles(&self) -> Option<&GeometryHandles> {
        match &self.state {
            GeometryState::Initialized(handles) => Some(handles),
            GeometryState::Uninitialized => None,
        }
    }

    /// Records that the vertex data now lives in the GPU buffers.
    pub fn mark_uploaded(&mut self) {
        if let GeometryState::Initialized(handles) = &mut self.state {
            handles.uploaded = true;
        }
    }

    /// Allocates the vertex array, one buffer per attribute kind and the index buffer.
    ///
    /// Fails with [`GraphicsError::AlreadyInitialized`] without allocating anything if
    /// this geometry already owns GPU objects.
    pub fn initialize(&mut self, ctx: &mut GraphicsContext) -> Result<()> {
        if self.is_initialized() {
            return Err(GraphicsError::AlreadyInitialized);
        }

        let vertex_array = ctx.create_vertex_array()?;
        let handles = GeometryHandles {
            vertex_array,
            positions: ctx.create_buffer(BufferKind::Array)?,
            normals: ctx.create_buffer(BufferKind::Array)?,
            colors: ctx.create_buffer(BufferKind::Array)?,
            texels: ctx.create_buffer(BufferKind::Array)?,
            indices: ctx.create_buffer(BufferKind::ElementArray)?,
            uploaded: false,
        };
        self.state = GeometryState::Initialized(handles);

        log::trace!(
            "Initialized geometry with {} vertices as {:?}.",
            self.buffer.vertex_count(),
            vertex_array
        );
        Ok(())
    }

    /// Frees the GPU objects. Does nothing if the geometry is not initialized.
    pub fn release(&mut self, ctx: &mut GraphicsContext) {
        if let GeometryState::Initialized(handles) = std::mem::take(&mut self.state) {
            for kind in AttributeKind::ALL.iter() {
                ctx.delete_buffer(handles.buffer(*kind));
            }
            ctx.delete_buffer(handles.indices);
            ctx.delete_vertex_array(handles.vertex_array);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::HeadlessDevice;
    use glamx::Vec3;

    fn triangle() -> GpuGeometry {
        let mut buffer = VertexBuffer::new();
        buffer.add_vertex(Vec3::ZERO);
        buffer.add_vertex(Vec3::X);
        buffer.add_vertex(Vec3::Y);
        GpuGeometry::new(buffer, PrimitiveType::Triangles)
    }

    #[test]
    fn initialize_allocates_one_array_and_five_buffers() {
        let mut ctx = GraphicsContext::headless();
        let mut geometry = triangle();
        geometry.initialize(&mut ctx).unwrap();

        assert!(geometry.is_initialized());
        assert!(!geometry.is_uploaded());
        let device = ctx.downcast_device::<HeadlessDevice>().unwrap();
        assert_eq!(device.live_vertex_arrays(), 1);
        assert_eq!(device.live_buffers(), 5);
    }

    #[test]
    fn second_initialize_fails_without_allocating() {
        let mut ctx = GraphicsContext::headless();
        let mut geometry = triangle();
        geometry.initialize(&mut ctx).unwrap();
        let handles = *geometry.handles().unwrap();

        assert!(matches!(
            geometry.initialize(&mut ctx),
            Err(GraphicsError::AlreadyInitialized)
        ));
        assert_eq!(geometry.handles(), Some(&handles));
        let device = ctx.downcast_device::<HeadlessDevice>().unwrap();
        assert_eq!(device.live_buffers(), 5);
    }

    #[test]
    fn release_frees_everything_once() {
        let mut ctx = GraphicsContext::headless();
        let mut geometry = triangle();
        geometry.initialize(&mut ctx).unwrap();
        geometry.release(&mut ctx);
        geometry.release(&mut ctx);

        assert!(!geometry.is_initialized());
        let device = ctx.downcast_device::<HeadlessDevice>().unwrap();
        assert_eq!(device.live_vertex_arrays(), 0);
        assert_eq!(device.live_buffers(), 0);
    }

    #[test]
    fn editing_vertices_requires_a_new_upload() {
        let mut ctx = GraphicsContext::headless();
        let mut geometry = triangle();
        geometry.initialize(&mut ctx).unwrap();
        geometry.mark_uploaded();
        assert!(geometry.is_uploaded());

        geometry.buffer_mut().add_vertex(Vec3::Z);
        assert!(!geometry.is_uploaded());
    }
}
