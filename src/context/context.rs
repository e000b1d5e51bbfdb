//! The explicit rendering context.
//!
//! Every upload and draw goes through a `&mut GraphicsContext`. It owns the GPU device,
//! remembers which program, vertex array, framebuffer and textures are bound, skips
//! redundant binds, and lets callers save and restore the binding state around
//! operations that need to rebind temporarily.

use crate::context::device::{
    AttachmentKind, BufferId, BufferKind, ClearFlags, DrawCall, FramebufferId, GpuDevice,
    ProgramDescriptor, ProgramId, TextureDescriptor, TextureId, VertexArrayId, Viewport,
};
use crate::context::HeadlessDevice;
use crate::error::{GraphicsError, Result};
use crate::resource::{UniformValue, VertexAttribute};

/// Number of texture units materials can bind to.
pub const MAX_TEXTURE_UNITS: usize = 3;

/// The binding state of a [`GraphicsContext`] at some point in time.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct Bindings {
    pub program: Option<ProgramId>,
    pub vertex_array: Option<VertexArrayId>,
    pub framebuffer: Option<FramebufferId>,
    pub textures: [Option<TextureId>; MAX_TEXTURE_UNITS],
}

/// Owner of the GPU device and of the current binding state.
pub struct GraphicsContext {
    device: Box<dyn GpuDevice>,
    bindings: Bindings,
    viewport: Viewport,
    elided_binds: usize,
}

impl GraphicsContext {
    /// Wraps a device. Nothing is bound initially.
    pub fn new<D: GpuDevice>(device: D) -> Self {
        GraphicsContext {
            device: Box::new(device),
            bindings: Bindings::default(),
            viewport: Viewport::default(),
            elided_binds: 0,
        }
    }

    /// A context backed by a [`HeadlessDevice`].
    pub fn headless() -> Self {
        Self::new(HeadlessDevice::new())
    }

    pub fn device(&self) -> &dyn GpuDevice {
        &*self.device
    }

    pub fn device_mut(&mut self) -> &mut dyn GpuDevice {
        &mut *self.device
    }

    /// The device as its concrete type.
    pub fn downcast_device<D: GpuDevice>(&self) -> Option<&D> {
        self.device.as_any().downcast_ref::<D>()
    }

    /// The device as its concrete type.
    pub fn downcast_device_mut<D: GpuDevice>(&mut self) -> Option<&mut D> {
        self.device.as_any_mut().downcast_mut::<D>()
    }

    /// The current binding state.
    pub fn bindings(&self) -> Bindings {
        self.bindings
    }

    pub fn bound_program(&self) -> Option<ProgramId> {
        self.bindings.program
    }

    pub fn bound_vertex_array(&self) -> Option<VertexArrayId> {
        self.bindings.vertex_array
    }

    pub fn bound_framebuffer(&self) -> Option<FramebufferId> {
        self.bindings.framebuffer
    }

    pub fn bound_texture(&self, unit: u32) -> Option<TextureId> {
        self.bindings.textures.get(unit as usize).copied().flatten()
    }

    /// Number of bind requests skipped because the resource was already bound.
    pub fn elided_binds(&self) -> usize {
        self.elided_binds
    }

    /// Binds a program. Returns `false` if it was already bound.
    pub fn use_program(&mut self, program: Option<ProgramId>) -> bool {
        if self.bindings.program == program {
            self.elided_binds += 1;
            return false;
        }

        self.bindings.program = program;
        self.device.bind_program(program);
        true
    }

    /// Binds a vertex array. Returns `false` if it was already bound.
    pub fn bind_vertex_array(&mut self, vao: Option<VertexArrayId>) -> bool {
        if self.bindings.vertex_array == vao {
            self.elided_binds += 1;
            return false;
        }

        self.bindings.vertex_array = vao;
        self.device.bind_vertex_array(vao);
        true
    }

    /// Binds a texture on a unit. Returns `false` if it was already bound there.
    pub fn bind_texture(&mut self, unit: u32, texture: Option<TextureId>) -> bool {
        let Some(slot) = self.bindings.textures.get_mut(unit as usize) else {
            log::warn!("Texture unit {} is out of range, ignoring the bind.", unit);
            return false;
        };

        if *slot == texture {
            self.elided_binds += 1;
            return false;
        }

        *slot = texture;
        self.device.bind_texture(unit, texture);
        true
    }

    /// Binds a framebuffer, `None` being the window surface. Returns `false` if already bound.
    pub fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>) -> bool {
        if self.bindings.framebuffer == framebuffer {
            self.elided_binds += 1;
            return false;
        }

        self.bindings.framebuffer = framebuffer;
        self.device.bind_framebuffer(framebuffer);
        true
    }

    /// Rebinds everything recorded in `bindings`.
    pub fn restore(&mut self, bindings: Bindings) {
        let _ = self.use_program(bindings.program);
        let _ = self.bind_vertex_array(bindings.vertex_array);
        let _ = self.bind_framebuffer(bindings.framebuffer);
        for (unit, texture) in bindings.textures.iter().enumerate() {
            let _ = self.bind_texture(unit as u32, *texture);
        }
    }

    /// Runs `f` and restores the binding state that was current before it ran.
    pub fn with_saved_bindings<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        let saved = self.bindings;
        let result = f(self);
        self.restore(saved);
        result
    }

    /*
     * Resource creation.
     */
    pub fn create_vertex_array(&mut self) -> Result<VertexArrayId> {
        self.device.create_vertex_array()
    }

    pub fn create_buffer(&mut self, kind: BufferKind) -> Result<BufferId> {
        self.device.create_buffer(kind)
    }

    pub fn buffer_size(&self, buffer: BufferId) -> usize {
        self.device.buffer_size(buffer)
    }

    pub fn upload_buffer(&mut self, buffer: BufferId, data: &[u8]) -> Result<()> {
        self.device.upload_buffer(buffer, data)
    }

    pub fn configure_attribute(
        &mut self,
        vao: VertexArrayId,
        buffer: BufferId,
        attribute: &VertexAttribute,
    ) -> Result<()> {
        self.device.configure_attribute(vao, buffer, attribute)
    }

    pub fn set_index_buffer(&mut self, vao: VertexArrayId, buffer: BufferId) -> Result<()> {
        self.device.set_index_buffer(vao, buffer)
    }

    pub fn create_program(&mut self, desc: &ProgramDescriptor) -> Result<ProgramId> {
        self.device.create_program(desc)
    }

    pub fn set_uniform(
        &mut self,
        program: ProgramId,
        index: usize,
        value: UniformValue,
    ) -> Result<()> {
        self.device.set_uniform(program, index, value)
    }

    pub fn create_texture(&mut self, desc: &TextureDescriptor, pixels: &[u8]) -> Result<TextureId> {
        self.device.create_texture(desc, pixels)
    }

    pub fn create_framebuffer(&mut self, width: u32, height: u32) -> Result<FramebufferId> {
        self.device.create_framebuffer(width, height)
    }

    /// Attaches a texture to a framebuffer.
    ///
    /// The framebuffer is bound only for the duration of the call.
    pub fn attach(
        &mut self,
        framebuffer: FramebufferId,
        kind: AttachmentKind,
        texture: TextureId,
    ) -> Result<()> {
        self.with_saved_bindings(|ctx| {
            let _ = ctx.bind_framebuffer(Some(framebuffer));
            ctx.device.attach(framebuffer, kind, texture)
        })
    }

    /*
     * Resource destruction. Deleting a bound resource unbinds it.
     */
    pub fn delete_vertex_array(&mut self, vao: VertexArrayId) {
        if self.bindings.vertex_array == Some(vao) {
            let _ = self.bind_vertex_array(None);
        }
        self.device.delete_vertex_array(vao);
    }

    pub fn delete_buffer(&mut self, buffer: BufferId) {
        self.device.delete_buffer(buffer);
    }

    pub fn delete_program(&mut self, program: ProgramId) {
        if self.bindings.program == Some(program) {
            let _ = self.use_program(None);
        }
        self.device.delete_program(program);
    }

    pub fn delete_texture(&mut self, texture: TextureId) {
        for unit in 0..MAX_TEXTURE_UNITS {
            if self.bindings.textures[unit] == Some(texture) {
                let _ = self.bind_texture(unit as u32, None);
            }
        }
        self.device.delete_texture(texture);
    }

    pub fn delete_framebuffer(&mut self, framebuffer: FramebufferId) {
        if self.bindings.framebuffer == Some(framebuffer) {
            let _ = self.bind_framebuffer(None);
        }
        self.device.delete_framebuffer(framebuffer);
    }

    /*
     * Drawing.
     */
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.device.set_viewport(viewport);
    }

    pub fn set_point_size(&mut self, size: f32) {
        self.device.set_point_size(size);
    }

    pub fn clear(&mut self, color: [f32; 4], flags: ClearFlags) {
        self.device.clear(color, flags);
    }

    /// Issues a draw with the current bindings.
    ///
    /// Fails without touching the device if no program or no vertex array is bound.
    pub fn draw(&mut self, call: DrawCall) -> Result<()> {
        if self.bindings.program.is_none() {
            return Err(GraphicsError::UnknownHandle("bound program"));
        }

        if self.bindings.vertex_array.is_none() {
            return Err(GraphicsError::NotInitialized);
        }

        self.device.draw(call)
    }

    pub fn begin_frame(&mut self) -> Result<()> {
        self.device.begin_frame()
    }

    pub fn end_frame(&mut self) -> Result<()> {
        self.device.end_frame()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::PrimitiveType;

    #[test]
    fn redundant_binds_are_elided() {
        let mut ctx = GraphicsContext::headless();
        let vao = ctx.create_vertex_array().unwrap();

        assert!(ctx.bind_vertex_array(Some(vao)));
        assert!(!ctx.bind_vertex_array(Some(vao)));
        assert_eq!(ctx.elided_binds(), 1);
        assert_eq!(ctx.bound_vertex_array(), Some(vao));
    }

    #[test]
    fn saved_bindings_are_restored() {
        let mut ctx = GraphicsContext::headless();
        let a = ctx.create_vertex_array().unwrap();
        let b = ctx.create_vertex_array().unwrap();
        let _ = ctx.bind_vertex_array(Some(a));

        let inner = ctx.with_saved_bindings(|ctx| {
            let _ = ctx.bind_vertex_array(Some(b));
            ctx.bound_vertex_array()
        });

        assert_eq!(inner, Some(b));
        assert_eq!(ctx.bound_vertex_array(), Some(a));
    }

    #[test]
    fn attaching_does_not_leak_the_framebuffer_binding() {
        let mut ctx = GraphicsContext::headless();
        let fb = ctx.create_framebuffer(4, 4).unwrap();
        let tex = ctx
            .create_texture(&crate::resource::Texture::default().descriptor(), &[])
            .unwrap();
        ctx.attach(fb, AttachmentKind::Color, tex).unwrap();
        assert_eq!(ctx.bound_framebuffer(), None);
    }

    #[test]
    fn deleting_a_bound_resource_unbinds_it() {
        let mut ctx = GraphicsContext::headless();
        let vao = ctx.create_vertex_array().unwrap();
        let _ = ctx.bind_vertex_array(Some(vao));
        ctx.delete_vertex_array(vao);
        assert_eq!(ctx.bound_vertex_array(), None);
    }

    #[test]
    fn draw_without_bindings_fails() {
        let mut ctx = GraphicsContext::headless();
        let call = DrawCall {
            primitive: PrimitiveType::Triangles,
            first: 0,
            count: 3,
            indexed: false,
        };
        assert!(ctx.draw(call).is_err());
        assert!(ctx
            .downcast_device::<HeadlessDevice>()
            .unwrap()
            .draw_calls()
            .is_empty());
    }

    #[test]
    fn out_of_range_texture_unit_is_ignored() {
        let mut ctx = GraphicsContext::headless();
        assert!(!ctx.bind_texture(MAX_TEXTURE_UNITS as u32, None));
    }
}
