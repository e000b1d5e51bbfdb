//! The low-level GPU device abstraction driven by the [`GraphicsContext`](crate::context::GraphicsContext).
//!
//! Resources are named by small integer handles, in the manner of a classic
//! binding-based graphics API. The real implementation is
//! [`WgpuDevice`](crate::context::WgpuDevice); [`HeadlessDevice`](crate::context::HeadlessDevice)
//! records every call and is used where no GPU is available.

use crate::error::Result;
use crate::resource::{
    PixelFormat, PrimitiveType, ProgramLayout, TextureFilter, TextureWrap, UniformValue,
    VertexAttribute,
};
use std::any::Any;

macro_rules! gpu_handle {
    ($($(#[$meta:meta])* $name:ident;)*) => {$(
        $(#[$meta])*
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);
    )*};
}

gpu_handle! {
    /// Handle of a vertex array object: the attribute and index bindings of one geometry.
    VertexArrayId;
    /// Handle of a GPU buffer.
    BufferId;
    /// Handle of a linked shader program.
    ProgramId;
    /// Handle of a GPU texture.
    TextureId;
    /// Handle of an offscreen framebuffer.
    FramebufferId;
}

/// What a buffer is bound as.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BufferKind {
    /// Per-vertex attribute data.
    Array,
    /// 32-bit indices.
    ElementArray,
}

/// A shader stage.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    /// Entry point every stage source must define.
    pub fn entry_point(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vs_main",
            ShaderStage::Fragment => "fs_main",
        }
    }
}

/// Everything the device needs to build a program.
#[derive(Clone, Debug)]
pub struct ProgramDescriptor<'a> {
    pub label: &'a str,
    pub stages: &'a [(ShaderStage, String)],
    pub layout: &'a ProgramLayout,
}

/// What a texture is allocated for.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum TextureUsage {
    /// Sampled by shaders and usable as a color attachment.
    #[default]
    Sampled,
    /// Depth attachment of a framebuffer.
    Depth,
    /// Combined depth and stencil attachment of a framebuffer.
    DepthStencil,
}

/// Everything the device needs to allocate a texture.
#[derive(Clone, Debug)]
pub struct TextureDescriptor {
    pub usage: TextureUsage,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub min_filter: TextureFilter,
    pub mag_filter: TextureFilter,
    pub wrap_s: TextureWrap,
    pub wrap_t: TextureWrap,
    pub border_color: [f32; 4],
    pub mipmap: bool,
}

/// Kind of attachment of a framebuffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum AttachmentKind {
    Color,
    Depth,
    Stencil,
    DepthStencil,
}

bitflags! {
    /// Which planes of the bound framebuffer a clear touches.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct ClearFlags: u8 {
        const COLOR = 0b001;
        const DEPTH = 0b010;
        const STENCIL = 0b100;
    }
}

/// A viewport rectangle in pixels.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// A viewport covering `width x height` pixels from the origin.
    pub fn sized(width: u32, height: u32) -> Self {
        Viewport {
            x: 0,
            y: 0,
            width,
            height,
        }
    }
}

/// A draw command issued against the currently bound program, vertex array and textures.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DrawCall {
    pub primitive: PrimitiveType,
    pub first: u32,
    pub count: u32,
    pub indexed: bool,
}

/// Operations a GPU backend must provide.
///
/// All binding state is owned by the caller's [`GraphicsContext`](crate::context::GraphicsContext):
/// the device only mirrors what the context binds, and `draw` always uses the
/// most recently bound program, vertex array, textures and framebuffer.
pub trait GpuDevice: Any {
    fn create_vertex_array(&mut self) -> Result<VertexArrayId>;
    fn create_buffer(&mut self, kind: BufferKind) -> Result<BufferId>;
    /// Size in bytes of the data last uploaded to `buffer`.
    fn buffer_size(&self, buffer: BufferId) -> usize;
    fn upload_buffer(&mut self, buffer: BufferId, data: &[u8]) -> Result<()>;
    /// Binds `buffer` as the source of `attribute` in `vao`.
    fn configure_attribute(
        &mut self,
        vao: VertexArrayId,
        buffer: BufferId,
        attribute: &VertexAttribute,
    ) -> Result<()>;
    fn set_index_buffer(&mut self, vao: VertexArrayId, buffer: BufferId) -> Result<()>;

    fn create_program(&mut self, desc: &ProgramDescriptor) -> Result<ProgramId>;
    /// Writes the uniform at position `index` of the program layout.
    fn set_uniform(&mut self, program: ProgramId, index: usize, value: UniformValue)
        -> Result<()>;

    fn create_texture(&mut self, desc: &TextureDescriptor, pixels: &[u8]) -> Result<TextureId>;
    fn create_framebuffer(&mut self, width: u32, height: u32) -> Result<FramebufferId>;
    fn attach(
        &mut self,
        framebuffer: FramebufferId,
        kind: AttachmentKind,
        texture: TextureId,
    ) -> Result<()>;

    fn bind_program(&mut self, program: Option<ProgramId>);
    fn bind_vertex_array(&mut self, vao: Option<VertexArrayId>);
    fn bind_texture(&mut self, unit: u32, texture: Option<TextureId>);
    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>);

    fn set_viewport(&mut self, viewport: Viewport);
    fn set_point_size(&mut self, size: f32);
    fn clear(&mut self, color: [f32; 4], flags: ClearFlags);
    fn draw(&mut self, call: DrawCall) -> Result<()>;

    /// Starts recording a frame.
    fn begin_frame(&mut self) -> Result<()>;
    /// Submits everything recorded since `begin_frame`.
    fn end_frame(&mut self) -> Result<()>;

    fn delete_vertex_array(&mut self, vao: VertexArrayId);
    fn delete_buffer(&mut self, buffer: BufferId);
    fn delete_program(&mut self, program: ProgramId);
    fn delete_texture(&mut self, texture: TextureId);
    fn delete_framebuffer(&mut self, framebuffer: FramebufferId);

    /// Returns self as Any for downcasting.
    fn as_any(&self) -> &dyn Any;
    /// Returns self as mutable Any for downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}
