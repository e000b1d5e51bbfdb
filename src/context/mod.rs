//! The rendering context and the GPU devices it drives.

pub use self::context::{Bindings, GraphicsContext, MAX_TEXTURE_UNITS};
pub use self::device::{
    AttachmentKind, BufferId, BufferKind, ClearFlags, DrawCall, FramebufferId, GpuDevice,
    ProgramDescriptor, ProgramId, ShaderStage, TextureDescriptor, TextureId, TextureUsage,
    VertexArrayId, Viewport,
};
pub use self::headless::{DeviceCall, HeadlessDevice};
pub use self::wgpu_device::WgpuDevice;

mod context;
mod device;
mod dynamic_buffer;
mod headless;
mod wgpu_device;
