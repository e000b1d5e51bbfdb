//! GPU resources: vertex data, shader programs, textures, materials and render targets.

pub use self::framebuffer::Framebuffer;
pub use self::geometry::{AttributeKind, GeometryHandles, GeometryState, GpuGeometry};
pub use self::material::{
    apply_material, Lambertian, Material, Phong, PhongTextured, ShadingModel, Solid,
    SolidPointLine, DIFFUSE_UNIT, EMISSIVE_UNIT, SPECULAR_UNIT,
};
pub use self::shader::{
    AttributeType, ProgramLayout, ShaderProgram, UniformDecl, UniformKind, UniformValue,
    VertexAttribute,
};
pub use self::shader_cache::ShaderCache;
pub use self::texture::{PixelFormat, Texture, TextureFilter, TextureTarget, TextureWrap};
pub use self::vertex_buffer::{PrimitiveType, VertexBuffer};
pub use crate::context::ShaderStage;

mod framebuffer;
mod geometry;
pub mod material;
mod shader;
mod shader_cache;
mod texture;
mod vertex_buffer;
