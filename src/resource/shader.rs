//! Shader programs, their declared interface and typed uniform values.

use crate::context::{GraphicsContext, ProgramDescriptor, ProgramId, ShaderStage};
use crate::error::{GraphicsError, Result};
use glamx::{Mat4, Vec3, Vec4};
use std::path::Path;

/// Scalar type of a vertex attribute component.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum AttributeType {
    Float,
    UnsignedInt,
}

impl AttributeType {
    /// Size in bytes of one component.
    pub fn size(self) -> u32 {
        4
    }
}

/// Describes how one vertex attribute is read from its buffer.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    pub name: String,
    pub location: u32,
    /// Number of components (1 to 4).
    pub size: u32,
    pub data_type: AttributeType,
    pub normalized: bool,
    /// Distance in bytes between two consecutive elements. Zero means tightly packed.
    pub stride: u32,
    pub offset: u32,
}

impl VertexAttribute {
    /// A tightly packed float attribute.
    pub fn float(name: &str, location: u32, size: u32) -> Self {
        VertexAttribute {
            name: name.to_string(),
            location,
            size,
            data_type: AttributeType::Float,
            normalized: false,
            stride: 0,
            offset: 0,
        }
    }

    /// The stride, resolving the tightly packed case.
    pub fn effective_stride(&self) -> u32 {
        if self.stride == 0 {
            self.size * self.data_type.size()
        } else {
            self.stride
        }
    }
}

/// Type of a uniform declared by a program.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum UniformKind {
    Bool,
    Int,
    Float,
    Vec3,
    Vec4,
    Mat4,
}

impl UniformKind {
    /// Alignment and size in a uniform block.
    pub fn align_and_size(self) -> (u32, u32) {
        match self {
            UniformKind::Bool | UniformKind::Int | UniformKind::Float => (4, 4),
            UniformKind::Vec3 => (16, 12),
            UniformKind::Vec4 => (16, 16),
            UniformKind::Mat4 => (16, 64),
        }
    }

    fn name(self) -> &'static str {
        match self {
            UniformKind::Bool => "bool",
            UniformKind::Int => "int",
            UniformKind::Float => "float",
            UniformKind::Vec3 => "vec3",
            UniformKind::Vec4 => "vec4",
            UniformKind::Mat4 => "mat4",
        }
    }
}

/// A value written to a uniform.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum UniformValue {
    Bool(bool),
    Int(i32),
    Float(f32),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat4(Mat4),
}

impl UniformValue {
    pub fn kind(&self) -> UniformKind {
        match self {
            UniformValue::Bool(_) => UniformKind::Bool,
            UniformValue::Int(_) => UniformKind::Int,
            UniformValue::Float(_) => UniformKind::Float,
            UniformValue::Vec3(_) => UniformKind::Vec3,
            UniformValue::Vec4(_) => UniformKind::Vec4,
            UniformValue::Mat4(_) => UniformKind::Mat4,
        }
    }

    /// Writes the value at the start of `out` with the uniform block encoding.
    ///
    /// Booleans are stored as 32-bit integers.
    pub fn write_to(&self, out: &mut [u8]) {
        match self {
            UniformValue::Bool(b) => out[..4].copy_from_slice(&(*b as u32).to_ne_bytes()),
            UniformValue::Int(i) => out[..4].copy_from_slice(&i.to_ne_bytes()),
            UniformValue::Float(f) => out[..4].copy_from_slice(&f.to_ne_bytes()),
            UniformValue::Vec3(v) => out[..12].copy_from_slice(bytemuck::cast_slice(&v.to_array())),
            UniformValue::Vec4(v) => out[..16].copy_from_slice(bytemuck::cast_slice(&v.to_array())),
            UniformValue::Mat4(m) => {
                out[..64].copy_from_slice(bytemuck::cast_slice(&m.to_cols_array()))
            }
        }
    }
}

macro_rules! uniform_from {
    ($($t:ty => $variant:ident),*) => {$(
        impl From<$t> for UniformValue {
            fn from(v: $t) -> Self {
                UniformValue::$variant(v)
            }
        }
    )*};
}

uniform_from!(bool => Bool, i32 => Int, f32 => Float, Vec3 => Vec3, Vec4 => Vec4, Mat4 => Mat4);

/// A uniform declared by a program.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct UniformDecl {
    pub name: String,
    pub kind: UniformKind,
}

/// The vertex inputs and uniforms a program's stages agree on.
///
/// Uniforms are laid out in declaration order in a single uniform block following the
/// WGSL alignment rules, so shader sources must declare the same fields in the same order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ProgramLayout {
    pub attributes: Vec<VertexAttribute>,
    pub uniforms: Vec<UniformDecl>,
}

impl ProgramLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a tightly packed float attribute at the next location.
    pub fn with_attribute(mut self, name: &str, size: u32) -> Self {
        let location = self.attributes.len() as u32;
        self.attributes
            .push(VertexAttribute::float(name, location, size));
        self
    }

    /// Declares a uniform after the previous ones.
    pub fn with_uniform(mut self, name: &str, kind: UniformKind) -> Self {
        self.uniforms.push(UniformDecl {
            name: name.to_string(),
            kind,
        });
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&VertexAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn uniform_index(&self, name: &str) -> Option<usize> {
        self.uniforms.iter().position(|u| u.name == name)
    }

    /// Byte offset of every uniform, and the total block size rounded to 16 bytes.
    pub fn uniform_offsets(&self) -> (Vec<u32>, u32) {
        let mut offsets = Vec::with_capacity(self.uniforms.len());
        let mut cursor = 0u32;

        for uniform in &self.uniforms {
            let (align, size) = uniform.kind.align_and_size();
            cursor = cursor.div_ceil(align) * align;
            offsets.push(cursor);
            cursor += size;
        }

        (offsets, cursor.div_ceil(16).max(1) * 16)
    }
}

/// A GPU program built from one vertex and one fragment stage.
pub struct ShaderProgram {
    label: String,
    stages: Vec<(ShaderStage, String)>,
    layout: ProgramLayout,
    id: Option<ProgramId>,
}

impl ShaderProgram {
    /// Creates an empty, unlinked program with the given interface.
    pub fn new(label: &str, layout: ProgramLayout) -> Self {
        ShaderProgram {
            label: label.to_string(),
            stages: Vec::new(),
            layout,
            id: None,
        }
    }

    /// Reads a stage source from disk.
    ///
    /// Fails if the path does not exist or is a directory.
    pub fn load_shader(path: &Path) -> Result<String> {
        if !path.is_file() {
            return Err(GraphicsError::ShaderNotFound(path.to_path_buf()));
        }

        std::fs::read_to_string(path).map_err(|source| GraphicsError::ShaderIo {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Attaches a stage, replacing any previous source for the same stage.
    pub fn attach(&mut self, stage: ShaderStage, source: String) {
        self.stages.retain(|(s, _)| *s != stage);
        self.stages.push((stage, source));
    }

    /// Compiles the attached stages and links them into a program.
    pub fn compile_and_link(&mut self, ctx: &mut GraphicsContext) -> Result<()> {
        for stage in [ShaderStage::Vertex, ShaderStage::Fragment].iter() {
            if !self.stages.iter().any(|(s, _)| s == stage) {
                return Err(GraphicsError::MissingStage(self.label.clone()));
            }
        }

        if let Some(old) = self.id.take() {
            ctx.delete_program(old);
        }

        let id = ctx.create_program(&ProgramDescriptor {
            label: &self.label,
            stages: &self.stages,
            layout: &self.layout,
        })?;

        log::debug!("Linked shader program `{}`.", self.label);
        self.id = Some(id);
        Ok(())
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn id(&self) -> Option<ProgramId> {
        self.id
    }

    pub fn is_linked(&self) -> bool {
        self.id.is_some()
    }

    pub fn layout(&self) -> &ProgramLayout {
        &self.layout
    }

    /// Vertex inputs of the program.
    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.layout.attributes
    }

    /// Uniforms of the program.
    pub fn uniforms(&self) -> &[UniformDecl] {
        &self.layout.uniforms
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.layout.attribute(name).is_some()
    }

    pub fn has_uniform(&self, name: &str) -> bool {
        self.layout.uniform_index(name).is_some()
    }

    pub fn attribute_location(&self, name: &str) -> Option<u32> {
        self.layout.attribute(name).map(|a| a.location)
    }

    /// Binds this program on the context.
    pub fn use_program(&self, ctx: &mut GraphicsContext) -> Result<()> {
        let id = self
            .id
            .ok_or_else(|| GraphicsError::ProgramNotLinked(self.label.clone()))?;
        let _ = ctx.use_program(Some(id));
        Ok(())
    }

    /// Sets a uniform.
    ///
    /// Names the program does not declare are ignored, like inactive uniforms on a
    /// classic driver. A value of the wrong type is an error.
    pub fn set(
        &self,
        ctx: &mut GraphicsContext,
        name: &str,
        value: impl Into<UniformValue>,
    ) -> Result<()> {
        let id = self
            .id
            .ok_or_else(|| GraphicsError::ProgramNotLinked(self.label.clone()))?;
        let value = value.into();

        let Some(index) = self.layout.uniform_index(name) else {
            log::trace!("`{}` has no uniform named `{}`.", self.label, name);
            return Ok(());
        };

        let expected = self.layout.uniforms[index].kind;
        if value.kind() != expected {
            return Err(GraphicsError::UniformType {
                name: name.to_string(),
                expected: expected.name(),
            });
        }

        ctx.set_uniform(id, index, value)
    }

    /// Deletes the GPU program. The sources stay attached so the program can be relinked.
    pub fn release(&mut self, ctx: &mut GraphicsContext) {
        if let Some(id) = self.id.take() {
            ctx.delete_program(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::HeadlessDevice;

    fn layout() -> ProgramLayout {
        ProgramLayout::new()
            .with_attribute("position", 3)
            .with_attribute("normal", 3)
            .with_uniform("model", UniformKind::Mat4)
            .with_uniform("eyePoint", UniformKind::Vec3)
            .with_uniform("wireframe", UniformKind::Bool)
            .with_uniform("color", UniformKind::Vec4)
    }

    fn linked(ctx: &mut GraphicsContext) -> ShaderProgram {
        let mut program = ShaderProgram::new("test", layout());
        program.attach(ShaderStage::Vertex, "vs".to_string());
        program.attach(ShaderStage::Fragment, "fs".to_string());
        program.compile_and_link(ctx).unwrap();
        program
    }

    #[test]
    fn uniform_offsets_follow_block_alignment() {
        let (offsets, size) = layout().uniform_offsets();
        assert_eq!(offsets, vec![0, 64, 76, 80]);
        assert_eq!(size, 96);
    }

    #[test]
    fn setting_before_link_fails() {
        let mut ctx = GraphicsContext::headless();
        let program = ShaderProgram::new("test", layout());
        assert!(matches!(
            program.set(&mut ctx, "wireframe", true),
            Err(GraphicsError::ProgramNotLinked(_))
        ));
    }

    #[test]
    fn link_requires_both_stages() {
        let mut ctx = GraphicsContext::headless();
        let mut program = ShaderProgram::new("test", layout());
        program.attach(ShaderStage::Vertex, "vs".to_string());
        assert!(matches!(
            program.compile_and_link(&mut ctx),
            Err(GraphicsError::MissingStage(_))
        ));
        assert!(!program.is_linked());
    }

    #[test]
    fn uniforms_reach_the_device() {
        let mut ctx = GraphicsContext::headless();
        let program = linked(&mut ctx);
        program.set(&mut ctx, "eyePoint", Vec3::X).unwrap();
        program.set(&mut ctx, "unknown", 1.0f32).unwrap();

        let device = ctx.downcast_device::<HeadlessDevice>().unwrap();
        let id = program.id().unwrap();
        assert_eq!(
            device.uniform(id, "eyePoint"),
            Some(UniformValue::Vec3(Vec3::X))
        );
        assert_eq!(device.uniform(id, "unknown"), None);
    }

    #[test]
    fn mistyped_uniform_is_rejected() {
        let mut ctx = GraphicsContext::headless();
        let program = linked(&mut ctx);
        assert!(matches!(
            program.set(&mut ctx, "wireframe", 1.0f32),
            Err(GraphicsError::UniformType { .. })
        ));
    }

    #[test]
    fn reflection_queries() {
        let mut ctx = GraphicsContext::headless();
        let program = linked(&mut ctx);
        assert!(program.has_attribute("normal"));
        assert!(!program.has_attribute("texel"));
        assert_eq!(program.attribute_location("normal"), Some(1));
        assert!(program.has_uniform("model"));
    }

    #[test]
    fn missing_or_directory_paths_are_not_found() {
        let dir = std::env::temp_dir();
        assert!(matches!(
            ShaderProgram::load_shader(&dir),
            Err(GraphicsError::ShaderNotFound(_))
        ));
        assert!(matches!(
            ShaderProgram::load_shader(&dir.join("definitely-missing.wgsl")),
            Err(GraphicsError::ShaderNotFound(_))
        ));
    }
}
