//! The built-in shader programs and their interfaces.

use crate::context::{GraphicsContext, ShaderStage};
use crate::error::Result;
use crate::light::MAX_LIGHTS;
use crate::resource::{ProgramLayout, ShaderProgram, UniformKind};
use std::path::Path;

pub const LIT_VERTEX_SHADER: &str = "lit.vert.wgsl";
pub const LIT_FRAGMENT_SHADER: &str = "lit.frag.wgsl";
pub const SOLID_VERTEX_SHADER: &str = "solid.vert.wgsl";
pub const SOLID_FRAGMENT_SHADER: &str = "solid.frag.wgsl";

/// Interface of the lit program shared by every Phong-style material.
///
/// The uniform order matches the `Uniforms` struct of `lit.*.wgsl`.
pub fn lit_layout() -> ProgramLayout {
    let mut layout = ProgramLayout::new()
        .with_attribute("position", 3)
        .with_attribute("normal", 3)
        .with_attribute("color", 4)
        .with_attribute("texel", 2)
        .with_uniform("model", UniformKind::Mat4)
        .with_uniform("viewProjection", UniformKind::Mat4)
        .with_uniform("eyePoint", UniformKind::Vec3)
        .with_uniform("wireframe", UniformKind::Bool)
        .with_uniform("material.ambientColor", UniformKind::Vec3)
        .with_uniform("material.ambientIntensity", UniformKind::Float)
        .with_uniform("material.diffuseColor", UniformKind::Vec3)
        .with_uniform("material.diffuseIntensity", UniformKind::Float)
        .with_uniform("material.specularColor", UniformKind::Vec3)
        .with_uniform("material.specularIntensity", UniformKind::Float)
        .with_uniform("material.emissiveIntensity", UniformKind::Float)
        .with_uniform("material.shininess", UniformKind::Float)
        .with_uniform("material.hasDiffuse", UniformKind::Bool)
        .with_uniform("material.hasEmissive", UniformKind::Bool)
        .with_uniform("material.hasSpecular", UniformKind::Bool)
        .with_uniform("material.diffuseMap", UniformKind::Int)
        .with_uniform("material.emissiveMap", UniformKind::Int)
        .with_uniform("material.specularMap", UniformKind::Int)
        .with_uniform("includeAmbient", UniformKind::Bool)
        .with_uniform("includeDiffuse", UniformKind::Bool)
        .with_uniform("includeSpecular", UniformKind::Bool)
        .with_uniform("ambientColor", UniformKind::Vec3)
        .with_uniform("ambientIntensity", UniformKind::Float);

    for i in 0..MAX_LIGHTS {
        layout = layout
            .with_uniform(&format!("directionalLights[{}].direction", i), UniformKind::Vec3)
            .with_uniform(&format!("directionalLights[{}].intensity", i), UniformKind::Float)
            .with_uniform(&format!("directionalLights[{}].color", i), UniformKind::Vec3)
            .with_uniform(&format!("directionalLights[{}].enabled", i), UniformKind::Bool);
    }

    layout
}

/// Interface of the flat-color program used by `Solid` materials and markers.
pub fn solid_layout() -> ProgramLayout {
    ProgramLayout::new()
        .with_attribute("position", 3)
        .with_uniform("model", UniformKind::Mat4)
        .with_uniform("viewProjection", UniformKind::Mat4)
        .with_uniform("shear", UniformKind::Mat4)
        .with_uniform("material.color", UniformKind::Vec3)
        .with_uniform("wireframe", UniformKind::Bool)
}

/// Loads `vertex` and `fragment` from `dir`, then compiles and links them.
pub fn load_program(
    ctx: &mut GraphicsContext,
    dir: &Path,
    label: &str,
    (vertex, fragment): (&str, &str),
    layout: ProgramLayout,
) -> Result<ShaderProgram> {
    let mut program = ShaderProgram::new(label, layout);
    program.attach(
        ShaderStage::Vertex,
        ShaderProgram::load_shader(&dir.join(vertex))?,
    );
    program.attach(
        ShaderStage::Fragment,
        ShaderProgram::load_shader(&dir.join(fragment))?,
    );
    program.compile_and_link(ctx)?;
    Ok(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GraphicsError;

    #[test]
    fn lit_uniforms_follow_the_wgsl_block() {
        let layout = lit_layout();
        let (offsets, size) = layout.uniform_offsets();
        let offset = |name: &str| offsets[layout.uniform_index(name).unwrap()];

        assert_eq!(offset("eyePoint"), 128);
        assert_eq!(offset("wireframe"), 140);
        assert_eq!(offset("material.specularMap"), 220);
        assert_eq!(offset("ambientColor"), 240);
        assert_eq!(offset("directionalLights[0].direction"), 256);
        assert_eq!(offset("directionalLights[0].enabled"), 284);
        assert_eq!(offset("directionalLights[1].direction"), 288);
        assert_eq!(size, 352);
    }

    #[test]
    fn solid_uniforms_follow_the_wgsl_block() {
        let layout = solid_layout();
        let (offsets, size) = layout.uniform_offsets();
        assert_eq!(offsets, vec![0, 64, 128, 192, 204]);
        assert_eq!(size, 208);
    }

    #[test]
    fn missing_sources_are_reported() {
        let mut ctx = GraphicsContext::headless();
        let dir = std::env::temp_dir().join("modelview-no-shaders");
        let result = load_program(
            &mut ctx,
            &dir,
            "lit",
            (LIT_VERTEX_SHADER, LIT_FRAGMENT_SHADER),
            lit_layout(),
        );
        match result {
            Err(GraphicsError::ShaderNotFound(path)) => {
                assert_eq!(path, dir.join(LIT_VERTEX_SHADER))
            }
            other => panic!("unexpected result: {:?}", other.map(|p| p.label().to_string())),
        }
    }
}
