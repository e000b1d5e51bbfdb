//! Materials: the surface parameters uploaded to a shader program before a draw.
//!
//! A [`Material`] is a closed set of variants. Each variant maps to a
//! [`ShadingModel`], the key under which the [`ShaderCache`](crate::resource::ShaderCache)
//! stores the program able to render it, and [`apply_material`] writes the variant's
//! uniforms to that program.

use crate::context::GraphicsContext;
use crate::error::Result;
use crate::resource::{ShaderProgram, Texture};
use crate::settings::{merge_fields, Restorable};
use glamx::Vec3;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Texture unit of the diffuse map.
pub const DIFFUSE_UNIT: i32 = 0;
/// Texture unit of the emissive map.
pub const EMISSIVE_UNIT: i32 = 1;
/// Texture unit of the specular map.
pub const SPECULAR_UNIT: i32 = 2;

/// Key of the shader program a material is rendered with.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShadingModel {
    Lambertian,
    Phong,
    PhongTextured,
    Textured,
    Solid,
    SolidPointLine,
}

/// Diffuse-only shading.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lambertian {
    pub diffuse_color: Vec3,
    pub diffuse_intensity: f32,
    pub wireframe: bool,
}

impl Default for Lambertian {
    fn default() -> Self {
        Lambertian {
            diffuse_color: Vec3::ONE,
            diffuse_intensity: 1.0,
            wireframe: false,
        }
    }
}

/// Ambient, diffuse and specular shading with flat colors.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Phong {
    pub ambient_color: Vec3,
    pub ambient_intensity: f32,
    pub diffuse_color: Vec3,
    pub diffuse_intensity: f32,
    pub specular_color: Vec3,
    pub specular_intensity: f32,
    pub shininess: f32,
    pub wireframe: bool,
}

impl Default for Phong {
    fn default() -> Self {
        Phong {
            ambient_color: Vec3::ONE,
            ambient_intensity: 1.0,
            diffuse_color: Vec3::ONE,
            diffuse_intensity: 1.0,
            specular_color: Vec3::ONE,
            specular_intensity: 1.0,
            shininess: 32.0,
            wireframe: false,
        }
    }
}

/// Phong shading whose colors come from texture maps.
///
/// The maps are not persisted: only the scalar parameters are saved.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhongTextured {
    #[serde(skip)]
    pub diffuse_map: Option<Texture>,
    #[serde(skip)]
    pub emissive_map: Option<Texture>,
    #[serde(skip)]
    pub specular_map: Option<Texture>,
    pub shininess: f32,
    pub ambient_intensity: f32,
    pub diffuse_intensity: f32,
    pub emissive_intensity: f32,
    pub specular_intensity: f32,
    #[serde(skip)]
    pub wireframe: bool,
}

impl Default for PhongTextured {
    fn default() -> Self {
        PhongTextured {
            diffuse_map: None,
            emissive_map: None,
            specular_map: None,
            shininess: 28.0,
            ambient_intensity: 1.0,
            diffuse_intensity: 1.0,
            emissive_intensity: 1.0,
            specular_intensity: 1.0,
            wireframe: false,
        }
    }
}

impl PhongTextured {
    /// The maps with their texture units.
    pub fn maps(&self) -> [(i32, Option<&Texture>); 3] {
        [
            (DIFFUSE_UNIT, self.diffuse_map.as_ref()),
            (EMISSIVE_UNIT, self.emissive_map.as_ref()),
            (SPECULAR_UNIT, self.specular_map.as_ref()),
        ]
    }

    fn maps_mut(&mut self) -> [&mut Option<Texture>; 3] {
        [
            &mut self.diffuse_map,
            &mut self.emissive_map,
            &mut self.specular_map,
        ]
    }
}

/// A single flat color, unlit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Solid {
    pub color: Vec3,
    pub wireframe: bool,
}

impl Default for Solid {
    fn default() -> Self {
        Solid {
            color: Vec3::ONE,
            wireframe: false,
        }
    }
}

/// Material of the point and line markers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolidPointLine {
    pub color: Vec3,
}

impl Default for SolidPointLine {
    fn default() -> Self {
        SolidPointLine { color: Vec3::ONE }
    }
}

/// Every material the renderer can draw with.
#[derive(Clone, Debug, PartialEq)]
pub enum Material {
    Lambertian(Lambertian),
    Phong(Phong),
    PhongTextured(PhongTextured),
    /// The textured material of imported models. Same parameters as `PhongTextured`,
    /// rendered through its own cache entry.
    Textured(PhongTextured),
    Solid(Solid),
    SolidPointLine(SolidPointLine),
}

impl Material {
    pub fn shading_model(&self) -> ShadingModel {
        match self {
            Material::Lambertian(_) => ShadingModel::Lambertian,
            Material::Phong(_) => ShadingModel::Phong,
            Material::PhongTextured(_) => ShadingModel::PhongTextured,
            Material::Textured(_) => ShadingModel::Textured,
            Material::Solid(_) => ShadingModel::Solid,
            Material::SolidPointLine(_) => ShadingModel::SolidPointLine,
        }
    }

    pub fn wireframe(&self) -> bool {
        match self {
            Material::Lambertian(m) => m.wireframe,
            Material::Phong(m) => m.wireframe,
            Material::PhongTextured(m) | Material::Textured(m) => m.wireframe,
            Material::Solid(m) => m.wireframe,
            Material::SolidPointLine(_) => false,
        }
    }

    /// Switches wireframe rendering. Point/line markers ignore it.
    pub fn set_wireframe(&mut self, wireframe: bool) {
        match self {
            Material::Lambertian(m) => m.wireframe = wireframe,
            Material::Phong(m) => m.wireframe = wireframe,
            Material::PhongTextured(m) | Material::Textured(m) => m.wireframe = wireframe,
            Material::Solid(m) => m.wireframe = wireframe,
            Material::SolidPointLine(_) => {}
        }
    }

    /// One-time GPU setup: uploads the texture maps that are not uploaded yet.
    pub fn configure(&mut self, ctx: &mut GraphicsContext) -> Result<()> {
        if let Material::PhongTextured(m) | Material::Textured(m) = self {
            for map in m.maps_mut().iter_mut() {
                if let Some(texture) = map.as_mut() {
                    texture.upload(ctx)?;
                }
            }
        }
        Ok(())
    }

    /// Releases the GPU textures owned by this material.
    pub fn release(&mut self, ctx: &mut GraphicsContext) {
        if let Material::PhongTextured(m) | Material::Textured(m) = self {
            for map in m.maps_mut().iter_mut() {
                if let Some(texture) = map.as_mut() {
                    texture.release(ctx);
                }
            }
        }
    }
}

impl Default for Material {
    fn default() -> Self {
        Material::Phong(Phong::default())
    }
}

/// Writes the uniforms of `material` to `program` and binds its textures.
///
/// `program` must be bound.
pub fn apply_material(
    material: &Material,
    program: &ShaderProgram,
    ctx: &mut GraphicsContext,
) -> Result<()> {
    match material {
        Material::Lambertian(m) => {
            program.set(ctx, "material.diffuseColor", m.diffuse_color)?;
            program.set(ctx, "material.diffuseIntensity", m.diffuse_intensity)?;
            program.set(ctx, "includeAmbient", false)?;
            program.set(ctx, "includeDiffuse", true)?;
            program.set(ctx, "includeSpecular", false)?;
            program.set(ctx, "wireframe", m.wireframe)?;
        }
        Material::Phong(m) => {
            program.set(ctx, "material.ambientColor", m.ambient_color)?;
            program.set(ctx, "material.ambientIntensity", m.ambient_intensity)?;
            program.set(ctx, "material.diffuseColor", m.diffuse_color)?;
            program.set(ctx, "material.diffuseIntensity", m.diffuse_intensity)?;
            program.set(ctx, "material.specularColor", m.specular_color)?;
            program.set(ctx, "material.specularIntensity", m.specular_intensity)?;
            program.set(ctx, "material.shininess", m.shininess)?;
            program.set(ctx, "includeAmbient", true)?;
            program.set(ctx, "includeDiffuse", true)?;
            program.set(ctx, "includeSpecular", true)?;
            program.set(ctx, "wireframe", m.wireframe)?;
        }
        Material::PhongTextured(m) | Material::Textured(m) => {
            program.set(ctx, "material.ambientIntensity", m.ambient_intensity)?;

            let slots = [
                ("Diffuse", "diffuse", m.diffuse_intensity),
                ("Emissive", "emissive", m.emissive_intensity),
                ("Specular", "specular", m.specular_intensity),
            ];
            for ((unit, texture), (flag, prefix, intensity)) in m.maps().iter().zip(slots.iter()) {
                let id = texture.and_then(|t| t.id());
                let _ = ctx.bind_texture(*unit as u32, id);
                program.set(ctx, &format!("material.has{}", flag), id.is_some())?;
                if id.is_some() {
                    program.set(ctx, &format!("material.{}Map", prefix), *unit)?;
                    program.set(ctx, &format!("material.{}Intensity", prefix), *intensity)?;
                }
            }

            program.set(ctx, "material.shininess", m.shininess)?;
            program.set(ctx, "includeAmbient", true)?;
            program.set(ctx, "includeDiffuse", true)?;
            program.set(ctx, "includeSpecular", true)?;
            program.set(ctx, "wireframe", m.wireframe)?;
        }
        Material::Solid(m) => {
            program.set(ctx, "material.color", m.color)?;
            program.set(ctx, "wireframe", m.wireframe)?;
        }
        Material::SolidPointLine(m) => {
            program.set(ctx, "material.color", m.color)?;
            program.set(ctx, "wireframe", false)?;
        }
    }

    Ok(())
}

macro_rules! restorable_material {
    ($($t:ty => $id:expr),* $(,)*) => {$(
        impl Restorable for $t {
            fn id(&self) -> &'static str {
                $id
            }

            fn state(&self) -> Value {
                serde_json::to_value(self).unwrap_or(Value::Null)
            }

            fn restore(&mut self, settings: &Value) {
                if let Some(restored) = merge_fields(self, settings) {
                    *self = restored.with_runtime_state_of(self);
                }
            }
        }
    )*};
}

/// Carries over the fields that are never persisted.
trait RuntimeState: Sized {
    fn with_runtime_state_of(self, _current: &Self) -> Self {
        self
    }
}

impl RuntimeState for Lambertian {}
impl RuntimeState for Phong {}
impl RuntimeState for Solid {}
impl RuntimeState for SolidPointLine {}

impl RuntimeState for PhongTextured {
    fn with_runtime_state_of(self, current: &Self) -> Self {
        PhongTextured {
            diffuse_map: current.diffuse_map.clone(),
            emissive_map: current.emissive_map.clone(),
            specular_map: current.specular_map.clone(),
            wireframe: current.wireframe,
            ..self
        }
    }
}

restorable_material! {
    Lambertian => "LambertianMaterial",
    Phong => "PhongMaterial",
    PhongTextured => "PhongTexturedMaterial",
    Solid => "SolidMaterial",
    SolidPointLine => "SolidPointLineMaterial",
}
