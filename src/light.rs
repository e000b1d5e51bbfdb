//! Directional lights and the scene's ambient term.

use crate::context::GraphicsContext;
use crate::error::Result;
use crate::math::{rotate_vector, WORLD_FORWARD};
use crate::resource::ShaderProgram;
use crate::settings::{merge_fields, Restorable};
use glamx::Vec3;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Maximum number of directional lights in a scene.
pub const MAX_LIGHTS: usize = 3;

/// A light with parallel rays, like the sun.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectionalLight {
    /// Direction the light travels in.
    pub direction: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    pub enabled: bool,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        DirectionalLight {
            direction: -WORLD_FORWARD,
            color: Vec3::ONE,
            intensity: 1.0,
            enabled: false,
        }
    }
}

impl DirectionalLight {
    /// A white light pointing along `-Z` rotated by `pitch` then `yaw`.
    pub fn from_orientation(pitch: f32, yaw: f32) -> Self {
        let mut light = Self::default();
        light.set_orientation(pitch, yaw);
        light
    }

    /// Points the light along `-Z` rotated by `pitch` around the world right axis, then
    /// by `yaw` around the world up axis.
    pub fn set_orientation(&mut self, pitch: f32, yaw: f32) {
        self.direction = rotate_vector(-WORLD_FORWARD, pitch, yaw, false);
    }

    /// Uploads this light as the program's single `directionalLight`.
    pub fn apply(&self, program: &ShaderProgram, ctx: &mut GraphicsContext) -> Result<()> {
        self.apply_named(program, ctx, "directionalLight")
    }

    /// Uploads this light as `directionalLights[index]`.
    pub fn apply_indexed(
        &self,
        program: &ShaderProgram,
        ctx: &mut GraphicsContext,
        index: usize,
    ) -> Result<()> {
        debug_assert!(index < MAX_LIGHTS);
        self.apply_named(program, ctx, &format!("directionalLights[{}]", index))
    }

    fn apply_named(&self, program: &ShaderProgram, ctx: &mut GraphicsContext, name: &str) -> Result<()> {
        program.set(ctx, &format!("{}.direction", name), self.direction)?;
        program.set(ctx, &format!("{}.color", name), self.color)?;
        program.set(ctx, &format!("{}.intensity", name), self.intensity)?;
        program.set(ctx, &format!("{}.enabled", name), self.enabled)
    }
}

impl Restorable for DirectionalLight {
    fn id(&self) -> &'static str {
        "DirectionalLight"
    }

    fn state(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    fn restore(&mut self, settings: &Value) {
        if let Some(restored) = merge_fields(self, settings) {
            *self = restored;
        }
    }
}

/// Every light of a scene.
#[derive(Clone, Debug, PartialEq)]
pub struct Lighting {
    pub lights: [DirectionalLight; MAX_LIGHTS],
    pub ambient_color: Vec3,
    pub ambient_intensity: f32,
}

impl Default for Lighting {
    fn default() -> Self {
        Lighting {
            lights: [DirectionalLight::default(); MAX_LIGHTS],
            ambient_color: Vec3::ONE,
            ambient_intensity: 0.0,
        }
    }
}

impl Lighting {
    /// Two enabled lights 45 degrees up on opposite sides and a disabled one from above.
    pub fn three_point() -> Self {
        let mut lighting = Self::default();
        lighting.lights[0] = DirectionalLight::from_orientation(45.0f32.to_radians(), 0.0);
        lighting.lights[0].enabled = true;
        lighting.lights[1] =
            DirectionalLight::from_orientation(45.0f32.to_radians(), 180.0f32.to_radians());
        lighting.lights[1].enabled = true;
        lighting.lights[2] = DirectionalLight::from_orientation(-90.0f32.to_radians(), 0.0);
        lighting
    }

    /// Uploads the ambient term and every light.
    pub fn apply(&self, program: &ShaderProgram, ctx: &mut GraphicsContext) -> Result<()> {
        program.set(ctx, "ambientColor", self.ambient_color)?;
        program.set(ctx, "ambientIntensity", self.ambient_intensity)?;

        for (i, light) in self.lights.iter().enumerate() {
            light.apply_indexed(program, ctx, i)?;
        }
        Ok(())
    }

    /// The lights as `[{ "DirectionalLight": {..} }, ..]`.
    pub fn save_lights(&self) -> Value {
        Value::Array(self.lights.iter().map(|l| l.save()).collect())
    }

    /// Restores the lights from [`Lighting::save_lights`] output.
    ///
    /// Arrays longer than [`MAX_LIGHTS`] are ignored entirely.
    pub fn restore_lights(&mut self, settings: &Value) {
        let Some(entries) = settings.as_array() else {
            return;
        };
        if entries.len() > MAX_LIGHTS {
            log::warn!("Ignoring {} saved lights; at most {} are supported.", entries.len(), MAX_LIGHTS);
            return;
        }

        for (light, entry) in self.lights.iter_mut().zip(entries) {
            if let Some(state) = entry.get("DirectionalLight") {
                light.restore(state);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::HeadlessDevice;
    use crate::resource::{ProgramLayout, ShaderStage, UniformKind, UniformValue};
    use serde_json::json;

    fn lit_program(ctx: &mut GraphicsContext) -> ShaderProgram {
        let mut layout = ProgramLayout::new()
            .with_uniform("ambientColor", UniformKind::Vec3)
            .with_uniform("ambientIntensity", UniformKind::Float);
        for i in 0..MAX_LIGHTS {
            layout = layout
                .with_uniform(&format!("directionalLights[{}].direction", i), UniformKind::Vec3)
                .with_uniform(&format!("directionalLights[{}].intensity", i), UniformKind::Float)
                .with_uniform(&format!("directionalLights[{}].color", i), UniformKind::Vec3)
                .with_uniform(&format!("directionalLights[{}].enabled", i), UniformKind::Bool);
        }

        let mut program = ShaderProgram::new("lit", layout);
        program.attach(ShaderStage::Vertex, String::new());
        program.attach(ShaderStage::Fragment, String::new());
        program.compile_and_link(ctx).unwrap();
        program
    }

    #[test]
    fn orientation_rotates_the_forward_axis() {
        let down = DirectionalLight::from_orientation(-90.0f32.to_radians(), 0.0);
        assert!((down.direction - Vec3::new(0.0, -1.0, 0.0)).length() < 1.0e-5);

        let flat = DirectionalLight::from_orientation(0.0, 90.0f32.to_radians());
        assert!((flat.direction - Vec3::new(-1.0, 0.0, 0.0)).length() < 1.0e-5);
    }

    #[test]
    fn lighting_uploads_indexed_uniforms() {
        let mut ctx = GraphicsContext::headless();
        let program = lit_program(&mut ctx);
        program.use_program(&mut ctx).unwrap();

        let lighting = Lighting::three_point();
        lighting.apply(&program, &mut ctx).unwrap();

        let id = program.id().unwrap();
        let device = ctx.downcast_device::<HeadlessDevice>().unwrap();
        assert_eq!(
            device.uniform(id, "directionalLights[1].enabled"),
            Some(UniformValue::Bool(true))
        );
        assert_eq!(
            device.uniform(id, "directionalLights[2].enabled"),
            Some(UniformValue::Bool(false))
        );
        assert_eq!(
            device.uniform(id, "ambientIntensity"),
            Some(UniformValue::Float(0.0))
        );
    }

    #[test]
    fn lights_round_trip_through_settings() {
        let mut lighting = Lighting::three_point();
        lighting.lights[2].intensity = 0.25;
        let saved = lighting.save_lights();

        let mut restored = Lighting::default();
        restored.restore_lights(&saved);
        assert_eq!(restored.lights, lighting.lights);
    }

    #[test]
    fn too_many_saved_lights_are_ignored() {
        let mut lighting = Lighting::default();
        let entry = json!({ "DirectionalLight": { "intensity": 3.0 } });
        lighting.restore_lights(&json!([entry, entry, entry, entry]));
        assert_eq!(lighting, Lighting::default());

        lighting.restore_lights(&json!([entry]));
        assert_eq!(lighting.lights[0].intensity, 3.0);
        assert_eq!(lighting.lights[1].intensity, 1.0);
    }
}
