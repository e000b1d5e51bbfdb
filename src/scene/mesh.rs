use crate::context::GraphicsContext;
use crate::math::pitch_yaw_roll_quat;
use crate::resource::GpuGeometry;
use crate::scene::MaterialHandle;
use crate::settings::{merge_fields, Restorable};
use glamx::{Mat4, Vec3};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Summary of a model's vertex data.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct MeshMetadata {
    pub vertex_count: usize,
    /// Indexed triangles, `indices / 3`.
    pub face_count: usize,
    pub has_positions: bool,
    pub has_normals: bool,
    pub has_colors: bool,
    pub has_texels: bool,
    pub has_indices: bool,
}

impl MeshMetadata {
    pub fn of(model: &[GpuGeometry]) -> Self {
        let mut metadata = MeshMetadata::default();
        let mut index_count = 0;

        for piece in model {
            let buffer = piece.buffer();
            metadata.vertex_count += buffer.vertex_count();
            index_count += buffer.indices().map_or(0, |i| i.len());
            metadata.has_normals |= buffer.normals().is_some();
            metadata.has_colors |= buffer.colors().is_some();
            metadata.has_texels |= buffer.texels().is_some();
        }

        metadata.has_positions = metadata.vertex_count > 0;
        metadata.has_indices = index_count > 0;
        metadata.face_count = index_count / 3;
        metadata
    }
}

#[derive(Serialize, Deserialize)]
struct MeshState {
    scale: f32,
    pitch: f32,
    yaw: f32,
    roll: f32,
    translate: Vec3,
    origin: Vec3,
}

/// A loaded model: its geometry pieces, its material and its placement.
#[derive(Debug)]
pub struct Mesh {
    model: Vec<GpuGeometry>,
    material: Option<MaterialHandle>,
    metadata: MeshMetadata,
    initialized: bool,

    pub scale: f32,
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
    pub translate: Vec3,
    /// Offset of the model origin, e.g. minus its bounding box center.
    pub position: Vec3,
}

impl Default for Mesh {
    fn default() -> Self {
        Mesh {
            model: Vec::new(),
            material: None,
            metadata: MeshMetadata::default(),
            initialized: false,
            scale: 1.0,
            pitch: 0.0,
            yaw: 0.0,
            roll: 0.0,
            translate: Vec3::ZERO,
            position: Vec3::ZERO,
        }
    }
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mesh showing `model` with `material`.
    pub fn with_model(model: Vec<GpuGeometry>, material: Option<MaterialHandle>) -> Self {
        let mut mesh = Mesh {
            material,
            ..Self::default()
        };
        let _ = mesh.set_model(model);
        mesh
    }

    pub fn model(&self) -> &[GpuGeometry] {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut [GpuGeometry] {
        &mut self.model
    }

    /// Replaces the geometry and returns the previous pieces, whose GPU objects the caller
    /// must release.
    pub fn set_model(&mut self, model: Vec<GpuGeometry>) -> Vec<GpuGeometry> {
        self.metadata = MeshMetadata::of(&model);
        self.initialized = false;
        std::mem::replace(&mut self.model, model)
    }

    pub fn material(&self) -> Option<MaterialHandle> {
        self.material
    }

    /// Switches material. The geometry must be initialized again for the new program.
    pub fn set_material(&mut self, material: Option<MaterialHandle>) {
        self.material = material;
        self.initialized = false;
    }

    pub fn metadata(&self) -> &MeshMetadata {
        &self.metadata
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn set_initialized(&mut self, initialized: bool) {
        self.initialized = initialized;
    }

    /// The model matrix: scale, then rotate, then translate by `translate + position`.
    ///
    /// The rotation applies pitch, then yaw around the pitched up axis, then roll around
    /// the resulting forward axis.
    pub fn transform(&self) -> Mat4 {
        let rotation = pitch_yaw_roll_quat(self.pitch, self.yaw, self.roll, true);
        Mat4::from_scale_rotation_translation(
            Vec3::splat(self.scale),
            rotation,
            self.translate + self.position,
        )
    }

    /// Frees the GPU objects of every piece.
    pub fn release(&mut self, ctx: &mut GraphicsContext) {
        for piece in &mut self.model {
            piece.release(ctx);
        }
        self.initialized = false;
    }

    fn placement(&self) -> MeshState {
        MeshState {
            scale: self.scale,
            pitch: self.pitch,
            yaw: self.yaw,
            roll: self.roll,
            translate: self.translate,
            origin: self.position,
        }
    }
}

impl Restorable for Mesh {
    fn id(&self) -> &'static str {
        "Mesh"
    }

    fn state(&self) -> Value {
        serde_json::to_value(self.placement()).unwrap_or(Value::Null)
    }

    fn restore(&mut self, settings: &Value) {
        if let Some(state) = merge_fields(&self.placement(), settings) {
            self.scale = state.scale;
            self.pitch = state.pitch;
            self.yaw = state.yaw;
            self.roll = state.roll;
            self.translate = state.translate;
            self.position = state.origin;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::procedural::Cuboid;
    use glamx::Vec4Swizzles;
    use serde_json::json;

    fn apply(mesh: &Mesh, p: Vec3) -> Vec3 {
        (mesh.transform() * p.extend(1.0)).xyz()
    }

    #[test]
    fn translation_is_applied_last() {
        let mesh = Mesh {
            scale: 2.0,
            translate: Vec3::X,
            ..Mesh::default()
        };
        assert!((apply(&mesh, Vec3::ZERO) - Vec3::X).length() < 1.0e-6);
        assert!((apply(&mesh, Vec3::Y) - Vec3::new(1.0, 2.0, 0.0)).length() < 1.0e-6);
    }

    #[test]
    fn yaw_turns_right_into_backward() {
        let mesh = Mesh {
            yaw: 90.0f32.to_radians(),
            ..Mesh::default()
        };
        assert!((apply(&mesh, Vec3::X) - Vec3::new(0.0, 0.0, -1.0)).length() < 1.0e-6);
    }

    #[test]
    fn euler_angles_do_not_commute() {
        let a = Mesh {
            pitch: 0.5,
            yaw: 1.0,
            ..Mesh::default()
        };
        let b = Mesh {
            pitch: 1.0,
            yaw: 0.5,
            ..Mesh::default()
        };
        assert!((apply(&a, Vec3::X) - apply(&b, Vec3::X)).length() > 1.0e-3);
    }

    #[test]
    fn model_and_material_changes_require_initialization() {
        let mut mesh = Mesh::with_model(vec![Cuboid::new(1.0, 1.0, 1.0).into_geometry()], None);
        assert_eq!(mesh.metadata().vertex_count, 24);
        assert_eq!(mesh.metadata().face_count, 12);
        assert!(mesh.metadata().has_texels);
        assert!(!mesh.metadata().has_colors);

        mesh.set_initialized(true);
        mesh.set_material(None);
        assert!(!mesh.is_initialized());

        mesh.set_initialized(true);
        let old = mesh.set_model(Vec::new());
        assert_eq!(old.len(), 1);
        assert!(!mesh.is_initialized());
        assert!(!mesh.metadata().has_positions);
    }

    #[test]
    fn placement_round_trips_through_settings() {
        let mesh = Mesh {
            scale: 0.5,
            roll: 0.25,
            position: Vec3::new(1.0, 2.0, 3.0),
            ..Mesh::default()
        };
        let state = mesh.state();
        assert_eq!(state["origin"], json!([1.0, 2.0, 3.0]));

        let mut restored = Mesh::new();
        restored.restore(&state);
        assert_eq!(restored.scale, 0.5);
        assert_eq!(restored.roll, 0.25);
        assert_eq!(restored.position, mesh.position);

        restored.restore(&json!({ "yaw": 1.5 }));
        assert_eq!(restored.yaw, 1.5);
        assert_eq!(restored.scale, 0.5);
    }
}
