use crate::math::WORLD_UP;
use crate::settings::{merge_fields, Restorable};
use glamx::{Mat4, Vec3};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The two projections a [`Camera`] can switch between.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ProjectionKind {
    Perspective,
    Orthographic,
}

/// The view volume of an orthographic camera, before zooming.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrthographicExtents {
    pub left: f32,
    pub right: f32,
    pub bottom: f32,
    pub top: f32,
    /// Factor applied to every extent when building the projection.
    pub zoom: f32,
}

impl Default for OrthographicExtents {
    fn default() -> Self {
        OrthographicExtents {
            left: -0.5,
            right: 0.5,
            bottom: -0.5,
            top: 0.5,
            zoom: 1.0,
        }
    }
}

impl OrthographicExtents {
    /// Extents covering what a perspective camera with the given field of view and aspect
    /// ratio sees at `distance` from the eye.
    pub fn framing(distance: f32, fov_y: f32, aspect_ratio: f32, zoom: f32) -> Self {
        let y = distance * (fov_y / 2.0).tan();
        let x = y * aspect_ratio;
        OrthographicExtents {
            left: -x,
            right: x,
            bottom: -y,
            top: y,
            zoom,
        }
    }

    pub fn width(&self) -> f32 {
        (self.right - self.left).abs()
    }

    pub fn height(&self) -> f32 {
        (self.top - self.bottom).abs()
    }
}

/// How a camera maps view space to clip space.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Projection {
    Perspective,
    Orthographic(OrthographicExtents),
}

impl Projection {
    pub fn kind(&self) -> ProjectionKind {
        match self {
            Projection::Perspective => ProjectionKind::Perspective,
            Projection::Orthographic(_) => ProjectionKind::Orthographic,
        }
    }
}

/// A camera looking from `position` at `target`.
///
/// The cached view-projection matrix is only refreshed by [`Camera::update`], so it is
/// stale after any mutation until the next update.
///
/// The up vector is derived from the world up axis. Pointing the camera exactly along
/// that axis makes it degenerate and the resulting matrices contain NaNs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Camera {
    position: Vec3,
    target: Vec3,
    near: f32,
    far: f32,
    /// Full vertical angle, in radians.
    fov_y: f32,
    aspect_ratio: f32,
    projection: Projection,
    #[serde(skip)]
    view_projection: Mat4,
}

impl Default for Camera {
    fn default() -> Self {
        Camera {
            position: Vec3::ZERO,
            target: Vec3::ZERO,
            near: 0.1,
            far: 100.0,
            fov_y: 45.0f32.to_radians(),
            aspect_ratio: 1.0,
            projection: Projection::Perspective,
            view_projection: Mat4::IDENTITY,
        }
    }
}

impl Camera {
    /// A perspective camera with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// A perspective camera at the origin.
    pub fn perspective(fov_y: f32, aspect_ratio: f32, near: f32, far: f32) -> Self {
        Camera {
            fov_y,
            aspect_ratio,
            near,
            far,
            ..Self::default()
        }
    }

    /// An orthographic camera at the origin with the default extents.
    pub fn orthographic(fov_y: f32, aspect_ratio: f32, near: f32, far: f32) -> Self {
        Camera {
            projection: Projection::Orthographic(OrthographicExtents::default()),
            ..Self::perspective(fov_y, aspect_ratio, near, far)
        }
    }

    /// An orthographic camera with explicit extents.
    ///
    /// The aspect ratio follows the extents and the vertical field of view is chosen so
    /// that a perspective camera would see `top - bottom` units at the far plane. Converting
    /// the result back to extents from the eye-to-target distance is therefore only
    /// approximately the identity.
    pub fn orthographic_from_extents(
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
        near: f32,
        far: f32,
    ) -> Self {
        let extents = OrthographicExtents {
            left,
            right,
            bottom,
            top,
            zoom: 1.0,
        };
        let distance = far;

        Camera {
            near,
            far,
            aspect_ratio: extents.width() / extents.height(),
            fov_y: 2.0 * (extents.height() / (2.0 * distance)).atan(),
            projection: Projection::Orthographic(extents),
            ..Self::default()
        }
    }

    // ==================
    // Placement
    // ==================

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    pub fn set_target(&mut self, target: Vec3) {
        self.target = target;
    }

    /// Moves the camera to `position` and points it at `target`.
    pub fn look_at(&mut self, position: Vec3, target: Vec3) {
        self.position = position;
        self.target = target;
        self.refresh_extents();
    }

    /// Distance from the eye to the target.
    pub fn distance(&self) -> f32 {
        self.position.distance(self.target)
    }

    pub fn forward(&self) -> Vec3 {
        (self.target - self.position).normalize()
    }

    pub fn right(&self) -> Vec3 {
        self.forward().cross(WORLD_UP).normalize()
    }

    pub fn up(&self) -> Vec3 {
        self.right().cross(self.forward()).normalize()
    }

    // ==================
    // Projection parameters
    // ==================

    pub fn near(&self) -> f32 {
        self.near
    }

    pub fn set_near(&mut self, near: f32) {
        self.near = near;
    }

    pub fn far(&self) -> f32 {
        self.far
    }

    pub fn set_far(&mut self, far: f32) {
        self.far = far;
    }

    pub fn fov_y(&self) -> f32 {
        self.fov_y
    }

    /// Sets the vertical field of view. An orthographic camera refits its extents.
    pub fn set_fov_y(&mut self, fov_y: f32) {
        self.fov_y = fov_y;
        self.refresh_extents();
    }

    /// The horizontal field of view derived from the vertical one and the aspect ratio.
    pub fn fov_x(&self) -> f32 {
        2.0 * ((self.fov_y / 2.0).tan() * self.aspect_ratio).atan()
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.aspect_ratio
    }

    /// Sets the width over height ratio. An orthographic camera refits its extents.
    pub fn set_aspect_ratio(&mut self, aspect_ratio: f32) {
        self.aspect_ratio = aspect_ratio;
        self.refresh_extents();
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn projection_kind(&self) -> ProjectionKind {
        self.projection.kind()
    }

    pub fn is_orthographic(&self) -> bool {
        self.projection_kind() == ProjectionKind::Orthographic
    }

    /// The orthographic extents, if this is an orthographic camera.
    pub fn extents(&self) -> Option<&OrthographicExtents> {
        match &self.projection {
            Projection::Orthographic(extents) => Some(extents),
            Projection::Perspective => None,
        }
    }

    /// Replaces the orthographic extents. Ignored by a perspective camera.
    pub fn set_extents(&mut self, extents: OrthographicExtents) {
        if let Projection::Orthographic(current) = &mut self.projection {
            *current = extents;
        }
    }

    pub fn set_left(&mut self, left: f32) {
        self.edit_extents(|e| e.left = left);
    }

    pub fn set_right(&mut self, right: f32) {
        self.edit_extents(|e| e.right = right);
    }

    pub fn set_bottom(&mut self, bottom: f32) {
        self.edit_extents(|e| e.bottom = bottom);
    }

    pub fn set_top(&mut self, top: f32) {
        self.edit_extents(|e| e.top = top);
    }

    /// The orthographic zoom factor. Always `1.0` for a perspective camera.
    pub fn zoom(&self) -> f32 {
        self.extents().map_or(1.0, |e| e.zoom)
    }

    pub fn set_zoom(&mut self, zoom: f32) {
        self.edit_extents(|e| e.zoom = zoom);
    }

    fn edit_extents(&mut self, f: impl FnOnce(&mut OrthographicExtents)) {
        if let Projection::Orthographic(extents) = &mut self.projection {
            f(extents)
        }
    }

    // Extents of an orthographic camera are a cache of the eye distance, the field of view
    // and the aspect ratio. A camera sitting on its target keeps the previous extents.
    fn refresh_extents(&mut self) {
        let distance = self.distance();
        let (fov_y, aspect_ratio) = (self.fov_y, self.aspect_ratio);

        if let Projection::Orthographic(extents) = &mut self.projection {
            if distance > 0.0 {
                *extents = OrthographicExtents::framing(distance, fov_y, aspect_ratio, extents.zoom);
            }
        }
    }

    // ==================
    // Conversions
    // ==================

    /// An orthographic camera with the same placement framing what this camera sees at
    /// its target.
    pub fn to_orthographic(&self) -> Camera {
        let mut camera = Camera {
            projection: Projection::Orthographic(OrthographicExtents::default()),
            ..self.clone()
        };
        camera.refresh_extents();
        camera.update();
        camera
    }

    /// A perspective camera with the same placement and field of view.
    pub fn to_perspective(&self) -> Camera {
        let mut camera = Camera {
            projection: Projection::Perspective,
            ..self.clone()
        };
        camera.update();
        camera
    }

    /// Converts to the requested projection, or clones if it already uses it.
    pub fn with_projection(&self, kind: ProjectionKind) -> Camera {
        match kind {
            ProjectionKind::Perspective => self.to_perspective(),
            ProjectionKind::Orthographic if self.is_orthographic() => self.clone(),
            ProjectionKind::Orthographic => self.to_orthographic(),
        }
    }

    // ==================
    // Matrices
    // ==================

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up())
    }

    pub fn projection_matrix(&self) -> Mat4 {
        match &self.projection {
            Projection::Perspective => {
                Mat4::perspective_rh(self.fov_y, self.aspect_ratio, self.near, self.far)
            }
            Projection::Orthographic(e) => Mat4::orthographic_rh(
                e.left * e.zoom,
                e.right * e.zoom,
                e.bottom * e.zoom,
                e.top * e.zoom,
                self.near,
                self.far,
            ),
        }
    }

    /// Recomputes the cached view-projection matrix.
    pub fn update(&mut self) {
        self.view_projection = self.projection_matrix() * self.view_matrix();
    }

    /// The view-projection matrix as of the last [`Camera::update`].
    pub fn view_projection(&self) -> Mat4 {
        self.view_projection
    }
}

impl Restorable for Camera {
    fn id(&self) -> &'static str {
        "Camera"
    }

    fn state(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    fn restore(&mut self, settings: &Value) {
        if let Some(restored) = merge_fields(self, settings) {
            *self = restored;
            self.update();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const EPS: f32 = 1.0e-5;

    fn looking_down_z() -> Camera {
        let mut camera = Camera::perspective(60.0f32.to_radians(), 16.0 / 9.0, 0.1, 50.0);
        camera.look_at(Vec3::new(0.0, 1.0, 5.0), Vec3::ZERO);
        camera
    }

    #[test]
    fn update_caches_projection_times_view() {
        let mut camera = looking_down_z();
        camera.update();
        let expected = camera.projection_matrix()
            * Mat4::look_at_rh(camera.position(), camera.target(), camera.up());
        assert_eq!(camera.view_projection(), expected);

        let mut ortho = camera.to_orthographic();
        ortho.set_zoom(2.0);
        ortho.update();
        let expected =
            ortho.projection_matrix() * Mat4::look_at_rh(ortho.position(), ortho.target(), ortho.up());
        assert_eq!(ortho.view_projection(), expected);
    }

    #[test]
    fn view_projection_is_stale_until_update() {
        let mut camera = looking_down_z();
        camera.update();
        let before = camera.view_projection();
        camera.set_position(Vec3::new(3.0, 1.0, 5.0));
        assert_eq!(camera.view_projection(), before);
        camera.update();
        assert_ne!(camera.view_projection(), before);
    }

    #[test]
    fn derived_axes_are_orthonormal() {
        let camera = looking_down_z();
        assert!(camera.forward().dot(camera.right()).abs() < EPS);
        assert!(camera.forward().dot(camera.up()).abs() < EPS);
        assert!((camera.up().length() - 1.0).abs() < EPS);
        assert!(camera.up().y > 0.0);
    }

    #[test]
    fn horizontal_fov_matches_known_pairs() {
        let camera = Camera::perspective(90.0f32.to_radians(), 1.0, 0.1, 10.0);
        assert!((camera.fov_x() - 90.0f32.to_radians()).abs() < EPS);

        let wide = Camera::perspective(90.0f32.to_radians(), 2.0, 0.1, 10.0);
        assert!((wide.fov_x() - 2.0 * 2.0f32.atan()).abs() < EPS);
    }

    #[test]
    fn projection_round_trip_keeps_fov_and_aspect() {
        let camera = looking_down_z();
        let back = camera.to_orthographic().to_perspective();

        assert_eq!(back.projection_kind(), ProjectionKind::Perspective);
        assert!((back.fov_y() - camera.fov_y()).abs() < EPS);
        assert!((back.aspect_ratio() - camera.aspect_ratio()).abs() < EPS);
        assert_eq!(back.position(), camera.position());
        assert_eq!(back.target(), camera.target());
    }

    #[test]
    fn orthographic_conversion_frames_the_target() {
        let camera = looking_down_z();
        let ortho = camera.to_orthographic();
        let extents = ortho.extents().unwrap();

        let y = camera.distance() * (camera.fov_y() / 2.0).tan();
        assert!((extents.top - y).abs() < EPS);
        assert!((extents.bottom + y).abs() < EPS);
        assert!((extents.right - y * camera.aspect_ratio()).abs() < EPS);
        assert!((extents.width() / extents.height() - camera.aspect_ratio()).abs() < EPS);
    }

    #[test]
    fn orthographic_setters_refit_the_extents() {
        let mut ortho = looking_down_z().to_orthographic();
        ortho.set_aspect_ratio(1.0);
        let extents = *ortho.extents().unwrap();
        assert!((extents.width() - extents.height()).abs() < EPS);

        ortho.set_fov_y(90.0f32.to_radians());
        let top = ortho.extents().unwrap().top;
        assert!((top - ortho.distance()).abs() < 1.0e-4);
    }

    #[test]
    fn explicit_extents_are_kept() {
        let mut ortho = looking_down_z().to_orthographic();
        ortho.set_left(-7.0);
        ortho.set_top(3.0);
        let extents = ortho.extents().unwrap();
        assert_eq!(extents.left, -7.0);
        assert_eq!(extents.top, 3.0);

        let mut camera = looking_down_z();
        camera.set_left(-7.0);
        assert!(camera.extents().is_none());
        assert_eq!(camera.zoom(), 1.0);
    }

    #[test]
    fn extents_constructor_back_solves_the_fov() {
        let camera = Camera::orthographic_from_extents(-2.0, 2.0, -1.0, 1.0, 0.1, 10.0);
        assert!((camera.aspect_ratio() - 2.0).abs() < EPS);
        assert!((camera.fov_y() - 2.0 * (2.0f32 / 20.0).atan()).abs() < EPS);
        assert_eq!(camera.extents().unwrap().right, 2.0);
    }

    #[test]
    fn restore_updates_known_fields_only() {
        let mut camera = looking_down_z();
        camera.restore(&json!({ "near": 0.5, "aspectRatio": 2.0, "unknown": true }));
        assert_eq!(camera.near(), 0.5);
        assert_eq!(camera.aspect_ratio(), 2.0);
        assert_eq!(camera.far(), 50.0);
        assert_ne!(camera.view_projection(), Mat4::IDENTITY);
    }

    #[test]
    fn state_round_trips_through_restore() {
        let mut ortho = looking_down_z().to_orthographic();
        ortho.set_zoom(1.5);
        ortho.update();
        let state = ortho.state();

        let mut restored = Camera::new();
        restored.restore(&state);
        assert_eq!(restored, ortho);
    }
}
