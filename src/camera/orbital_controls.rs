use crate::camera::{Camera, ProjectionKind};
use crate::context::Viewport;
use crate::math::WORLD_UP;
use crate::scene::CameraHandle;
use crate::window::{Action, EventContext, Key, Modifiers, MouseButton, Signal, WindowCallbacks};
use glamx::{Quat, Vec3};

/// Radians of rotation (or zoom units) per pixel of cursor motion.
pub const SENSITIVITY: f32 = 0.01;

const MIN_PITCH: f32 = -89.0 * std::f32::consts::PI / 180.0;
const MAX_PITCH: f32 = 89.0 * std::f32::consts::PI / 180.0;
const MIN_FOV: f32 = 0.1 * std::f32::consts::PI / 180.0;
const MAX_FOV: f32 = 175.0 * std::f32::consts::PI / 180.0;
const MIN_ZOOM: f32 = 0.2;
const MAX_ZOOM: f32 = 4.0;

/// What a held mouse button is doing to the camera.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DragState {
    Idle,
    /// Left button: the camera orbits its target.
    Orbiting,
    /// Right button: vertical motion changes the field of view or the orthographic zoom.
    ZoomAdjusting,
}

/// Mouse and keyboard controls orbiting the bound camera around its target.
///
/// Projection switches are only requested through [`OrbitalControls::projection_changed`]:
/// the owner swaps the camera and keeps it behind the same handle.
pub struct OrbitalControls {
    camera: Option<CameraHandle>,
    state: DragState,
    navigation_enabled: bool,
    last_cursor: Option<(f64, f64)>,
    // Accumulated since the camera was bound, relative to `reference_forward`.
    pitch: f32,
    yaw: f32,
    reference_forward: Option<Vec3>,
    radius: f32,
    wireframe: bool,

    pub projection_changed: Signal<ProjectionKind>,
    pub wireframe_changed: Signal<bool>,
    pub saved: Signal<()>,
    pub close_requested: Signal<()>,
}

impl Default for OrbitalControls {
    fn default() -> Self {
        OrbitalControls {
            camera: None,
            state: DragState::Idle,
            navigation_enabled: true,
            last_cursor: None,
            pitch: 0.0,
            yaw: 0.0,
            reference_forward: None,
            radius: 0.0,
            wireframe: false,
            projection_changed: Signal::new(),
            wireframe_changed: Signal::new(),
            saved: Signal::new(),
            close_requested: Signal::new(),
        }
    }
}

impl OrbitalControls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drives the camera behind `handle` from now on, or nothing with `None`.
    ///
    /// The orbit restarts from the camera's current direction.
    pub fn bind(&mut self, camera: Option<CameraHandle>) {
        self.camera = camera;
        self.state = DragState::Idle;
        self.pitch = 0.0;
        self.yaw = 0.0;
        self.reference_forward = None;
    }

    pub fn camera(&self) -> Option<CameraHandle> {
        self.camera
    }

    pub fn state(&self) -> DragState {
        self.state
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn navigation_enabled(&self) -> bool {
        self.navigation_enabled
    }

    /// Enables or disables pointer input, e.g. while a dialog has focus.
    pub fn set_navigation_enabled(&mut self, enabled: bool) {
        self.navigation_enabled = enabled;
        if !enabled {
            self.state = DragState::Idle;
        }
    }

    pub fn wireframe(&self) -> bool {
        self.wireframe
    }

    pub fn set_wireframe(&mut self, wireframe: bool) {
        self.wireframe = wireframe;
    }

    fn bound<'a>(&self, cx: &'a mut EventContext) -> Option<&'a mut Camera> {
        cx.cameras.get_mut(self.camera?)
    }

    fn orbit(&mut self, camera: &mut Camera, dx: f32, dy: f32) {
        self.pitch = (self.pitch - dy).max(MIN_PITCH).min(MAX_PITCH);
        self.yaw -= dx;

        let forward = *self.reference_forward.get_or_insert_with(|| camera.forward());
        let yawed = Quat::from_axis_angle(WORLD_UP, self.yaw) * forward;
        let right = yawed.cross(WORLD_UP).normalize_or_zero();
        let direction = if right == Vec3::ZERO {
            yawed
        } else {
            Quat::from_axis_angle(right, self.pitch) * yawed
        };

        camera.set_position(camera.target() - direction * self.radius);
    }

    fn adjust_zoom(camera: &mut Camera, dy: f32) {
        if camera.is_orthographic() {
            let zoom = (camera.zoom() - dy).max(MIN_ZOOM).min(MAX_ZOOM);
            camera.set_zoom(zoom);
        } else {
            let fov = (camera.fov_y() - dy).max(MIN_FOV).min(MAX_FOV);
            camera.set_fov_y(fov);
        }
    }
}

impl WindowCallbacks for OrbitalControls {
    fn framebuffer_size(&mut self, cx: &mut EventContext, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }

        cx.graphics.set_viewport(Viewport::sized(width, height));
        if let Some(camera) = self.bound(cx) {
            camera.set_aspect_ratio(width as f32 / height as f32);
        }
    }

    fn cursor_position(&mut self, cx: &mut EventContext, x: f64, y: f64) {
        let (last_x, last_y) = self.last_cursor.unwrap_or((x, y));
        self.last_cursor = Some((x, y));

        if !self.navigation_enabled {
            return;
        }

        let dx = (x - last_x) as f32 * SENSITIVITY;
        let dy = (last_y - y) as f32 * SENSITIVITY;
        let state = self.state;

        let Some(handle) = self.camera else {
            return;
        };
        let Some(camera) = cx.cameras.get_mut(handle) else {
            return;
        };

        match state {
            DragState::Orbiting => self.orbit(camera, dx, dy),
            DragState::ZoomAdjusting => Self::adjust_zoom(camera, dy),
            DragState::Idle => {}
        }
    }

    fn mouse_button(
        &mut self,
        cx: &mut EventContext,
        button: MouseButton,
        action: Action,
        _modifiers: Modifiers,
    ) {
        if !self.navigation_enabled {
            return;
        }

        match (button, action) {
            (MouseButton::Button1, Action::Press) => {
                if let Some(camera) = self.bound(cx) {
                    let radius = camera.distance();
                    self.radius = radius;
                    self.state = DragState::Orbiting;
                }
            }
            (MouseButton::Button2, Action::Press) => {
                if self.bound(cx).is_some() {
                    self.state = DragState::ZoomAdjusting;
                }
            }
            (MouseButton::Button1, Action::Release) if self.state == DragState::Orbiting => {
                self.state = DragState::Idle
            }
            (MouseButton::Button2, Action::Release) if self.state == DragState::ZoomAdjusting => {
                self.state = DragState::Idle
            }
            _ => {}
        }
    }

    fn key(&mut self, _cx: &mut EventContext, key: Key, action: Action, modifiers: Modifiers) {
        if action != Action::Press {
            return;
        }

        match key {
            Key::Escape => self.close_requested.emit(()),
            Key::Key1 => self.projection_changed.emit(ProjectionKind::Perspective),
            Key::Key2 => self.projection_changed.emit(ProjectionKind::Orthographic),
            Key::S if modifiers.contains(Modifiers::Control) => self.saved.emit(()),
            Key::W => {
                self.wireframe = !self.wireframe;
                self.wireframe_changed.emit(self.wireframe);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::GraphicsContext;
    use crate::scene::Arena;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Rig {
        graphics: GraphicsContext,
        cameras: Arena<Camera>,
        handle: CameraHandle,
        controls: OrbitalControls,
    }

    impl Rig {
        fn new() -> Self {
            let mut cameras = Arena::new();
            let mut camera = Camera::perspective(45.0f32.to_radians(), 1.0, 0.1, 100.0);
            camera.look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO);
            let handle = cameras.insert(camera);
            let mut controls = OrbitalControls::new();
            controls.bind(Some(handle));

            Rig {
                graphics: GraphicsContext::headless(),
                cameras,
                handle,
                controls,
            }
        }

        fn send(&mut self, event: crate::window::WindowEvent) {
            let mut cx = EventContext {
                graphics: &mut self.graphics,
                cameras: &mut self.cameras,
            };
            self.controls.handle_event(&mut cx, &event);
        }

        fn press(&mut self, button: MouseButton) {
            use crate::window::WindowEvent;
            self.send(WindowEvent::MouseButton(button, Action::Press, Modifiers::empty()));
        }

        fn move_to(&mut self, x: f64, y: f64) {
            use crate::window::WindowEvent;
            self.send(WindowEvent::CursorPos(x, y, Modifiers::empty()));
        }

        fn camera(&self) -> &Camera {
            self.cameras.get(self.handle).unwrap()
        }
    }

    #[test]
    fn pitch_clamps_at_eighty_nine_degrees() {
        let mut rig = Rig::new();
        rig.move_to(0.0, 0.0);
        rig.press(MouseButton::Button1);
        rig.move_to(0.0, 1000.0);
        assert_eq!(rig.controls.pitch(), MAX_PITCH);

        rig.move_to(0.0, -5000.0);
        assert_eq!(rig.controls.pitch(), MIN_PITCH);
    }

    #[test]
    fn orbiting_preserves_the_radius() {
        let mut rig = Rig::new();
        rig.move_to(100.0, 100.0);
        rig.press(MouseButton::Button1);

        for (x, y) in [(130.0, 90.0), (260.0, 40.0), (-80.0, 300.0), (15.0, 15.0)].iter() {
            rig.move_to(*x, *y);
            let camera = rig.camera();
            assert!((camera.distance() - 5.0).abs() < 1.0e-4);
        }
        assert_ne!(rig.camera().position(), Vec3::new(0.0, 0.0, 5.0));
    }

    #[test]
    fn moving_without_a_button_does_nothing() {
        let mut rig = Rig::new();
        rig.move_to(0.0, 0.0);
        rig.move_to(50.0, 80.0);
        assert_eq!(rig.camera().position(), Vec3::new(0.0, 0.0, 5.0));
        assert_eq!(rig.controls.state(), DragState::Idle);
    }

    #[test]
    fn right_drag_adjusts_the_field_of_view() {
        let mut rig = Rig::new();
        rig.move_to(0.0, 0.0);
        rig.press(MouseButton::Button2);
        rig.move_to(0.0, -10.0);
        let expected = 45.0f32.to_radians() - 0.1;
        assert!((rig.camera().fov_y() - expected).abs() < 1.0e-5);

        rig.move_to(0.0, -100_000.0);
        assert!((rig.camera().fov_y() - MIN_FOV).abs() < 1.0e-6);
    }

    #[test]
    fn right_drag_clamps_the_orthographic_zoom() {
        let mut rig = Rig::new();
        let ortho = rig.camera().to_orthographic();
        let _ = rig.cameras.replace(rig.handle, ortho);

        rig.move_to(0.0, 0.0);
        rig.press(MouseButton::Button2);
        rig.move_to(0.0, 1000.0);
        assert_eq!(rig.camera().zoom(), MAX_ZOOM);
    }

    #[test]
    fn keys_emit_signals() {
        let mut rig = Rig::new();
        let projections = Rc::new(RefCell::new(Vec::new()));
        let wireframes = Rc::new(RefCell::new(Vec::new()));
        {
            let projections = projections.clone();
            rig.controls
                .projection_changed
                .connect(move |kind| projections.borrow_mut().push(*kind));
            let wireframes = wireframes.clone();
            rig.controls
                .wireframe_changed
                .connect(move |on| wireframes.borrow_mut().push(*on));
        }

        use crate::window::WindowEvent;
        for key in [Key::Key2, Key::Key1, Key::W, Key::W].iter() {
            rig.send(WindowEvent::Key(*key, Action::Press, Modifiers::empty()));
            rig.send(WindowEvent::Key(*key, Action::Release, Modifiers::empty()));
        }

        assert_eq!(
            *projections.borrow(),
            vec![ProjectionKind::Orthographic, ProjectionKind::Perspective]
        );
        assert_eq!(*wireframes.borrow(), vec![true, false]);
    }

    #[test]
    fn resize_updates_viewport_and_aspect() {
        let mut rig = Rig::new();
        rig.send(crate::window::WindowEvent::FramebufferSize(800, 400));
        assert_eq!(rig.graphics.viewport(), Viewport::sized(800, 400));
        assert_eq!(rig.camera().aspect_ratio(), 2.0);

        rig.send(crate::window::WindowEvent::FramebufferSize(0, 0));
        assert_eq!(rig.camera().aspect_ratio(), 2.0);
    }

    #[test]
    fn unbound_controls_ignore_input() {
        let mut rig = Rig::new();
        rig.controls.bind(None);
        rig.move_to(0.0, 0.0);
        rig.press(MouseButton::Button1);
        rig.move_to(40.0, 40.0);
        rig.send(crate::window::WindowEvent::FramebufferSize(300, 100));

        assert_eq!(rig.controls.state(), DragState::Idle);
        assert_eq!(rig.camera().position(), Vec3::new(0.0, 0.0, 5.0));
        assert_eq!(rig.camera().aspect_ratio(), 1.0);
    }
}
