//! The model viewer application: one mesh, three selectable materials, three lights and
//! an orbiting camera, persisted across runs.

use crate::camera::{Camera, OrbitalControls, ProjectionKind};
use crate::context::GraphicsContext;
use crate::error::Result;
use crate::loader::{ModelLoader, TextureKind, TextureLoader};
use crate::math::{compute_center, compute_scale, MAX_MODEL_SIZE};
use crate::renderer::Renderer;
use crate::resource::{Lambertian, Material, Phong, PhongTextured, ShadingModel};
use crate::scene::{Arena, CameraHandle, MaterialHandle, Mesh};
use crate::settings::{merge_fields, Restorable, Settings, SETTINGS_FILE};
use crate::window::{Canvas, EventContext, WindowCallbacks, WindowEvent, WindowSetup};
use glamx::Vec3;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Background color of a fresh scene.
pub const CLEAR_COLOR: [f32; 4] = [0.305, 0.520, 0.828, 1.0];

const AXES: [(Vec3, Vec3); 3] = [
    (Vec3::X, Vec3::new(1.0, 0.0, 0.0)),
    (Vec3::Y, Vec3::new(0.0, 1.0, 0.0)),
    (Vec3::Z, Vec3::new(0.0, 0.0, 1.0)),
];

/// Where the viewer finds its inputs.
#[derive(Clone, Debug, PartialEq)]
pub struct ViewerOptions {
    /// Model shown at startup.
    pub model: Option<PathBuf>,
    pub shader_dir: PathBuf,
    pub settings: PathBuf,
}

impl Default for ViewerOptions {
    fn default() -> Self {
        ViewerOptions {
            model: None,
            shader_dir: PathBuf::from("shaders"),
            settings: PathBuf::from(SETTINGS_FILE),
        }
    }
}

/// A request raised by the controls and carried out between events.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Command {
    SetProjection(ProjectionKind),
    SetWireframe(bool),
    Save,
    Close,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WindowState {
    size: [u32; 2],
    position: Option<[i32; 2]>,
    maximized: bool,
}

impl Default for WindowState {
    fn default() -> Self {
        WindowState {
            size: [800, 600],
            position: None,
            maximized: false,
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SceneState {
    clear_color: [f32; 4],
    ambient_color: Vec3,
    ambient_intensity: f32,
}

/// The viewer state, independent of the window it is shown in.
pub struct Viewer {
    settings_path: PathBuf,
    window: WindowState,
    clear_color: [f32; 4],
    show_axes: bool,
    running: bool,

    renderer: Renderer,
    cameras: Arena<Camera>,
    camera: CameraHandle,
    controls: OrbitalControls,
    commands: Rc<RefCell<Vec<Command>>>,

    materials: Arena<Material>,
    lambertian: MaterialHandle,
    phong: MaterialHandle,
    phong_textured: MaterialHandle,
    mesh: Mesh,
}

impl Viewer {
    /// A viewer drawing with `renderer` and saving to `settings_path`.
    pub fn new(renderer: Renderer, settings_path: &Path) -> Self {
        let window = WindowState::default();

        let mut camera = Camera::perspective(
            45.0f32.to_radians(),
            window.size[0] as f32 / window.size[1] as f32,
            0.01,
            150.0,
        );
        camera.look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO);
        camera.update();

        let mut cameras = Arena::new();
        let camera = cameras.insert(camera);

        let mut materials = Arena::new();
        let lambertian = materials.insert(Material::Lambertian(Lambertian::default()));
        let phong = materials.insert(Material::Phong(Phong::default()));
        let phong_textured = materials.insert(Material::PhongTextured(PhongTextured::default()));

        let mut viewer = Viewer {
            settings_path: settings_path.to_path_buf(),
            window,
            clear_color: CLEAR_COLOR,
            show_axes: true,
            running: true,
            renderer,
            cameras,
            camera,
            controls: OrbitalControls::new(),
            commands: Rc::new(RefCell::new(Vec::new())),
            materials,
            lambertian,
            phong,
            phong_textured,
            mesh: Mesh::with_model(Vec::new(), Some(phong)),
        };

        *viewer.renderer.lighting_mut() = crate::light::Lighting::three_point();
        viewer.renderer.set_camera(Some(camera));
        viewer.controls.bind(Some(camera));
        viewer.connect_controls();
        viewer
    }

    fn connect_controls(&mut self) {
        let queue = self.commands.clone();
        self.controls
            .projection_changed
            .connect(move |kind| queue.borrow_mut().push(Command::SetProjection(*kind)));

        let queue = self.commands.clone();
        self.controls
            .wireframe_changed
            .connect(move |on| queue.borrow_mut().push(Command::SetWireframe(*on)));

        let queue = self.commands.clone();
        self.controls
            .saved
            .connect(move |_| queue.borrow_mut().push(Command::Save));

        let queue = self.commands.clone();
        self.controls
            .close_requested
            .connect(move |_| queue.borrow_mut().push(Command::Close));
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn camera(&self) -> Option<&Camera> {
        self.cameras.get(self.camera)
    }

    pub fn controls(&self) -> &OrbitalControls {
        &self.controls
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut Renderer {
        &mut self.renderer
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn mesh_mut(&mut self) -> &mut Mesh {
        &mut self.mesh
    }

    pub fn materials(&self) -> &Arena<Material> {
        &self.materials
    }

    pub fn clear_color(&self) -> [f32; 4] {
        self.clear_color
    }

    pub fn set_clear_color(&mut self, color: [f32; 4]) {
        self.clear_color = color;
    }

    /// Whether the world axes are drawn on top of the model.
    pub fn set_show_axes(&mut self, show: bool) {
        self.show_axes = show;
    }

    /// The window placement to open with, as last saved.
    pub fn window_setup(&self) -> WindowSetup {
        WindowSetup {
            size: (self.window.size[0], self.window.size[1]),
            position: self.window.position.map(|[x, y]| (x, y)),
            maximized: self.window.maximized,
            ..WindowSetup::default()
        }
    }

    /// Records the current window placement for the next save.
    pub fn sync_window(&mut self, setup: &WindowSetup) {
        self.window.size = [setup.size.0, setup.size.1];
        if let Some((x, y)) = setup.position {
            self.window.position = Some([x, y]);
        }
        self.window.maximized = setup.maximized;
    }

    /*
     * Model.
     */
    /// Shows the model at `path`, scaled and centered to fit the view.
    ///
    /// Its diffuse, emissive and specular maps go to the textured material, which is
    /// selected if the model has a diffuse map. Returns whether any geometry was loaded.
    pub fn load_model(&mut self, ctx: &mut GraphicsContext, path: &Path) -> bool {
        let mut loaded = ModelLoader::new().load(path);
        if loaded.is_empty() {
            return false;
        }

        self.close_model(ctx);
        let _ = self.mesh.set_model(std::mem::take(&mut loaded.pieces));
        self.fit_model();

        let loader = TextureLoader::new();
        let mut load_map = |kind: TextureKind| {
            let texture = loader.load(ctx, loaded.texture(kind)?, kind, true);
            Some(texture).filter(|t| !t.is_empty())
        };
        let diffuse = load_map(TextureKind::Diffuse);
        let emissive = load_map(TextureKind::Emissive);
        let specular = load_map(TextureKind::Specular);

        let has_diffuse = diffuse.is_some();
        if let Some(Material::PhongTextured(m)) = self.materials.get_mut(self.phong_textured) {
            m.diffuse_map = diffuse;
            m.emissive_map = emissive;
            m.specular_map = specular;
        }

        if has_diffuse {
            let _ = self.select_material(ShadingModel::PhongTextured);
        }
        true
    }

    /// Centers the model bounding box on the origin and scales it to fit the view.
    pub fn fit_model(&mut self) {
        let center = compute_center(self.mesh.model());
        let scale = compute_scale(self.mesh.model(), MAX_MODEL_SIZE);
        self.mesh.scale = scale;
        self.mesh.position = -center * scale;
    }

    /// Removes the model and frees its GPU objects and texture maps.
    pub fn close_model(&mut self, ctx: &mut GraphicsContext) {
        self.mesh.release(ctx);
        for mut piece in self.mesh.set_model(Vec::new()) {
            piece.release(ctx);
        }
        if let Some(material) = self.materials.get_mut(self.phong_textured) {
            material.release(ctx);
            if let Material::PhongTextured(m) = material {
                m.diffuse_map = None;
                m.emissive_map = None;
                m.specular_map = None;
            }
        }
    }

    /// Draws the mesh with one of the three viewer materials.
    ///
    /// Returns `false` for any other shading model.
    pub fn select_material(&mut self, model: ShadingModel) -> bool {
        let handle = match model {
            ShadingModel::Lambertian => self.lambertian,
            ShadingModel::Phong => self.phong,
            ShadingModel::PhongTextured => self.phong_textured,
            _ => return false,
        };
        if self.mesh.material() != Some(handle) {
            self.mesh.set_material(Some(handle));
        }
        true
    }

    /*
     * Events.
     */
    /// Reacts to one window event, then carries out the commands it raised.
    pub fn handle_event(&mut self, ctx: &mut GraphicsContext, event: &WindowEvent) {
        match *event {
            WindowEvent::Close => {
                self.running = false;
                return;
            }
            WindowEvent::FramebufferSize(w, h) if w > 0 && h > 0 => self.window.size = [w, h],
            _ => {}
        }

        let mut cx = EventContext {
            graphics: ctx,
            cameras: &mut self.cameras,
        };
        self.controls.handle_event(&mut cx, event);
        self.process_commands();
    }

    /// Carries out the queued commands, in the order they were raised.
    pub fn process_commands(&mut self) {
        let commands: Vec<Command> = self.commands.borrow_mut().drain(..).collect();

        for command in commands {
            log::debug!("Command: {:?}", command);
            match command {
                Command::SetProjection(kind) => self.set_projection(kind),
                Command::SetWireframe(wireframe) => {
                    for material in self.materials.values_mut() {
                        material.set_wireframe(wireframe);
                    }
                }
                Command::Save => {
                    if let Err(e) = self.save() {
                        log::error!("Failed to save {}: {}", self.settings_path.display(), e);
                    }
                }
                Command::Close => self.running = false,
            }
        }
    }

    /// Swaps the camera for one with the requested projection, behind the same handle.
    fn set_projection(&mut self, kind: ProjectionKind) {
        let Some(current) = self.cameras.get(self.camera) else {
            return;
        };
        if current.projection_kind() == kind {
            return;
        }

        let mut swapped = current.with_projection(kind);
        swapped.update();
        if self.cameras.replace(self.camera, swapped).is_ok() {
            self.controls.bind(Some(self.camera));
            self.renderer.set_camera(Some(self.camera));
            log::info!("Switched to {:?} projection.", kind);
        }
    }

    /*
     * Frames.
     */
    pub fn update(&mut self) {
        if let Some(camera) = self.cameras.get_mut(self.camera) {
            camera.update();
        }
    }

    /// Clears the target and draws the mesh and the world axes.
    ///
    /// A model that fails to initialize is logged and closed.
    pub fn render(&mut self, ctx: &mut GraphicsContext) -> Result<()> {
        self.renderer.prepare(&self.cameras);
        self.renderer.clear(ctx, self.clear_color);

        if !self.mesh.model().is_empty() && self.mesh.material().is_some() {
            if !self.mesh.is_initialized() {
                if let Err(e) =
                    self.renderer
                        .initialize_mesh(ctx, &mut self.mesh, &mut self.materials)
                {
                    log::error!("Failed to initialize the model: {}", e);
                    self.close_model(ctx);
                }
            }
            if self.mesh.is_initialized() {
                self.renderer.draw_mesh(ctx, &mut self.mesh, &self.materials)?;
            }
        }

        if self.show_axes {
            for (axis, color) in AXES.iter() {
                self.renderer.draw_line(ctx, Vec3::ZERO, *axis, *color)?;
            }
        }
        Ok(())
    }

    /// Updates the camera and renders one frame to the device.
    pub fn frame(&mut self, ctx: &mut GraphicsContext) -> Result<()> {
        self.update();
        ctx.begin_frame()?;
        let rendered = self.render(ctx);
        ctx.end_frame()?;
        rendered
    }

    /*
     * Persistence.
     */
    /// Writes the viewer state into the settings file, keeping its other sections.
    pub fn save(&self) -> io::Result<()> {
        let mut settings = Settings::load(&self.settings_path).unwrap_or_default();
        settings.store(self);
        settings.save(&self.settings_path)?;
        log::info!("Saved settings to {}.", self.settings_path.display());
        Ok(())
    }

    /// Saves, then frees every GPU object of the viewer.
    pub fn shutdown(&mut self, ctx: &mut GraphicsContext) {
        if let Err(e) = self.save() {
            log::error!("Failed to save {}: {}", self.settings_path.display(), e);
        }

        self.close_model(ctx);
        for material in self.materials.values_mut() {
            material.release(ctx);
        }
        self.renderer.release(ctx);
    }

    fn scene_state(&self) -> SceneState {
        let lighting = self.renderer.lighting();
        SceneState {
            clear_color: self.clear_color,
            ambient_color: lighting.ambient_color,
            ambient_intensity: lighting.ambient_intensity,
        }
    }

    fn material_handles(&self) -> [MaterialHandle; 3] {
        [self.lambertian, self.phong, self.phong_textured]
    }
}

fn payload(material: &Material) -> &dyn Restorable {
    match material {
        Material::Lambertian(m) => m,
        Material::Phong(m) => m,
        Material::PhongTextured(m) | Material::Textured(m) => m,
        Material::Solid(m) => m,
        Material::SolidPointLine(m) => m,
    }
}

fn payload_mut(material: &mut Material) -> &mut dyn Restorable {
    match material {
        Material::Lambertian(m) => m,
        Material::Phong(m) => m,
        Material::PhongTextured(m) | Material::Textured(m) => m,
        Material::Solid(m) => m,
        Material::SolidPointLine(m) => m,
    }
}

impl Restorable for Viewer {
    fn id(&self) -> &'static str {
        "Application"
    }

    fn state(&self) -> Value {
        let mut state = Map::new();
        let mut insert = |key: &str, value: Value| {
            let _ = state.insert(key.to_string(), value);
        };

        insert("Window", serde_json::to_value(self.window).unwrap_or(Value::Null));
        insert("Scene", serde_json::to_value(self.scene_state()).unwrap_or(Value::Null));
        insert("Lighting", self.renderer.lighting().save_lights());
        insert(self.mesh.id(), self.mesh.state());

        let mut materials = Map::new();
        for handle in self.material_handles().iter() {
            if let Some(material) = self.materials.get(*handle) {
                let material = payload(material);
                let _ = materials.insert(material.id().to_string(), material.state());
            }
        }
        insert("Materials", Value::Object(materials));

        if let Some(camera) = self.cameras.get(self.camera) {
            insert(camera.id(), camera.state());
        }
        Value::Object(state)
    }

    fn restore(&mut self, settings: &Value) {
        if !settings.is_object() {
            return;
        }

        if let Some(window) = settings.get("Window").and_then(|s| merge_fields(&self.window, s)) {
            self.window = window;
        }

        if let Some(scene) = settings
            .get("Scene")
            .and_then(|s| merge_fields(&self.scene_state(), s))
        {
            self.clear_color = scene.clear_color;
            let lighting = self.renderer.lighting_mut();
            lighting.ambient_color = scene.ambient_color;
            lighting.ambient_intensity = scene.ambient_intensity;
        }

        if let Some(lights) = settings.get("Lighting") {
            self.renderer.lighting_mut().restore_lights(lights);
        }

        if let Some(mesh) = settings.get(self.mesh.id()) {
            self.mesh.restore(mesh);
        }

        if let Some(saved) = settings.get("Materials") {
            for handle in self.material_handles().iter() {
                if let Some(material) = self.materials.get_mut(*handle) {
                    let material = payload_mut(material);
                    if let Some(state) = saved.get(material.id()) {
                        material.restore(state);
                    }
                }
            }
        }

        if let Some(camera) = self.cameras.get_mut(self.camera) {
            if let Some(state) = settings.get(camera.id()) {
                camera.restore(state);
            }
        }
        self.controls.bind(Some(self.camera));
    }
}

/// Opens the viewer window and runs it until it is closed.
pub fn run(options: &ViewerOptions) -> Result<()> {
    let settings = Settings::load(&options.settings)?;

    // The renderer needs a device, which needs the window, which needs the saved placement.
    let mut placement = Viewer::new(Renderer::new(), &options.settings);
    let _ = settings.apply_to(&mut placement);

    let (mut canvas, mut ctx) = Canvas::open(&placement.window_setup())?;
    let renderer = Renderer::setup(&mut ctx, &options.shader_dir)?;

    let mut viewer = Viewer::new(renderer, &options.settings);
    let _ = settings.apply_to(&mut viewer);
    if let Some(model) = &options.model {
        let _ = viewer.load_model(&mut ctx, model);
    }

    while viewer.is_running() {
        for event in canvas.poll_events(&mut ctx) {
            viewer.handle_event(&mut ctx, &event);
        }
        if !viewer.is_running() {
            break;
        }

        if let Err(e) = viewer.frame(&mut ctx) {
            log::error!("Frame failed: {}", e);
        }
        canvas.request_redraw();
    }

    viewer.sync_window(&canvas.setup());
    viewer.shutdown(&mut ctx);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{DeviceCall, HeadlessDevice};
    use crate::renderer::{lit_layout, solid_layout};
    use crate::resource::{ShaderProgram, ShaderStage};
    use crate::window::{Action, Key, Modifiers};
    use serde_json::json;

    fn linked(ctx: &mut GraphicsContext, label: &str, layout: crate::resource::ProgramLayout) -> ShaderProgram {
        let mut program = ShaderProgram::new(label, layout);
        program.attach(ShaderStage::Vertex, String::new());
        program.attach(ShaderStage::Fragment, String::new());
        program.compile_and_link(ctx).unwrap();
        program
    }

    fn viewer(ctx: &mut GraphicsContext, settings: &Path) -> Viewer {
        let lit = linked(ctx, "lit", lit_layout());
        let solid = linked(ctx, "solid", solid_layout());
        let renderer = Renderer::from_programs(ctx, lit, solid).unwrap();
        Viewer::new(renderer, settings)
    }

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("modelview-viewer");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    fn press(viewer: &mut Viewer, ctx: &mut GraphicsContext, key: Key, modifiers: Modifiers) {
        viewer.handle_event(ctx, &WindowEvent::Key(key, Action::Press, modifiers));
    }

    #[test]
    fn starts_with_the_default_scene() {
        let mut ctx = GraphicsContext::headless();
        let viewer = viewer(&mut ctx, &scratch("defaults.json"));

        let camera = viewer.camera().unwrap();
        assert_eq!(camera.position(), Vec3::new(0.0, 0.0, 5.0));
        assert!((camera.aspect_ratio() - 800.0 / 600.0).abs() < 1.0e-6);
        assert!((camera.fov_y() - 45.0f32.to_radians()).abs() < 1.0e-6);
        assert_eq!((camera.near(), camera.far()), (0.01, 150.0));

        assert_eq!(viewer.clear_color(), CLEAR_COLOR);
        let lights = &viewer.renderer().lighting().lights;
        assert!(lights[0].enabled && lights[1].enabled && !lights[2].enabled);
        assert_eq!(viewer.mesh().material(), Some(viewer.phong));
    }

    #[test]
    fn projection_keys_swap_the_camera_behind_its_handle() {
        let mut ctx = GraphicsContext::headless();
        let mut viewer = viewer(&mut ctx, &scratch("projection.json"));
        let handle = viewer.camera;

        press(&mut viewer, &mut ctx, Key::Key2, Modifiers::empty());
        assert!(viewer.camera().unwrap().is_orthographic());
        assert_eq!(viewer.controls().camera(), Some(handle));
        assert_eq!(viewer.renderer().camera(), Some(handle));

        press(&mut viewer, &mut ctx, Key::Key1, Modifiers::empty());
        let camera = viewer.camera().unwrap();
        assert!(!camera.is_orthographic());
        assert!((camera.fov_y() - 45.0f32.to_radians()).abs() < 1.0e-6);
    }

    #[test]
    fn wireframe_toggles_every_material() {
        let mut ctx = GraphicsContext::headless();
        let mut viewer = viewer(&mut ctx, &scratch("wireframe.json"));

        press(&mut viewer, &mut ctx, Key::W, Modifiers::empty());
        assert!(viewer.materials().iter().all(|(_, m)| m.wireframe()));

        press(&mut viewer, &mut ctx, Key::W, Modifiers::empty());
        assert!(viewer.materials().iter().all(|(_, m)| !m.wireframe()));
    }

    #[test]
    fn escape_and_close_stop_the_viewer() {
        let mut ctx = GraphicsContext::headless();
        let mut viewer = viewer(&mut ctx, &scratch("close.json"));
        press(&mut viewer, &mut ctx, Key::Escape, Modifiers::empty());
        assert!(!viewer.is_running());

        let mut viewer = self::viewer(&mut ctx, &scratch("close.json"));
        viewer.handle_event(&mut ctx, &WindowEvent::Close);
        assert!(!viewer.is_running());
    }

    #[test]
    fn control_s_saves_and_a_new_viewer_restores() {
        let path = scratch("roundtrip.json");
        let mut ctx = GraphicsContext::headless();
        let mut viewer = viewer(&mut ctx, &path);

        viewer.set_clear_color([0.1, 0.2, 0.3, 1.0]);
        viewer.renderer_mut().lighting_mut().ambient_intensity = 0.25;
        viewer.renderer_mut().lighting_mut().lights[2].enabled = true;
        viewer.mesh_mut().yaw = 1.5;
        viewer.handle_event(&mut ctx, &WindowEvent::FramebufferSize(1024, 512));
        press(&mut viewer, &mut ctx, Key::S, Modifiers::Control);
        assert!(path.is_file());

        let settings = Settings::load(&path).unwrap();
        let mut restored = self::viewer(&mut ctx, &path);
        assert!(settings.apply_to(&mut restored));

        assert_eq!(restored.clear_color(), [0.1, 0.2, 0.3, 1.0]);
        assert_eq!(restored.renderer().lighting().ambient_intensity, 0.25);
        assert!(restored.renderer().lighting().lights[2].enabled);
        assert_eq!(restored.mesh().yaw, 1.5);
        assert_eq!(restored.window_setup().size, (1024, 512));
        assert!((restored.camera().unwrap().aspect_ratio() - 2.0).abs() < 1.0e-6);
    }

    #[test]
    fn saved_document_has_the_application_sections() {
        let mut ctx = GraphicsContext::headless();
        let viewer = viewer(&mut ctx, &scratch("sections.json"));
        let state = viewer.state();

        for key in ["Window", "Scene", "Lighting", "Mesh", "Materials", "Camera"].iter() {
            assert!(state.get(*key).is_some(), "missing {}", key);
        }
        let materials = &state["Materials"];
        assert!(materials.get("LambertianMaterial").is_some());
        assert!(materials.get("PhongMaterial").is_some());
        assert!(materials.get("PhongTexturedMaterial").is_some());
        assert_eq!(state["Lighting"].as_array().map(|a| a.len()), Some(3));
    }

    #[test]
    fn restore_ignores_malformed_sections() {
        let mut ctx = GraphicsContext::headless();
        let mut viewer = viewer(&mut ctx, &scratch("malformed.json"));

        viewer.restore(&json!({
            "Scene": { "clearColor": "blue", "ambientIntensity": 0.5 },
            "Lighting": [{}, {}, {}, {}],
            "Materials": { "PhongMaterial": { "shininess": 3.0 } },
        }));

        assert_eq!(viewer.clear_color(), CLEAR_COLOR);
        assert_eq!(viewer.renderer().lighting().ambient_intensity, 0.0);
        match viewer.materials().get(viewer.phong) {
            Some(Material::Phong(m)) => assert_eq!(m.shininess, 3.0),
            other => panic!("unexpected material {:?}", other),
        }

        viewer.restore(&json!(42));
        assert_eq!(viewer.clear_color(), CLEAR_COLOR);
    }

    #[test]
    fn fitting_centers_and_scales_the_model() {
        use crate::procedural::Cuboid;

        let mut ctx = GraphicsContext::headless();
        let mut viewer = viewer(&mut ctx, &scratch("fit.json"));
        let mut cuboid = Cuboid::new(4.0, 4.0, 4.0).into_geometry();
        for v in cuboid.buffer_mut().vertices_mut().iter_mut() {
            *v += Vec3::new(10.0, 0.0, 0.0);
        }
        let _ = viewer.mesh_mut().set_model(vec![cuboid]);
        viewer.fit_model();

        let mesh = viewer.mesh();
        assert!((mesh.scale - 0.5).abs() < 1.0e-6);
        let center = mesh.transform().transform_point3(Vec3::new(10.0, 0.0, 0.0));
        assert!(center.length() < 1.0e-5);
    }

    #[test]
    fn frames_draw_the_mesh_and_the_axes() {
        use crate::procedural::Cuboid;

        let mut ctx = GraphicsContext::headless();
        let mut viewer = viewer(&mut ctx, &scratch("frame.json"));
        let _ = viewer
            .mesh_mut()
            .set_model(vec![Cuboid::new(1.0, 1.0, 1.0).into_geometry()]);

        viewer.frame(&mut ctx).unwrap();
        viewer.frame(&mut ctx).unwrap();
        assert!(viewer.mesh().is_initialized());

        let device = ctx.downcast_device::<HeadlessDevice>().unwrap();
        // One cube and three axes per frame.
        assert_eq!(device.draw_calls().len(), 8);
        assert!(device
            .calls()
            .iter()
            .any(|c| matches!(c, DeviceCall::Clear(..))));
    }

    #[test]
    fn switching_material_reinitializes_the_mesh() {
        use crate::procedural::Cuboid;

        let mut ctx = GraphicsContext::headless();
        let mut viewer = viewer(&mut ctx, &scratch("material.json"));
        viewer.set_show_axes(false);
        let _ = viewer
            .mesh_mut()
            .set_model(vec![Cuboid::new(1.0, 1.0, 1.0).into_geometry()]);
        viewer.render(&mut ctx).unwrap();

        assert!(viewer.select_material(ShadingModel::Lambertian));
        assert!(!viewer.mesh().is_initialized());
        viewer.render(&mut ctx).unwrap();
        assert!(viewer.mesh().is_initialized());
        assert!(!viewer.select_material(ShadingModel::Solid));
    }

    #[test]
    fn missing_models_leave_the_scene_empty() {
        let mut ctx = GraphicsContext::headless();
        let mut viewer = viewer(&mut ctx, &scratch("missing.json"));
        assert!(!viewer.load_model(&mut ctx, Path::new("/nonexistent/model.gltf")));
        assert!(viewer.mesh().model().is_empty());
    }
}
