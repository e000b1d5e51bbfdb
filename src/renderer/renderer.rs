//! The renderer: resolves the program of each material and draws geometry with it.

use crate::camera::Camera;
use crate::context::{
    AttachmentKind, BufferId, BufferKind, ClearFlags, DrawCall, GraphicsContext, VertexArrayId,
};
use crate::error::{GraphicsError, Result};
use crate::light::Lighting;
use crate::renderer::artist::{self, DrawStrategy};
use crate::renderer::programs::{
    self, LIT_FRAGMENT_SHADER, LIT_VERTEX_SHADER, SOLID_FRAGMENT_SHADER, SOLID_VERTEX_SHADER,
};
use crate::resource::{
    apply_material, AttributeKind, Framebuffer, GpuGeometry, Material, PrimitiveType,
    ShaderCache, ShaderProgram, ShadingModel, SolidPointLine,
};
use crate::scene::{Arena, CameraHandle, Mesh};
use glamx::{Mat4, Vec3};
use std::path::Path;

/// Size of the point markers, in pixels.
pub const POINT_SIZE: f32 = 7.0;

/// Vertices the shear matrix of a marker maps onto its end points.
const MARKER_BASIS: [Vec3; 2] = [Vec3::X, Vec3::Y];

#[derive(Copy, Clone, Debug)]
struct MarkerBuffers {
    vertex_array: VertexArrayId,
    basis: BufferId,
}

/// Draws geometry, meshes and point/line markers.
pub struct Renderer {
    cache: ShaderCache,
    camera: Option<CameraHandle>,
    view_projection: Mat4,
    eye_point: Vec3,
    lighting: Lighting,
    markers: Option<MarkerBuffers>,
    framebuffer: Option<Framebuffer>,
}

impl Default for Renderer {
    fn default() -> Self {
        Renderer {
            cache: ShaderCache::new(),
            camera: None,
            view_projection: Mat4::IDENTITY,
            eye_point: Vec3::ZERO,
            lighting: Lighting::default(),
            markers: None,
            framebuffer: None,
        }
    }
}

impl Renderer {
    /// A renderer with no program. Nothing can be drawn until programs are registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the built-in programs from `shader_dir` and creates the marker buffers.
    pub fn setup(ctx: &mut GraphicsContext, shader_dir: &Path) -> Result<Self> {
        let lit = programs::load_program(
            ctx,
            shader_dir,
            "lit",
            (LIT_VERTEX_SHADER, LIT_FRAGMENT_SHADER),
            programs::lit_layout(),
        )?;
        let solid = programs::load_program(
            ctx,
            shader_dir,
            "solid",
            (SOLID_VERTEX_SHADER, SOLID_FRAGMENT_SHADER),
            programs::solid_layout(),
        )?;

        log::info!("Loaded shader programs from {}.", shader_dir.display());
        Self::from_programs(ctx, lit, solid)
    }

    /// Registers already linked programs: `lit` for every Phong-style material and
    /// `solid` for flat colors and markers.
    pub fn from_programs(
        ctx: &mut GraphicsContext,
        lit: ShaderProgram,
        solid: ShaderProgram,
    ) -> Result<Self> {
        let mut renderer = Self::new();

        register_programs(&mut renderer.cache, lit, solid)?;
        renderer.create_markers(ctx)?;
        Ok(renderer)
    }

    fn create_markers(&mut self, ctx: &mut GraphicsContext) -> Result<()> {
        let program = self
            .cache
            .get(ShadingModel::SolidPointLine)
            .ok_or(GraphicsError::NoProgram(ShadingModel::SolidPointLine))?;
        let position = program
            .layout()
            .attribute(AttributeKind::Position.name())
            .cloned()
            .ok_or(GraphicsError::Unsupported("marker programs without positions"))?;

        let vertex_array = ctx.create_vertex_array()?;
        let basis = ctx.create_buffer(BufferKind::Array)?;
        ctx.upload_buffer(basis, bytemuck::cast_slice(&MARKER_BASIS))?;
        ctx.configure_attribute(vertex_array, basis, &position)?;
        ctx.set_point_size(POINT_SIZE);

        self.markers = Some(MarkerBuffers {
            vertex_array,
            basis,
        });
        Ok(())
    }

    pub fn shader_cache(&self) -> &ShaderCache {
        &self.cache
    }

    pub fn shader_cache_mut(&mut self) -> &mut ShaderCache {
        &mut self.cache
    }

    /// Sets the camera whose view [`Renderer::prepare`] uses.
    pub fn set_camera(&mut self, camera: Option<CameraHandle>) {
        self.camera = camera;
    }

    pub fn camera(&self) -> Option<CameraHandle> {
        self.camera
    }

    /// Takes the view of the current camera for the next draws.
    ///
    /// Without a live camera the previous view is kept.
    pub fn prepare(&mut self, cameras: &Arena<Camera>) {
        match self.camera.and_then(|h| cameras.get(h)) {
            Some(camera) => self.set_view(camera),
            None => log::debug!("No camera bound to the renderer; keeping the last view."),
        }
    }

    /// Takes the view of `camera` for the next draws.
    pub fn set_view(&mut self, camera: &Camera) {
        self.view_projection = camera.view_projection();
        self.eye_point = camera.position();
    }

    pub fn lighting(&self) -> &Lighting {
        &self.lighting
    }

    pub fn lighting_mut(&mut self) -> &mut Lighting {
        &mut self.lighting
    }

    /*
     * Geometry.
     */
    /// Creates the GPU objects of `geometry` for drawing with `material`, uploads its
    /// vertex data and uploads the textures of `material`.
    ///
    /// Fails without allocating anything if the geometry is already initialized or if
    /// no program renders `material`. If the vertex data is invalid or a texture of
    /// `material` cannot be created, the freshly created objects are released and the
    /// geometry stays uninitialized.
    pub fn initialize(
        &self,
        ctx: &mut GraphicsContext,
        geometry: &mut GpuGeometry,
        material: &mut Material,
    ) -> Result<()> {
        if geometry.is_initialized() {
            return Err(GraphicsError::AlreadyInitialized);
        }

        let program = self
            .cache
            .get_for(material)
            .ok_or_else(|| GraphicsError::NoProgram(material.shading_model()))?;

        geometry.initialize(ctx)?;
        let uploaded = configure_attributes(ctx, geometry, program).and_then(|_| {
            DrawStrategy::for_geometry(geometry).validate(geometry.buffer())?;
            artist::upload(ctx, geometry)
        });
        if let Err(e) = uploaded.and_then(|_| material.configure(ctx)) {
            geometry.release(ctx);
            return Err(e);
        }
        Ok(())
    }

    /// Draws `geometry` with an identity model matrix.
    pub fn draw(
        &self,
        ctx: &mut GraphicsContext,
        geometry: &mut GpuGeometry,
        material: &Material,
    ) -> Result<()> {
        self.draw_with_model(ctx, geometry, material, Mat4::IDENTITY)
    }

    fn draw_with_model(
        &self,
        ctx: &mut GraphicsContext,
        geometry: &mut GpuGeometry,
        material: &Material,
        model: Mat4,
    ) -> Result<()> {
        let Some(program) = self.cache.get_for(material) else {
            debug_assert!(false, "no program for {:?}", material.shading_model());
            log::warn!(
                "Skipping draw: no program renders {:?}.",
                material.shading_model()
            );
            return Ok(());
        };
        if !geometry.is_initialized() {
            debug_assert!(false, "drawing uninitialized geometry");
            log::warn!("Skipping draw of uninitialized geometry.");
            return Ok(());
        }

        let strategy = DrawStrategy::for_geometry(geometry);
        strategy.validate(geometry.buffer())?;

        program.use_program(ctx)?;
        program.set(ctx, "model", model)?;
        program.set(ctx, "viewProjection", self.view_projection)?;
        program.set(ctx, "eyePoint", self.eye_point)?;
        program.set(ctx, "shear", Mat4::IDENTITY)?;
        apply_material(material, program, ctx)?;
        self.lighting.apply(program, ctx)?;

        match strategy {
            DrawStrategy::PointLine => {
                let points = artist::point_line_positions(geometry.buffer())?;
                self.draw_marker(ctx, program, points, model)
            }
            _ => artist::draw(ctx, geometry, strategy),
        }
    }

    /*
     * Meshes.
     */
    /// Releases and re-creates the GPU objects of every piece of `mesh` for its material.
    pub fn initialize_mesh(
        &self,
        ctx: &mut GraphicsContext,
        mesh: &mut Mesh,
        materials: &mut Arena<Material>,
    ) -> Result<()> {
        mesh.release(ctx);

        let handle = mesh
            .material()
            .ok_or(GraphicsError::UnknownHandle("material"))?;
        let material = materials
            .get_mut(handle)
            .ok_or(GraphicsError::UnknownHandle("material"))?;

        let result = mesh
            .model_mut()
            .iter_mut()
            .try_for_each(|piece| self.initialize(ctx, piece, material));
        if let Err(e) = result {
            mesh.release(ctx);
            return Err(e);
        }

        log::debug!(
            "Initialized a mesh of {} pieces for {:?}.",
            mesh.model().len(),
            material.shading_model()
        );
        mesh.set_initialized(true);
        Ok(())
    }

    /// Draws every piece of `mesh` with its material and transform.
    pub fn draw_mesh(
        &self,
        ctx: &mut GraphicsContext,
        mesh: &mut Mesh,
        materials: &Arena<Material>,
    ) -> Result<()> {
        let Some(material) = mesh.material().and_then(|h| materials.get(h)) else {
            log::warn!("Skipping draw of a mesh without material.");
            return Ok(());
        };
        if !mesh.is_initialized() {
            log::warn!("Skipping draw of an uninitialized mesh.");
            return Ok(());
        }

        let model = mesh.transform();
        for piece in mesh.model_mut() {
            self.draw_with_model(ctx, piece, material, model)?;
        }
        Ok(())
    }

    /*
     * Markers.
     */
    /// Draws a point of `color` at `position`.
    pub fn draw_point(&self, ctx: &mut GraphicsContext, position: Vec3, color: Vec3) -> Result<()> {
        self.draw_flat_marker(ctx, &[position], color)
    }

    /// Draws a line of `color` from `start` to `end`.
    pub fn draw_line(
        &self,
        ctx: &mut GraphicsContext,
        start: Vec3,
        end: Vec3,
        color: Vec3,
    ) -> Result<()> {
        self.draw_flat_marker(ctx, &[start, end], color)
    }

    fn draw_flat_marker(&self, ctx: &mut GraphicsContext, points: &[Vec3], color: Vec3) -> Result<()> {
        let material = Material::SolidPointLine(SolidPointLine { color });
        let program = self
            .cache
            .get_for(&material)
            .ok_or(GraphicsError::NoProgram(ShadingModel::SolidPointLine))?;

        program.use_program(ctx)?;
        program.set(ctx, "viewProjection", self.view_projection)?;
        apply_material(&material, program, ctx)?;
        self.draw_marker(ctx, program, points, Mat4::IDENTITY)
    }

    fn draw_marker(
        &self,
        ctx: &mut GraphicsContext,
        program: &ShaderProgram,
        points: &[Vec3],
        model: Mat4,
    ) -> Result<()> {
        let markers = self.markers.ok_or(GraphicsError::NotInitialized)?;
        let (primitive, count) = match points.len() {
            1 => (PrimitiveType::Points, 1),
            2 => (PrimitiveType::Lines, 2),
            n => return Err(crate::error::GeometryError::PointLineCount(n).into()),
        };

        program.set(ctx, "model", model)?;
        program.set(ctx, "shear", artist::shear_matrix(points))?;
        let _ = ctx.bind_vertex_array(Some(markers.vertex_array));
        ctx.draw(DrawCall {
            primitive,
            first: 0,
            count,
            indexed: false,
        })
    }

    /*
     * Render target.
     */
    /// Renders to an offscreen `size` framebuffer with a depth attachment from now on.
    ///
    /// An existing framebuffer of the same size is kept.
    pub fn create_framebuffer(&mut self, ctx: &mut GraphicsContext, size: (u32, u32)) -> Result<()> {
        if self.framebuffer.as_ref().map(|f| f.size()) == Some(size) {
            return Ok(());
        }

        self.purge_framebuffer(ctx);
        let mut framebuffer = Framebuffer::new(size.0, size.1, Some(AttachmentKind::Depth));
        framebuffer.create(ctx)?;
        self.framebuffer = Some(framebuffer);
        Ok(())
    }

    /// Frees the offscreen framebuffer and renders to the screen again.
    pub fn purge_framebuffer(&mut self, ctx: &mut GraphicsContext) {
        if let Some(mut framebuffer) = self.framebuffer.take() {
            framebuffer.release(ctx);
        }
    }

    pub fn framebuffer(&self) -> Option<&Framebuffer> {
        self.framebuffer.as_ref()
    }

    /// Planes cleared at the start of a frame. The screen has color and depth.
    pub fn framebuffer_bitplane(&self) -> ClearFlags {
        self.framebuffer
            .as_ref()
            .map_or(ClearFlags::COLOR | ClearFlags::DEPTH, |f| f.bitplane())
    }

    /// Binds the current render target and clears it.
    pub fn clear(&self, ctx: &mut GraphicsContext, color: [f32; 4]) {
        let _ = ctx.bind_framebuffer(self.framebuffer.as_ref().and_then(|f| f.id()));
        ctx.clear(color, self.framebuffer_bitplane());
    }

    /// Frees the programs, the marker buffers and the framebuffer.
    pub fn release(&mut self, ctx: &mut GraphicsContext) {
        self.cache.release(ctx);
        if let Some(markers) = self.markers.take() {
            ctx.delete_buffer(markers.basis);
            ctx.delete_vertex_array(markers.vertex_array);
        }
        self.purge_framebuffer(ctx);
    }
}

/// Registers `lit` for every Phong-style shading model and `solid` for flat colors
/// and markers.
fn register_programs(
    cache: &mut ShaderCache,
    lit: ShaderProgram,
    solid: ShaderProgram,
) -> Result<()> {
    let bases = vec![(ShadingModel::Phong, lit), (ShadingModel::Solid, solid)];
    for (model, program) in bases {
        if !cache.register_program(model, program) {
            return Err(GraphicsError::DuplicateProgram(model));
        }
    }

    let shared = [
        (ShadingModel::Lambertian, ShadingModel::Phong),
        (ShadingModel::PhongTextured, ShadingModel::Phong),
        (ShadingModel::Textured, ShadingModel::Phong),
        (ShadingModel::SolidPointLine, ShadingModel::Solid),
    ];
    for &(model, base) in shared.iter() {
        if cache.contains(model) {
            return Err(GraphicsError::DuplicateProgram(model));
        }
        if !cache.register_shared(model, base) {
            return Err(GraphicsError::NoProgram(base));
        }
    }
    Ok(())
}

/// Feeds every attribute the program declares from the matching geometry buffer.
fn configure_attributes(
    ctx: &mut GraphicsContext,
    geometry: &GpuGeometry,
    program: &ShaderProgram,
) -> Result<()> {
    let handles = *geometry.handles().ok_or(GraphicsError::NotInitialized)?;
    let buffer = geometry.buffer();

    for kind in AttributeKind::ALL.iter() {
        let present = match kind {
            AttributeKind::Position => buffer.vertices().is_some(),
            AttributeKind::Normal => buffer.normals().is_some(),
            AttributeKind::Color => buffer.colors().is_some(),
            AttributeKind::Texel => buffer.texels().is_some(),
        };

        match program.layout().attribute(kind.name()) {
            Some(attribute) => {
                if !present {
                    log::warn!(
                        "Program `{}` expects a `{}` attribute the geometry lacks.",
                        program.label(),
                        kind.name()
                    );
                }
                ctx.configure_attribute(handles.vertex_array, handles.buffer(*kind), attribute)?;
            }
            None if present => log::debug!(
                "Program `{}` has no `{}` attribute; skipping it.",
                program.label(),
                kind.name()
            ),
            None => {}
        }
    }

    if buffer.indices().is_some() {
        ctx.set_index_buffer(handles.vertex_array, handles.indices)?;
    }
    Ok(())
}
