//! A GPU device that only records what it is asked to do.

use crate::context::device::{
    AttachmentKind, BufferId, BufferKind, ClearFlags, DrawCall, FramebufferId, GpuDevice,
    ProgramDescriptor, ProgramId, TextureDescriptor, TextureId, VertexArrayId, Viewport,
};
use crate::error::{GraphicsError, Result};
use crate::resource::{ProgramLayout, UniformValue, VertexAttribute};
use std::any::Any;
use std::collections::HashMap;

/// One recorded device call.
#[derive(Clone, Debug, PartialEq)]
pub enum DeviceCall {
    CreateVertexArray(VertexArrayId),
    CreateBuffer(BufferId, BufferKind),
    UploadBuffer(BufferId, usize),
    ConfigureAttribute(VertexArrayId, BufferId, u32),
    SetIndexBuffer(VertexArrayId, BufferId),
    CreateProgram(ProgramId),
    SetUniform(ProgramId, String, UniformValue),
    CreateTexture(TextureId),
    CreateFramebuffer(FramebufferId),
    Attach(FramebufferId, AttachmentKind, TextureId),
    BindProgram(Option<ProgramId>),
    BindVertexArray(Option<VertexArrayId>),
    BindTexture(u32, Option<TextureId>),
    BindFramebuffer(Option<FramebufferId>),
    SetViewport(Viewport),
    SetPointSize(f32),
    Clear([f32; 4], ClearFlags),
    Draw(DrawCall),
    BeginFrame,
    EndFrame,
    DeleteVertexArray(VertexArrayId),
    DeleteBuffer(BufferId),
    DeleteProgram(ProgramId),
    DeleteTexture(TextureId),
    DeleteFramebuffer(FramebufferId),
}

#[derive(Default)]
struct VertexArrayState {
    attributes: HashMap<u32, BufferId>,
    index_buffer: Option<BufferId>,
}

struct ProgramState {
    layout: ProgramLayout,
    values: Vec<Option<UniformValue>>,
}

/// A device with no GPU behind it.
///
/// It keeps enough state to validate calls (unknown handles are errors) and exposes
/// everything it recorded for inspection.
#[derive(Default)]
pub struct HeadlessDevice {
    next_id: u32,
    calls: Vec<DeviceCall>,
    vertex_arrays: HashMap<VertexArrayId, VertexArrayState>,
    buffers: HashMap<BufferId, (BufferKind, usize)>,
    programs: HashMap<ProgramId, ProgramState>,
    textures: HashMap<TextureId, TextureDescriptor>,
    framebuffers: HashMap<FramebufferId, Vec<(AttachmentKind, TextureId)>>,
    program: Option<ProgramId>,
    vertex_array: Option<VertexArrayId>,
    failing_programs: bool,
    failing_textures: bool,
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent program creation fail as a compilation error would.
    pub fn fail_program_creation(&mut self, fail: bool) {
        self.failing_programs = fail;
    }

    /// Makes every subsequent texture creation fail as an allocation error would.
    pub fn fail_texture_creation(&mut self, fail: bool) {
        self.failing_textures = fail;
    }

    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> &[DeviceCall] {
        &self.calls
    }

    /// The draw calls received so far.
    pub fn draw_calls(&self) -> Vec<DrawCall> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                DeviceCall::Draw(d) => Some(*d),
                _ => None,
            })
            .collect()
    }

    /// Number of buffer uploads received so far.
    pub fn upload_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, DeviceCall::UploadBuffer(..)))
            .count()
    }

    /// The last value written to a uniform.
    pub fn uniform(&self, program: ProgramId, name: &str) -> Option<UniformValue> {
        let state = self.programs.get(&program)?;
        let index = state.layout.uniform_index(name)?;
        state.values[index]
    }

    /// The buffer feeding `location` in `vao`.
    pub fn attribute_buffer(&self, vao: VertexArrayId, location: u32) -> Option<BufferId> {
        self.vertex_arrays
            .get(&vao)?
            .attributes
            .get(&location)
            .copied()
    }

    pub fn live_vertex_arrays(&self) -> usize {
        self.vertex_arrays.len()
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn live_framebuffers(&self) -> usize {
        self.framebuffers.len()
    }

    /// Attachments of a framebuffer.
    pub fn attachments(&self, framebuffer: FramebufferId) -> &[(AttachmentKind, TextureId)] {
        self.framebuffers
            .get(&framebuffer)
            .map(|a| &a[..])
            .unwrap_or(&[])
    }
}

impl GpuDevice for HeadlessDevice {
    fn create_vertex_array(&mut self) -> Result<VertexArrayId> {
        let id = VertexArrayId(self.next());
        let _ = self.vertex_arrays.insert(id, VertexArrayState::default());
        self.calls.push(DeviceCall::CreateVertexArray(id));
        Ok(id)
    }

    fn create_buffer(&mut self, kind: BufferKind) -> Result<BufferId> {
        let id = BufferId(self.next());
        let _ = self.buffers.insert(id, (kind, 0));
        self.calls.push(DeviceCall::CreateBuffer(id, kind));
        Ok(id)
    }

    fn buffer_size(&self, buffer: BufferId) -> usize {
        self.buffers.get(&buffer).map(|b| b.1).unwrap_or(0)
    }

    fn upload_buffer(&mut self, buffer: BufferId, data: &[u8]) -> Result<()> {
        let entry = self
            .buffers
            .get_mut(&buffer)
            .ok_or(GraphicsError::UnknownHandle("buffer"))?;
        entry.1 = data.len();
        self.calls.push(DeviceCall::UploadBuffer(buffer, data.len()));
        Ok(())
    }

    fn configure_attribute(
        &mut self,
        vao: VertexArrayId,
        buffer: BufferId,
        attribute: &VertexAttribute,
    ) -> Result<()> {
        if !self.buffers.contains_key(&buffer) {
            return Err(GraphicsError::UnknownHandle("buffer"));
        }
        let state = self
            .vertex_arrays
            .get_mut(&vao)
            .ok_or(GraphicsError::UnknownHandle("vertex array"))?;
        let _ = state.attributes.insert(attribute.location, buffer);
        self.calls.push(DeviceCall::ConfigureAttribute(
            vao,
            buffer,
            attribute.location,
        ));
        Ok(())
    }

    fn set_index_buffer(&mut self, vao: VertexArrayId, buffer: BufferId) -> Result<()> {
        if !self.buffers.contains_key(&buffer) {
            return Err(GraphicsError::UnknownHandle("buffer"));
        }
        let state = self
            .vertex_arrays
            .get_mut(&vao)
            .ok_or(GraphicsError::UnknownHandle("vertex array"))?;
        state.index_buffer = Some(buffer);
        self.calls.push(DeviceCall::SetIndexBuffer(vao, buffer));
        Ok(())
    }

    fn create_program(&mut self, desc: &ProgramDescriptor) -> Result<ProgramId> {
        if self.failing_programs {
            return Err(GraphicsError::Compile {
                label: desc.label.to_string(),
                message: "program creation disabled".to_string(),
            });
        }

        let id = ProgramId(self.next());
        let _ = self.programs.insert(
            id,
            ProgramState {
                layout: desc.layout.clone(),
                values: vec![None; desc.layout.uniforms.len()],
            },
        );
        self.calls.push(DeviceCall::CreateProgram(id));
        Ok(id)
    }

    fn set_uniform(&mut self, program: ProgramId, index: usize, value: UniformValue) -> Result<()> {
        let state = self
            .programs
            .get_mut(&program)
            .ok_or(GraphicsError::UnknownHandle("program"))?;
        let name = state
            .layout
            .uniforms
            .get(index)
            .map(|u| u.name.clone())
            .ok_or(GraphicsError::UnknownHandle("uniform"))?;
        state.values[index] = Some(value);
        self.calls.push(DeviceCall::SetUniform(program, name, value));
        Ok(())
    }

    fn create_texture(&mut self, desc: &TextureDescriptor, _pixels: &[u8]) -> Result<TextureId> {
        if self.failing_textures {
            return Err(GraphicsError::Unsupported("texture creation"));
        }

        let id = TextureId(self.next());
        let _ = self.textures.insert(id, desc.clone());
        self.calls.push(DeviceCall::CreateTexture(id));
        Ok(id)
    }

    fn create_framebuffer(&mut self, _width: u32, _height: u32) -> Result<FramebufferId> {
        let id = FramebufferId(self.next());
        let _ = self.framebuffers.insert(id, Vec::new());
        self.calls.push(DeviceCall::CreateFramebuffer(id));
        Ok(id)
    }

    fn attach(
        &mut self,
        framebuffer: FramebufferId,
        kind: AttachmentKind,
        texture: TextureId,
    ) -> Result<()> {
        if !self.textures.contains_key(&texture) {
            return Err(GraphicsError::UnknownHandle("texture"));
        }
        let attachments = self
            .framebuffers
            .get_mut(&framebuffer)
            .ok_or(GraphicsError::UnknownHandle("framebuffer"))?;
        attachments.retain(|(k, _)| *k != kind);
        attachments.push((kind, texture));
        self.calls
            .push(DeviceCall::Attach(framebuffer, kind, texture));
        Ok(())
    }

    fn bind_program(&mut self, program: Option<ProgramId>) {
        self.program = program;
        self.calls.push(DeviceCall::BindProgram(program));
    }

    fn bind_vertex_array(&mut self, vao: Option<VertexArrayId>) {
        self.vertex_array = vao;
        self.calls.push(DeviceCall::BindVertexArray(vao));
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<TextureId>) {
        self.calls.push(DeviceCall::BindTexture(unit, texture));
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>) {
        self.calls.push(DeviceCall::BindFramebuffer(framebuffer));
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.calls.push(DeviceCall::SetViewport(viewport));
    }

    fn set_point_size(&mut self, size: f32) {
        self.calls.push(DeviceCall::SetPointSize(size));
    }

    fn clear(&mut self, color: [f32; 4], flags: ClearFlags) {
        self.calls.push(DeviceCall::Clear(color, flags));
    }

    fn draw(&mut self, call: DrawCall) -> Result<()> {
        if !self.program.map_or(false, |p| self.programs.contains_key(&p)) {
            return Err(GraphicsError::UnknownHandle("program"));
        }

        let vao = self
            .vertex_array
            .and_then(|v| self.vertex_arrays.get(&v))
            .ok_or(GraphicsError::UnknownHandle("vertex array"))?;

        if call.indexed && vao.index_buffer.is_none() {
            return Err(GraphicsError::UnknownHandle("index buffer"));
        }

        self.calls.push(DeviceCall::Draw(call));
        Ok(())
    }

    fn begin_frame(&mut self) -> Result<()> {
        self.calls.push(DeviceCall::BeginFrame);
        Ok(())
    }

    fn end_frame(&mut self) -> Result<()> {
        self.calls.push(DeviceCall::EndFrame);
        Ok(())
    }

    fn delete_vertex_array(&mut self, vao: VertexArrayId) {
        if self.vertex_arrays.remove(&vao).is_some() {
            self.calls.push(DeviceCall::DeleteVertexArray(vao));
        }
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        if self.buffers.remove(&buffer).is_some() {
            self.calls.push(DeviceCall::DeleteBuffer(buffer));
        }
    }

    fn delete_program(&mut self, program: ProgramId) {
        if self.programs.remove(&program).is_some() {
            self.calls.push(DeviceCall::DeleteProgram(program));
        }
    }

    fn delete_texture(&mut self, texture: TextureId) {
        if self.textures.remove(&texture).is_some() {
            self.calls.push(DeviceCall::DeleteTexture(texture));
        }
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferId) {
        if self.framebuffers.remove(&framebuffer).is_some() {
            self.calls.push(DeviceCall::DeleteFramebuffer(framebuffer));
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
