//! [`GpuDevice`] implementation on top of wgpu.
//!
//! wgpu has no global binding state, so this device records what the
//! [`GraphicsContext`](crate::context::GraphicsContext) binds, snapshots the
//! uniforms of every draw, and replays the recorded frame as one render pass per
//! clear or render target switch in [`GpuDevice::end_frame`].

use super::device::{
    AttachmentKind, BufferId, BufferKind, ClearFlags, DrawCall, FramebufferId, GpuDevice,
    ProgramDescriptor, ProgramId, ShaderStage, TextureDescriptor, TextureId, TextureUsage,
    VertexArrayId, Viewport,
};
use super::dynamic_buffer::DynamicUniformBuffer;
use super::MAX_TEXTURE_UNITS;
use crate::error::{GraphicsError, Result};
use crate::resource::{
    AttributeType, PixelFormat, PrimitiveType, ProgramLayout, TextureFilter, TextureWrap,
    UniformValue, VertexAttribute,
};
use std::any::Any;
use std::collections::HashMap;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const DEPTH_STENCIL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24PlusStencil8;

struct BufferState {
    kind: BufferKind,
    buffer: Option<wgpu::Buffer>,
    len: usize,
}

#[derive(Default)]
struct VertexArrayState {
    attributes: HashMap<u32, BufferId>,
    index_buffer: Option<BufferId>,
}

#[derive(Copy, Clone, PartialEq, Eq, Hash)]
struct PipelineKey {
    topology: wgpu::PrimitiveTopology,
    color: wgpu::TextureFormat,
    depth: Option<wgpu::TextureFormat>,
}

struct ProgramState {
    label: String,
    layout: ProgramLayout,
    offsets: Vec<u32>,
    staging: Vec<u8>,
    vertex: wgpu::ShaderModule,
    fragment: wgpu::ShaderModule,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
}

struct TextureState {
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
    format: wgpu::TextureFormat,
}

struct FramebufferState {
    width: u32,
    height: u32,
    color: Option<TextureId>,
    depth: Option<TextureId>,
}

struct SurfaceState {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    depth: wgpu::TextureView,
}

struct PendingDraw {
    program: ProgramId,
    vertex_array: VertexArrayId,
    textures: [Option<TextureId>; MAX_TEXTURE_UNITS],
    uniform_offset: u32,
    viewport: Viewport,
    call: DrawCall,
}

struct PendingPass {
    target: Option<FramebufferId>,
    clear_color: Option<wgpu::Color>,
    clear_depth: bool,
    clear_stencil: bool,
    draws: Vec<PendingDraw>,
}

impl PendingPass {
    fn new(target: Option<FramebufferId>) -> Self {
        PendingPass {
            target,
            clear_color: None,
            clear_depth: false,
            clear_stencil: false,
            draws: Vec::new(),
        }
    }
}

/// A [`GpuDevice`] rendering with wgpu, either to a window surface or offscreen.
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface: Option<SurfaceState>,
    next_id: u32,
    buffers: HashMap<BufferId, BufferState>,
    vertex_arrays: HashMap<VertexArrayId, VertexArrayState>,
    programs: HashMap<ProgramId, ProgramState>,
    textures: HashMap<TextureId, TextureState>,
    framebuffers: HashMap<FramebufferId, FramebufferState>,
    uniform_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    white: TextureState,
    zeros: wgpu::Buffer,
    uniforms: DynamicUniformBuffer,
    program: Option<ProgramId>,
    vertex_array: Option<VertexArrayId>,
    bound_textures: [Option<TextureId>; MAX_TEXTURE_UNITS],
    framebuffer: Option<FramebufferId>,
    viewport: Viewport,
    warned_point_size: bool,
    passes: Vec<PendingPass>,
    recording: bool,
}

impl WgpuDevice {
    /// Creates a device without a presentation surface. Only framebuffers can be rendered to.
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("uniforms_bind_group_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let mut texture_entries = Vec::with_capacity(MAX_TEXTURE_UNITS * 2);
        for unit in 0..MAX_TEXTURE_UNITS as u32 {
            texture_entries.push(wgpu::BindGroupLayoutEntry {
                binding: unit * 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                },
                count: None,
            });
            texture_entries.push(wgpu::BindGroupLayoutEntry {
                binding: unit * 2 + 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            });
        }

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("textures_bind_group_layout"),
            entries: &texture_entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("program_pipeline_layout"),
            bind_group_layouts: &[&uniform_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        let white = create_texture_state(
            &device,
            &queue,
            &TextureDescriptor {
                usage: TextureUsage::Sampled,
                width: 1,
                height: 1,
                format: PixelFormat::Rgba,
                min_filter: TextureFilter::Nearest,
                mag_filter: TextureFilter::Nearest,
                wrap_s: TextureWrap::Repeat,
                wrap_t: TextureWrap::Repeat,
                border_color: [0.0; 4],
                mipmap: false,
            },
            &[255, 255, 255, 255],
        );

        let zeros = create_zero_buffer(&device, 4096);
        let uniforms = DynamicUniformBuffer::with_capacity(&device, "draw_uniforms", 64 * 1024);

        WgpuDevice {
            device,
            queue,
            surface: None,
            next_id: 0,
            buffers: HashMap::new(),
            vertex_arrays: HashMap::new(),
            programs: HashMap::new(),
            textures: HashMap::new(),
            framebuffers: HashMap::new(),
            uniform_layout,
            texture_layout,
            pipeline_layout,
            white,
            zeros,
            uniforms,
            program: None,
            vertex_array: None,
            bound_textures: [None; MAX_TEXTURE_UNITS],
            framebuffer: None,
            viewport: Viewport::default(),
            warned_point_size: false,
            passes: Vec::new(),
            recording: false,
        }
    }

    /// Creates a device presenting to `surface`, which must already be configured with `config`.
    pub fn with_surface(
        device: wgpu::Device,
        queue: wgpu::Queue,
        surface: wgpu::Surface<'static>,
        config: wgpu::SurfaceConfiguration,
    ) -> Self {
        let mut result = Self::new(device, queue);
        let depth = create_depth_view(&result.device, config.width, config.height, DEPTH_FORMAT);
        result.surface = Some(SurfaceState {
            surface,
            config,
            depth,
        });
        result
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// The format of the presentation surface, if any.
    pub fn surface_format(&self) -> Option<wgpu::TextureFormat> {
        self.surface.as_ref().map(|s| s.config.format)
    }

    /// Reconfigures the surface and its depth buffer after a window resize.
    pub fn resize_surface(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }

        if let Some(state) = &mut self.surface {
            state.config.width = width;
            state.config.height = height;
            state.surface.configure(&self.device, &state.config);
            state.depth = create_depth_view(&self.device, width, height, DEPTH_FORMAT);
        }
    }

    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    /// The pass draws on the bound framebuffer are appended to.
    fn current_pass(&mut self) -> &mut PendingPass {
        let target = self.framebuffer;
        let reuse = self.passes.last().map_or(false, |p| p.target == target);
        if !reuse {
            self.passes.push(PendingPass::new(target));
        }
        let last = self.passes.len() - 1;
        &mut self.passes[last]
    }

    fn target_formats(
        &self,
        target: Option<FramebufferId>,
    ) -> Option<(wgpu::TextureFormat, Option<wgpu::TextureFormat>)> {
        match target {
            None => self
                .surface
                .as_ref()
                .map(|s| (s.config.format, Some(DEPTH_FORMAT))),
            Some(id) => {
                let fb = self.framebuffers.get(&id)?;
                let color = self.textures.get(&fb.color?)?.format;
                let depth = fb
                    .depth
                    .and_then(|d| self.textures.get(&d))
                    .map(|t| t.format);
                Some((color, depth))
            }
        }
    }

    fn ensure_pipeline(&mut self, program: ProgramId, key: PipelineKey) -> Result<()> {
        let state = self
            .programs
            .get_mut(&program)
            .ok_or(GraphicsError::UnknownHandle("program"))?;

        if state.pipelines.contains_key(&key) {
            return Ok(());
        }

        let attributes: Vec<[wgpu::VertexAttribute; 1]> = state
            .layout
            .attributes
            .iter()
            .map(|attr| {
                [wgpu::VertexAttribute {
                    format: vertex_format(attr),
                    offset: attr.offset as u64,
                    shader_location: attr.location,
                }]
            })
            .collect();
        let buffers: Vec<wgpu::VertexBufferLayout> = state
            .layout
            .attributes
            .iter()
            .zip(attributes.iter())
            .map(|(attr, wgpu_attr)| wgpu::VertexBufferLayout {
                array_stride: attr.effective_stride() as u64,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: wgpu_attr,
            })
            .collect();

        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(&state.label),
                layout: Some(&self.pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &state.vertex,
                    entry_point: Some(ShaderStage::Vertex.entry_point()),
                    buffers: &buffers,
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &state.fragment,
                    entry_point: Some(ShaderStage::Fragment.entry_point()),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: key.color,
                        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: key.topology,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: key.depth.map(|format| wgpu::DepthStencilState {
                    format,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            });

        log::debug!(
            "Created pipeline for program {:?} ({}) with {:?}.",
            program,
            state.label,
            key.topology
        );
        let _ = state.pipelines.insert(key, pipeline);
        Ok(())
    }

    fn texture_bind_group(&self, textures: &[Option<TextureId>; MAX_TEXTURE_UNITS]) -> wgpu::BindGroup {
        let states: Vec<&TextureState> = textures
            .iter()
            .map(|t| t.and_then(|id| self.textures.get(&id)).unwrap_or(&self.white))
            .collect();

        let mut entries = Vec::with_capacity(MAX_TEXTURE_UNITS * 2);
        for (unit, state) in states.iter().enumerate() {
            entries.push(wgpu::BindGroupEntry {
                binding: unit as u32 * 2,
                resource: wgpu::BindingResource::TextureView(&state.view),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: unit as u32 * 2 + 1,
                resource: wgpu::BindingResource::Sampler(&state.sampler),
            });
        }

        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("textures_bind_group"),
            layout: &self.texture_layout,
            entries: &entries,
        })
    }

    /// Number of vertices the attribute buffers of `vao` hold, as bound by `program`.
    fn vertex_capacity(&self, program: &ProgramState, vao: &VertexArrayState) -> u64 {
        program
            .layout
            .attributes
            .iter()
            .filter_map(|attr| {
                let buffer = self.buffers.get(vao.attributes.get(&attr.location)?)?;
                Some(buffer.len as u64 / attr.effective_stride().max(1) as u64)
            })
            .max()
            .unwrap_or(0)
    }

    fn replay(&mut self) -> Result<()> {
        let passes = std::mem::take(&mut self.passes);
        if passes.is_empty() {
            return Ok(());
        }

        // Pipelines first: they need mutable access to the programs.
        for pass in &passes {
            let Some((color, depth)) = self.target_formats(pass.target) else {
                continue;
            };
            for draw in &pass.draws {
                let key = PipelineKey {
                    topology: topology(draw.call.primitive)?,
                    color,
                    depth,
                };
                self.ensure_pipeline(draw.program, key)?;
            }
        }

        // Missing attributes read from a zeroed buffer large enough for every draw.
        let mut zeros_needed = 0u64;
        for draw in passes.iter().flat_map(|p| p.draws.iter()) {
            if let (Some(program), Some(vao)) = (
                self.programs.get(&draw.program),
                self.vertex_arrays.get(&draw.vertex_array),
            ) {
                let capacity = self.vertex_capacity(program, vao).max(draw.call.count as u64);
                let widest = program
                    .layout
                    .attributes
                    .iter()
                    .map(|a| a.effective_stride() as u64)
                    .max()
                    .unwrap_or(0);
                zeros_needed = zeros_needed.max(capacity * widest);
            }
        }
        if zeros_needed > self.zeros.size() {
            self.zeros = create_zero_buffer(&self.device, zeros_needed.next_power_of_two());
        }

        let _ = self.uniforms.flush(&self.device, &self.queue);

        let mut uniform_groups: HashMap<ProgramId, wgpu::BindGroup> = HashMap::new();
        let mut texture_groups: HashMap<[Option<TextureId>; MAX_TEXTURE_UNITS], wgpu::BindGroup> =
            HashMap::new();
        for draw in passes.iter().flat_map(|p| p.draws.iter()) {
            if !uniform_groups.contains_key(&draw.program) {
                if let Some(program) = self.programs.get(&draw.program) {
                    let group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                        label: Some("uniforms_bind_group"),
                        layout: &self.uniform_layout,
                        entries: &[wgpu::BindGroupEntry {
                            binding: 0,
                            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                                buffer: self.uniforms.buffer(),
                                offset: 0,
                                size: wgpu::BufferSize::new(program.staging.len() as u64),
                            }),
                        }],
                    });
                    let _ = uniform_groups.insert(draw.program, group);
                }
            }
            if !texture_groups.contains_key(&draw.textures) {
                let group = self.texture_bind_group(&draw.textures);
                let _ = texture_groups.insert(draw.textures, group);
            }
        }

        let targets_surface = passes.iter().any(|p| p.target.is_none());
        let frame = match (&self.surface, targets_surface) {
            (Some(state), true) => match state.surface.get_current_texture() {
                Ok(frame) => Some(frame),
                Err(err) => {
                    log::warn!("Skipping frame: {}", err);
                    self.uniforms.clear();
                    return Err(GraphicsError::Surface(err.to_string()));
                }
            },
            _ => None,
        };
        let frame_view = frame
            .as_ref()
            .map(|f| f.texture.create_view(&wgpu::TextureViewDescriptor::default()));

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame_encoder"),
            });

        for pass in &passes {
            let Some((color_format, depth_format)) = self.target_formats(pass.target) else {
                continue;
            };
            let (color_view, depth_view, size) = match pass.target {
                None => match (&frame_view, &self.surface) {
                    (Some(view), Some(state)) => (
                        view,
                        Some(&state.depth),
                        (state.config.width, state.config.height),
                    ),
                    _ => {
                        log::debug!("No surface to present to; dropping {} draws.", pass.draws.len());
                        continue;
                    }
                },
                Some(id) => {
                    let Some(fb) = self.framebuffers.get(&id) else {
                        continue;
                    };
                    let Some(color) = fb.color.and_then(|c| self.textures.get(&c)) else {
                        log::debug!("Framebuffer {:?} has no color attachment.", id);
                        continue;
                    };
                    let depth = fb
                        .depth
                        .and_then(|d| self.textures.get(&d))
                        .map(|t| &t.view);
                    (&color.view, depth, (fb.width, fb.height))
                }
            };

            let color_load = match pass.clear_color {
                Some(color) => wgpu::LoadOp::Clear(color),
                None => wgpu::LoadOp::Load,
            };
            let depth_attachment = depth_view.map(|view| wgpu::RenderPassDepthStencilAttachment {
                view,
                depth_ops: Some(wgpu::Operations {
                    load: if pass.clear_depth {
                        wgpu::LoadOp::Clear(1.0)
                    } else {
                        wgpu::LoadOp::Load
                    },
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: if depth_format == Some(DEPTH_STENCIL_FORMAT) {
                    Some(wgpu::Operations {
                        load: if pass.clear_stencil {
                            wgpu::LoadOp::Clear(0)
                        } else {
                            wgpu::LoadOp::Load
                        },
                        store: wgpu::StoreOp::Store,
                    })
                } else {
                    None
                },
            });

            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("frame_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: color_view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: color_load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: depth_attachment,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            for draw in &pass.draws {
                let (Some(program), Some(vao)) = (
                    self.programs.get(&draw.program),
                    self.vertex_arrays.get(&draw.vertex_array),
                ) else {
                    continue;
                };
                let key = PipelineKey {
                    topology: topology(draw.call.primitive)?,
                    color: color_format,
                    depth: depth_format,
                };
                let (Some(pipeline), Some(uniforms), Some(textures)) = (
                    program.pipelines.get(&key),
                    uniform_groups.get(&draw.program),
                    texture_groups.get(&draw.textures),
                ) else {
                    continue;
                };

                render_pass.set_pipeline(pipeline);
                render_pass.set_bind_group(0, uniforms, &[draw.uniform_offset]);
                render_pass.set_bind_group(1, textures, &[]);

                let viewport = clamp_viewport(draw.viewport, size);
                render_pass.set_viewport(
                    viewport.x as f32,
                    viewport.y as f32,
                    viewport.width as f32,
                    viewport.height as f32,
                    0.0,
                    1.0,
                );

                for (slot, attr) in program.layout.attributes.iter().enumerate() {
                    let buffer = vao
                        .attributes
                        .get(&attr.location)
                        .and_then(|id| self.buffers.get(id))
                        .and_then(|b| b.buffer.as_ref())
                        .unwrap_or(&self.zeros);
                    render_pass.set_vertex_buffer(slot as u32, buffer.slice(..));
                }

                let range = draw.call.first..draw.call.first + draw.call.count;
                if draw.call.indexed {
                    let Some(indices) = vao
                        .index_buffer
                        .and_then(|id| self.buffers.get(&id))
                        .and_then(|b| b.buffer.as_ref())
                    else {
                        continue;
                    };
                    render_pass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint32);
                    render_pass.draw_indexed(range, 0, 0..1);
                } else {
                    render_pass.draw(range, 0..1);
                }
            }
        }

        let _ = self.queue.submit(std::iter::once(encoder.finish()));
        if let Some(frame) = frame {
            frame.present();
        }
        self.uniforms.clear();
        Ok(())
    }
}

impl GpuDevice for WgpuDevice {
    fn create_vertex_array(&mut self) -> Result<VertexArrayId> {
        let id = VertexArrayId(self.next());
        let _ = self.vertex_arrays.insert(id, VertexArrayState::default());
        Ok(id)
    }

    fn create_buffer(&mut self, kind: BufferKind) -> Result<BufferId> {
        let id = BufferId(self.next());
        let _ = self.buffers.insert(
            id,
            BufferState {
                kind,
                buffer: None,
                len: 0,
            },
        );
        Ok(id)
    }

    fn buffer_size(&self, buffer: BufferId) -> usize {
        self.buffers.get(&buffer).map_or(0, |b| b.len)
    }

    fn upload_buffer(&mut self, buffer: BufferId, data: &[u8]) -> Result<()> {
        let state = self
            .buffers
            .get_mut(&buffer)
            .ok_or(GraphicsError::UnknownHandle("buffer"))?;

        // Buffer sizes must be multiples of 4 bytes.
        let size = (data.len() as u64).div_ceil(4).max(1) * 4;
        let reuse = state.buffer.as_ref().map_or(false, |b| b.size() >= size);
        if !reuse {
            let usage = match state.kind {
                BufferKind::Array => wgpu::BufferUsages::VERTEX,
                BufferKind::ElementArray => wgpu::BufferUsages::INDEX,
            };
            state.buffer = Some(self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("geometry_buffer"),
                size,
                usage: usage | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
        }

        if let Some(gpu) = &state.buffer {
            if data.len() % 4 == 0 {
                self.queue.write_buffer(gpu, 0, data);
            } else {
                let mut padded = data.to_vec();
                padded.resize(size as usize, 0);
                self.queue.write_buffer(gpu, 0, &padded);
            }
        }
        state.len = data.len();
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
        Ok(())
    }

    fn create_program(&mut self, desc: &ProgramDescriptor) -> Result<ProgramId> {
        let source = |stage: ShaderStage| {
            desc.stages
                .iter()
                .find(|(s, _)| *s == stage)
                .map(|(_, src)| src.as_str())
                .ok_or_else(|| GraphicsError::MissingStage(desc.label.to_string()))
        };

        let vertex = compile_module(&self.device, desc.label, source(ShaderStage::Vertex)?)?;
        let fragment = compile_module(&self.device, desc.label, source(ShaderStage::Fragment)?)?;
        let (offsets, size) = desc.layout.uniform_offsets();

        let id = ProgramId(self.next());
        let _ = self.programs.insert(
            id,
            ProgramState {
                label: desc.label.to_string(),
                layout: desc.layout.clone(),
                offsets,
                staging: vec![0; size.max(16) as usize],
                vertex,
                fragment,
                pipelines: HashMap::new(),
            },
        );
        Ok(id)
    }

    fn set_uniform(&mut self, program: ProgramId, index: usize, value: UniformValue) -> Result<()> {
        let state = self
            .programs
            .get_mut(&program)
            .ok_or(GraphicsError::UnknownHandle("program"))?;
        let offset = *state
            .offsets
            .get(index)
            .ok_or(GraphicsError::UnknownHandle("uniform"))? as usize;
        let (_, size) = value.kind().align_and_size();
        value.write_to(&mut state.staging[offset..offset + size as usize]);
        Ok(())
    }

    fn create_texture(&mut self, desc: &TextureDescriptor, pixels: &[u8]) -> Result<TextureId> {
        let state = match desc.usage {
            TextureUsage::Sampled => create_texture_state(&self.device, &self.queue, desc, pixels),
            TextureUsage::Depth | TextureUsage::DepthStencil => {
                let format = if desc.usage == TextureUsage::Depth {
                    DEPTH_FORMAT
                } else {
                    DEPTH_STENCIL_FORMAT
                };
                TextureState {
                    view: create_depth_view(&self.device, desc.width, desc.height, format),
                    sampler: self.device.create_sampler(&wgpu::SamplerDescriptor::default()),
                    format,
                }
            }
        };

        let id = TextureId(self.next());
        let _ = self.textures.insert(id, state);
        Ok(id)
    }

    fn create_framebuffer(&mut self, width: u32, height: u32) -> Result<FramebufferId> {
        let id = FramebufferId(self.next());
        let _ = self.framebuffers.insert(
            id,
            FramebufferState {
                width,
                height,
                color: None,
                depth: None,
            },
        );
        Ok(id)
    }

    fn attach(
        &mut self,
        framebuffer: FramebufferId,
        kind: AttachmentKind,
        texture: TextureId,
    ) -> Result<()> {
        let format = self
            .textures
            .get(&texture)
            .ok_or(GraphicsError::UnknownHandle("texture"))?
            .format;
        let fb = self
            .framebuffers
            .get_mut(&framebuffer)
            .ok_or(GraphicsError::UnknownHandle("framebuffer"))?;

        let is_depth = format == DEPTH_FORMAT || format == DEPTH_STENCIL_FORMAT;
        match kind {
            AttachmentKind::Color if !is_depth => fb.color = Some(texture),
            AttachmentKind::Depth | AttachmentKind::DepthStencil if is_depth => {
                fb.depth = Some(texture)
            }
            AttachmentKind::Stencil if format == DEPTH_STENCIL_FORMAT => fb.depth = Some(texture),
            _ => return Err(GraphicsError::Unsupported("attachment format")),
        }
        Ok(())
    }

    fn bind_program(&mut self, program: Option<ProgramId>) {
        self.program = program;
    }

    fn bind_vertex_array(&mut self, vao: Option<VertexArrayId>) {
        self.vertex_array = vao;
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<TextureId>) {
        if let Some(slot) = self.bound_textures.get_mut(unit as usize) {
            *slot = texture;
        }
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>) {
        self.framebuffer = framebuffer;
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    fn set_point_size(&mut self, size: f32) {
        if size != 1.0 && !self.warned_point_size {
            log::debug!("Point size {} ignored: wgpu rasterizes points as single pixels.", size);
            self.warned_point_size = true;
        }
    }

    fn clear(&mut self, color: [f32; 4], flags: ClearFlags) {
        let mut pass = PendingPass::new(self.framebuffer);
        if flags.contains(ClearFlags::COLOR) {
            pass.clear_color = Some(wgpu::Color {
                r: color[0] as f64,
                g: color[1] as f64,
                b: color[2] as f64,
                a: color[3] as f64,
            });
        }
        pass.clear_depth = flags.contains(ClearFlags::DEPTH);
        pass.clear_stencil = flags.contains(ClearFlags::STENCIL);
        self.passes.push(pass);
    }

    fn draw(&mut self, call: DrawCall) -> Result<()> {
        let _ = topology(call.primitive)?;
        let program = self.program.ok_or(GraphicsError::UnknownHandle("program"))?;
        let vertex_array = self.vertex_array.ok_or(GraphicsError::NotInitialized)?;
        let state = self
            .programs
            .get(&program)
            .ok_or(GraphicsError::UnknownHandle("program"))?;
        if call.indexed
            && self
                .vertex_arrays
                .get(&vertex_array)
                .and_then(|v| v.index_buffer)
                .is_none()
        {
            return Err(GraphicsError::UnknownHandle("index buffer"));
        }

        let uniform_offset = self.uniforms.push(&state.staging);
        let textures = self.bound_textures;
        let viewport = self.viewport;
        self.current_pass().draws.push(PendingDraw {
            program,
            vertex_array,
            textures,
            uniform_offset,
            viewport,
            call,
        });
        Ok(())
    }

    fn begin_frame(&mut self) -> Result<()> {
        self.passes.clear();
        self.uniforms.clear();
        self.recording = true;
        Ok(())
    }

    fn end_frame(&mut self) -> Result<()> {
        if !self.recording {
            return Err(GraphicsError::NotInitialized);
        }
        self.recording = false;
        self.replay()
    }

    fn delete_vertex_array(&mut self, vao: VertexArrayId) {
        let _ = self.vertex_arrays.remove(&vao);
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        if let Some(state) = self.buffers.remove(&buffer) {
            if let Some(gpu) = state.buffer {
                gpu.destroy();
            }
        }
    }

    fn delete_program(&mut self, program: ProgramId) {
        let _ = self.programs.remove(&program);
    }

    fn delete_texture(&mut self, texture: TextureId) {
        let _ = self.textures.remove(&texture);
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferId) {
        let _ = self.framebuffers.remove(&framebuffer);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn topology(primitive: PrimitiveType) -> Result<wgpu::PrimitiveTopology> {
    match primitive {
        PrimitiveType::Points => Ok(wgpu::PrimitiveTopology::PointList),
        PrimitiveType::Lines => Ok(wgpu::PrimitiveTopology::LineList),
        PrimitiveType::LineStrip => Ok(wgpu::PrimitiveTopology::LineStrip),
        PrimitiveType::Triangles => Ok(wgpu::PrimitiveTopology::TriangleList),
        PrimitiveType::TriangleStrip => Ok(wgpu::PrimitiveTopology::TriangleStrip),
        PrimitiveType::LineLoop => Err(GraphicsError::Unsupported("line loops")),
        PrimitiveType::TriangleFan => Err(GraphicsError::Unsupported("triangle fans")),
    }
}

fn vertex_format(attr: &VertexAttribute) -> wgpu::VertexFormat {
    match (attr.data_type, attr.size) {
        (AttributeType::Float, 1) => wgpu::VertexFormat::Float32,
        (AttributeType::Float, 2) => wgpu::VertexFormat::Float32x2,
        (AttributeType::Float, 3) => wgpu::VertexFormat::Float32x3,
        (AttributeType::Float, _) => wgpu::VertexFormat::Float32x4,
        (AttributeType::UnsignedInt, 1) => wgpu::VertexFormat::Uint32,
        (AttributeType::UnsignedInt, 2) => wgpu::VertexFormat::Uint32x2,
        (AttributeType::UnsignedInt, 3) => wgpu::VertexFormat::Uint32x3,
        (AttributeType::UnsignedInt, _) => wgpu::VertexFormat::Uint32x4,
    }
}

fn clamp_viewport(viewport: Viewport, (width, height): (u32, u32)) -> Viewport {
    if viewport.width == 0 || viewport.height == 0 {
        return Viewport::sized(width, height);
    }

    let x = (viewport.x.max(0) as u32).min(width.saturating_sub(1));
    let y = (viewport.y.max(0) as u32).min(height.saturating_sub(1));
    Viewport {
        x: x as i32,
        y: y as i32,
        width: viewport.width.min(width - x).max(1),
        height: viewport.height.min(height - y).max(1),
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn compile_module(device: &wgpu::Device, label: &str, source: &str) -> Result<wgpu::ShaderModule> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });
    match pollster::block_on(device.pop_error_scope()) {
        Some(err) => Err(GraphicsError::Compile {
            label: label.to_string(),
            message: err.to_string(),
        }),
        None => Ok(module),
    }
}

#[cfg(target_arch = "wasm32")]
fn compile_module(device: &wgpu::Device, label: &str, source: &str) -> Result<wgpu::ShaderModule> {
    Ok(device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    }))
}

fn create_zero_buffer(device: &wgpu::Device, size: u64) -> wgpu::Buffer {
    // New buffers are zero-initialized.
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("missing_attribute_buffer"),
        size,
        usage: wgpu::BufferUsages::VERTEX,
        mapped_at_creation: false,
    })
}

fn create_depth_view(
    device: &wgpu::Device,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("depth_texture"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

fn address_mode(device: &wgpu::Device, wrap: TextureWrap) -> wgpu::AddressMode {
    match wrap {
        TextureWrap::Repeat => wgpu::AddressMode::Repeat,
        TextureWrap::MirroredRepeat => wgpu::AddressMode::MirrorRepeat,
        TextureWrap::ClampToEdge => wgpu::AddressMode::ClampToEdge,
        TextureWrap::ClampToBorder => {
            if device
                .features()
                .contains(wgpu::Features::ADDRESS_MODE_CLAMP_TO_BORDER)
            {
                wgpu::AddressMode::ClampToBorder
            } else {
                wgpu::AddressMode::ClampToEdge
            }
        }
    }
}

fn border_color(color: [f32; 4]) -> wgpu::SamplerBorderColor {
    if color[3] < 0.5 {
        wgpu::SamplerBorderColor::TransparentBlack
    } else if color[0] + color[1] + color[2] >= 1.5 {
        wgpu::SamplerBorderColor::OpaqueWhite
    } else {
        wgpu::SamplerBorderColor::OpaqueBlack
    }
}

fn filter_mode(linear: bool) -> wgpu::FilterMode {
    if linear {
        wgpu::FilterMode::Linear
    } else {
        wgpu::FilterMode::Nearest
    }
}

/// Allocates a sampled texture, uploads its pixels and builds its mip chain.
fn create_texture_state(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    desc: &TextureDescriptor,
    pixels: &[u8],
) -> TextureState {
    let (width, height) = (desc.width.max(1), desc.height.max(1));
    let (format, channels, data) = match desc.format {
        PixelFormat::R => (wgpu::TextureFormat::R8Unorm, 1, pixels.to_vec()),
        PixelFormat::Rg => (wgpu::TextureFormat::Rg8Unorm, 2, pixels.to_vec()),
        PixelFormat::Rgb => (wgpu::TextureFormat::Rgba8Unorm, 4, expand_rgb(pixels)),
        PixelFormat::Rgba => (wgpu::TextureFormat::Rgba8Unorm, 4, pixels.to_vec()),
    };

    let mip_level_count = if desc.mipmap {
        (width.max(height) as f32).log2().floor() as u32 + 1
    } else {
        1
    };

    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("texture"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_DST
            | wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });

    let expected = (width * height) as usize * channels;
    if data.len() >= expected {
        let mut current = data;
        let (mut level_width, mut level_height) = (width, height);
        for mip_level in 0..mip_level_count {
            if mip_level > 0 {
                current = downsample(&current, level_width, level_height, channels);
                level_width = (level_width / 2).max(1);
                level_height = (level_height / 2).max(1);
            }
            queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &texture,
                    mip_level,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                &current,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(level_width * channels as u32),
                    rows_per_image: Some(level_height),
                },
                wgpu::Extent3d {
                    width: level_width,
                    height: level_height,
                    depth_or_array_layers: 1,
                },
            );
        }
    } else if !data.is_empty() {
        log::warn!(
            "Texture data holds {} bytes, expected {}; leaving it blank.",
            data.len(),
            expected
        );
    }

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let border = desc.wrap_s == TextureWrap::ClampToBorder || desc.wrap_t == TextureWrap::ClampToBorder;
    let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("texture_sampler"),
        address_mode_u: address_mode(device, desc.wrap_s),
        address_mode_v: address_mode(device, desc.wrap_t),
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: filter_mode(desc.mag_filter.is_linear()),
        min_filter: filter_mode(desc.min_filter.is_linear()),
        mipmap_filter: filter_mode(desc.mipmap && desc.min_filter.is_mipmap_linear()),
        border_color: if border {
            Some(border_color(desc.border_color))
        } else {
            None
        },
        ..Default::default()
    });

    TextureState {
        view,
        sampler,
        format,
    }
}

fn expand_rgb(pixels: &[u8]) -> Vec<u8> {
    let mut rgba = Vec::with_capacity(pixels.len() / 3 * 4);
    for rgb in pixels.chunks_exact(3) {
        rgba.extend_from_slice(rgb);
        rgba.push(255);
    }
    rgba
}

/// Downsamples an image by half using box filtering.
fn downsample(data: &[u8], width: u32, height: u32, channels: usize) -> Vec<u8> {
    let new_width = (width / 2).max(1);
    let new_height = (height / 2).max(1);
    let mut new_data = vec![0u8; (new_width * new_height) as usize * channels];

    for y in 0..new_height {
        for x in 0..new_width {
            // Sample 2x2 block from source (or fewer pixels at edges)
            let src_x = (x * 2) as usize;
            let src_y = (y * 2) as usize;
            let mut sums = [0u32; 4];
            let mut count = 0u32;

            for dy in 0..2 {
                for dx in 0..2 {
                    let sx = src_x + dx;
                    let sy = src_y + dy;
                    if sx < width as usize && sy < height as usize {
                        let idx = (sy * width as usize + sx) * channels;
                        for c in 0..channels {
                            sums[c] += data[idx + c] as u32;
                        }
                        count += 1;
                    }
                }
            }

            let dst_idx = (y * new_width + x) as usize * channels;
            for c in 0..channels {
                new_data[dst_idx + c] = (sums[c] / count) as u8;
            }
        }
    }

    new_data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downsample_averages_blocks() {
        let data = [0, 100, 200, 50, 10, 20, 30, 40];
        assert_eq!(downsample(&data, 2, 2, 2), vec![60, 52]);
    }

    #[test]
    fn rgb_is_expanded_to_opaque_rgba() {
        assert_eq!(expand_rgb(&[1, 2, 3, 4, 5, 6]), vec![1, 2, 3, 255, 4, 5, 6, 255]);
    }

    #[test]
    fn loops_and_fans_are_unsupported() {
        assert!(topology(PrimitiveType::LineLoop).is_err());
        assert!(topology(PrimitiveType::TriangleFan).is_err());
        assert_eq!(
            topology(PrimitiveType::Triangles).unwrap(),
            wgpu::PrimitiveTopology::TriangleList
        );
    }

    #[test]
    fn viewports_are_clamped_to_the_target() {
        assert_eq!(clamp_viewport(Viewport::default(), (640, 480)), Viewport::sized(640, 480));
        let clamped = clamp_viewport(
            Viewport {
                x: 600,
                y: -5,
                width: 200,
                height: 100,
            },
            (640, 480),
        );
        assert_eq!(
            clamped,
            Viewport {
                x: 600,
                y: 0,
                width: 40,
                height: 100
            }
        );
    }
}
