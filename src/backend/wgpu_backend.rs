//! Hardware-accelerated backend built on `wgpu`.

use std::collections::HashMap;

use wgpu::util::DeviceExt;

use crate::batch::{Batch, GeometryRecord, InstanceData, LayoutId};
use crate::color::Color;
use crate::error::{RenderError, RenderResult};
use crate::gpu::shaders::{Defines, ShaderCompiler, ShaderReflection, ShaderSource};
use crate::gpu::{BufferManager, ShaderManager};
use crate::material::{BlendMode, TextureId};
use crate::viewport::Viewport;

use super::Backend;

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct WgpuVertex {
    position: [f32; 2],
    uv: [f32; 2],
    color: [f32; 4],
}

impl WgpuVertex {
    const ATTRIBS: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
        0 => Float32x2,
        1 => Float32x2,
        2 => Float32x4,
    ];

    fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<WgpuVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

/// Per-instance vertex buffer contents for the `vs_instanced` entry point,
/// laid out identically to `InstanceData` so it can be built with a
/// straight field copy.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct WgpuInstance {
    transform: [f32; 4],
    tint: [f32; 4],
    uv_offset: [f32; 4],
}

impl From<InstanceData> for WgpuInstance {
    fn from(data: InstanceData) -> Self {
        Self { transform: data.transform, tint: data.tint, uv_offset: data.uv_offset }
    }
}

impl WgpuInstance {
    const ATTRIBS: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
        3 => Float32x4,
        4 => Float32x4,
        5 => Float32x4,
    ];

    fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<WgpuInstance>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRIBS,
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct ProjectionUniform {
    projection: [[f32; 4]; 4],
}

struct GpuTexture {
    #[allow(dead_code)]
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
}

struct CompiledPipeline {
    pipeline: wgpu::RenderPipeline,
    uniform_bind_group: wgpu::BindGroup,
}

/// Owns the `wgpu::Device`/`Queue`/`Surface` triple and the render pipeline
/// cache keyed by `(name, defines)` through [`ShaderManager`].
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface: wgpu::Surface<'static>,
    surface_format: wgpu::TextureFormat,
    config: wgpu::SurfaceConfiguration,
    uniform_bind_group_layout: wgpu::BindGroupLayout,
    texture_bind_group_layout: wgpu::BindGroupLayout,
    pipelines: HashMap<Defines, CompiledPipeline>,
    textures: HashMap<TextureId, GpuTexture>,
    default_texture: TextureId,
    next_texture_id: TextureId,
    clear_color: wgpu::Color,
}

impl WgpuBackend {
    /// Acquires a device/queue/surface triple for `surface` and configures
    /// it at `width`x`height`. Fails with `BackendUnavailable` if no
    /// adapter supports the surface.
    pub async fn new(surface: wgpu::Surface<'static>, width: u32, height: u32) -> RenderResult<Self> {
        Self::new_with_backends(surface, width, height, wgpu::Backends::all()).await
    }

    /// Same as [`WgpuBackend::new`] but with an explicit adapter-backend
    /// preference — used by [`super::NextGenBackend`] to try the native
    /// WebGPU path first.
    pub async fn new_with_backends_pub(
        surface: wgpu::Surface<'static>,
        width: u32,
        height: u32,
        backends: wgpu::Backends,
    ) -> RenderResult<Self> {
        Self::new_with_backends(surface, width, height, backends).await
    }

    async fn new_with_backends(
        surface: wgpu::Surface<'static>,
        width: u32,
        height: u32,
        backends: wgpu::Backends,
    ) -> RenderResult<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor { backends, ..Default::default() });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| RenderError::BackendUnavailable("no adapter supports this surface".into()))?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    label: Some("render2d-device"),
                },
                None,
            )
            .await
            .map_err(|e| RenderError::InitializationFailed(e.to_string()))?;

        let caps = surface.get_capabilities(&adapter);
        let surface_format = caps.formats.iter().copied().find(|f| f.is_srgb()).unwrap_or(caps.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: caps.present_modes[0],
            alpha_mode: caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let uniform_bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("render2d-projection-layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer { ty: wgpu::BufferBindingType::Uniform, has_dynamic_offset: false, min_binding_size: None },
                count: None,
            }],
        });

        let texture_bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("render2d-texture-layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let mut backend = Self {
            device,
            queue,
            surface,
            surface_format,
            config,
            uniform_bind_group_layout,
            texture_bind_group_layout,
            pipelines: HashMap::new(),
            textures: HashMap::new(),
            default_texture: 0,
            next_texture_id: 1,
            clear_color: wgpu::Color::BLACK,
        };
        backend.default_texture = backend.create_texture(1, 1, &[255, 255, 255, 255])?;
        Ok(backend)
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
    }

    fn uniform_bind_group(&self, projection: [[f32; 4]; 4]) -> wgpu::BindGroup {
        let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("render2d-projection-buffer"),
            contents: bytemuck::cast_slice(&[ProjectionUniform { projection }]),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("render2d-projection-bind-group"),
            layout: &self.uniform_bind_group_layout,
            entries: &[wgpu::BindGroupEntry { binding: 0, resource: buffer.as_entire_binding() }],
        })
    }

    fn compile_pipeline(&self, source: &ShaderSource, defines: &Defines) -> RenderResult<CompiledPipeline> {
        let textured = defines.get("TEXTURED").map(String::as_str) == Some("1");
        let instanced = defines.get("INSTANCED").map(String::as_str) == Some("1");
        let preprocessed_fragment = preprocess_ifdef(&source.fragment_src, "TEXTURED", textured);
        let vertex_entry_point = if instanced { "vs_instanced" } else { "vs_main" };
        let vertex_buffers: Vec<wgpu::VertexBufferLayout> =
            if instanced { vec![WgpuVertex::desc(), WgpuInstance::desc()] } else { vec![WgpuVertex::desc()] };

        let vertex_module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&format!("{}-vs", source.name)),
            source: wgpu::ShaderSource::Wgsl(source.vertex_src.clone().into()),
        });
        let fragment_module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&format!("{}-fs", source.name)),
            source: wgpu::ShaderSource::Wgsl(preprocessed_fragment.into()),
        });

        let layout = self.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("render2d-pipeline-layout"),
            bind_group_layouts: &[&self.uniform_bind_group_layout, &self.texture_bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&source.name),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &vertex_module,
                entry_point: vertex_entry_point,
                buffers: &vertex_buffers,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &fragment_module,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.surface_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState { count: 1, mask: !0, alpha_to_coverage_enabled: false },
            multiview: None,
        });

        let uniform_bind_group = self.uniform_bind_group(crate::math::Mat3::identity().to_mat4_array());
        Ok(CompiledPipeline { pipeline, uniform_bind_group })
    }

    fn interleave(batch: &Batch) -> (Vec<WgpuVertex>, Vec<u16>) {
        let mut vertices = Vec::new();
        let mut indices = Vec::new();
        for record in &batch.records {
            let stride = record.vertex_layout.floats_per_vertex();
            let base = vertices.len() as u16;
            let count = record.vertices.len() / stride;
            for v in 0..count {
                let o = v * stride;
                let (uv, color_offset) = match record.vertex_layout {
                    LayoutId::PositionColor => ([0.0, 0.0], 2),
                    LayoutId::PositionUvColor => ([record.vertices[o + 2], record.vertices[o + 3]], 4),
                };
                vertices.push(WgpuVertex {
                    position: [record.vertices[o], record.vertices[o + 1]],
                    uv,
                    color: [
                        record.vertices[o + color_offset],
                        record.vertices[o + color_offset + 1],
                        record.vertices[o + color_offset + 2],
                        record.vertices[o + color_offset + 3] * record.opacity,
                    ],
                });
            }
            indices.extend(record.indices.iter().map(|i| i + base));
        }
        (vertices, indices)
    }

    /// Builds the shared vertex/index buffers for an instanced batch: the
    /// template record's geometry, with positions re-centered on its own
    /// bounds so `vs_instanced` can place each instance by translating and
    /// scaling around the origin. Vertex color is left white; the instance
    /// buffer's `tint` carries the per-instance color instead.
    fn template_buffers(template: &GeometryRecord) -> (Vec<WgpuVertex>, Vec<u16>) {
        let stride = template.vertex_layout.floats_per_vertex();
        let (cx, cy) = template.world_bounds.center();
        let count = template.vertices.len() / stride;
        let mut vertices = Vec::with_capacity(count);
        for v in 0..count {
            let o = v * stride;
            let uv = match template.vertex_layout {
                LayoutId::PositionColor => [0.0, 0.0],
                LayoutId::PositionUvColor => [template.vertices[o + 2], template.vertices[o + 3]],
            };
            vertices.push(WgpuVertex { position: [template.vertices[o] - cx, template.vertices[o + 1] - cy], uv, color: [1.0, 1.0, 1.0, 1.0] });
        }
        (vertices, template.indices.clone())
    }
}

/// Textual `#ifdef NAME / #else / #endif` substitution. `wgpu`'s WGSL
/// frontend has no preprocessor, so shader variants selected by
/// `ShaderManager`'s defines are resolved to plain WGSL before the source
/// reaches `create_shader_module`.
fn preprocess_ifdef(source: &str, name: &str, enabled: bool) -> String {
    let directive = format!("#ifdef {}", name);
    let mut out = String::with_capacity(source.len());
    let mut in_block = false;
    let mut taking_branch = true;
    let mut on_else_branch = false;
    for line in source.lines() {
        let trimmed = line.trim();
        if trimmed == directive {
            in_block = true;
            taking_branch = enabled;
            on_else_branch = false;
            continue;
        }
        if in_block && trimmed == "#else" {
            on_else_branch = true;
            taking_branch = !enabled;
            continue;
        }
        if in_block && trimmed == "#endif" {
            in_block = false;
            taking_branch = true;
            on_else_branch = false;
            continue;
        }
        let _ = on_else_branch;
        if !in_block || taking_branch {
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

impl ShaderCompiler for WgpuBackend {
    fn compile(&mut self, source: &ShaderSource, defines: &Defines) -> RenderResult<ShaderReflection> {
        let pipeline = self.compile_pipeline(source, defines)?;
        self.pipelines.insert(defines.clone(), pipeline);
        Ok(ShaderReflection::default())
    }
}

impl Backend for WgpuBackend {
    fn clear(&mut self, color: Color) -> RenderResult<()> {
        self.clear_color = wgpu::Color { r: color.r as f64, g: color.g as f64, b: color.b as f64, a: color.a as f64 };
        Ok(())
    }

    fn flush_batches(
        &mut self,
        batches: &[Batch],
        _shaders: &mut ShaderManager,
        _buffers: &mut BufferManager,
        viewport: &Viewport,
    ) -> RenderResult<()> {
        let frame = self
            .surface
            .get_current_texture()
            .map_err(|e| RenderError::InitializationFailed(e.to_string()))?;
        let view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("render2d-encoder") });

        let projection = viewport.projection_matrix().to_mat4_array();

        struct PreparedDraw<'p> {
            pipeline: &'p wgpu::RenderPipeline,
            uniform_bind_group: wgpu::BindGroup,
            texture_bind_group: &'p wgpu::BindGroup,
            vertex_buffer: wgpu::Buffer,
            index_buffer: wgpu::Buffer,
            instance_buffer: Option<wgpu::Buffer>,
            index_count: u32,
            instance_count: u32,
        }

        let mut prepared: Vec<PreparedDraw> = Vec::new();

        for batch in batches {
            let mut defines = Defines::new();
            defines.insert("TEXTURED".to_string(), if batch.key.texture_id != 0 { "1" } else { "0" }.to_string());
            defines.insert("INSTANCED".to_string(), if batch.instanced { "1" } else { "0" }.to_string());
            let Some(pipeline) = self.pipelines.get(&defines) else {
                continue;
            };
            let texture = self.textures.get(&batch.key.texture_id).or_else(|| self.textures.get(&self.default_texture));
            let Some(texture) = texture else { continue };

            let uniform_bind_group = self.uniform_bind_group(projection);

            if let (true, Some(instances), Some(template)) = (batch.instanced, &batch.instances, batch.records.first()) {
                let (vertices, indices) = WgpuBackend::template_buffers(template);
                let instance_data: Vec<WgpuInstance> = instances.iter().map(|&i| i.into()).collect();
                let vertex_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("render2d-instanced-vertex-scratch"),
                    contents: bytemuck::cast_slice(&vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                });
                let index_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("render2d-instanced-index-scratch"),
                    contents: bytemuck::cast_slice(&indices),
                    usage: wgpu::BufferUsages::INDEX,
                });
                let instance_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("render2d-instance-buffer"),
                    contents: bytemuck::cast_slice(&instance_data),
                    usage: wgpu::BufferUsages::VERTEX,
                });
                prepared.push(PreparedDraw {
                    pipeline: &pipeline.pipeline,
                    uniform_bind_group,
                    texture_bind_group: &texture.bind_group,
                    vertex_buffer,
                    index_buffer,
                    instance_buffer: Some(instance_buffer),
                    index_count: indices.len() as u32,
                    instance_count: instance_data.len() as u32,
                });
            } else {
                let (vertices, indices) = WgpuBackend::interleave(batch);
                let vertex_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("render2d-vertex-scratch"),
                    contents: bytemuck::cast_slice(&vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                });
                let index_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("render2d-index-scratch"),
                    contents: bytemuck::cast_slice(&indices),
                    usage: wgpu::BufferUsages::INDEX,
                });
                prepared.push(PreparedDraw {
                    pipeline: &pipeline.pipeline,
                    uniform_bind_group,
                    texture_bind_group: &texture.bind_group,
                    vertex_buffer,
                    index_buffer,
                    instance_buffer: None,
                    index_count: indices.len() as u32,
                    instance_count: 1,
                });
            }
        }

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("render2d-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations { load: wgpu::LoadOp::Clear(self.clear_color), store: wgpu::StoreOp::Store },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            for draw in &prepared {
                pass.set_pipeline(draw.pipeline);
                pass.set_bind_group(0, &draw.uniform_bind_group, &[]);
                pass.set_bind_group(1, draw.texture_bind_group, &[]);
                pass.set_vertex_buffer(0, draw.vertex_buffer.slice(..));
                if let Some(instance_buffer) = &draw.instance_buffer {
                    pass.set_vertex_buffer(1, instance_buffer.slice(..));
                }
                pass.set_index_buffer(draw.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
                pass.draw_indexed(0..draw.index_count, 0, 0..draw.instance_count);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }

    fn present(&mut self) -> RenderResult<()> {
        Ok(())
    }

    fn create_texture(&mut self, width: u32, height: u32, rgba8: &[u8]) -> RenderResult<TextureId> {
        if rgba8.len() != (width * height * 4) as usize {
            return Err(RenderError::InvalidConfig("texture byte length does not match dimensions".into()));
        }
        let size = wgpu::Extent3d { width, height, depth_or_array_layers: 1 };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("render2d-texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.queue.write_texture(
            wgpu::ImageCopyTexture { aspect: wgpu::TextureAspect::All, texture: &texture, mip_level: 0, origin: wgpu::Origin3d::ZERO },
            rgba8,
            wgpu::ImageDataLayout { offset: 0, bytes_per_row: Some(4 * width), rows_per_image: Some(height) },
            size,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("render2d-texture-bind-group"),
            layout: &self.texture_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(&view) },
                wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::Sampler(&sampler) },
            ],
        });

        let id = self.next_texture_id;
        self.next_texture_id += 1;
        self.textures.insert(id, GpuTexture { texture, bind_group });
        Ok(id)
    }

    fn get_image_data(&self, _x: u32, _y: u32, _width: u32, _height: u32) -> RenderResult<Vec<u8>> {
        Err(RenderError::InitializationFailed("readback requires an async buffer map, not supported synchronously".into()))
    }

    fn put_image_data(&mut self, _x: u32, _y: u32, _width: u32, _height: u32, _rgba8: &[u8]) -> RenderResult<()> {
        Err(RenderError::InitializationFailed("direct backbuffer writes are not supported on the wgpu backend".into()))
    }

    fn dispose(&mut self) {
        self.pipelines.clear();
        self.textures.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ifdef_block_is_kept_when_enabled() {
        let source = "a\n#ifdef TEXTURED\nb\n#else\nc\n#endif\nd\n";
        let result = preprocess_ifdef(source, "TEXTURED", true);
        assert_eq!(result, "a\nb\nd\n");
    }

    #[test]
    fn else_block_is_kept_when_disabled() {
        let source = "a\n#ifdef TEXTURED\nb\n#else\nc\n#endif\nd\n";
        let result = preprocess_ifdef(source, "TEXTURED", false);
        assert_eq!(result, "a\nc\nd\n");
    }
}
