//! Render pass: one screen-space point per particle.

use wgpu::util::DeviceExt;

use crate::core::GpuContext;
use crate::state::{StateGrid, StateTexture};

use super::program::{link_scope, PipelineKey, ProgramCache, ProgramError};

/// The point render pass.
///
/// Each particle index carries its precomputed state-texel coordinate as a
/// vertex attribute; the vertex stage loads the particle's position from
/// the output state texture and emits a single-pixel point. Point color is
/// derived only from the sampled state, never from CPU-side bookkeeping.
/// Runs after the copy pass so the sampled data matches the frame's final
/// state.
pub struct RenderPass {
    pipeline: wgpu::RenderPipeline,
    bind_layout: wgpu::BindGroupLayout,
    coord_buffer: wgpu::Buffer,
    particle_count: u32,
    viewport: Option<(u32, u32)>,
}

impl RenderPass {
    /// Build the render pipeline and the static texel-coordinate buffer.
    ///
    /// `target_format` must match the view the host hands to
    /// [`encode`](Self::encode) each frame.
    pub fn new(
        ctx: &GpuContext,
        cache: &mut ProgramCache,
        vert: &str,
        frag: &str,
        key: &PipelineKey,
        grid: &StateGrid,
        target_format: wgpu::TextureFormat,
    ) -> Result<Self, ProgramError> {
        let device = &ctx.device;
        let program = cache.get_or_compile(device, "render", vert, frag, key)?;

        let coords = grid.texel_coords();
        let coord_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Texel Coord Buffer"),
            contents: bytemuck::cast_slice(&coords),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let bind_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Render Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Render Pipeline Layout"),
            bind_group_layouts: &[&bind_layout],
            push_constant_ranges: &[],
        });

        let pipeline = link_scope(device, "render", || {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Render Pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &program.module,
                    entry_point: Some("vs_main"),
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: 8,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &[wgpu::VertexAttribute {
                            format: wgpu::VertexFormat::Uint32x2,
                            offset: 0,
                            shader_location: 0,
                        }],
                    }],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &program.module,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: target_format,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::PointList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    unclipped_depth: false,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    conservative: false,
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        })?;

        Ok(Self {
            pipeline,
            bind_layout,
            coord_buffer,
            particle_count: grid.particle_count(),
            viewport: None,
        })
    }

    /// Restrict drawing to the given viewport; pass the canvas size when
    /// the host target is larger than the drawable area.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport = Some((width, height));
    }

    /// Number of points drawn per frame.
    #[inline]
    pub fn particle_count(&self) -> u32 {
        self.particle_count
    }

    /// Encode the point draw into the host's target view, clearing it to
    /// black first.
    pub fn encode(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        state: &StateTexture,
        target: &wgpu::TextureView,
    ) {
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Render Bind Group"),
            layout: &self.bind_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&state.view),
            }],
        });

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Point Render Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.set_vertex_buffer(0, self.coord_buffer.slice(..));
        if let Some((w, h)) = self.viewport {
            pass.set_viewport(0.0, 0.0, w as f32, h as f32, 0.0, 1.0);
        }
        pass.draw(0..self.particle_count, 0..1);
    }
}
