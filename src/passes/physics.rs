//! Physics pass: one simulation step as a full-coverage quad draw.

use bytemuck::{Pod, Zeroable};

use crate::core::{GpuContext, STATE_FORMAT};
use crate::state::{StateGrid, StateTexture};

use super::program::{link_scope, PipelineKey, ProgramCache, ProgramError};

/// Per-step simulation parameters uploaded before each physics draw.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct SimParams {
    /// Pointer target: xy in normalized device coordinates.
    pub target: [f32; 4],
    /// Timing: x = delta time in seconds, y = elapsed seconds.
    pub timing: [f32; 4],
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            target: [0.0, 0.0, 0.0, 0.0],
            timing: [0.0, 0.0, 0.0, 0.0],
        }
    }
}

/// The physics pass.
///
/// Reads the input state texture, integrates every particle record once,
/// and writes the result into the output state texture via an off-screen
/// quad draw covering each texel exactly once. Never reads back to the
/// CPU. The kernel variant (attractor or ballistic, restricted or not) is
/// compiled in through the program cache key.
pub struct PhysicsPass {
    pipeline: wgpu::RenderPipeline,
    bind_layout: wgpu::BindGroupLayout,
    params_buffer: wgpu::Buffer,
}

impl PhysicsPass {
    /// Build the physics pipeline for one compiled variant.
    pub fn new(
        ctx: &GpuContext,
        cache: &mut ProgramCache,
        vert: &str,
        frag: &str,
        key: &PipelineKey,
    ) -> Result<Self, ProgramError> {
        let device = &ctx.device;
        let program = cache.get_or_compile(device, "physics", vert, frag, key)?;

        let bind_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Physics Bind Group Layout"),
            entries: &[
                // Input state texture
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                // Simulation parameters
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Physics Pipeline Layout"),
            bind_group_layouts: &[&bind_layout],
            push_constant_ranges: &[],
        });

        let pipeline = link_scope(device, "physics", || {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Physics Pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &program.module,
                    entry_point: Some("vs_main"),
                    buffers: &[],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &program.module,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: STATE_FORMAT,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleStrip,
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

        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Sim Params Buffer"),
            size: std::mem::size_of::<SimParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Ok(Self {
            pipeline,
            bind_layout,
            params_buffer,
        })
    }

    /// Upload the per-step parameters.
    pub fn update_params(&self, queue: &wgpu::Queue, params: &SimParams) {
        queue.write_buffer(&self.params_buffer, 0, bytemuck::cast_slice(&[*params]));
    }

    /// Encode one physics step: input texture sampled, output texture
    /// attached, one quad draw at state-texture resolution. The bindings
    /// live only within this call.
    pub fn encode(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        input: &StateTexture,
        output: &StateTexture,
        grid: &StateGrid,
    ) {
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Physics Bind Group"),
            layout: &self.bind_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&input.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: self.params_buffer.as_entire_binding(),
                },
            ],
        });

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Physics Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &output.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.set_viewport(
            0.0,
            0.0,
            grid.width() as f32,
            grid.height() as f32,
            0.0,
            1.0,
        );
        pass.draw(0..4, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_match_shader_uniform_layout() {
        // The shader-side struct is two vec4 fields: 32 bytes, no padding.
        assert_eq!(std::mem::size_of::<SimParams>(), 32);
        assert_eq!(bytemuck::bytes_of(&SimParams::default()).len(), 32);
    }
}
