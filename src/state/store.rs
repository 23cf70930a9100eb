//! Ping-pong state texture pair.

use rand::Rng;

use crate::core::{GpuContext, STATE_FORMAT};

use super::{LayoutError, ParticleRecord, RecordLayout, StateGrid};

/// One floating-point state texture and its sampling view.
pub struct StateTexture {
    /// The GPU texture.
    pub texture: wgpu::Texture,
    /// View used for both sampling and attachment.
    pub view: wgpu::TextureView,
}

impl StateTexture {
    fn new(device: &wgpu::Device, grid: &StateGrid, label: &str) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: grid.width(),
                height: grid.height(),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: STATE_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }
}

/// The double-buffered particle state.
///
/// Exactly one texture is readable (the authoritative current state) and
/// one is writable during a physics step. The roles are not swapped by
/// pointer exchange: the copy pass writes the freshly computed output back
/// into the input texture, because the render pass still samples the output
/// texture later in the same frame.
///
/// Both textures and their views are released deterministically when the
/// store is dropped.
pub struct PingPongState {
    /// Read side of the physics step.
    pub input: StateTexture,
    /// Write side of the physics step; sampled by the render pass.
    pub output: StateTexture,
    grid: StateGrid,
    layout: RecordLayout,
}

impl PingPongState {
    /// Allocate and seed the texture pair.
    ///
    /// The input texture is seeded with one record per particle, each
    /// carried channel drawn independently and uniformly from [-1, 1]
    /// when `seed_random` is set, zeroed otherwise. The output texture
    /// always starts zeroed; the first physics pass overwrites every
    /// texel of it.
    pub fn new(
        ctx: &GpuContext,
        grid: StateGrid,
        layout: RecordLayout,
        seed_random: bool,
    ) -> Result<Self, LayoutError> {
        let input = StateTexture::new(&ctx.device, &grid, "State Input Texture");
        let output = StateTexture::new(&ctx.device, &grid, "State Output Texture");

        let store = Self {
            input,
            output,
            grid,
            layout,
        };

        let seed = store.seed_data(seed_random)?;
        store.upload_full(&ctx.queue, &store.input, &seed);
        let zeros = vec![0.0f32; seed.len()];
        store.upload_full(&ctx.queue, &store.output, &zeros);
        Ok(store)
    }

    /// Grid dimensions.
    #[inline]
    pub fn grid(&self) -> &StateGrid {
        &self.grid
    }

    /// Record layout both textures use.
    #[inline]
    pub fn layout(&self) -> RecordLayout {
        self.layout
    }

    fn seed_data(&self, random: bool) -> Result<Vec<f32>, LayoutError> {
        let count = self.grid.particle_count();
        let mut data = Vec::with_capacity(count as usize * self.layout.floats());
        let mut rng = rand::thread_rng();
        for _ in 0..count {
            let record = if random {
                match self.layout {
                    RecordLayout::PosVel2 => ParticleRecord {
                        position: [rng.gen_range(-1.0..=1.0), rng.gen_range(-1.0..=1.0), 0.0],
                        age: 0.0,
                        velocity: [rng.gen_range(-1.0..=1.0), rng.gen_range(-1.0..=1.0), 0.0],
                    },
                    RecordLayout::PosAgeVel3 => ParticleRecord {
                        position: [
                            rng.gen_range(-1.0..=1.0),
                            rng.gen_range(-1.0..=1.0),
                            rng.gen_range(-1.0..=1.0),
                        ],
                        age: 0.0,
                        velocity: [
                            rng.gen_range(-1.0..=1.0),
                            rng.gen_range(-1.0..=1.0),
                            rng.gen_range(-1.0..=1.0),
                        ],
                    },
                }
            } else {
                ParticleRecord::default()
            };
            self.layout.encode(&record, &mut data)?;
        }
        Ok(data)
    }

    fn upload_full(&self, queue: &wgpu::Queue, texture: &StateTexture, data: &[f32]) {
        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(data),
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(self.grid.width() * 16),
                rows_per_image: Some(self.grid.height()),
            },
            wgpu::Extent3d {
                width: self.grid.width(),
                height: self.grid.height(),
                depth_or_array_layers: 1,
            },
        );
    }

    /// Overwrite a horizontal run of texels on one row of the input
    /// texture. `data` must hold exactly `width_texels * 4` floats.
    pub fn write_input_run(
        &self,
        queue: &wgpu::Queue,
        x: u32,
        y: u32,
        width_texels: u32,
        data: &[f32],
    ) {
        debug_assert_eq!(data.len() as u32, width_texels * 4);
        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &self.input.texture,
                mip_level: 0,
                origin: wgpu::Origin3d { x, y, z: 0 },
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(data),
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(width_texels * 16),
                rows_per_image: Some(1),
            },
            wgpu::Extent3d {
                width: width_texels,
                height: 1,
                depth_or_array_layers: 1,
            },
        );
    }
}
