//! Synchronous state readback for debugging.
//!
//! This is a rare, fully blocking side path off the main tick cadence: it
//! copies the input state texture into a mapped buffer, waits for the
//! GPU, and decodes every particle record. The input side is read rather
//! than the output side because it is authoritative at every point a dump
//! can be issued: the copy pass commits each step's result into it, and
//! injected particles are written straight into it. Failures are reported
//! to the caller, which is expected to log and continue; a failed dump
//! never affects the simulation.

use std::sync::mpsc;

use thiserror::Error;

use crate::core::GpuContext;
use crate::state::{LayoutError, ParticleRecord, PingPongState};

/// Row alignment required for texture-to-buffer copies.
const ROW_ALIGN: u32 = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

/// Errors from the debug readback path.
#[derive(Error, Debug)]
pub enum ReadbackError {
    /// The state texture cannot be copied out on this configuration.
    #[error("State readback unsupported: {0}")]
    Unsupported(String),

    /// Mapping the staging buffer failed.
    #[error("Failed to map readback buffer: {0}")]
    Map(String),

    /// The texture held data the session layout does not admit.
    #[error(transparent)]
    Layout(#[from] LayoutError),
}

/// Read back and decode the full particle population from the input
/// texture, the committed current state.
///
/// Blocks until the GPU has drained all outstanding writes to the state
/// texture, so the data read is never mid-write.
pub fn read_state(
    ctx: &GpuContext,
    state: &PingPongState,
) -> Result<Vec<ParticleRecord>, ReadbackError> {
    let texture = &state.input.texture;
    if !texture.usage().contains(wgpu::TextureUsages::COPY_SRC) {
        return Err(ReadbackError::Unsupported(
            "state texture lacks COPY_SRC usage".to_string(),
        ));
    }

    let grid = state.grid();
    let layout = state.layout();
    let unpadded_row = grid.width() * 16;
    let padded_row = unpadded_row.div_ceil(ROW_ALIGN) * ROW_ALIGN;

    let staging = ctx.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("State Readback Buffer"),
        size: (padded_row * grid.height()) as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = ctx.create_command_encoder();
    encoder.copy_texture_to_buffer(
        wgpu::ImageCopyTexture {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::ImageCopyBuffer {
            buffer: &staging,
            layout: wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(padded_row),
                rows_per_image: Some(grid.height()),
            },
        },
        wgpu::Extent3d {
            width: grid.width(),
            height: grid.height(),
            depth_or_array_layers: 1,
        },
    );
    ctx.submit(Some(encoder.finish()));

    let slice = staging.slice(..);
    let (tx, rx) = mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    ctx.device.poll(wgpu::Maintain::Wait);
    rx.recv()
        .map_err(|_| ReadbackError::Map("map callback dropped".to_string()))?
        .map_err(|e| ReadbackError::Map(e.to_string()))?;

    let mapped = slice.get_mapped_range();
    let mut records = Vec::with_capacity(grid.particle_count() as usize);
    let floats_per_record = layout.floats();
    for index in 0..grid.particle_count() {
        let [x, y] = grid.index_to_texel(index);
        let offset = (y * padded_row + x * 16) as usize;
        let texels: &[f32] =
            bytemuck::cast_slice(&mapped[offset..offset + floats_per_record * 4]);
        records.push(layout.decode(texels)?);
    }
    drop(mapped);
    staging.unmap();

    Ok(records)
}
