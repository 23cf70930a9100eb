//! # Simulation Module
//!
//! The facade that owns one simulation session: the state texture pair,
//! the three passes compiled for the session's configuration, and the
//! emitter. A session is immutable in shape; changing the particle count,
//! layout, or compiled features means dropping the session and building a
//! new one (see [`FrameDriver::reinit`](crate::core::FrameDriver::reinit)).

use thiserror::Error;

use crate::assets::{AssetError, ShaderSources};
use crate::core::{ContextError, GpuContext, SimConfig};
use crate::emit::{Emitter, SpawnOrigin};
use crate::passes::{
    CopyPass, PhysicsPass, PipelineKey, ProgramCache, ProgramError, RenderPass, SimParams,
};
use crate::readback;
use crate::state::{LayoutError, ParticleRecord, PingPongState, StateGrid};

/// Errors raised while building or driving a simulation session.
#[derive(Error, Debug)]
pub enum SimError {
    /// Context acquisition failed.
    #[error(transparent)]
    Context(#[from] ContextError),

    /// A shader source was missing or unusable.
    #[error(transparent)]
    Asset(#[from] AssetError),

    /// A program variant failed to compile or link.
    #[error(transparent)]
    Program(#[from] ProgramError),

    /// The configuration or a record was rejected by the state layout.
    #[error(transparent)]
    Layout(#[from] LayoutError),
}

/// One fully built simulation session.
pub struct Simulation {
    config: SimConfig,
    grid: StateGrid,
    state: PingPongState,
    physics: PhysicsPass,
    copy: CopyPass,
    render: RenderPass,
    emitter: Emitter,
    params: SimParams,
    elapsed: f32,
}

/// The compiled-variant key a configuration selects.
fn pipeline_key(config: &SimConfig) -> PipelineKey {
    PipelineKey {
        kernel: config.kernel,
        position_mode: config.position_mode,
        layout: config.layout,
    }
}

impl Simulation {
    /// Build a session: validate the grid, allocate and seed the state
    /// textures, and compile all three passes.
    ///
    /// Construction is all-or-nothing. Any failure here leaves no partial
    /// session behind; everything allocated so far is dropped.
    pub fn new(
        ctx: &GpuContext,
        sources: &ShaderSources,
        cache: &mut ProgramCache,
        config: &SimConfig,
        target_format: wgpu::TextureFormat,
    ) -> Result<Self, SimError> {
        sources.validate()?;
        let grid = StateGrid::for_count(config.particle_count, config.layout)?;
        let state = PingPongState::new(ctx, grid, config.layout, config.seed_random)?;

        let key = pipeline_key(config);
        let physics = PhysicsPass::new(
            ctx,
            cache,
            sources.get("physics.vert")?,
            sources.get("physics.frag")?,
            &key,
        )?;
        let copy = CopyPass::new(
            ctx,
            cache,
            sources.get("copy.vert")?,
            sources.get("copy.frag")?,
            &key,
        )?;
        let render = RenderPass::new(
            ctx,
            cache,
            sources.get("render.vert")?,
            sources.get("render.frag")?,
            &key,
            &grid,
            target_format,
        )?;

        tracing::info!(
            particles = grid.particle_count(),
            texture = format!("{}x{}", grid.width(), grid.height()),
            kernel = ?config.kernel,
            "simulation session built"
        );

        Ok(Self {
            config: config.clone(),
            grid,
            state,
            physics,
            copy,
            render,
            emitter: Emitter::new(),
            params: SimParams::default(),
            elapsed: 0.0,
        })
    }

    /// The configuration this session was built from.
    #[inline]
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Grid dimensions of the state textures.
    #[inline]
    pub fn grid(&self) -> &StateGrid {
        &self.grid
    }

    /// Seconds of simulated time advanced so far.
    #[inline]
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// Point the attractor target, in normalized device coordinates.
    pub fn set_target(&mut self, x: f32, y: f32) {
        self.params.target = [x, y, 0.0, 0.0];
    }

    /// Tell the render pass the current target surface size in pixels.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.render.set_viewport(width, height);
    }

    /// Inject `count` particles at the emitter's cursor.
    pub fn add_particles(
        &mut self,
        ctx: &GpuContext,
        count: u32,
        origin: &SpawnOrigin,
    ) -> Result<(), SimError> {
        self.emitter
            .add_particles(&ctx.queue, &self.state, count, origin)?;
        Ok(())
    }

    /// Advance simulated time by `dt` seconds without rendering.
    ///
    /// Encodes the physics pass and the copy-back, then submits. The
    /// input texture holds the new state once the GPU drains the submit.
    pub fn step(&mut self, ctx: &GpuContext, dt: f32) {
        self.advance(dt);
        let mut encoder = ctx.create_command_encoder();
        self.encode_step(ctx, &mut encoder);
        ctx.submit(Some(encoder.finish()));
    }

    /// Advance one frame and draw it: physics, copy-back, then the point
    /// render into `target`, all in one submit.
    pub fn tick(
        &mut self,
        ctx: &GpuContext,
        dt: f32,
        target: &wgpu::TextureView,
    ) -> Result<(), SimError> {
        self.advance(dt);
        let mut encoder = ctx.create_command_encoder();
        self.encode_step(ctx, &mut encoder);
        self.render
            .encode(&ctx.device, &mut encoder, &self.state.output, target);
        ctx.submit(Some(encoder.finish()));
        Ok(())
    }

    fn advance(&mut self, dt: f32) {
        self.elapsed += dt;
        self.params.timing = [dt, self.elapsed, 0.0, 0.0];
    }

    fn encode_step(&self, ctx: &GpuContext, encoder: &mut wgpu::CommandEncoder) {
        self.physics.update_params(&ctx.queue, &self.params);
        self.physics.encode(
            &ctx.device,
            encoder,
            &self.state.input,
            &self.state.output,
            &self.grid,
        );
        self.copy
            .encode(&ctx.device, encoder, &self.state.output, &self.state.input);
    }

    /// Read back and log the full particle population, including records
    /// injected since the last step.
    ///
    /// This is a blocking debug path. A failed readback is logged and
    /// swallowed; the session continues unaffected.
    pub fn dump(&self, ctx: &GpuContext) -> Option<Vec<ParticleRecord>> {
        match readback::read_state(ctx, &self.state) {
            Ok(records) => {
                tracing::info!(count = records.len(), "state dump");
                for (index, record) in records.iter().enumerate() {
                    tracing::info!(
                        index,
                        position = ?record.position,
                        velocity = ?record.velocity,
                        age = record.age,
                        "particle"
                    );
                }
                Some(records)
            }
            Err(e) => {
                tracing::warn!(error = %e, "state dump failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::{Kernel, PositionMode};
    use crate::state::RecordLayout;

    #[test]
    fn test_pipeline_key_follows_config() {
        let config = SimConfig {
            kernel: Kernel::Ballistic,
            position_mode: PositionMode::Restricted,
            layout: RecordLayout::PosAgeVel3,
            ..Default::default()
        };
        let key = pipeline_key(&config);
        assert_eq!(key.kernel, Kernel::Ballistic);
        assert_eq!(key.position_mode, PositionMode::Restricted);
        assert_eq!(key.layout, RecordLayout::PosAgeVel3);
    }

    #[test]
    fn test_default_config_forms_square_grid() {
        let config = SimConfig::default();
        let grid = StateGrid::for_count(config.particle_count, config.layout).unwrap();
        assert_eq!(grid.cols(), grid.rows());
        assert_eq!(grid.particle_count(), config.particle_count);
    }
}
