//! # Core Module
//!
//! Core simulation functionality: wgpu context management, frame timing,
//! the frame driver state machine, and simulation configuration.

mod clock;
mod context;
mod driver;

pub use clock::FrameClock;
pub use context::{ContextError, GpuContext, STATE_FORMAT};
pub use driver::{DriverState, FrameDriver};

use serde::{Deserialize, Serialize};

use crate::passes::{Kernel, PositionMode};
use crate::state::RecordLayout;

/// Simulation configuration.
///
/// Any change to the particle count, record layout, or compiled features
/// requires a full pipeline rebuild (see [`FrameDriver`]); nothing is
/// patched in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    /// Number of particles. Must be a perfect square so the state
    /// texture grid can be square, matching the index mapping.
    pub particle_count: u32,
    /// Particle record layout for the state textures.
    pub layout: RecordLayout,
    /// Physics kernel compiled into the physics pass.
    pub kernel: Kernel,
    /// Whether out-of-bounds positions are clamped and reflected.
    pub position_mode: PositionMode,
    /// Seed the initial state uniformly in [-1, 1] per channel instead
    /// of all zeros.
    pub seed_random: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            particle_count: 65_536,
            layout: RecordLayout::PosVel2,
            kernel: Kernel::Attractor,
            position_mode: PositionMode::Unrestricted,
            seed_random: true,
        }
    }
}
