//! # Pointflow - GPU-Resident Point-Particle Simulation
//!
//! Pointflow advances a large population of point particles entirely on the
//! GPU and renders them as screen-space points. Particle state lives in a
//! pair of floating-point textures (ping-pong buffering): a fragment-shader
//! physics pass reads one texture and writes the other, an identity copy
//! pass commits the result back for the next step, and a point render pass
//! samples the same state within the vertex stage to place one point per
//! particle.
//!
//! ## Features
//!
//! - **Core**: headless wgpu context, frame clock, and an explicit
//!   play/pause frame driver
//! - **State**: validated particle record layouts and the ping-pong state
//!   texture pair
//! - **Passes**: compile-time specialized physics, copy, and render passes
//! - **Emit**: runtime particle injection through a wrapping write cursor
//!
//! ## Example
//!
//! ```ignore
//! use pointflow::prelude::*;
//!
//! let ctx = pollster::block_on(GpuContext::new())?;
//! let sources = ShaderSources::builtin();
//! let mut cache = ProgramCache::new();
//! let config = SimConfig::default();
//!
//! let sim = Simulation::new(&ctx, &sources, &mut cache, &config, surface_format)?;
//! let mut driver = FrameDriver::new();
//! driver.ready(sim);
//! driver.play();
//!
//! // per host frame callback:
//! driver.tick_with(|sim, dt| sim.tick(&ctx, dt, &surface_view))?;
//! ```

pub mod assets;
pub mod core;
pub mod emit;
pub mod passes;
pub mod readback;
pub mod sim;
pub mod state;

// Re-export commonly used types
pub mod prelude {
    //! Convenient re-exports of commonly used types.

    pub use crate::assets::{AssetError, ShaderSources};
    pub use crate::core::{
        ContextError, DriverState, FrameClock, FrameDriver, GpuContext, SimConfig,
    };
    pub use crate::emit::{Emitter, SpawnOrigin};
    pub use crate::passes::{Kernel, PositionMode, ProgramCache, ProgramError};
    pub use crate::sim::{SimError, Simulation};
    pub use crate::state::{LayoutError, ParticleRecord, PingPongState, RecordLayout, StateGrid};
}
