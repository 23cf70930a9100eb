//! GPU pass pipeline.
//!
//! Three passes run in fixed order each frame: physics (full-coverage quad
//! into the output state texture), copy (identity quad writing the output
//! back into the input texture), then render (one point per particle into
//! the host's target). Each pass owns its pipeline and acquires the
//! bindings it needs inside its own encode call, so no binding state leaks
//! between passes.

mod copy;
mod physics;
mod program;
mod render;

pub use copy::CopyPass;
pub use physics::{PhysicsPass, SimParams};
pub use program::{Kernel, PipelineKey, PositionMode, ProgramCache, ProgramError, ShaderProgram};
pub use render::RenderPass;
