//! Particle state storage.
//!
//! Particle records live in floating-point textures, not buffers: each
//! record occupies one or two 4-channel texels, and the physics pass is a
//! fragment shader drawing over the whole texture. This module defines the
//! record layouts, the index-to-texel mapping, and the ping-pong texture
//! pair the passes read from and write into.

mod layout;
mod store;

pub use layout::{LayoutError, ParticleRecord, RecordLayout, StateGrid};
pub use store::{PingPongState, StateTexture};
