//! Particle record layouts and the index-to-texel mapping.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Channels per state texel.
pub const CHANNELS: usize = 4;

/// Errors raised by layout construction and record encoding/decoding.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LayoutError {
    /// The particle count does not form a square texel grid.
    #[error("Particle count {particle_count} is not a perfect square")]
    NotSquare {
        /// The rejected count.
        particle_count: u32,
    },

    /// The particle count is zero.
    #[error("Particle count must be non-zero")]
    ZeroCount,

    /// A record field cannot be represented in the chosen layout.
    #[error("Field `{field}` is not representable in layout {layout:?}")]
    NotRepresentable {
        /// The offending record field.
        field: &'static str,
        /// Layout that rejected it.
        layout: RecordLayout,
    },

    /// A channel the layout declares unused held a non-zero value.
    #[error("Unused channel {channel} holds {value}, expected 0")]
    UnusedChannel {
        /// Flat channel index within the record.
        channel: usize,
        /// The unexpected value.
        value: f32,
    },

    /// Decoding was handed the wrong number of floats.
    #[error("Expected {expected} floats per record, got {got}")]
    WrongLength {
        /// Floats one record occupies in this layout.
        expected: usize,
        /// Floats actually provided.
        got: usize,
    },
}

/// How one particle record is packed into state texels.
///
/// The layout is fixed for the lifetime of a simulation session; the
/// physics pass encodes and the render pass decodes through the same
/// layout. Channels a layout does not use are declared here and validated
/// to be zero rather than left as an undocumented convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordLayout {
    /// One texel per particle: `(x, y, vx, vy)`.
    ///
    /// Planar records; z, age, and vz are not carried.
    PosVel2,
    /// Two texels per particle: `(x, y, z, age)` then `(vx, vy, vz, 0)`.
    ///
    /// The eighth channel is unused and must be zero.
    PosAgeVel3,
}

impl RecordLayout {
    /// Texel slots one record occupies.
    #[inline]
    pub fn slots(&self) -> u32 {
        match self {
            RecordLayout::PosVel2 => 1,
            RecordLayout::PosAgeVel3 => 2,
        }
    }

    /// Floats one record occupies.
    #[inline]
    pub fn floats(&self) -> usize {
        self.slots() as usize * CHANNELS
    }

    /// Append one encoded record to `out`.
    ///
    /// Fails if the record holds data the layout cannot carry, so a
    /// session can never silently drop state on the way into the texture.
    pub fn encode(&self, record: &ParticleRecord, out: &mut Vec<f32>) -> Result<(), LayoutError> {
        match self {
            RecordLayout::PosVel2 => {
                if record.position[2] != 0.0 {
                    return Err(LayoutError::NotRepresentable {
                        field: "position.z",
                        layout: *self,
                    });
                }
                if record.velocity[2] != 0.0 {
                    return Err(LayoutError::NotRepresentable {
                        field: "velocity.z",
                        layout: *self,
                    });
                }
                if record.age != 0.0 {
                    return Err(LayoutError::NotRepresentable {
                        field: "age",
                        layout: *self,
                    });
                }
                out.extend_from_slice(&[
                    record.position[0],
                    record.position[1],
                    record.velocity[0],
                    record.velocity[1],
                ]);
            }
            RecordLayout::PosAgeVel3 => {
                out.extend_from_slice(&[
                    record.position[0],
                    record.position[1],
                    record.position[2],
                    record.age,
                    record.velocity[0],
                    record.velocity[1],
                    record.velocity[2],
                    0.0,
                ]);
            }
        }
        Ok(())
    }

    /// Decode one record from exactly [`floats`](Self::floats) values.
    pub fn decode(&self, texels: &[f32]) -> Result<ParticleRecord, LayoutError> {
        if texels.len() != self.floats() {
            return Err(LayoutError::WrongLength {
                expected: self.floats(),
                got: texels.len(),
            });
        }
        match self {
            RecordLayout::PosVel2 => Ok(ParticleRecord {
                position: [texels[0], texels[1], 0.0],
                age: 0.0,
                velocity: [texels[2], texels[3], 0.0],
            }),
            RecordLayout::PosAgeVel3 => {
                if texels[7] != 0.0 {
                    return Err(LayoutError::UnusedChannel {
                        channel: 7,
                        value: texels[7],
                    });
                }
                Ok(ParticleRecord {
                    position: [texels[0], texels[1], texels[2]],
                    age: texels[3],
                    velocity: [texels[4], texels[5], texels[6]],
                })
            }
        }
    }
}

/// One particle's decoded state.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ParticleRecord {
    /// Position in normalized device coordinates.
    pub position: [f32; 3],
    /// Age in seconds.
    pub age: f32,
    /// Velocity in NDC units per second.
    pub velocity: [f32; 3],
}

/// Dimensions of the state texture grid and the particle index mapping.
///
/// `cols * rows == particle_count` and the texture is `cols * slots` texels
/// wide: a two-slot record occupies two horizontally adjacent texels.
/// The index mapping is bijective over `[0, particle_count)` and immutable
/// until the particle count changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateGrid {
    cols: u32,
    rows: u32,
    slots: u32,
}

impl StateGrid {
    /// Build the square grid for a particle count.
    ///
    /// The count must be a non-zero perfect square, mirroring the square
    /// state texture the render mapping assumes.
    pub fn for_count(particle_count: u32, layout: RecordLayout) -> Result<Self, LayoutError> {
        if particle_count == 0 {
            return Err(LayoutError::ZeroCount);
        }
        let side = integer_sqrt(particle_count);
        if side * side != particle_count {
            return Err(LayoutError::NotSquare { particle_count });
        }
        Ok(Self {
            cols: side,
            rows: side,
            slots: layout.slots(),
        })
    }

    /// Particles per texture row.
    #[inline]
    pub fn cols(&self) -> u32 {
        self.cols
    }

    /// Texture rows.
    #[inline]
    pub fn rows(&self) -> u32 {
        self.rows
    }

    /// Texel slots per particle.
    #[inline]
    pub fn slots(&self) -> u32 {
        self.slots
    }

    /// Total particle count.
    #[inline]
    pub fn particle_count(&self) -> u32 {
        self.cols * self.rows
    }

    /// State texture width in texels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.cols * self.slots
    }

    /// State texture height in texels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.rows
    }

    /// Base texel coordinate of a particle index.
    #[inline]
    pub fn index_to_texel(&self, index: u32) -> [u32; 2] {
        [(index % self.cols) * self.slots, index / self.cols]
    }

    /// The per-point vertex attribute data for the render pass: one base
    /// texel coordinate per particle index.
    pub fn texel_coords(&self) -> Vec<[u32; 2]> {
        (0..self.particle_count())
            .map(|i| self.index_to_texel(i))
            .collect()
    }
}

/// Floor of the square root, exact for perfect squares.
fn integer_sqrt(n: u32) -> u32 {
    let mut root = (n as f64).sqrt() as u32;
    while root.saturating_mul(root) > n {
        root -= 1;
    }
    // checked_mul ends the ascent when the next square leaves u32 range.
    while (root + 1).checked_mul(root + 1).is_some_and(|sq| sq <= n) {
        root += 1;
    }
    root
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_mapping_is_bijective_for_perfect_squares() {
        for count in [1u32, 4, 16, 64, 1024, 65_536] {
            let grid = StateGrid::for_count(count, RecordLayout::PosVel2).unwrap();
            let coords: HashSet<[u32; 2]> = grid.texel_coords().into_iter().collect();
            assert_eq!(coords.len() as u32, count);
            for [x, y] in &coords {
                assert!(*x < grid.width());
                assert!(*y < grid.height());
            }
        }
    }

    #[test]
    fn test_two_slot_mapping_strides_by_two() {
        let grid = StateGrid::for_count(4, RecordLayout::PosAgeVel3).unwrap();
        assert_eq!(grid.width(), 4);
        assert_eq!(grid.height(), 2);
        assert_eq!(grid.index_to_texel(0), [0, 0]);
        assert_eq!(grid.index_to_texel(1), [2, 0]);
        assert_eq!(grid.index_to_texel(2), [0, 1]);
    }

    #[test]
    fn test_non_square_count_rejected() {
        assert_eq!(
            StateGrid::for_count(12, RecordLayout::PosVel2),
            Err(LayoutError::NotSquare { particle_count: 12 })
        );
        assert_eq!(
            StateGrid::for_count(0, RecordLayout::PosVel2),
            Err(LayoutError::ZeroCount)
        );
    }

    #[test]
    fn test_planar_round_trip() {
        let layout = RecordLayout::PosVel2;
        let record = ParticleRecord {
            position: [0.25, -0.75, 0.0],
            age: 0.0,
            velocity: [1.5, -0.125, 0.0],
        };
        let mut encoded = Vec::new();
        layout.encode(&record, &mut encoded).unwrap();
        assert_eq!(encoded.len(), layout.floats());
        assert_eq!(layout.decode(&encoded).unwrap(), record);
    }

    #[test]
    fn test_two_slot_round_trip() {
        let layout = RecordLayout::PosAgeVel3;
        let record = ParticleRecord {
            position: [0.5, 0.5, -0.25],
            age: 3.75,
            velocity: [0.0, -2.0, 1.0],
        };
        let mut encoded = Vec::new();
        layout.encode(&record, &mut encoded).unwrap();
        assert_eq!(encoded.len(), 8);
        assert_eq!(layout.decode(&encoded).unwrap(), record);
    }

    #[test]
    fn test_planar_layout_rejects_depth_and_age() {
        let layout = RecordLayout::PosVel2;
        let mut out = Vec::new();
        let record = ParticleRecord {
            position: [0.0, 0.0, 0.5],
            ..Default::default()
        };
        assert!(matches!(
            layout.encode(&record, &mut out),
            Err(LayoutError::NotRepresentable {
                field: "position.z",
                ..
            })
        ));
    }

    #[test]
    fn test_unused_channel_must_be_zero() {
        let layout = RecordLayout::PosAgeVel3;
        let mut texels = vec![0.0f32; 8];
        texels[7] = 0.5;
        assert!(matches!(
            layout.decode(&texels),
            Err(LayoutError::UnusedChannel {
                channel: 7,
                value
            }) if value == 0.5
        ));
    }

    #[test]
    fn test_decode_length_checked() {
        assert!(matches!(
            RecordLayout::PosVel2.decode(&[0.0; 8]),
            Err(LayoutError::WrongLength {
                expected: 4,
                got: 8
            })
        ));
    }

    #[test]
    fn test_integer_sqrt_edges() {
        assert_eq!(integer_sqrt(0), 0);
        assert_eq!(integer_sqrt(1), 1);
        assert_eq!(integer_sqrt(3), 1);
        assert_eq!(integer_sqrt(4), 2);
        assert_eq!(integer_sqrt(65_535 * 65_535), 65_535);
        assert_eq!(integer_sqrt(u32::MAX), 65_535);
    }

    #[test]
    fn test_huge_count_rejected_without_panic() {
        // Counts near u32::MAX must come back as a layout error, never
        // trip arithmetic overflow on the way to one.
        assert_eq!(
            StateGrid::for_count(u32::MAX, RecordLayout::PosVel2),
            Err(LayoutError::NotSquare {
                particle_count: u32::MAX
            })
        );
        assert_eq!(
            StateGrid::for_count(u32::MAX - 1, RecordLayout::PosAgeVel3),
            Err(LayoutError::NotSquare {
                particle_count: u32::MAX - 1
            })
        );
    }
}
