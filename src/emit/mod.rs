//! Runtime particle injection.
//!
//! New particles are written straight into the input state texture at a
//! wrapping write cursor, so particles can be injected at runtime without
//! reseeding the whole population. Overwritten records lose their prior
//! state unconditionally.

use rand::Rng;

use crate::state::{LayoutError, ParticleRecord, PingPongState, RecordLayout, StateGrid};

/// Position jitter applied to spawned particles on the x and y axes.
pub const POSITION_JITTER_XY: f32 = 0.02;
/// Position jitter applied on the z axis (two-slot layouts only).
pub const POSITION_JITTER_Z: f32 = 0.01;
/// Velocity jitter applied per carried axis.
pub const VELOCITY_JITTER: f32 = 1.0;

/// Where and how fast injected particles start.
#[derive(Debug, Clone, Copy)]
pub struct SpawnOrigin {
    /// Spawn position in normalized device coordinates.
    pub position: [f32; 3],
    /// Initial velocity.
    pub velocity: [f32; 3],
}

/// A contiguous run of particle indices on one texture row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRun {
    /// First particle index of the run.
    pub start: u32,
    /// Number of particles in the run.
    pub len: u32,
}

/// The spawn component.
///
/// Owns its write cursor explicitly, so independent simulation instances
/// cannot interfere through shared module state. The cursor is the next
/// particle index to be written and wraps modulo the particle count.
#[derive(Debug, Default, Clone)]
pub struct Emitter {
    cursor: u32,
}

impl Emitter {
    /// Create an emitter writing from index 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// The next particle index that will be written.
    #[inline]
    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    /// Move the write cursor to an absolute particle index.
    pub fn seek(&mut self, index: u32) {
        self.cursor = index;
    }

    /// Plan the row-bounded runs for a spawn of `count` particles and
    /// advance the cursor past them.
    ///
    /// Each run stays within one texture row, so uploading one run is one
    /// contiguous sub-image write: a spawn costs O(rows touched) uploads,
    /// not O(count). A spawn larger than the particle count revisits
    /// indices at most `ceil(count / particle_count)` times, later runs
    /// overwriting earlier ones.
    pub fn plan(&mut self, count: u32, grid: &StateGrid) -> Vec<IndexRun> {
        let n = grid.particle_count();
        let cols = grid.cols();
        self.cursor %= n;

        let mut runs = Vec::new();
        let mut index = self.cursor;
        let mut remaining = count;
        while remaining > 0 {
            let row_end = (index / cols + 1) * cols;
            let len = remaining.min(row_end - index);
            runs.push(IndexRun { start: index, len });
            index = (index + len) % n;
            remaining -= len;
        }
        self.cursor = index;
        runs
    }

    /// Inject `count` particles around `origin` into the input texture.
    ///
    /// Every spawned record is jittered independently around the origin;
    /// fields the session's layout cannot carry must be zero in the
    /// origin or the spawn fails before anything is written.
    pub fn add_particles(
        &mut self,
        queue: &wgpu::Queue,
        state: &PingPongState,
        count: u32,
        origin: &SpawnOrigin,
    ) -> Result<(), LayoutError> {
        if count == 0 {
            return Ok(());
        }
        let grid = *state.grid();
        let layout = state.layout();
        let mut rng = rand::thread_rng();

        // Reject an unrepresentable origin before moving the cursor.
        layout.encode(
            &ParticleRecord {
                position: origin.position,
                age: 0.0,
                velocity: origin.velocity,
            },
            &mut Vec::new(),
        )?;

        let runs = self.plan(count, &grid);
        let mut data = Vec::new();
        for run in &runs {
            data.clear();
            data.reserve(run.len as usize * layout.floats());
            for _ in 0..run.len {
                layout.encode(&spawn_record(origin, layout, &mut rng), &mut data)?;
            }
            let [x, y] = grid.index_to_texel(run.start);
            state.write_input_run(queue, x, y, run.len * grid.slots(), &data);
        }

        tracing::debug!(count, runs = runs.len(), cursor = self.cursor, "spawned particles");
        Ok(())
    }
}

/// One jittered record around the spawn origin.
fn spawn_record<R: Rng>(origin: &SpawnOrigin, layout: RecordLayout, rng: &mut R) -> ParticleRecord {
    let carries_z = layout == RecordLayout::PosAgeVel3;
    fn jitter<R: Rng>(rng: &mut R, extent: f32) -> f32 {
        rng.gen_range(-extent..=extent)
    }
    ParticleRecord {
        position: [
            origin.position[0] + jitter(rng, POSITION_JITTER_XY),
            origin.position[1] + jitter(rng, POSITION_JITTER_XY),
            if carries_z {
                origin.position[2] + jitter(rng, POSITION_JITTER_Z)
            } else {
                origin.position[2]
            },
        ],
        age: 0.0,
        velocity: [
            origin.velocity[0] + jitter(rng, VELOCITY_JITTER),
            origin.velocity[1] + jitter(rng, VELOCITY_JITTER),
            if carries_z {
                origin.velocity[2] + jitter(rng, VELOCITY_JITTER)
            } else {
                origin.velocity[2]
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(count: u32, layout: RecordLayout) -> StateGrid {
        StateGrid::for_count(count, layout).unwrap()
    }

    #[test]
    fn test_plan_stays_within_rows() {
        // 16 particles, 4 per row; spawning 8 from index 2 touches rows
        // 0, 1, and 2 with exactly one run each.
        let mut emitter = Emitter::new();
        emitter.seek(2);
        let runs = emitter.plan(8, &grid(16, RecordLayout::PosVel2));
        assert_eq!(
            runs,
            vec![
                IndexRun { start: 2, len: 2 },
                IndexRun { start: 4, len: 4 },
                IndexRun { start: 8, len: 2 },
            ]
        );
        assert_eq!(emitter.cursor(), 10);
    }

    #[test]
    fn test_plan_wraps_across_index_space() {
        // 4 particles (2x2 grid): spawning 3 at the tail writes index 3,
        // then wraps to 0 and 1.
        let mut emitter = Emitter::new();
        emitter.seek(3);
        let runs = emitter.plan(3, &grid(4, RecordLayout::PosVel2));
        assert_eq!(
            runs,
            vec![
                IndexRun { start: 3, len: 1 },
                IndexRun { start: 0, len: 2 },
            ]
        );
        assert_eq!(emitter.cursor(), 2);
    }

    #[test]
    fn test_cursor_marks_first_written_index() {
        // The cursor is the index the next spawn writes first: from
        // index 6 on a 16-particle grid a 3-particle spawn lands on
        // indices 6, 7, and 8, leaving the cursor at 9.
        let g = grid(16, RecordLayout::PosVel2);
        let mut emitter = Emitter::new();
        emitter.seek(6);
        let runs = emitter.plan(3, &g);
        assert_eq!(
            runs,
            vec![
                IndexRun { start: 6, len: 2 },
                IndexRun { start: 8, len: 1 },
            ]
        );
        assert_eq!(emitter.cursor(), 9);

        // The same spawn at the tail wraps: 14, 15, then 0.
        emitter.seek(14);
        let runs = emitter.plan(3, &g);
        assert_eq!(
            runs,
            vec![
                IndexRun { start: 14, len: 2 },
                IndexRun { start: 0, len: 1 },
            ]
        );
        assert_eq!(emitter.cursor(), 1);
    }

    #[test]
    fn test_oversized_spawn_revisits_at_most_ceil() {
        let g = grid(4, RecordLayout::PosVel2);
        let mut emitter = Emitter::new();
        let runs = emitter.plan(10, &g);
        let mut visits = [0u32; 4];
        for run in runs {
            for i in 0..run.len {
                visits[((run.start + i) % 4) as usize] += 1;
            }
        }
        // ceil(10 / 4) == 3
        assert!(visits.iter().all(|&v| v <= 3));
        assert_eq!(visits.iter().sum::<u32>(), 10);
        assert_eq!(emitter.cursor(), 2);
    }

    #[test]
    fn test_spawn_record_within_jitter_bounds() {
        let origin = SpawnOrigin {
            position: [0.5, 0.5, 0.0],
            velocity: [0.0, 0.0, 0.0],
        };
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let record = spawn_record(&origin, RecordLayout::PosAgeVel3, &mut rng);
            assert!((record.position[0] - 0.5).abs() <= POSITION_JITTER_XY);
            assert!((record.position[1] - 0.5).abs() <= POSITION_JITTER_XY);
            assert!(record.position[2].abs() <= POSITION_JITTER_Z);
            for axis in record.velocity {
                assert!(axis.abs() <= VELOCITY_JITTER);
            }
            assert_eq!(record.age, 0.0);
        }
    }

    #[test]
    fn test_planar_spawn_never_invents_depth() {
        let origin = SpawnOrigin {
            position: [0.0, 0.0, 0.0],
            velocity: [1.0, -1.0, 0.0],
        };
        let mut rng = rand::thread_rng();
        for _ in 0..20 {
            let record = spawn_record(&origin, RecordLayout::PosVel2, &mut rng);
            assert_eq!(record.position[2], 0.0);
            assert_eq!(record.velocity[2], 0.0);
        }
    }
}
