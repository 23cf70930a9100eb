//! Frame driver state machine.
//!
//! The driver owns the simulation between reinitializations and gates the
//! per-frame work behind an explicit play/pause state machine:
//!
//! ```text
//! Uninitialized -> Ready -> Running <-> Paused -> TornDown
//! ```
//!
//! The host scheduler (a window event loop, a display callback, or a test)
//! calls [`FrameDriver::tick_with`] once per frame; the closure runs only
//! while the driver is `Running`, which makes single-step testing
//! deterministic without a real display callback.

use super::FrameClock;

/// Lifecycle state of the frame driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// No simulation constructed yet.
    Uninitialized,
    /// Pipeline built and seeded; not ticking.
    Ready,
    /// Ticking on every host frame callback.
    Running,
    /// Ticking suspended; GPU resources retained.
    Paused,
    /// Simulation dropped; must be reinitialized before use.
    TornDown,
}

/// Owns a simulation and sequences its per-frame work.
///
/// Generic over the simulation type so the state machine can be exercised
/// without a GPU.
pub struct FrameDriver<S> {
    state: DriverState,
    sim: Option<S>,
    clock: FrameClock,
    ticks: u64,
}

impl<S> Default for FrameDriver<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> FrameDriver<S> {
    /// Create an uninitialized driver.
    pub fn new() -> Self {
        Self {
            state: DriverState::Uninitialized,
            sim: None,
            clock: FrameClock::new(),
            ticks: 0,
        }
    }

    /// Install a freshly constructed simulation and enter `Ready`.
    ///
    /// Any previous simulation is dropped first, releasing its GPU
    /// resources; stale textures of mismatched dimensions never survive a
    /// parameter change.
    pub fn ready(&mut self, sim: S) {
        self.sim = Some(sim);
        self.state = DriverState::Ready;
        tracing::debug!("frame driver ready");
    }

    /// Begin ticking. No-op unless `Ready` or `Paused`.
    pub fn play(&mut self) {
        if matches!(self.state, DriverState::Ready | DriverState::Paused) {
            self.clock.start();
            self.state = DriverState::Running;
        }
    }

    /// Suspend ticking without touching GPU resources.
    ///
    /// After this returns no further tick closure will run until
    /// [`play`](Self::play); a frame already submitted to the GPU queue
    /// still completes.
    pub fn pause(&mut self) {
        if self.state == DriverState::Running {
            self.clock.stop();
            self.state = DriverState::Paused;
        }
    }

    /// Run one frame if the driver is `Running`.
    ///
    /// The closure receives the simulation and the delta time in seconds
    /// and is expected to execute physics, copy, and render in that fixed
    /// order. Returns `Ok(true)` when a frame ran.
    pub fn tick_with<E>(
        &mut self,
        frame: impl FnOnce(&mut S, f32) -> Result<(), E>,
    ) -> Result<bool, E> {
        if self.state != DriverState::Running {
            return Ok(false);
        }
        let dt = self.clock.get_delta() as f32;
        let sim = self
            .sim
            .as_mut()
            .expect("running driver always holds a simulation");
        frame(sim, dt)?;
        self.ticks += 1;
        Ok(true)
    }

    /// Drop the simulation and enter `TornDown`.
    pub fn teardown(&mut self) {
        self.sim = None;
        self.clock.stop();
        self.state = DriverState::TornDown;
        tracing::debug!(ticks = self.ticks, "frame driver torn down");
    }

    /// Full teardown followed by installation of a rebuilt simulation.
    pub fn reinit(&mut self, sim: S) {
        self.teardown();
        self.ready(sim);
    }

    /// Current lifecycle state.
    #[inline]
    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Number of frames executed so far.
    #[inline]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Access the simulation, if one is installed.
    #[inline]
    pub fn sim(&self) -> Option<&S> {
        self.sim.as_ref()
    }

    /// Mutable access to the simulation, if one is installed.
    #[inline]
    pub fn sim_mut(&mut self) -> Option<&mut S> {
        self.sim.as_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    #[derive(Default)]
    struct CountingSim {
        steps: u32,
    }

    fn init_logs() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn run_frame(driver: &mut FrameDriver<CountingSim>) -> bool {
        driver
            .tick_with(|sim, _dt| -> Result<(), Infallible> {
                sim.steps += 1;
                Ok(())
            })
            .unwrap()
    }

    #[test]
    fn test_starts_uninitialized() {
        let driver = FrameDriver::<CountingSim>::new();
        assert_eq!(driver.state(), DriverState::Uninitialized);
        assert!(driver.sim().is_none());
    }

    #[test]
    fn test_no_ticks_before_play() {
        let mut driver = FrameDriver::new();
        driver.ready(CountingSim::default());
        assert!(!run_frame(&mut driver));
        assert_eq!(driver.sim().unwrap().steps, 0);
    }

    #[test]
    fn test_play_enables_ticking() {
        let mut driver = FrameDriver::new();
        driver.ready(CountingSim::default());
        driver.play();
        assert!(run_frame(&mut driver));
        assert!(run_frame(&mut driver));
        assert_eq!(driver.sim().unwrap().steps, 2);
        assert_eq!(driver.ticks(), 2);
    }

    #[test]
    fn test_pause_suppresses_frames_until_play() {
        let mut driver = FrameDriver::new();
        driver.ready(CountingSim::default());
        driver.play();
        assert!(run_frame(&mut driver));

        driver.pause();
        assert_eq!(driver.state(), DriverState::Paused);
        // Two host callbacks elapse while paused; neither reaches the sim.
        assert!(!run_frame(&mut driver));
        assert!(!run_frame(&mut driver));
        assert_eq!(driver.sim().unwrap().steps, 1);

        driver.play();
        assert!(run_frame(&mut driver));
        assert_eq!(driver.sim().unwrap().steps, 2);
    }

    #[test]
    fn test_play_requires_ready() {
        let mut driver = FrameDriver::<CountingSim>::new();
        driver.play();
        assert_eq!(driver.state(), DriverState::Uninitialized);
    }

    #[test]
    fn test_teardown_drops_simulation() {
        init_logs();
        let mut driver = FrameDriver::new();
        driver.ready(CountingSim::default());
        driver.play();
        driver.teardown();
        assert_eq!(driver.state(), DriverState::TornDown);
        assert!(driver.sim().is_none());
        assert!(!run_frame(&mut driver));
    }

    #[test]
    fn test_reinit_returns_to_ready() {
        let mut driver = FrameDriver::new();
        driver.ready(CountingSim::default());
        driver.play();
        assert!(run_frame(&mut driver));

        driver.reinit(CountingSim::default());
        assert_eq!(driver.state(), DriverState::Ready);
        assert_eq!(driver.sim().unwrap().steps, 0);
    }
}
