use std::time::{Duration, Instant};

/// Frame timing snapshot.
#[derive(Debug, Copy, Clone)]
pub struct FrameTime {
    /// Time elapsed since the previous tick, in seconds.
    pub dt: f32,

    /// Monotonic timestamp taken at the tick.
    pub now: Instant,

    /// Monotonic frame counter.
    pub frame_index: u64,
}

/// Fixed-interval frame clock.
///
/// Produces `FrameTime` snapshots and tells the event loop when the next tick
/// is due. Delta time is clamped so a stalled or minimized window does not
/// make the quad jump on resume.
#[derive(Debug, Clone)]
pub struct FrameClock {
    last: Instant,
    interval: Duration,
    frame_index: u64,
    dt_min: Duration,
    dt_max: Duration,
}

impl FrameClock {
    /// Roughly 60 ticks per second.
    pub const DEFAULT_INTERVAL: Duration = Duration::from_micros(16_667);

    pub fn new(interval: Duration) -> Self {
        Self::starting_at(Instant::now(), interval)
    }

    /// Creates a clock whose baseline is `start`.
    pub fn starting_at(start: Instant, interval: Duration) -> Self {
        Self {
            last: start,
            interval: interval.max(Duration::from_millis(1)),
            frame_index: 0,
            dt_min: Duration::from_micros(100),
            dt_max: Duration::from_millis(250),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Resets the baseline, e.g. after the window was suspended.
    pub fn reset(&mut self) {
        self.reset_at(Instant::now());
    }

    pub fn reset_at(&mut self, now: Instant) {
        self.last = now;
    }

    /// When the next tick is due.
    pub fn next_tick(&self) -> Instant {
        self.last + self.interval
    }

    /// Whether `now` has reached the next tick.
    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.next_tick()
    }

    pub fn tick(&mut self) -> FrameTime {
        self.tick_at(Instant::now())
    }

    /// Advances the clock to `now` and returns the snapshot for that tick.
    pub fn tick_at(&mut self, now: Instant) -> FrameTime {
        let dt = now
            .saturating_duration_since(self.last)
            .clamp(self.dt_min, self.dt_max);

        self.last = now;

        let ft = FrameTime {
            dt: dt.as_secs_f32(),
            now,
            frame_index: self.frame_index,
        };
        self.frame_index = self.frame_index.wrapping_add(1);
        ft
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INTERVAL)
    }
}
