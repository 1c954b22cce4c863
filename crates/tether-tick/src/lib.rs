//! Fixed-rate frame clock for Tether.
//!
//! A peer runs one dispatch tick and one physics-sync step per frame. The
//! [`FrameClock`] decides when the next frame is due, notices when the host
//! fell behind, and keeps timing stats for the work done inside a frame.
//!
//! ```ignore
//! let mut clock = FrameClock::new(ClockConfig::with_rate(60));
//! loop {
//!     let frame = clock.next_frame().await;
//!     scene.tick();
//!     bodies.fixed_update();
//!     bodies.step(frame.dt.as_secs_f32());
//!     bodies.send_updates();
//!     clock.end_frame();
//! }
//! ```
//!
//! All timing uses `tokio::time`, so tests can run on a paused clock.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What to do after a frame started late.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClockPolicy {
    /// Forget the missed frames and schedule from now.
    #[default]
    Skip,
    /// Keep the original cadence, running missed frames back to back, but
    /// never more than `max_catchup` of them.
    CatchUp { max_catchup: u32 },
}

/// Frame clock settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Frames per second.
    pub rate_hz: u32,
    /// Late-frame handling.
    pub policy: ClockPolicy,
    /// Fraction of the frame period (0.0–1.0) the work inside a frame may
    /// use before a warning is logged.
    pub budget_warn_threshold: f64,
    /// Upper bound of a random delay (µs) added before the first frame.
    pub initial_jitter_us: u64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            rate_hz: 60,
            policy: ClockPolicy::Skip,
            budget_warn_threshold: 0.8,
            initial_jitter_us: 0,
        }
    }
}

impl ClockConfig {
    pub const MIN_RATE_HZ: u32 = 1;
    pub const MAX_RATE_HZ: u32 = 240;

    pub fn with_rate(rate_hz: u32) -> Self {
        Self {
            rate_hz,
            ..Self::default()
        }
    }

    /// Clamps out-of-range values. [`FrameClock::new`] calls this.
    pub fn validated(mut self) -> Self {
        let clamped = self.rate_hz.clamp(Self::MIN_RATE_HZ, Self::MAX_RATE_HZ);
        if clamped != self.rate_hz {
            warn!(rate = self.rate_hz, clamped, "frame rate out of range; clamping");
            self.rate_hz = clamped;
        }
        self.budget_warn_threshold = self.budget_warn_threshold.clamp(0.0, 1.0);
        self
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.rate_hz.max(Self::MIN_RATE_HZ)))
    }
}

// ---------------------------------------------------------------------------
// Frame info and stats
// ---------------------------------------------------------------------------

/// One frame handed out by [`FrameClock::next_frame`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    /// Frame number, starting at 1.
    pub index: u64,
    /// Fixed step for this frame, always the clock period.
    pub dt: Duration,
    /// The frame started more than a tenth of a period after its deadline.
    pub late: bool,
    /// Frames given up on because of this delay.
    pub frames_dropped: u64,
}

/// Running totals kept by the clock.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameStats {
    pub frames: u64,
    pub late_frames: u64,
    pub dropped_frames: u64,
    /// Work time of the most recent frame.
    pub last_work: Duration,
    /// Longest work time seen.
    pub max_work: Duration,
    /// `last_work` as a fraction of the period.
    pub budget_utilization: f64,
}

// ---------------------------------------------------------------------------
// FrameClock
// ---------------------------------------------------------------------------

/// Hands out frames at a fixed rate.
pub struct FrameClock {
    config: ClockConfig,
    period: Duration,
    next: Instant,
    work_started: Option<Instant>,
    stats: FrameStats,
}

impl FrameClock {
    pub fn new(config: ClockConfig) -> Self {
        let config = config.validated();
        let period = config.period();
        let jitter = if config.initial_jitter_us > 0 {
            Duration::from_micros(rand::rng().random_range(0..config.initial_jitter_us))
        } else {
            Duration::ZERO
        };
        debug!(
            rate_hz = config.rate_hz,
            period_ms = period.as_secs_f64() * 1000.0,
            policy = ?config.policy,
            "frame clock created"
        );
        Self {
            next: Instant::now() + period + jitter,
            config,
            period,
            work_started: None,
            stats: FrameStats::default(),
        }
    }

    pub fn with_rate(rate_hz: u32) -> Self {
        Self::new(ClockConfig::with_rate(rate_hz))
    }

    /// Waits for the next frame deadline.
    pub async fn next_frame(&mut self) -> Frame {
        let deadline = self.next;
        time::sleep_until(deadline).await;

        let now = Instant::now();
        let late_by = now.saturating_duration_since(deadline);
        let late = late_by > self.period / 10;
        let behind = (late_by.as_nanos() / self.period.as_nanos()) as u64;

        let (next, frames_dropped) = match self.config.policy {
            ClockPolicy::Skip => (now + self.period, if late { behind } else { 0 }),
            ClockPolicy::CatchUp { max_catchup } if behind <= u64::from(max_catchup) => {
                (deadline + self.period, 0)
            }
            ClockPolicy::CatchUp { max_catchup } => {
                (now + self.period, behind - u64::from(max_catchup))
            }
        };
        self.next = next;

        self.stats.frames += 1;
        if late {
            self.stats.late_frames += 1;
            warn!(
                frame = self.stats.frames,
                late_ms = late_by.as_secs_f64() * 1000.0,
                dropped = frames_dropped,
                "frame started late"
            );
        }
        self.stats.dropped_frames += frames_dropped;
        self.work_started = Some(now);
        trace!(frame = self.stats.frames, late, "frame");

        Frame {
            index: self.stats.frames,
            dt: self.period,
            late,
            frames_dropped,
        }
    }

    /// Marks the end of the work for the current frame.
    pub fn end_frame(&mut self) {
        let Some(started) = self.work_started.take() else {
            return;
        };
        let work = started.elapsed();
        let utilization = work.as_secs_f64() / self.period.as_secs_f64();

        self.stats.last_work = work;
        self.stats.max_work = self.stats.max_work.max(work);
        self.stats.budget_utilization = utilization;

        if utilization >= self.config.budget_warn_threshold {
            warn!(
                frame = self.stats.frames,
                work_ms = work.as_secs_f64() * 1000.0,
                budget_ms = self.period.as_secs_f64() * 1000.0,
                "frame work near or over budget"
            );
        }
    }

    /// Restarts the cadence one period from now, e.g. after the host was
    /// suspended.
    pub fn reset(&mut self) {
        self.next = Instant::now() + self.period;
        self.work_started = None;
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn config(&self) -> &ClockConfig {
        &self.config
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }
}
