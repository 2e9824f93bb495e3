use embassy_time::{Duration, Instant};

use super::tap::TapTempo;
use super::{frac, BeatState, SyncSource};

pub const DEFAULT_BPM: f32 = 120.0;
pub const MIN_BPM: f32 = 20.0;
pub const MAX_BPM: f32 = 300.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockState {
    Stopped,
    Running,
}

/// The tap-driven beat clock.
///
/// Stores a phase origin instant; every reading recomputes the phases from
/// the elapsed time since that origin, so error never accumulates. Tapping
/// both refines the bpm estimate and moves the origin, aligning the downbeat
/// with the tap.
#[derive(Debug)]
pub struct BeatClock {
    state: ClockState,
    bpm: f32,
    taps: TapTempo,
    phase_origin: Instant,
    started_at: Instant,
    accumulated: Duration,
    frozen_beat_phase: f32,
    frozen_bar_phase: f32,
    sync_source: SyncSource,
}

impl Default for BeatClock {
    fn default() -> Self {
        Self::new()
    }
}

impl BeatClock {
    pub fn new() -> Self {
        Self {
            state: ClockState::Stopped,
            bpm: DEFAULT_BPM,
            taps: TapTempo::new(),
            phase_origin: Instant::MIN,
            started_at: Instant::MIN,
            accumulated: Duration::from_ticks(0),
            frozen_beat_phase: 0.0,
            frozen_bar_phase: 0.0,
            sync_source: SyncSource::None,
        }
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn bpm(&self) -> f32 {
        self.bpm
    }

    pub fn set_bpm(&mut self, bpm: f32) {
        self.bpm = bpm.clamp(MIN_BPM, MAX_BPM);
    }

    pub fn start(&mut self, now: Instant) {
        if self.state == ClockState::Stopped {
            self.state = ClockState::Running;
            self.started_at = now;
            self.phase_origin = now;
        }
    }

    /// Stop the clock, accumulating elapsed time and freezing the phases at
    /// their last computed values.
    pub fn stop(&mut self, now: Instant) {
        if self.state == ClockState::Running {
            let state = self.beat_state(now);
            self.frozen_beat_phase = state.beat_phase;
            self.frozen_bar_phase = state.bar_phase;
            self.accumulated += since(now, self.started_at);
            self.state = ClockState::Stopped;
        }
    }

    /// Clear the tap history, restore the default bpm and stop.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Record a tempo tap. The downbeat realigns to the tap instant.
    pub fn tap(&mut self, now: Instant) {
        if let Some(bpm) = self.taps.tap(now) {
            self.bpm = bpm;
        }
        self.phase_origin = now;
        self.sync_source = SyncSource::Tap;
        debug!("tap: bpm={}", self.bpm);
    }

    pub fn beat_state(&self, now: Instant) -> BeatState {
        match self.state {
            ClockState::Stopped => BeatState {
                bpm: self.bpm,
                beat_phase: self.frozen_beat_phase,
                bar_phase: self.frozen_bar_phase,
                elapsed_seconds: self.accumulated.as_micros() as f64 / 1e6,
                sync_source: self.sync_source,
            },
            ClockState::Running => {
                let since_origin = since(now, self.phase_origin).as_micros() as f64 / 1e6;
                let beats = since_origin * self.bpm as f64 / 60.0;
                let elapsed = self.accumulated.as_micros() as f64 / 1e6
                    + since(now, self.started_at).as_micros() as f64 / 1e6;
                BeatState {
                    bpm: self.bpm,
                    beat_phase: frac(beats),
                    bar_phase: frac(beats / 4.0),
                    elapsed_seconds: elapsed,
                    sync_source: self.sync_source,
                }
            }
        }
    }
}

/// `now - earlier`, clamped to zero for non-monotonic callers.
fn since(now: Instant, earlier: Instant) -> Duration {
    now.checked_duration_since(earlier)
        .unwrap_or(Duration::from_ticks(0))
}
