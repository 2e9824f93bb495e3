//! Drift-free beat and bar phase tracking.
//!
//! Phases are always computed from elapsed time against a stored origin,
//! never accumulated, so the worst case error is one polling interval
//! regardless of how long the clock runs.

mod clock;
mod link;
mod tap;

pub use clock::{BeatClock, ClockState, DEFAULT_BPM, MAX_BPM, MIN_BPM};
pub use link::{CompositeClock, LinkSession, NO_LINK_TIMEOUT};
pub use tap::{TapTempo, MAX_TAP_HISTORY, TAP_RESET_GAP};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_sync::watch::Watch;
use embassy_time::{Duration, Instant, Timer};

/// Where the clock's timing currently comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SyncSource {
    #[default]
    None,
    Tap,
    Mesh,
}

/// A snapshot of the clock, as read by effects.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BeatState {
    pub bpm: f32,
    /// Fractional position within the current beat, `0.0..1.0`
    pub beat_phase: f32,
    /// Fractional position within the current 4-beat bar, `0.0..1.0`
    pub bar_phase: f32,
    pub elapsed_seconds: f64,
    pub sync_source: SyncSource,
}

impl BeatState {
    pub const IDLE: BeatState = BeatState {
        bpm: DEFAULT_BPM,
        beat_phase: 0.0,
        bar_phase: 0.0,
        elapsed_seconds: 0.0,
        sync_source: SyncSource::None,
    };

    /// Total beats elapsed since the clock started.
    pub fn beats(&self) -> f32 {
        (self.elapsed_seconds * self.bpm as f64 / 60.0) as f32
    }

    /// The state as seen through a tempo multiplier: effective beats scale by
    /// `multiplier`, phases are recomputed from elapsed time.
    pub fn with_multiplier(&self, multiplier: f32) -> BeatState {
        if multiplier == 1.0 {
            return *self;
        }
        let bpm = (self.bpm * multiplier).clamp(MIN_BPM, MAX_BPM);
        let beats = self.elapsed_seconds * bpm as f64 / 60.0;
        BeatState {
            bpm,
            beat_phase: frac(beats),
            bar_phase: frac(beats / 4.0),
            elapsed_seconds: self.elapsed_seconds,
            sync_source: self.sync_source,
        }
    }
}

impl Default for BeatState {
    fn default() -> Self {
        Self::IDLE
    }
}

/// Fractional part of a non-negative value, as an `f32` in `0.0..1.0`.
pub(crate) fn frac(value: f64) -> f32 {
    (value - value as u64 as f64) as f32
}

/// How often the clock worker refreshes the observable state.
pub const UPDATE_INTERVAL: Duration = Duration::from_millis(16);

/// Consumer slots on the beat watch: engine, pipeline, UI, one spare.
pub const BEAT_WATCH_CONSUMERS: usize = 4;

pub type BeatWatch = Watch<CriticalSectionRawMutex, BeatState, BEAT_WATCH_CONSUMERS>;

/// Publish the composite clock onto `watch` every `interval`.
///
/// The clock lives behind a mutex so the control plane can tap, start and
/// stop it while the worker runs.
pub async fn run_clock<L: LinkSession>(
    clock: &Mutex<CriticalSectionRawMutex, CompositeClock<L>>,
    watch: &BeatWatch,
    interval: Duration,
) -> ! {
    let sender = watch.sender();
    loop {
        let state = clock.lock().await.beat_state(Instant::now());
        sender.send(state);
        Timer::after(interval).await;
    }
}
