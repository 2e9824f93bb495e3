use embassy_time::{Duration, Instant};

use super::clock::{MAX_BPM, MIN_BPM};

/// Number of taps kept for the interval estimate.
pub const MAX_TAP_HISTORY: usize = 8;

/// A pause longer than this starts a fresh phrase.
pub const TAP_RESET_GAP: Duration = Duration::from_secs(3);

/// Tap tempo estimator.
///
/// Keeps a ring of recent tap timestamps and derives bpm from the median
/// inter-tap interval, with an outlier pass that discards intervals outside
/// half/double the first median. A stray early or late tap therefore barely
/// moves the estimate.
#[derive(Debug, Default)]
pub struct TapTempo {
    taps: heapless::Vec<Instant, MAX_TAP_HISTORY>,
}

impl TapTempo {
    pub const fn new() -> Self {
        Self {
            taps: heapless::Vec::new(),
        }
    }

    /// Record a tap at `now`. Returns the new bpm estimate once at least two
    /// taps are in the current phrase.
    pub fn tap(&mut self, now: Instant) -> Option<f32> {
        if let Some(&last) = self.taps.last() {
            let gap = now.checked_duration_since(last);
            if gap.map_or(false, |gap| gap > TAP_RESET_GAP) {
                self.taps.clear();
            }
        }
        if self.taps.is_full() {
            self.taps.remove(0);
        }
        // Capacity was just ensured
        self.taps.push(now).ok();
        self.bpm()
    }

    pub fn clear(&mut self) {
        self.taps.clear();
    }

    pub fn len(&self) -> usize {
        self.taps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.taps.is_empty()
    }

    /// The current estimate, or `None` with fewer than two taps.
    pub fn bpm(&self) -> Option<f32> {
        if self.taps.len() < 2 {
            return None;
        }

        let mut intervals: heapless::Vec<f32, { MAX_TAP_HISTORY - 1 }> = heapless::Vec::new();
        for pair in self.taps.windows(2) {
            let seconds = (pair[1] - pair[0]).as_micros() as f32 / 1e6;
            intervals.push(seconds).ok();
        }

        let rough = median(&mut intervals.clone());
        let mut filtered: heapless::Vec<f32, { MAX_TAP_HISTORY - 1 }> = intervals
            .iter()
            .copied()
            .filter(|&i| i >= 0.5 * rough && i <= 2.0 * rough)
            .collect();
        if filtered.is_empty() {
            return None;
        }

        let interval = median(&mut filtered);
        Some((60.0 / interval).clamp(MIN_BPM, MAX_BPM))
    }
}

fn median(values: &mut [f32]) -> f32 {
    values.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap());
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}
