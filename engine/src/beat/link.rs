use embassy_time::{Duration, Instant};

use super::clock::BeatClock;
use super::{BeatState, SyncSource};

/// A tempo-sharing mesh session (Ableton Link style).
///
/// The composite clock polls this; when peers are present the session's
/// bpm and phases override the local tap clock.
pub trait LinkSession {
    fn peer_count(&self) -> usize;
    fn bpm(&self) -> f32;
    /// Session beat phase, `0.0..1.0`
    fn beat_phase(&self) -> f32;
    /// Session bar phase, `0.0..1.0`
    fn bar_phase(&self) -> f32;
    /// Propose a tempo to the session.
    fn request_bpm(&mut self, bpm: f32);
}

/// How long to keep reporting the mesh tempo after the last peer leaves
/// before falling back to tap.
pub const NO_LINK_TIMEOUT: Duration = Duration::from_secs(5);

/// Selects between the mesh session and the tap clock.
///
/// Mesh wins whenever peers are present. After the last peer disappears the
/// session values are held through a grace window so a brief dropout does
/// not glitch the exported state, then the tap clock takes over.
pub struct CompositeClock<L: LinkSession> {
    tap: BeatClock,
    link: L,
    last_peer_seen: Option<Instant>,
    no_link_timeout: Duration,
}

impl<L: LinkSession> CompositeClock<L> {
    pub fn new(tap: BeatClock, link: L) -> Self {
        Self {
            tap,
            link,
            last_peer_seen: None,
            no_link_timeout: NO_LINK_TIMEOUT,
        }
    }

    pub fn with_no_link_timeout(mut self, timeout: Duration) -> Self {
        self.no_link_timeout = timeout;
        self
    }

    /// The local tap clock, for tap/start/stop/reset control.
    pub fn tap_clock(&mut self) -> &mut BeatClock {
        &mut self.tap
    }

    pub fn request_bpm(&mut self, bpm: f32) {
        self.link.request_bpm(bpm);
    }

    pub fn beat_state(&mut self, now: Instant) -> BeatState {
        if self.link.peer_count() > 0 {
            if self.last_peer_seen.is_none() {
                info!("link session active, following mesh tempo");
            }
            self.last_peer_seen = Some(now);
            return self.mesh_state(now);
        }

        match self.last_peer_seen {
            Some(seen)
                if now
                    .checked_duration_since(seen)
                    .map_or(true, |gone| gone < self.no_link_timeout) =>
            {
                // Grace window: hold the session tempo
                self.mesh_state(now)
            }
            Some(_) => {
                info!("link session lost, falling back to tap clock");
                self.last_peer_seen = None;
                self.tap.beat_state(now)
            }
            None => self.tap.beat_state(now),
        }
    }

    fn mesh_state(&self, now: Instant) -> BeatState {
        BeatState {
            bpm: self.link.bpm(),
            beat_phase: self.link.beat_phase(),
            bar_phase: self.link.bar_phase(),
            elapsed_seconds: self.tap.beat_state(now).elapsed_seconds,
            sync_source: SyncSource::Mesh,
        }
    }
}
