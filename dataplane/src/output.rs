use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use core::sync::atomic::{AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::{Mutex, MutexGuard};
use embassy_time::{Duration, Instant, Timer};

use crate::dmx_transport::DmxTransport;
use crate::UniverseFrame;

pub const DEFAULT_FRAME_RATE_HZ: u8 = 40;
pub const MIN_FRAME_RATE_HZ: u8 = 1;
pub const MAX_FRAME_RATE_HZ: u8 = 44;

type FrameMap = BTreeMap<u16, UniverseFrame>;

/// The paced DMX sender.
///
/// Publishers atomically replace the "latest frame" map; the output loop
/// reads whatever is current each tick and pushes one packet per universe
/// through the transport. A failed send only bumps the skip counter; the
/// next tick sends the next frame.
pub struct DmxOutputService<T: DmxTransport> {
    transport: Mutex<CriticalSectionRawMutex, T>,
    latest: Mutex<CriticalSectionRawMutex, Arc<FrameMap>>,
    frame_rate_hz: u8,
    skipped: AtomicU32,
}

impl<T: DmxTransport> DmxOutputService<T> {
    pub fn new(transport: T) -> Self {
        Self::with_frame_rate(transport, DEFAULT_FRAME_RATE_HZ)
    }

    pub fn with_frame_rate(transport: T, frame_rate_hz: u8) -> Self {
        Self {
            transport: Mutex::new(transport),
            latest: Mutex::new(Arc::new(BTreeMap::new())),
            frame_rate_hz: frame_rate_hz.clamp(MIN_FRAME_RATE_HZ, MAX_FRAME_RATE_HZ),
            skipped: AtomicU32::new(0),
        }
    }

    pub fn frame_rate_hz(&self) -> u8 {
        self.frame_rate_hz
    }

    /// Frames the loop could not deliver.
    pub fn skipped_frames(&self) -> u32 {
        self.skipped.load(Ordering::Relaxed)
    }

    /// Publish a whole new universe map. Successive calls are totally
    /// ordered; the loop sends frames in publication order.
    pub async fn update_frame(&self, frames: FrameMap) {
        *self.latest.lock().await = Arc::new(frames);
    }

    /// Copy the current map, replace one universe, publish.
    pub async fn update_universe(&self, universe: u16, frame: UniverseFrame) {
        let mut latest = self.latest.lock().await;
        let mut copy: FrameMap = (**latest).clone();
        copy.insert(universe, frame);
        *latest = Arc::new(copy);
    }

    pub async fn latest_frames(&self) -> Arc<FrameMap> {
        self.latest.lock().await.clone()
    }

    /// Control-plane access to the transport (mode switches, start/stop).
    /// Held locks stall the output loop, so keep them short.
    pub async fn transport(&self) -> MutexGuard<'_, CriticalSectionRawMutex, T> {
        self.transport.lock().await
    }

    pub async fn start(&self) {
        self.transport.lock().await.start().await;
    }

    pub async fn stop(&self) {
        self.transport.lock().await.stop().await;
    }

    /// The output loop: read the current frames, send one packet per
    /// universe, sleep whatever remains of the tick.
    pub async fn run(&self) -> ! {
        let interval = Duration::from_hz(self.frame_rate_hz as u64);
        info!("dmx output running at {} Hz", self.frame_rate_hz);

        loop {
            let started = Instant::now();

            let frames = self.latest.lock().await.clone();
            {
                let mut transport = self.transport.lock().await;
                for (universe, frame) in frames.iter() {
                    if transport.send_universe(*universe, frame).await.is_err() {
                        self.skipped.fetch_add(1, Ordering::Relaxed);
                        warn!("frame send failed for universe {}", *universe);
                    }
                }
            }

            let elapsed = started.elapsed();
            let rest = if elapsed < interval {
                interval - elapsed
            } else {
                Duration::from_ticks(0)
            };
            Timer::after(rest).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dmx_transport::{Protocol, SimulatedTransport, UdpDmxTransport};
    use crate::mocks::MockUdp;
    use crate::router::{RouterMode, TransportRouter};
    use crate::DMX_CHANNELS;

    fn frame(fill: u8) -> UniverseFrame {
        [fill; DMX_CHANNELS]
    }

    #[tokio::test]
    async fn update_universe_copies_and_publishes() {
        let service = DmxOutputService::new(SimulatedTransport::new());

        service.update_universe(0, frame(1)).await;
        service.update_universe(1, frame(2)).await;

        let latest = service.latest_frames().await;
        assert_eq!(2, latest.len());
        assert_eq!(1, latest[&0][0]);
        assert_eq!(2, latest[&1][0]);
    }

    #[tokio::test]
    async fn frame_rate_is_clamped() {
        let service = DmxOutputService::with_frame_rate(SimulatedTransport::new(), 200);
        assert_eq!(MAX_FRAME_RATE_HZ, service.frame_rate_hz());
        let service = DmxOutputService::with_frame_rate(SimulatedTransport::new(), 0);
        assert_eq!(MIN_FRAME_RATE_HZ, service.frame_rate_hz());
    }

    #[tokio::test]
    async fn mixed_mode_tick_sends_to_wire_and_simulator() {
        // Given a MIXED router over a mock socket and the simulator
        let real = UdpDmxTransport::new(MockUdp::new(), Protocol::ArtNet, [0; 16]);
        let router = TransportRouter::new(real, SimulatedTransport::new(), RouterMode::Mixed);
        let service = DmxOutputService::new(router);
        service.start().await;

        // When one universe is published and the loop runs for one interval
        service.update_frame(BTreeMap::from([(0u16, frame(0))])).await;
        let _ = tokio::time::timeout(std::time::Duration::from_millis(20), service.run()).await;

        // Then exactly one UDP datagram and one simulated frame went out
        // per tick
        let transport = service.transport().await;
        let udp_sends = transport.real().udp.sent.len() as u32;
        let sim_sends = transport.simulated().send_count();
        assert!(udp_sends >= 1);
        assert_eq!(udp_sends, sim_sends);
    }

    #[tokio::test]
    async fn send_failure_counts_skip_and_loop_continues() {
        let mut udp = MockUdp::new();
        udp.fail_sends = true;
        let real = UdpDmxTransport::new(udp, Protocol::ArtNet, [0; 16]);
        let service = DmxOutputService::new(real);
        service.start().await;

        service.update_frame(BTreeMap::from([(0u16, frame(0))])).await;
        let _ = tokio::time::timeout(std::time::Duration::from_millis(60), service.run()).await;

        assert!(service.skipped_frames() >= 2, "loop stopped after a failure");
    }

    #[tokio::test]
    async fn empty_map_sends_nothing() {
        let service = DmxOutputService::new(SimulatedTransport::new());
        service.start().await;

        let _ = tokio::time::timeout(std::time::Duration::from_millis(20), service.run()).await;

        assert_eq!(0, service.transport().await.send_count());
    }
}
