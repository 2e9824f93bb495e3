use alloc::collections::BTreeMap;
use core::net::{SocketAddr, SocketAddrV4};

use artnet_codec::{ArtDmx, ART_DMX_MAX_LEN};
use embassy_time::Instant;
use sacn_codec::{DataPacket, DATA_PACKET_MAX_LEN};

use crate::node::DmxNode;
use crate::registry::NodeRegistry;
use crate::transport::{ConnectionState, UdpTransport, ARTNET_BROADCAST};
use crate::UniverseFrame;

/// Channels per universe.
pub const DMX_CHANNELS: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Protocol {
    ArtNet,
    Sacn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    /// The universe cannot be represented on the wire
    Encode,
    /// The datagram send failed
    Io,
    /// The transport is not started
    NotStarted,
}

/// A sink for per-universe DMX frames.
pub trait DmxTransport {
    async fn start(&mut self);
    async fn stop(&mut self);
    async fn send_universe(
        &mut self,
        universe: u16,
        frame: &UniverseFrame,
    ) -> Result<(), TransportError>;
    fn connection_state(&self) -> ConnectionState;
}

/// The real output path: one Art-Net or sACN packet per universe over UDP.
///
/// Sequence counters are per protocol: Art-Net rolls 1..=255 (0 is reserved
/// for "no sequencing"), sACN wraps the full 0..=255 range.
pub struct UdpDmxTransport<U: UdpTransport> {
    pub udp: U,
    protocol: Protocol,
    state: ConnectionState,
    artnet_sequence: u8,
    sacn_sequence: u8,
    cid: [u8; 16],
    source_name: heapless::String<63>,
    priority: u8,
}

impl<U: UdpTransport> UdpDmxTransport<U> {
    pub fn new(udp: U, protocol: Protocol, cid: [u8; 16]) -> Self {
        Self {
            udp,
            protocol,
            state: ConnectionState::Disconnected,
            artnet_sequence: 0,
            sacn_sequence: 0,
            cid,
            source_name: heapless::String::try_from("ChromaDMX").unwrap_or_default(),
            priority: 100,
        }
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    fn next_artnet_sequence(&mut self) -> u8 {
        self.artnet_sequence = match self.artnet_sequence {
            255 => 1,
            n => n + 1,
        };
        self.artnet_sequence
    }

    fn next_sacn_sequence(&mut self) -> u8 {
        let current = self.sacn_sequence;
        self.sacn_sequence = self.sacn_sequence.wrapping_add(1);
        current
    }

    async fn send_artnet(
        &mut self,
        universe: u16,
        frame: &UniverseFrame,
    ) -> Result<(), TransportError> {
        let packet = ArtDmx {
            sequence: self.next_artnet_sequence(),
            physical: 0,
            universe,
            data: frame,
        };
        let mut buf = [0u8; ART_DMX_MAX_LEN];
        let len = packet.encode(&mut buf).map_err(|_| TransportError::Encode)?;
        self.udp
            .send_to(&buf[..len], ARTNET_BROADCAST)
            .await
            .map_err(|_| TransportError::Io)
    }

    async fn send_sacn(
        &mut self,
        universe: u16,
        frame: &UniverseFrame,
    ) -> Result<(), TransportError> {
        // Internal universe numbering is 0-based; E1.31 universes start at 1
        let wire_universe = universe.checked_add(1).ok_or(TransportError::Encode)?;
        let packet = DataPacket {
            cid: self.cid,
            source_name: self.source_name.clone(),
            priority: self.priority,
            sequence: self.next_sacn_sequence(),
            options: 0,
            universe: wire_universe,
            start_code: 0,
            data: frame,
        };
        let mut buf = [0u8; DATA_PACKET_MAX_LEN];
        let len = packet.encode(&mut buf).map_err(|_| TransportError::Encode)?;
        let remote = SocketAddr::V4(SocketAddrV4::new(
            sacn_codec::multicast_addr(wire_universe),
            sacn_codec::PORT,
        ));
        self.udp
            .send_to(&buf[..len], remote)
            .await
            .map_err(|_| TransportError::Io)
    }
}

impl<U: UdpTransport> DmxTransport for UdpDmxTransport<U> {
    async fn start(&mut self) {
        self.state = ConnectionState::Connecting;
        // The socket is bound by the embedder; from here on sends can flow
        self.state = ConnectionState::Connected;
        info!("udp dmx transport started");
    }

    async fn stop(&mut self) {
        self.state = ConnectionState::Disconnected;
        info!("udp dmx transport stopped");
    }

    async fn send_universe(
        &mut self,
        universe: u16,
        frame: &UniverseFrame,
    ) -> Result<(), TransportError> {
        if self.state != ConnectionState::Connected {
            return Err(TransportError::NotStarted);
        }
        let result = match self.protocol {
            Protocol::ArtNet => self.send_artnet(universe, frame).await,
            Protocol::Sacn => self.send_sacn(universe, frame).await,
        };
        if result == Err(TransportError::Io) {
            self.state = ConnectionState::Error;
        }
        result
    }

    fn connection_state(&self) -> ConnectionState {
        self.state
    }
}

/// The preview output path: swallows frames and records the latest one per
/// universe. While started it advertises one synthetic node so MIXED-mode
/// discovery has something to merge.
pub struct SimulatedTransport {
    state: ConnectionState,
    frames: BTreeMap<u16, UniverseFrame>,
    send_count: u32,
    registry: NodeRegistry,
}

impl Default for SimulatedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedTransport {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            frames: BTreeMap::new(),
            send_count: 0,
            registry: NodeRegistry::with_capacity(4),
        }
    }

    pub fn last_frame(&self, universe: u16) -> Option<&UniverseFrame> {
        self.frames.get(&universe)
    }

    pub fn send_count(&self) -> u32 {
        self.send_count
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    fn synthetic_node(now: Instant) -> DmxNode {
        let reply = artnet_codec::ArtPollReply {
            ip: [127, 0, 0, 1],
            short_name: heapless::String::try_from("Simulated").unwrap_or_default(),
            long_name: heapless::String::try_from("ChromaDMX Simulated Node").unwrap_or_default(),
            num_ports: 1,
            mac: [0x02, 0x00, 0x00, 0x51, 0x4d, 0x01],
            ..artnet_codec::ArtPollReply::default()
        };
        DmxNode::from_reply(&reply, now)
    }
}

impl DmxTransport for SimulatedTransport {
    async fn start(&mut self) {
        self.state = ConnectionState::Connected;
        self.registry.insert(Self::synthetic_node(Instant::now()));
        info!("simulated transport started");
    }

    async fn stop(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.registry.clear();
    }

    async fn send_universe(
        &mut self,
        universe: u16,
        frame: &UniverseFrame,
    ) -> Result<(), TransportError> {
        if self.state != ConnectionState::Connected {
            return Err(TransportError::NotStarted);
        }
        self.frames.insert(universe, *frame);
        self.send_count += 1;
        Ok(())
    }

    fn connection_state(&self) -> ConnectionState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MockUdp;

    fn frame(fill: u8) -> UniverseFrame {
        [fill; DMX_CHANNELS]
    }

    #[tokio::test]
    async fn artnet_send_is_decodable_and_broadcast() {
        let mut transport = UdpDmxTransport::new(MockUdp::new(), Protocol::ArtNet, [0; 16]);
        transport.start().await;

        transport.send_universe(0x0105, &frame(0x42)).await.unwrap();

        let (datagram, remote) = &transport.udp.sent[0];
        assert_eq!(ARTNET_BROADCAST, *remote);
        let decoded = ArtDmx::decode(datagram).unwrap();
        assert_eq!(0x0105, decoded.universe);
        assert_eq!(1, decoded.sequence);
        assert_eq!(512, decoded.data.len());
        assert_eq!(0x42, decoded.data[0]);
    }

    #[tokio::test]
    async fn artnet_sequence_rolls_skipping_zero() {
        let mut transport = UdpDmxTransport::new(MockUdp::new(), Protocol::ArtNet, [0; 16]);
        transport.start().await;

        let f = frame(0);
        for _ in 0..256 {
            transport.send_universe(0, &f).await.unwrap();
        }

        let sequences: alloc::vec::Vec<u8> = transport
            .udp
            .sent
            .iter()
            .map(|(d, _)| ArtDmx::decode(d).unwrap().sequence)
            .collect();
        assert_eq!(1, sequences[0]);
        assert_eq!(255, sequences[254]);
        // Wraps back to 1, never 0
        assert_eq!(1, sequences[255]);
        assert!(!sequences.contains(&0));
    }

    #[tokio::test]
    async fn sacn_send_goes_to_universe_multicast() {
        let mut transport = UdpDmxTransport::new(MockUdp::new(), Protocol::Sacn, [0x11; 16]);
        transport.start().await;

        transport.send_universe(0, &frame(0x10)).await.unwrap();

        let (datagram, remote) = &transport.udp.sent[0];
        // 0-based universe 0 is wire universe 1
        assert_eq!(
            "239.255.0.1:5568".parse::<SocketAddr>().unwrap(),
            *remote
        );
        let decoded = DataPacket::decode(datagram).unwrap();
        assert_eq!(1, decoded.universe);
        assert_eq!([0x11; 16], decoded.cid);
        assert_eq!(0, decoded.sequence);
    }

    #[tokio::test]
    async fn sacn_sequence_wraps_through_zero() {
        let mut transport = UdpDmxTransport::new(MockUdp::new(), Protocol::Sacn, [0; 16]);
        transport.start().await;

        let f = frame(0);
        for _ in 0..257 {
            transport.send_universe(0, &f).await.unwrap();
        }

        let first = DataPacket::decode(&transport.udp.sent[0].0).unwrap().sequence;
        let wrapped = DataPacket::decode(&transport.udp.sent[256].0).unwrap().sequence;
        assert_eq!(0, first);
        assert_eq!(0, wrapped);
    }

    #[tokio::test]
    async fn send_before_start_is_rejected() {
        let mut transport = UdpDmxTransport::new(MockUdp::new(), Protocol::ArtNet, [0; 16]);
        assert_eq!(
            Err(TransportError::NotStarted),
            transport.send_universe(0, &frame(0)).await
        );
    }

    #[tokio::test]
    async fn io_failure_degrades_connection_state() {
        let mut udp = MockUdp::new();
        udp.fail_sends = true;
        let mut transport = UdpDmxTransport::new(udp, Protocol::ArtNet, [0; 16]);
        transport.start().await;

        assert_eq!(
            Err(TransportError::Io),
            transport.send_universe(0, &frame(0)).await
        );
        assert_eq!(ConnectionState::Error, transport.connection_state());
    }

    #[tokio::test]
    async fn simulated_records_frames_and_advertises_a_node() {
        let mut sim = SimulatedTransport::new();
        sim.start().await;

        sim.send_universe(2, &frame(0x77)).await.unwrap();

        assert_eq!(1, sim.send_count());
        assert_eq!(0x77, sim.last_frame(2).unwrap()[511]);
        assert_eq!(1, sim.registry().len());

        sim.stop().await;
        assert!(sim.registry().is_empty());
    }
}
