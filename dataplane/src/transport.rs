use core::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use embassy_time::Duration;

/// Where discovery polls go: the limited broadcast address on the Art-Net
/// port.
pub const ARTNET_BROADCAST: SocketAddr =
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::BROADCAST, artnet_codec::PORT));

/// The seam to the platform's UDP socket.
///
/// Implementations must bind with broadcast and address reuse enabled.
/// `send_to` may suspend but never blocks the executor; `receive` resolves
/// with one datagram or `None` once the timeout elapses. `close` is
/// idempotent.
pub trait UdpTransport {
    type Error: core::fmt::Debug;

    async fn send_to(&mut self, data: &[u8], remote: SocketAddr) -> Result<(), Self::Error>;

    async fn receive(
        &mut self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<Option<(usize, SocketAddr)>, Self::Error>;

    fn close(&mut self);
}

/// Health of one output path, as collaborators observe it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}
