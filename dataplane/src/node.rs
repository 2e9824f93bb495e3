use core::net::Ipv4Addr;

use artnet_codec::ArtPollReply;
use embassy_time::{Duration, Instant};

/// Registry key: a node's MAC plus its first output universe. One physical
/// device with several bound outputs shows up once per binding.
pub type NodeKey = ([u8; 6], u16);

/// A discovered Art-Net node.
#[derive(Debug, Clone, PartialEq)]
pub struct DmxNode {
    pub ip: Ipv4Addr,
    pub mac: [u8; 6],
    pub short_name: heapless::String<17>,
    pub long_name: heapless::String<63>,
    pub firmware_version: u16,
    pub num_ports: u16,
    /// Port addresses served by this node's output ports
    pub universes: heapless::Vec<u16, 4>,
    pub style: u8,
    pub first_seen: Instant,
    pub last_seen: Instant,
    /// Poll-to-reply delay measured at the last refresh
    pub latency: Option<Duration>,
}

impl DmxNode {
    /// Materialize a node from a poll reply received at `now`.
    ///
    /// The port address of output port `i` is Net | Sub-Net | SwOut\[i\],
    /// reassembled from the reply's switch fields.
    pub fn from_reply(reply: &ArtPollReply, now: Instant) -> Self {
        let mut universes = heapless::Vec::new();
        let ports = usize::min(reply.num_ports as usize, 4);
        for i in 0..ports {
            let universe = ((reply.net_switch as u16 & 0x7f) << 8)
                | ((reply.sub_switch as u16 & 0x0f) << 4)
                | (reply.sw_out[i] as u16 & 0x0f);
            universes.push(universe).ok();
        }

        Self {
            ip: Ipv4Addr::new(reply.ip[0], reply.ip[1], reply.ip[2], reply.ip[3]),
            mac: reply.mac,
            short_name: reply.short_name.clone(),
            long_name: reply.long_name.clone(),
            firmware_version: reply.firmware_version,
            num_ports: reply.num_ports,
            universes,
            style: reply.style,
            first_seen: now,
            last_seen: now,
            latency: None,
        }
    }

    pub fn key(&self) -> NodeKey {
        (self.mac, self.universes.first().copied().unwrap_or(0))
    }

    pub fn is_alive(&self, now: Instant, timeout: Duration) -> bool {
        now.checked_duration_since(self.last_seen)
            .map_or(true, |age| age <= timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply() -> ArtPollReply {
        ArtPollReply {
            ip: [10, 0, 0, 7],
            firmware_version: 0x0100,
            net_switch: 0x01,
            sub_switch: 0x02,
            short_name: heapless::String::try_from("node").unwrap(),
            num_ports: 2,
            sw_out: [0x05, 0x06, 0, 0],
            mac: [1, 2, 3, 4, 5, 6],
            ..ArtPollReply::default()
        }
    }

    fn at_ms(ms: u64) -> Instant {
        Instant::from_micros(ms * 1000)
    }

    #[test]
    fn universes_reassemble_from_switch_fields() {
        let node = DmxNode::from_reply(&reply(), at_ms(0));
        // 0x01 net, 0x2 sub-net, 0x5/0x6 out ports
        assert_eq!(&[0x0125, 0x0126][..], &node.universes[..]);
        assert_eq!(([1, 2, 3, 4, 5, 6], 0x0125), node.key());
    }

    #[test]
    fn num_ports_is_capped_at_four() {
        let mut r = reply();
        r.num_ports = 9;
        let node = DmxNode::from_reply(&r, at_ms(0));
        assert_eq!(4, node.universes.len());
    }

    #[test]
    fn alive_until_timeout() {
        let node = DmxNode::from_reply(&reply(), at_ms(1000));
        let timeout = Duration::from_millis(500);
        assert!(node.is_alive(at_ms(1500), timeout));
        assert!(!node.is_alive(at_ms(1501), timeout));
    }
}
