use crate::{put_padded_str, take_padded_str, CodecError, OpCode, ID, PORT};

/// ArtPollReply is a fixed 239 byte frame.
///
/// Unlike the other packets it carries no protocol version; the IP address
/// follows the opcode directly.
pub const ART_POLL_REPLY_LEN: usize = 239;

const IP: usize = 10;
const UDP_PORT: usize = 14;
const FIRMWARE_VERSION: usize = 16;
const NET_SWITCH: usize = 18;
const SUB_SWITCH: usize = 19;
const STATUS: usize = 23;
const SHORT_NAME: usize = 26;
const LONG_NAME: usize = 44;
const NODE_REPORT: usize = 108;
const NUM_PORTS: usize = 172;
const SW_IN: usize = 186;
const SW_OUT: usize = 190;
const STYLE: usize = 200;
const MAC: usize = 201;
const BIND_IP: usize = 207;

/// A node's answer to ArtPoll, the input to the discovery registry.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ArtPollReply {
    pub ip: [u8; 4],
    /// Always 6454 in practice, transmitted little-endian
    pub port: u16,
    pub firmware_version: u16,
    /// Bits 14..8 of the port address this node serves
    pub net_switch: u8,
    /// Bits 7..4 of the port address this node serves
    pub sub_switch: u8,
    pub status: u8,
    pub short_name: heapless::String<17>,
    pub long_name: heapless::String<63>,
    pub node_report: heapless::String<63>,
    /// Number of input/output ports, 0..=4
    pub num_ports: u16,
    pub sw_in: [u8; 4],
    /// Low nibble of the port address for each output port
    pub sw_out: [u8; 4],
    pub style: u8,
    pub mac: [u8; 6],
    pub bind_ip: [u8; 4],
}

impl Default for ArtPollReply {
    fn default() -> Self {
        Self {
            ip: [0; 4],
            port: PORT,
            firmware_version: 0,
            net_switch: 0,
            sub_switch: 0,
            status: 0,
            short_name: heapless::String::new(),
            long_name: heapless::String::new(),
            node_report: heapless::String::new(),
            num_ports: 0,
            sw_in: [0; 4],
            sw_out: [0; 4],
            style: 0,
            mac: [0; 6],
            bind_ip: [0; 4],
        }
    }
}

impl ArtPollReply {
    pub fn encode(&self, out: &mut [u8]) -> Result<usize, CodecError> {
        if out.len() < ART_POLL_REPLY_LEN {
            return Err(CodecError::BufferSize);
        }
        let out = &mut out[..ART_POLL_REPLY_LEN];
        out.fill(0);

        out[..8].copy_from_slice(ID);
        out[8..10].copy_from_slice(&(OpCode::PollReply as u16).to_le_bytes());
        out[IP..IP + 4].copy_from_slice(&self.ip);
        out[UDP_PORT..UDP_PORT + 2].copy_from_slice(&self.port.to_le_bytes());
        out[FIRMWARE_VERSION..FIRMWARE_VERSION + 2]
            .copy_from_slice(&self.firmware_version.to_be_bytes());
        out[NET_SWITCH] = self.net_switch;
        out[SUB_SWITCH] = self.sub_switch;
        out[STATUS] = self.status;
        put_padded_str::<18>(&mut out[SHORT_NAME..SHORT_NAME + 18], &self.short_name);
        put_padded_str::<64>(&mut out[LONG_NAME..LONG_NAME + 64], &self.long_name);
        put_padded_str::<64>(&mut out[NODE_REPORT..NODE_REPORT + 64], &self.node_report);
        out[NUM_PORTS..NUM_PORTS + 2].copy_from_slice(&self.num_ports.to_be_bytes());
        out[SW_IN..SW_IN + 4].copy_from_slice(&self.sw_in);
        out[SW_OUT..SW_OUT + 4].copy_from_slice(&self.sw_out);
        out[STYLE] = self.style;
        out[MAC..MAC + 6].copy_from_slice(&self.mac);
        out[BIND_IP..BIND_IP + 4].copy_from_slice(&self.bind_ip);

        Ok(ART_POLL_REPLY_LEN)
    }

    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < ART_POLL_REPLY_LEN {
            return None;
        }
        if &buf[..8] != ID {
            return None;
        }
        if u16::from_le_bytes([buf[8], buf[9]]) != OpCode::PollReply as u16 {
            return None;
        }

        let mut ip = [0u8; 4];
        ip.copy_from_slice(&buf[IP..IP + 4]);
        let mut sw_in = [0u8; 4];
        sw_in.copy_from_slice(&buf[SW_IN..SW_IN + 4]);
        let mut sw_out = [0u8; 4];
        sw_out.copy_from_slice(&buf[SW_OUT..SW_OUT + 4]);
        let mut mac = [0u8; 6];
        mac.copy_from_slice(&buf[MAC..MAC + 6]);
        let mut bind_ip = [0u8; 4];
        bind_ip.copy_from_slice(&buf[BIND_IP..BIND_IP + 4]);

        Some(ArtPollReply {
            ip,
            port: u16::from_le_bytes([buf[UDP_PORT], buf[UDP_PORT + 1]]),
            firmware_version: u16::from_be_bytes([
                buf[FIRMWARE_VERSION],
                buf[FIRMWARE_VERSION + 1],
            ]),
            net_switch: buf[NET_SWITCH],
            sub_switch: buf[SUB_SWITCH],
            status: buf[STATUS],
            short_name: take_padded_str(&buf[SHORT_NAME..SHORT_NAME + 18]),
            long_name: take_padded_str(&buf[LONG_NAME..LONG_NAME + 64]),
            node_report: take_padded_str(&buf[NODE_REPORT..NODE_REPORT + 64]),
            num_ports: u16::from_be_bytes([buf[NUM_PORTS], buf[NUM_PORTS + 1]]),
            sw_in,
            sw_out,
            style: buf[STYLE],
            mac,
            bind_ip,
        })
    }
}
