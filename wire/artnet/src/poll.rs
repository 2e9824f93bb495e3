use bitfield::bitfield;

use crate::{put_header, take_header, CodecError, OpCode};

/// ArtPoll is a fixed 14 byte frame.
pub const ART_POLL_LEN: usize = 14;

/// TalkToMe value the discovery loop broadcasts: reply on change, no
/// unsolicited diagnostics.
pub const DISCOVERY_TALK_TO_ME: TalkToMe = TalkToMe(0x02);

bitfield! {
    /// ArtPoll behaviour flags.
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct TalkToMe(u8);
    impl Debug;
    /// Send ArtPollReply whenever the node configuration changes, not only
    /// in answer to a poll.
    pub reply_on_change, set_reply_on_change: 1;
    /// Send diagnostics messages.
    pub send_diagnostics, set_send_diagnostics: 2;
    /// Unicast diagnostics to the poller instead of broadcasting them.
    pub diagnostics_unicast, set_diagnostics_unicast: 3;
    /// Disable VLC transmission.
    pub disable_vlc, set_disable_vlc: 4;
}

/// An ArtPoll discovery request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtPoll {
    pub talk_to_me: TalkToMe,
    /// Lowest diagnostics priority the poller wants to receive
    pub diag_priority: u8,
}

impl Default for ArtPoll {
    fn default() -> Self {
        Self {
            talk_to_me: DISCOVERY_TALK_TO_ME,
            diag_priority: 0,
        }
    }
}

impl ArtPoll {
    pub fn encode(&self, out: &mut [u8]) -> Result<usize, CodecError> {
        if out.len() < ART_POLL_LEN {
            return Err(CodecError::BufferSize);
        }
        put_header(out, OpCode::Poll);
        out[12] = self.talk_to_me.0;
        out[13] = self.diag_priority;
        Ok(ART_POLL_LEN)
    }

    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < ART_POLL_LEN || take_header(buf)? != OpCode::Poll {
            return None;
        }
        Some(ArtPoll {
            talk_to_me: TalkToMe(buf[12]),
            diag_priority: buf[13],
        })
    }
}
