use artnet_codec::{ArtPoll, ArtPollReply, ART_POLL_LEN, ART_POLL_REPLY_LEN};
use embassy_time::{Duration, Instant};

use crate::registry::{NodeRegistry, MAX_NODES};
use crate::transport::{UdpTransport, ARTNET_BROADCAST};
use crate::DmxNode;

/// Per-iteration receive buffer: a full reply plus slack for vendor extras.
pub const RECEIVE_BUF_LEN: usize = ART_POLL_REPLY_LEN + 64;

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DiscoveryConfig {
    /// How often ArtPoll is broadcast
    pub poll_interval: Duration,
    /// Nodes unseen for longer than this are pruned
    pub node_timeout: Duration,
    pub max_nodes: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(3000),
            node_timeout: Duration::from_millis(10_000),
            max_nodes: MAX_NODES,
        }
    }
}

/// Art-Net node discovery.
///
/// One task multiplexes the two jobs: broadcast an ArtPoll every
/// `poll_interval` and prune the registry, then listen for replies with
/// whatever time remains until the next poll. Malformed datagrams and
/// transient socket faults are dropped and the loop continues.
pub struct NodeDiscovery {
    registry: NodeRegistry,
    config: DiscoveryConfig,
}

impl Default for NodeDiscovery {
    fn default() -> Self {
        Self::new(DiscoveryConfig::default())
    }
}

impl NodeDiscovery {
    pub fn new(config: DiscoveryConfig) -> Self {
        Self {
            registry: NodeRegistry::with_capacity(config.max_nodes),
            config,
        }
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// The discovery loop. Runs forever; spawn it with the socket bound to
    /// the Art-Net port.
    pub async fn run<U: UdpTransport>(&self, udp: &mut U) -> ! {
        let mut buf = [0u8; RECEIVE_BUF_LEN];
        let mut next_poll = Instant::now();
        info!("node discovery running");

        loop {
            let now = Instant::now();
            if now >= next_poll {
                self.poll_now(udp).await;
                self.registry.prune(now, self.config.node_timeout);
                next_poll = now + self.config.poll_interval;
            }

            let remaining = next_poll
                .checked_duration_since(Instant::now())
                .unwrap_or(Duration::from_ticks(0));
            match udp.receive(&mut buf, remaining).await {
                Ok(Some((len, _from))) => {
                    if let Some(reply) = ArtPollReply::decode(&buf[..len]) {
                        self.process_reply(&reply, Instant::now());
                    }
                }
                Ok(None) => {} // receive timeout, next poll is due
                Err(_) => {
                    warn!("discovery receive failed");
                }
            }
        }
    }

    /// Broadcast one ArtPoll immediately. Send faults are swallowed; the
    /// next tick retries.
    pub async fn poll_now<U: UdpTransport>(&self, udp: &mut U) {
        let mut frame = [0u8; ART_POLL_LEN];
        // Infallible: the buffer is sized for the packet
        let len = ArtPoll::default().encode(&mut frame).unwrap_or(ART_POLL_LEN);
        if udp.send_to(&frame[..len], ARTNET_BROADCAST).await.is_err() {
            warn!("art poll broadcast failed");
        } else {
            trace!("art poll broadcast");
        }
    }

    /// Fold one validated reply into the registry.
    pub fn process_reply(&self, reply: &ArtPollReply, now: Instant) {
        let node = DmxNode::from_reply(reply, now);
        debug!("poll reply from node with {} ports", node.num_ports);
        self.registry.insert(node);
    }
}
