#![cfg_attr(not(test), no_std)]

//! The ChromaDMX dataplane.
//!
//! Everything between the effect engine's color frames and the UDP socket:
//!
//! - [`UdpTransport`]: the seam to the platform's datagram socket
//! - [`NodeDiscovery`]: ArtPoll broadcast, reply collection, aging registry
//! - [`UdpDmxTransport`] / [`SimulatedTransport`]: per-universe frame senders
//! - [`TransportRouter`]: real/simulated/mixed multiplexing
//! - [`DmxOutputService`]: the paced 40 Hz output loop
//! - [`run_pipeline`]: engine colors to per-universe byte frames
//!
//! The loops recover from transient faults locally and keep running; nothing
//! in here can take the effect engine down.

// This mod MUST go first, so that the others see its macros.
#[macro_use]
mod fmt;

extern crate alloc;

mod discovery;
mod dmx_transport;
mod node;
mod output;
mod pipeline;
mod registry;
mod router;
mod transport;

pub use discovery::{DiscoveryConfig, NodeDiscovery, RECEIVE_BUF_LEN};
pub use dmx_transport::{
    DmxTransport, Protocol, SimulatedTransport, TransportError, UdpDmxTransport, DMX_CHANNELS,
};
pub use node::{DmxNode, NodeKey};
pub use output::{DmxOutputService, DEFAULT_FRAME_RATE_HZ, MAX_FRAME_RATE_HZ, MIN_FRAME_RATE_HZ};
pub use pipeline::{run_pipeline, PIPELINE_RATE_HZ};
pub use registry::{NodeRegistry, MAX_NODES};
pub use router::{DiscoveryRouter, RouterMode, TransportRouter};
pub use transport::{ConnectionState, UdpTransport, ARTNET_BROADCAST};

/// One universe worth of channel levels.
pub type UniverseFrame = [u8; dmx_transport::DMX_CHANNELS];

#[cfg(test)]
pub(crate) mod mocks;
