//! Test doubles for the transport seam.

use alloc::collections::VecDeque;
use alloc::vec::Vec;
use core::net::SocketAddr;

use embassy_time::{Duration, Timer};

use crate::transport::UdpTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockUdpError;

/// A scriptable in-memory socket: records every send, replays queued
/// datagrams, and honors the receive timeout by sleeping when the queue is
/// empty.
pub struct MockUdp {
    pub sent: Vec<(Vec<u8>, SocketAddr)>,
    pub incoming: VecDeque<(Vec<u8>, SocketAddr)>,
    pub fail_sends: bool,
    pub closed: bool,
}

impl MockUdp {
    pub fn new() -> Self {
        Self {
            sent: Vec::new(),
            incoming: VecDeque::new(),
            fail_sends: false,
            closed: false,
        }
    }

    pub fn enqueue(&mut self, datagram: &[u8], from: SocketAddr) {
        self.incoming.push_back((datagram.to_vec(), from));
    }
}

impl UdpTransport for MockUdp {
    type Error = MockUdpError;

    async fn send_to(&mut self, data: &[u8], remote: SocketAddr) -> Result<(), Self::Error> {
        if self.fail_sends {
            return Err(MockUdpError);
        }
        self.sent.push((data.to_vec(), remote));
        Ok(())
    }

    async fn receive(
        &mut self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<Option<(usize, SocketAddr)>, Self::Error> {
        match self.incoming.pop_front() {
            Some((datagram, from)) => {
                let len = usize::min(datagram.len(), buf.len());
                buf[..len].copy_from_slice(&datagram[..len]);
                Ok(Some((len, from)))
            }
            None => {
                Timer::after(timeout).await;
                Ok(None)
            }
        }
    }

    fn close(&mut self) {
        self.closed = true;
    }
}
