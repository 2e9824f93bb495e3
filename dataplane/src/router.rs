use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use crate::dmx_transport::{DmxTransport, TransportError};
use crate::node::DmxNode;
use crate::registry::NodeRegistry;
use crate::transport::ConnectionState;
use crate::UniverseFrame;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RouterMode {
    Real,
    Simulated,
    Mixed,
}

impl RouterMode {
    /// Which children this mode drives: (real, simulated).
    const fn uses(self) -> (bool, bool) {
        match self {
            RouterMode::Real => (true, false),
            RouterMode::Simulated => (false, true),
            RouterMode::Mixed => (true, true),
        }
    }
}

/// Multiplexes the real and simulated output paths.
///
/// In MIXED every frame goes to both children. Mode switches start and stop
/// only the children whose inclusion changed, so a child that stays in the
/// new mode keeps emitting without a gap.
pub struct TransportRouter<R: DmxTransport, S: DmxTransport> {
    real: R,
    simulated: S,
    mode: RouterMode,
    started: bool,
}

impl<R: DmxTransport, S: DmxTransport> TransportRouter<R, S> {
    pub fn new(real: R, simulated: S, mode: RouterMode) -> Self {
        Self {
            real,
            simulated,
            mode,
            started: false,
        }
    }

    pub fn mode(&self) -> RouterMode {
        self.mode
    }

    pub fn real(&self) -> &R {
        &self.real
    }

    pub fn simulated(&self) -> &S {
        &self.simulated
    }

    /// Change routing, preserving output continuity for any child that is
    /// running in both the old and the new mode.
    pub async fn switch_to(&mut self, new_mode: RouterMode) {
        if new_mode == self.mode {
            return;
        }
        info!("transport router switching mode");

        if self.started {
            let (old_real, old_sim) = self.mode.uses();
            let (new_real, new_sim) = new_mode.uses();

            if new_real && !old_real {
                self.real.start().await;
            }
            if new_sim && !old_sim {
                self.simulated.start().await;
            }
            if old_real && !new_real {
                self.real.stop().await;
            }
            if old_sim && !new_sim {
                self.simulated.stop().await;
            }
        }

        self.mode = new_mode;
    }
}

impl<R: DmxTransport, S: DmxTransport> DmxTransport for TransportRouter<R, S> {
    async fn start(&mut self) {
        let (real, sim) = self.mode.uses();
        if real {
            self.real.start().await;
        }
        if sim {
            self.simulated.start().await;
        }
        self.started = true;
    }

    async fn stop(&mut self) {
        let (real, sim) = self.mode.uses();
        if real {
            self.real.stop().await;
        }
        if sim {
            self.simulated.stop().await;
        }
        self.started = false;
    }

    async fn send_universe(
        &mut self,
        universe: u16,
        frame: &UniverseFrame,
    ) -> Result<(), TransportError> {
        match self.mode {
            RouterMode::Real => self.real.send_universe(universe, frame).await,
            RouterMode::Simulated => self.simulated.send_universe(universe, frame).await,
            RouterMode::Mixed => {
                // Both children get the frame even when the first one fails
                let real = self.real.send_universe(universe, frame).await;
                let sim = self.simulated.send_universe(universe, frame).await;
                real.and(sim)
            }
        }
    }

    fn connection_state(&self) -> ConnectionState {
        match self.mode {
            RouterMode::Real => self.real.connection_state(),
            RouterMode::Simulated => self.simulated.connection_state(),
            RouterMode::Mixed => aggregate(
                self.real.connection_state(),
                self.simulated.connection_state(),
            ),
        }
    }
}

/// Collapse two child states into the mixed-mode aggregate.
fn aggregate(a: ConnectionState, b: ConnectionState) -> ConnectionState {
    use ConnectionState::*;
    if a == Error || b == Error {
        Error
    } else if a == Connected && b == Connected {
        Connected
    } else if a == Connecting || b == Connecting {
        Connecting
    } else if a == Connected || b == Connected {
        Connected
    } else {
        Disconnected
    }
}

/// Merges the discovered-node views of the two output paths.
///
/// In MIXED the two lists are combined and de-duplicated by node key, the
/// real node winning.
pub struct DiscoveryRouter<'a> {
    real: &'a NodeRegistry,
    simulated: &'a NodeRegistry,
}

impl<'a> DiscoveryRouter<'a> {
    pub fn new(real: &'a NodeRegistry, simulated: &'a NodeRegistry) -> Self {
        Self { real, simulated }
    }

    pub fn snapshot(&self, mode: RouterMode) -> Vec<DmxNode> {
        match mode {
            RouterMode::Real => self.real.snapshot(),
            RouterMode::Simulated => self.simulated.snapshot(),
            RouterMode::Mixed => {
                let mut merged: BTreeMap<_, _> = self
                    .simulated
                    .snapshot()
                    .into_iter()
                    .map(|n| (n.key(), n))
                    .collect();
                for node in self.real.snapshot() {
                    merged.insert(node.key(), node);
                }
                merged.into_values().collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dmx_transport::SimulatedTransport;
    use crate::DMX_CHANNELS;
    use embassy_time::Instant;

    fn frame() -> UniverseFrame {
        [0u8; DMX_CHANNELS]
    }

    /// A scriptable child transport for aggregate-state checks.
    struct StubTransport {
        state: ConnectionState,
        sends: u32,
        fail: bool,
    }

    impl StubTransport {
        fn new(state: ConnectionState) -> Self {
            Self {
                state,
                sends: 0,
                fail: false,
            }
        }
    }

    impl DmxTransport for StubTransport {
        async fn start(&mut self) {
            self.state = ConnectionState::Connected;
        }

        async fn stop(&mut self) {
            self.state = ConnectionState::Disconnected;
        }

        async fn send_universe(
            &mut self,
            _universe: u16,
            _frame: &UniverseFrame,
        ) -> Result<(), TransportError> {
            self.sends += 1;
            if self.fail {
                Err(TransportError::Io)
            } else {
                Ok(())
            }
        }

        fn connection_state(&self) -> ConnectionState {
            self.state
        }
    }

    #[tokio::test]
    async fn mixed_send_reaches_both_children() {
        let mut router = TransportRouter::new(
            StubTransport::new(ConnectionState::Disconnected),
            StubTransport::new(ConnectionState::Disconnected),
            RouterMode::Mixed,
        );
        router.start().await;

        router.send_universe(0, &frame()).await.unwrap();

        assert_eq!(1, router.real().sends);
        assert_eq!(1, router.simulated().sends);
    }

    #[tokio::test]
    async fn mixed_send_attempts_second_child_after_failure() {
        let mut real = StubTransport::new(ConnectionState::Disconnected);
        real.fail = true;
        let mut router = TransportRouter::new(
            real,
            StubTransport::new(ConnectionState::Disconnected),
            RouterMode::Mixed,
        );
        router.start().await;

        assert!(router.send_universe(0, &frame()).await.is_err());
        assert_eq!(1, router.simulated().sends);
    }

    #[test]
    fn aggregate_state_collapse() {
        use ConnectionState::*;
        assert_eq!(Error, aggregate(Error, Connected));
        assert_eq!(Error, aggregate(Connecting, Error));
        assert_eq!(Connected, aggregate(Connected, Connected));
        assert_eq!(Connecting, aggregate(Connecting, Connected));
        assert_eq!(Connecting, aggregate(Disconnected, Connecting));
        assert_eq!(Connected, aggregate(Connected, Disconnected));
        assert_eq!(Disconnected, aggregate(Disconnected, Disconnected));
    }

    #[tokio::test]
    async fn switch_preserves_running_child() {
        let mut router = TransportRouter::new(
            StubTransport::new(ConnectionState::Disconnected),
            StubTransport::new(ConnectionState::Disconnected),
            RouterMode::Mixed,
        );
        router.start().await;
        assert_eq!(ConnectionState::Connected, router.real().state);
        assert_eq!(ConnectionState::Connected, router.simulated().state);

        router.switch_to(RouterMode::Real).await;

        // The real child never stopped; the simulated one did
        assert_eq!(ConnectionState::Connected, router.real().state);
        assert_eq!(ConnectionState::Disconnected, router.simulated().state);

        router.switch_to(RouterMode::Simulated).await;
        assert_eq!(ConnectionState::Disconnected, router.real().state);
        assert_eq!(ConnectionState::Connected, router.simulated().state);
    }

    #[tokio::test]
    async fn switch_before_start_only_changes_mode() {
        let mut router = TransportRouter::new(
            StubTransport::new(ConnectionState::Disconnected),
            StubTransport::new(ConnectionState::Disconnected),
            RouterMode::Real,
        );

        router.switch_to(RouterMode::Mixed).await;

        assert_eq!(RouterMode::Mixed, router.mode());
        assert_eq!(ConnectionState::Disconnected, router.simulated().state);
    }

    #[tokio::test]
    async fn discovery_router_merges_and_dedupes() {
        let real = NodeRegistry::new();
        let simulated = NodeRegistry::new();

        let mut sim_transport = SimulatedTransport::new();
        sim_transport.start().await;
        for node in sim_transport.registry().snapshot() {
            simulated.insert(node);
        }

        // The same key also shows up on the real side
        let mut duplicate = simulated.snapshot()[0].clone();
        duplicate.last_seen = Instant::from_micros(999_000);
        real.insert(duplicate.clone());

        let router = DiscoveryRouter::new(&real, &simulated);
        assert_eq!(1, router.snapshot(RouterMode::Mixed).len());
        // Real side wins the merge
        assert_eq!(
            duplicate.last_seen,
            router.snapshot(RouterMode::Mixed)[0].last_seen
        );
        assert_eq!(1, router.snapshot(RouterMode::Simulated).len());
    }
}
