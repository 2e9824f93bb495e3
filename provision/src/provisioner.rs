use core::fmt::Write as _;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::watch::Watch;
use embassy_time::{Duration, Timer};

use crate::config::NodeConfig;
use crate::gatt::{Characteristic, GattClient, NodeCommand, MAX_SCAN_RESULTS};
use crate::node::BleNode;

/// Settle time before the verification read-back.
pub const VERIFY_DELAY: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProvisioningState {
    #[default]
    Idle,
    Scanning,
    Connecting,
    ReadingConfig,
    WritingConfig,
    Verifying,
    Success,
    Error,
}

/// Consumer slots on the state watch.
const STATE_CONSUMERS: usize = 2;

pub type ProvisioningWatch = Watch<CriticalSectionRawMutex, ProvisioningState, STATE_CONSUMERS>;

/// Drives the provisioning sequence over a [`GattClient`].
///
/// State always moves through the fixed order
/// CONNECTING → READING_CONFIG → WRITING_CONFIG → VERIFYING → SUCCESS;
/// any failure lands in ERROR with a human readable message, after a best
/// effort disconnect. `reset` returns to IDLE.
///
/// Dropping a `provision` future mid-flight cancels cooperatively: no more
/// GATT traffic is issued, and the platform client tears the link down when
/// it is next used or dropped. A partially written node stays in whatever
/// intermediate state it reached and can simply be provisioned again.
pub struct Provisioner<'a, C: GattClient> {
    client: C,
    state_watch: &'a ProvisioningWatch,
    state: ProvisioningState,
    last_error: Option<heapless::String<96>>,
    last_provisioned: Option<NodeConfig>,
}

impl<'a, C: GattClient> Provisioner<'a, C> {
    pub fn new(client: C, state_watch: &'a ProvisioningWatch) -> Self {
        Self {
            client,
            state_watch,
            state: ProvisioningState::Idle,
            last_error: None,
            last_provisioned: None,
        }
    }

    pub fn state(&self) -> ProvisioningState {
        self.state
    }

    /// The message from the most recent failure, for the UI.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// The config most recently verified on a node.
    pub fn last_provisioned(&self) -> Option<&NodeConfig> {
        self.last_provisioned.as_ref()
    }

    /// Leave SUCCESS or ERROR (or any other state) for IDLE.
    pub fn reset(&mut self) {
        self.last_error = None;
        self.transition(ProvisioningState::Idle);
    }

    /// Scan for provisionable nodes.
    pub async fn scan(
        &mut self,
        timeout: Duration,
    ) -> heapless::Vec<BleNode, MAX_SCAN_RESULTS> {
        self.transition(ProvisioningState::Scanning);
        match self.client.scan(timeout).await {
            Ok(nodes) => {
                info!("scan found {} nodes", nodes.len());
                self.transition(ProvisioningState::Idle);
                nodes
            }
            Err(_) => {
                self.fail("Scan failed");
                heapless::Vec::new()
            }
        }
    }

    /// Configure one node. Returns the verified config on success, `None`
    /// on any failure (with the reason left in [`last_error`]).
    ///
    /// [`last_error`]: Self::last_error
    pub async fn provision(
        &mut self,
        node: &BleNode,
        config: &NodeConfig,
    ) -> Option<NodeConfig> {
        if let Err(message) = config.validate() {
            self.fail(message);
            return None;
        }

        self.transition(ProvisioningState::Connecting);
        if self.client.connect(&node.device_id).await.is_err() {
            self.fail("Could not connect to node");
            return None;
        }

        // The node's current config is informational; a null read is fine
        self.transition(ProvisioningState::ReadingConfig);
        let _ = self.read_config().await;

        self.transition(ProvisioningState::WritingConfig);
        if self.write_config(config).await.is_err() {
            self.fail("Writing configuration failed");
            self.client.disconnect().await;
            return None;
        }

        self.transition(ProvisioningState::Verifying);
        Timer::after(VERIFY_DELAY).await;
        let Some(mut verified) = self.read_config().await else {
            self.fail("Node did not confirm configuration");
            self.client.disconnect().await;
            return None;
        };
        // The password characteristic is write-only; carry the input through
        verified.wifi_password = config.wifi_password.clone();

        self.client.disconnect().await;
        self.transition(ProvisioningState::Success);
        self.last_provisioned = Some(verified.clone());
        info!("node provisioned");
        Some(verified)
    }

    /// Read the node's current config. `None` when any readable field is
    /// missing or undecodable.
    async fn read_config(&mut self) -> Option<NodeConfig> {
        let name = self.read_string::<32>(Characteristic::NodeName).await?;
        let wifi_ssid = self.read_string::<32>(Characteristic::WifiSsid).await?;
        let universe = self.read_u16(Characteristic::Universe).await?;
        let dmx_start_address = self.read_u16(Characteristic::DmxStartAddress).await?;

        Some(NodeConfig {
            name,
            wifi_ssid,
            wifi_password: heapless::String::new(),
            universe,
            dmx_start_address,
        })
    }

    async fn read_string<const N: usize>(
        &mut self,
        characteristic: Characteristic,
    ) -> Option<heapless::String<N>> {
        let value = self.client.read(characteristic).await.ok()??;
        let text = core::str::from_utf8(&value).ok()?;
        heapless::String::try_from(text).ok()
    }

    async fn read_u16(&mut self, characteristic: Characteristic) -> Option<u16> {
        let value = self.client.read(characteristic).await.ok()??;
        if value.len() < 2 {
            return None;
        }
        Some(u16::from_le_bytes([value[0], value[1]]))
    }

    async fn write_config(&mut self, config: &NodeConfig) -> Result<(), C::Error> {
        self.client
            .write(Characteristic::NodeName, config.name.as_bytes())
            .await?;
        self.client
            .write(Characteristic::WifiSsid, config.wifi_ssid.as_bytes())
            .await?;
        self.client
            .write(Characteristic::WifiPassword, config.wifi_password.as_bytes())
            .await?;
        self.client
            .write(Characteristic::Universe, &config.universe.to_le_bytes())
            .await?;
        self.client
            .write(
                Characteristic::DmxStartAddress,
                &config.dmx_start_address.to_le_bytes(),
            )
            .await?;
        self.client
            .write(Characteristic::Command, &[NodeCommand::Apply as u8])
            .await
    }

    fn transition(&mut self, state: ProvisioningState) {
        debug!("provisioning state change");
        self.state = state;
        self.state_watch.sender().send(state);
    }

    fn fail(&mut self, message: &str) {
        warn!("provisioning failed");
        let mut error = heapless::String::new();
        // Truncation is acceptable for an oversized message
        let _ = error.write_str(message);
        self.last_error = Some(error);
        self.transition(ProvisioningState::Error);
    }
}
