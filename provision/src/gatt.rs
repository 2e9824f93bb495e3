use embassy_time::Duration;

use crate::node::BleNode;

/// A 128 bit GATT UUID, stored big-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Uuid(pub [u8; 16]);

impl Uuid {
    pub const fn from_u128(value: u128) -> Self {
        Self(value.to_be_bytes())
    }
}

/// The ChromaDMX provisioning service.
pub const SERVICE_UUID: Uuid = Uuid::from_u128(0x4368726f_6d61_444d_5800_000000000001);

const CHARACTERISTIC_BASE: u128 = 0x4368726f_6d61_444d_5800_000000000000;

/// Longest characteristic payload (the WiFi password).
pub const MAX_VALUE_LEN: usize = 64;

pub type GattValue = heapless::Vec<u8, MAX_VALUE_LEN>;

/// Most nodes a single scan reports.
pub const MAX_SCAN_RESULTS: usize = 16;

/// The provisioning service's characteristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Characteristic {
    /// UTF-8 string, R/W
    NodeName,
    /// UTF-8 string, R/W
    WifiSsid,
    /// UTF-8 string, write only
    WifiPassword,
    /// uint16 little-endian, R/W
    Universe,
    /// uint16 little-endian, R/W
    DmxStartAddress,
    /// uint8 status, read/notify
    ProvisionedFlag,
    /// UTF-8 string, read only
    FirmwareVersion,
    /// uint8 command, write only
    Command,
}

impl Characteristic {
    pub const fn uuid(self) -> Uuid {
        let low = match self {
            Characteristic::NodeName => 0x10,
            Characteristic::WifiSsid => 0x11,
            Characteristic::WifiPassword => 0x12,
            Characteristic::Universe => 0x13,
            Characteristic::DmxStartAddress => 0x14,
            Characteristic::ProvisionedFlag => 0x15,
            Characteristic::FirmwareVersion => 0x16,
            Characteristic::Command => 0x20,
        };
        Uuid::from_u128(CHARACTERISTIC_BASE | low)
    }
}

/// Values of the provisioned_flag characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProvisionedStatus {
    NotProvisioned,
    Provisioned,
    Provisioning,
    WifiConnecting,
    WifiConnected,
    Error,
}

impl ProvisionedStatus {
    pub const fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => ProvisionedStatus::NotProvisioned,
            1 => ProvisionedStatus::Provisioned,
            2 => ProvisionedStatus::Provisioning,
            3 => ProvisionedStatus::WifiConnecting,
            4 => ProvisionedStatus::WifiConnected,
            0xff => ProvisionedStatus::Error,
            _ => return None,
        })
    }
}

/// Commands accepted by the command characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum NodeCommand {
    Apply = 1,
    Reboot = 2,
    FactoryReset = 3,
    EnterDfu = 4,
}

/// The seam to the platform's BLE stack.
///
/// At most one operation is outstanding per channel (connect, read, write,
/// disconnect); issuing a second before the first resolves is a programming
/// error on the implementation side. `read` distinguishes "the node returned
/// nothing" (`Ok(None)`) from a transport fault (`Err`).
pub trait GattClient {
    type Error: core::fmt::Debug;

    /// Scan for nodes advertising the provisioning service.
    async fn scan(
        &mut self,
        timeout: Duration,
    ) -> Result<heapless::Vec<BleNode, MAX_SCAN_RESULTS>, Self::Error>;

    async fn connect(&mut self, device_id: &str) -> Result<(), Self::Error>;

    async fn read(&mut self, characteristic: Characteristic)
        -> Result<Option<GattValue>, Self::Error>;

    async fn write(
        &mut self,
        characteristic: Characteristic,
        value: &[u8],
    ) -> Result<(), Self::Error>;

    /// Best effort; never fails.
    async fn disconnect(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_uuid_spells_the_project() {
        // "Chro" "ma" "DM" "X\0"
        assert_eq!(
            [0x43, 0x68, 0x72, 0x6f, 0x6d, 0x61, 0x44, 0x4d, 0x58, 0x00],
            SERVICE_UUID.0[..10]
        );
    }

    #[test]
    fn characteristic_uuids_share_the_base() {
        let uuid = Characteristic::Command.uuid();
        assert_eq!(SERVICE_UUID.0[..10], uuid.0[..10]);
        assert_eq!(0x20, uuid.0[15]);
        assert_eq!(0x14, Characteristic::DmxStartAddress.uuid().0[15]);
    }

    #[test]
    fn provisioned_status_roundtrip() {
        assert_eq!(
            Some(ProvisionedStatus::WifiConnected),
            ProvisionedStatus::from_u8(4)
        );
        assert_eq!(Some(ProvisionedStatus::Error), ProvisionedStatus::from_u8(0xff));
        assert_eq!(None, ProvisionedStatus::from_u8(9));
    }
}
