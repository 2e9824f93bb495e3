#![cfg_attr(not(test), no_std)]

//! BLE provisioning of ChromaDMX edge nodes.
//!
//! New nodes advertise a GATT service through which the controller writes
//! their name, WiFi credentials and DMX addressing. [`Provisioner`] drives
//! the scan → connect → read → write → verify sequence over a [`GattClient`]
//! implementation the platform supplies, publishing every state transition
//! for observers.

// This mod MUST go first, so that the others see its macros.
#[macro_use]
mod fmt;

mod config;
mod gatt;
mod node;
mod provisioner;

pub use config::NodeConfig;
pub use gatt::{
    Characteristic, GattClient, GattValue, NodeCommand, ProvisionedStatus, Uuid,
    MAX_SCAN_RESULTS, MAX_VALUE_LEN, SERVICE_UUID,
};
pub use node::{BleNode, SignalQuality};
pub use provisioner::{
    Provisioner, ProvisioningState, ProvisioningWatch, VERIFY_DELAY,
};
