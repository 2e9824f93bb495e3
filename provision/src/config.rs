/// What gets written to a node during provisioning.
///
/// The string capacities match the GATT characteristic payload limits, so an
/// oversized value is unrepresentable; validation covers the remaining
/// invariants.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NodeConfig {
    pub name: heapless::String<32>,
    pub wifi_ssid: heapless::String<32>,
    pub wifi_password: heapless::String<64>,
    /// Art-Net port address, 0..=32767
    pub universe: u16,
    /// 1-based DMX start address
    pub dmx_start_address: u16,
}

impl NodeConfig {
    /// Check every invariant, reporting the first violation.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.name.is_empty() {
            return Err("Node name is required");
        }
        if self.wifi_ssid.is_empty() {
            return Err("WiFi SSID is required");
        }
        if self.universe > 32767 {
            return Err("Universe must be between 0 and 32767");
        }
        if self.dmx_start_address == 0 || self.dmx_start_address > 512 {
            return Err("DMX start address must be between 1 and 512");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> NodeConfig {
        NodeConfig {
            name: heapless::String::try_from("Stage Left").unwrap(),
            wifi_ssid: heapless::String::try_from("venue-rig").unwrap(),
            wifi_password: heapless::String::try_from("hunter22").unwrap(),
            universe: 1,
            dmx_start_address: 1,
        }
    }

    #[test]
    fn valid_config_passes() {
        assert_eq!(Ok(()), valid().validate());
    }

    #[test]
    fn empty_password_is_allowed() {
        let mut config = valid();
        config.wifi_password = heapless::String::new();
        assert_eq!(Ok(()), config.validate());
    }

    #[test]
    fn first_violation_wins() {
        let mut config = valid();
        config.name = heapless::String::new();
        config.dmx_start_address = 0;
        assert_eq!(Err("Node name is required"), config.validate());
    }

    #[test]
    fn ranges_are_enforced() {
        let mut config = valid();
        config.universe = 32768;
        assert_eq!(
            Err("Universe must be between 0 and 32767"),
            config.validate()
        );

        let mut config = valid();
        config.dmx_start_address = 513;
        assert_eq!(
            Err("DMX start address must be between 1 and 512"),
            config.validate()
        );
    }
}
