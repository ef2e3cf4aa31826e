use serde::{Deserialize, Serialize};

/// Operator-distributed policy affecting fee verification.
/// Arrives over the network, so every field is optional on the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TradeFilter {
    /// Extra BTC fee receiver addresses, each optionally suffixed
    /// with a "#comment" marker.
    #[serde(default)]
    pub btc_fee_receiver_addresses: Vec<String>,
    /// Turns all fee verification into an automatic pass.
    #[serde(default)]
    pub disable_fee_validation: bool,
}

impl TradeFilter {
    pub fn new(btc_fee_receiver_addresses: Vec<String>, disable_fee_validation: bool) -> Self {
        Self {
            btc_fee_receiver_addresses,
            disable_fee_validation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_default() {
        let filter: TradeFilter = serde_json::from_str("{}").unwrap();
        assert!(filter.btc_fee_receiver_addresses.is_empty());
        assert!(!filter.disable_fee_validation);
    }

    #[test]
    fn test_full_filter_parses() {
        let json = r#"{
            "btc_fee_receiver_addresses": ["1EKXx73oUhHaUh8JBimtiPGgHfwNmxYKAj#2021"],
            "disable_fee_validation": true
        }"#;
        let filter: TradeFilter = serde_json::from_str(json).unwrap();
        assert_eq!(filter.btc_fee_receiver_addresses.len(), 1);
        assert!(filter.disable_fee_validation);
    }
}
