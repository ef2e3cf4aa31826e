mod receivers;
mod schedule;

pub use receivers::KnownFeeReceivers;
pub use schedule::{FeeSchedule, HistoricalFeeSchedule, MAINNET_FEE_SCHEDULE};

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::{BSQ_UNITS_PER_BSQ, COIN_VALUE};

/// Currency a trading fee was paid in.
/// BTC fees go to a recognized receiver address, BSQ fees are burned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum FeeCurrency {
    Btc,
    Bsq,
}

impl Display for FeeCurrency {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            FeeCurrency::Btc => "BTC",
            FeeCurrency::Bsq => "BSQ",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for FeeCurrency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "BTC" => Ok(FeeCurrency::Btc),
            "BSQ" => Ok(FeeCurrency::Bsq),
            _ => Err(format!("Invalid fee currency '{}'", s)),
        }
    }
}

/// Side of the trade whose fee payment is being checked.
/// Makers and takers pay different rates for the same block height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum TradeRole {
    Maker,
    Taker,
}

impl Display for TradeRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            TradeRole::Maker => "maker",
            TradeRole::Taker => "taker",
        };
        write!(f, "{}", s)
    }
}

/// Scales a per-BTC fee rate to a trade amount, rounding half up.
/// Rates are quoted in fee units per whole BTC of trade amount.
pub fn fee_from_rate(rate: u64, trade_amount: u64) -> u64 {
    let scaled = rate as u128 * trade_amount as u128;
    ((scaled + COIN_VALUE as u128 / 2) / COIN_VALUE as u128) as u64
}

/// Renders burned BSQ units as a decimal BSQ amount, e.g. 188 -> "1.88".
pub fn format_bsq(units: u64) -> String {
    format!("{}.{:02}", units / BSQ_UNITS_PER_BSQ, units % BSQ_UNITS_PER_BSQ)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fee_from_rate_rounds_half_up() {
        // 3000 * 6250000 / 1e8 = 187.5
        assert_eq!(fee_from_rate(3000, 6_250_000), 188);
        // 1006 * 1000000 / 1e8 = 10.06
        assert_eq!(fee_from_rate(1006, 1_000_000), 10);
        // 5268 * 900000 / 1e8 = 47.412
        assert_eq!(fee_from_rate(5268, 900_000), 47);
        // 1 * 50000000 / 1e8 = 0.5
        assert_eq!(fee_from_rate(1, 50_000_000), 1);
        assert_eq!(fee_from_rate(100_000, 1_000_000), 1000);
        assert_eq!(fee_from_rate(0, 1_000_000), 0);
    }

    #[test]
    fn test_fee_from_rate_large_amounts_do_not_overflow() {
        // 700000 * 2.1e15 overflows u64 in the intermediate product
        assert_eq!(fee_from_rate(700_000, 2_100_000_000_000_000), 14_700_000_000_000);
    }

    #[test]
    fn test_format_bsq() {
        assert_eq!(format_bsq(188), "1.88");
        assert_eq!(format_bsq(50), "0.50");
        assert_eq!(format_bsq(0), "0.00");
        assert_eq!(format_bsq(10050), "100.50");
    }

    #[test]
    fn test_currency_and_role_display() {
        assert_eq!(FeeCurrency::Btc.to_string(), "BTC");
        assert_eq!(FeeCurrency::Bsq.to_string(), "BSQ");
        assert_eq!(FeeCurrency::from_str("bsq"), Ok(FeeCurrency::Bsq));
        assert!(FeeCurrency::from_str("EUR").is_err());
        assert_eq!(TradeRole::Maker.to_string(), "maker");
        assert_eq!(TradeRole::Taker.to_string(), "taker");
    }

    use proptest::prelude::*;

    proptest! {
        // rounding never moves the scaled fee by more than half a unit
        #[test]
        fn test_fee_from_rate_rounding_bound(
            rate in 0u64..=1_000_000,
            trade_amount in 0u64..=2_100_000_000_000_000,
        ) {
            let fee = fee_from_rate(rate, trade_amount) as i128;
            let scaled = rate as i128 * trade_amount as i128;
            let diff = fee * COIN_VALUE as i128 - scaled;
            prop_assert!(diff.abs() <= COIN_VALUE as i128 / 2);
        }
    }
}
