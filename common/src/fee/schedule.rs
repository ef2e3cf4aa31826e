use std::sync::Arc;

use indexmap::IndexMap;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use super::{FeeCurrency, TradeRole};

/// Source of per-BTC trading fee rates.
/// Implementations answer "what rate applied at this block height",
/// the caller scales the rate to the trade amount.
pub trait FeeSchedule: Send + Sync {
    fn fee_rate(&self, currency: FeeCurrency, role: TradeRole, block_height: u64) -> u64;
}

/// Fee rates as they changed over time, one table per (currency, role).
/// Tables are kept newest first, a lookup returns the first entry whose
/// activation height is at or below the queried height.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalFeeSchedule {
    maker_btc: IndexMap<u64, u64>,
    taker_btc: IndexMap<u64, u64>,
    maker_bsq: IndexMap<u64, u64>,
    taker_bsq: IndexMap<u64, u64>,
    default_maker_btc: u64,
    default_taker_btc: u64,
    default_maker_bsq: u64,
    default_taker_bsq: u64,
}

impl HistoricalFeeSchedule {
    /// Rate history of the mainnet DAO, including every voted change.
    pub fn mainnet() -> Self {
        Self {
            maker_btc: IndexMap::from([(623227, 100000), (585787, 200000)]),
            taker_btc: IndexMap::from([(623227, 700000), (585787, 600000)]),
            maker_bsq: IndexMap::from([
                (670027, 753),
                (660667, 1006),
                (655987, 874),
                (641947, 760),
                (632587, 660),
                (623227, 575),
                (599827, 1000),
                (590467, 1300),
                (585787, 800),
                (581107, 160),
            ]),
            taker_bsq: IndexMap::from([
                (670027, 5268),
                (660667, 7039),
                (655987, 6121),
                (641947, 5323),
                (632587, 4630),
                (623227, 4025),
                (599827, 3000),
                (590467, 3800),
                (585787, 2400),
                (581107, 480),
            ]),
            default_maker_btc: 100000,
            default_taker_btc: 300000,
            default_maker_bsq: 50,
            default_taker_bsq: 150,
        }
    }

    fn lookup(table: &IndexMap<u64, u64>, default: u64, block_height: u64) -> u64 {
        table
            .iter()
            .find(|(activation, _)| **activation <= block_height)
            .map(|(_, rate)| *rate)
            .unwrap_or(default)
    }
}

impl FeeSchedule for HistoricalFeeSchedule {
    fn fee_rate(&self, currency: FeeCurrency, role: TradeRole, block_height: u64) -> u64 {
        let (table, default) = match (currency, role) {
            (FeeCurrency::Btc, TradeRole::Maker) => (&self.maker_btc, self.default_maker_btc),
            (FeeCurrency::Btc, TradeRole::Taker) => (&self.taker_btc, self.default_taker_btc),
            (FeeCurrency::Bsq, TradeRole::Maker) => (&self.maker_bsq, self.default_maker_bsq),
            (FeeCurrency::Bsq, TradeRole::Taker) => (&self.taker_bsq, self.default_taker_bsq),
        };
        Self::lookup(table, default, block_height)
    }
}

lazy_static! {
    /// Shared mainnet schedule, built once.
    pub static ref MAINNET_FEE_SCHEDULE: Arc<HistoricalFeeSchedule> =
        Arc::new(HistoricalFeeSchedule::mainnet());
}
