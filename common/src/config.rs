pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Satoshis per whole BTC, trade amounts and BTC fees are expressed in sats
pub const COIN_VALUE: u64 = 10u64.pow(8);
// BSQ has two decimal places, schedule rates and burns use these base units
pub const BSQ_UNITS_PER_BSQ: u64 = 100;

// ===== FEE VERIFICATION POLICY =====

// Historical deployment constants, exact values are part of the protocol

// Below this block height an unrecognized BTC fee address is still accepted
// (fee addresses rotated before enforcement began and are no longer tracked)
pub const FEE_GRANDFATHER_HEIGHT: i64 = 600_000;
// An underpaid fee passes only while actual / expected stays strictly above
// this ratio
pub const FEE_LENIENCY_RATIO: f64 = 0.85;
// Ceiling on simultaneous explorer lookups
pub const MAX_OUTSTANDING_REQUESTS: usize = 5;

// Violations are truncated to this many chars for operator display
pub const ERROR_SUMMARY_LIMIT: usize = 85;

// ===== EXPLORER DEFAULTS =====

// Public esplora-compatible mirrors, tried in listed order
pub const DEFAULT_EXPLORER_MIRRORS: [&str; 3] = [
    "https://mempool.space/api",
    "https://mempool.emzy.de/api",
    "https://blockstream.info/api",
];

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

// Protocol donation addresses, always part of the known fee receiver set
pub const DONATION_ADDRESSES: [&str; 4] = [
    "3EtUWqsGThPtjwUczw27YCo6EWvQdaPUyp",
    "3A8Zc1XioE2HRzYfbb5P8iemCS72M6vRJV",
    "3EfRGckBQQuk7cpU7SwatPv8kFD1vALkTU",
    "34VLFgtFKAtwTdZ5rengTT2g2zC99sWQLC",
];
