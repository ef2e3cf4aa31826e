use std::fmt::{self, Display, Formatter};

use indexmap::IndexSet;

/// Addresses allowed to collect BTC trading fees.
/// Built from the distributed filter feed plus the static donation
/// addresses, deduplicated, insertion order kept for logging.
#[derive(Debug, Clone, Default)]
pub struct KnownFeeReceivers {
    addresses: IndexSet<String>,
}

impl KnownFeeReceivers {
    /// Feed entries carry an optional "#comment" suffix which is stripped.
    /// Entries that normalize to an empty address are ignored.
    pub fn from_sources<S: AsRef<str>>(feed: &[S], donations: &[&str]) -> Self {
        let mut addresses = IndexSet::new();
        for entry in feed {
            let address = entry.as_ref().split('#').next().unwrap_or_default().trim();
            if !address.is_empty() {
                addresses.insert(address.to_string());
            }
        }
        for donation in donations {
            addresses.insert((*donation).to_string());
        }
        Self { addresses }
    }

    pub fn contains(&self, address: &str) -> bool {
        self.addresses.contains(address)
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.addresses.iter().map(|s| s.as_str())
    }
}

impl Display for KnownFeeReceivers {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let joined = self.addresses.iter().cloned().collect::<Vec<_>>().join(", ");
        write!(f, "[{}]", joined)
    }
}
