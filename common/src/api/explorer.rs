use serde::{Deserialize, Serialize};

/// Transaction document as served by mempool.space style explorers.
/// Every field is optional so verification code can tell a missing
/// field apart from a present one and report it precisely. Unknown
/// fields in the full explorer payload are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TxInfo {
    pub txid: Option<String>,
    pub vin: Option<Vec<TxInput>>,
    pub vout: Option<Vec<TxOutput>>,
    pub status: Option<TxStatus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TxStatus {
    pub confirmed: Option<bool>,
    pub block_height: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TxInput {
    pub txid: Option<String>,
    pub prevout: Option<TxOutput>,
}

/// Also used for the `prevout` of an input, which carries the same shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TxOutput {
    pub value: Option<u64>,
    pub scriptpubkey_address: Option<String>,
}

/// One element of a `/tx/{txid}/outspends` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Outspend {
    pub spent: Option<bool>,
    pub txid: Option<String>,
}

impl TxInfo {
    /// Block height with sentinels: confirmed transactions report their
    /// height, unconfirmed ones report 0, and a malformed or absent
    /// status reports -1.
    pub fn resolved_height(&self) -> i64 {
        let Some(status) = &self.status else {
            return -1;
        };
        match status.confirmed {
            Some(true) => status.block_height.map(|h| h as i64).unwrap_or(-1),
            Some(false) => 0,
            None => -1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trimmed_tx() {
        let json = r#"{
            "txid": "3524364062c96ba0280621309e8b539d152154422294c2cf263a965dcde9a8ca",
            "vin": [{"prevout": {"value": 2971000}}],
            "vout": [
                {"scriptpubkey_address": "3A8Zc1XioE2HRzYfbb5P8iemCS72M6vRJV", "value": 6000},
                {"scriptpubkey_address": "34VLFgtFKAtwTdZ5rengTT2g2zC99sWQLC", "value": 1607245}
            ],
            "status": {"confirmed": true, "block_height": 614672}
        }"#;
        let tx: TxInfo = serde_json::from_str(json).unwrap();
        assert_eq!(
            tx.txid.as_deref(),
            Some("3524364062c96ba0280621309e8b539d152154422294c2cf263a965dcde9a8ca")
        );
        let vout = tx.vout.as_ref().unwrap();
        assert_eq!(vout.len(), 2);
        assert_eq!(vout[0].value, Some(6000));
        assert_eq!(tx.resolved_height(), 614672);
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let json = r#"{"txid": "ab", "fee": 142, "weight": 884, "locktime": 0}"#;
        let tx: TxInfo = serde_json::from_str(json).unwrap();
        assert_eq!(tx.txid.as_deref(), Some("ab"));
        assert!(tx.vin.is_none());
    }

    #[test]
    fn test_resolved_height_sentinels() {
        let confirmed: TxInfo =
            serde_json::from_str(r#"{"status": {"confirmed": true, "block_height": 600500}}"#).unwrap();
        assert_eq!(confirmed.resolved_height(), 600500);

        let unconfirmed: TxInfo = serde_json::from_str(r#"{"status": {"confirmed": false}}"#).unwrap();
        assert_eq!(unconfirmed.resolved_height(), 0);

        let no_status: TxInfo = serde_json::from_str(r#"{"txid": "ab"}"#).unwrap();
        assert_eq!(no_status.resolved_height(), -1);

        let empty_status: TxInfo = serde_json::from_str(r#"{"status": {}}"#).unwrap();
        assert_eq!(empty_status.resolved_height(), -1);

        let confirmed_without_height: TxInfo =
            serde_json::from_str(r#"{"status": {"confirmed": true}}"#).unwrap();
        assert_eq!(confirmed_without_height.resolved_height(), -1);
    }

    #[test]
    fn test_parse_outspends() {
        let json = r#"[
            {"spent": true, "txid": "feetx"},
            {"spent": true, "txid": "deposittx"},
            {"spent": false}
        ]"#;
        let outspends: Vec<Outspend> = serde_json::from_str(json).unwrap();
        assert_eq!(outspends.len(), 3);
        assert_eq!(outspends[1].txid.as_deref(), Some("deposittx"));
        assert_eq!(outspends[2].spent, Some(false));
        assert!(outspends[2].txid.is_none());
    }
}
