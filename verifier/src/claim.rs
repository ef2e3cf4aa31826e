use std::fmt::{self, Display, Formatter};

use anyhow::{anyhow, bail, Result};
use log::{debug, info, warn};

use feeaudit_common::{
    api::explorer::{Outspend, TxInfo, TxInput, TxOutput},
    config::{ERROR_SUMMARY_LIMIT, FEE_GRANDFATHER_HEIGHT, FEE_LENIENCY_RATIO},
    fee::{fee_from_rate, format_bsq, FeeCurrency, FeeSchedule, KnownFeeReceivers, TradeRole},
};

/// One asserted fee payment to verify against explorer data.
/// The claim accumulates violations while it is checked, an empty
/// violation list after validation means the claim holds.
#[derive(Debug, Clone)]
pub struct TransactionClaim {
    tx_id: String,
    trade_amount: Option<u64>,
    fee_currency: Option<FeeCurrency>,
    /// Maker claims carry the height at offer creation, confirmation
    /// claims carry the current chain height. Taker claims start empty.
    block_height: Option<i64>,
    response: Option<String>,
    confirmations: Option<i64>,
    violations: Vec<String>,
    bypassed: bool,
}

impl TransactionClaim {
    /// Claim that `tx_id` paid the maker fee for a trade of `trade_amount`.
    /// The height hint comes from the offer, when absent the height is
    /// taken from the fetched transaction.
    pub fn maker(
        tx_id: impl Into<String>,
        trade_amount: u64,
        fee_currency: FeeCurrency,
        height_hint: Option<u64>,
    ) -> Self {
        Self {
            tx_id: tx_id.into(),
            trade_amount: Some(trade_amount),
            fee_currency: Some(fee_currency),
            block_height: height_hint.map(|h| h as i64),
            response: None,
            confirmations: None,
            violations: Vec::new(),
            bypassed: false,
        }
    }

    /// Claim that `tx_id` paid the taker fee. A taker may pay in either
    /// currency, passing `None` makes the verifier infer it from the
    /// first output of the fetched transaction.
    pub fn taker(tx_id: impl Into<String>, trade_amount: u64, fee_currency: Option<FeeCurrency>) -> Self {
        Self {
            tx_id: tx_id.into(),
            trade_amount: Some(trade_amount),
            fee_currency,
            block_height: None,
            response: None,
            confirmations: None,
            violations: Vec::new(),
            bypassed: false,
        }
    }

    /// Claim used to count confirmations of `tx_id` against the given
    /// chain height.
    pub fn for_confirmation(tx_id: impl Into<String>, chain_height: u64) -> Self {
        Self {
            tx_id: tx_id.into(),
            trade_amount: None,
            fee_currency: None,
            block_height: Some(chain_height as i64),
            response: None,
            confirmations: None,
            violations: Vec::new(),
            bypassed: false,
        }
    }

    pub fn tx_id(&self) -> &str {
        &self.tx_id
    }

    pub fn trade_amount(&self) -> Option<u64> {
        self.trade_amount
    }

    pub fn fee_currency(&self) -> Option<FeeCurrency> {
        self.fee_currency
    }

    pub fn block_height(&self) -> Option<i64> {
        self.block_height
    }

    pub fn confirmations(&self) -> Option<i64> {
        self.confirmations
    }

    /// Raw explorer document the verdict was based on, when one was fetched.
    pub fn response(&self) -> Option<&str> {
        self.response.as_deref()
    }

    pub fn violations(&self) -> &[String] {
        &self.violations
    }

    pub fn is_success(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn is_fail(&self) -> bool {
        !self.violations.is_empty()
    }

    /// True when the service skipped verification entirely and the
    /// verdict is an automatic pass.
    pub fn was_bypassed(&self) -> bool {
        self.bypassed
    }

    pub(crate) fn mark_bypassed(&mut self) {
        self.bypassed = true;
    }

    pub(crate) fn set_response(&mut self, body: &str) {
        self.response = Some(body.to_string());
    }

    /// Checks a maker fee payment. Runs the receiver address check and
    /// the amount check independently so a wrong address and a wrong
    /// amount are both reported.
    pub fn validate_maker_fee(
        &mut self,
        body: &str,
        receivers: &KnownFeeReceivers,
        schedule: &dyn FeeSchedule,
    ) -> bool {
        self.set_response(body);
        let status = match serde_json::from_str::<TxInfo>(body) {
            Ok(tx) => {
                let mut status = self.sanity_checks(&tx);
                if status {
                    if self.block_height.is_none() {
                        self.block_height = Some(tx.resolved_height());
                    }
                    let height = self.block_height.unwrap_or(-1);
                    match self.fee_currency {
                        Some(FeeCurrency::Btc) => {
                            status &= self.check_fee_address_btc(&tx, receivers);
                            status &= self.checked_fee_amount(
                                &tx,
                                FeeCurrency::Btc,
                                TradeRole::Maker,
                                height,
                                schedule,
                            );
                        }
                        Some(FeeCurrency::Bsq) => {
                            status &= self.checked_fee_amount(
                                &tx,
                                FeeCurrency::Bsq,
                                TradeRole::Maker,
                                height,
                                schedule,
                            );
                        }
                        None => {
                            let error = "maker claim is missing its fee currency".to_string();
                            warn!("{}", error);
                            self.violations.push(error);
                            status = false;
                        }
                    }
                }
                status
            }
            Err(e) => {
                self.record_parse_failure(TradeRole::Maker, &e);
                false
            }
        };
        self.record("Maker fee tx validation", status)
    }

    /// Checks a taker fee payment. The height always comes from the
    /// fetched transaction, and an unspecified fee currency is inferred
    /// from the first output before the branch is chosen.
    pub fn validate_taker_fee(
        &mut self,
        body: &str,
        receivers: &KnownFeeReceivers,
        schedule: &dyn FeeSchedule,
    ) -> bool {
        self.set_response(body);
        let status = match serde_json::from_str::<TxInfo>(body) {
            Ok(tx) => {
                let mut status = self.sanity_checks(&tx);
                if status {
                    let currency = match self.fee_currency {
                        Some(currency) => currency,
                        None => {
                            let inferred = Self::infer_fee_currency(&tx, receivers);
                            debug!("inferred fee currency {} for tx {}", inferred, self.tx_id);
                            self.fee_currency = Some(inferred);
                            inferred
                        }
                    };
                    let height = tx.resolved_height();
                    if currency == FeeCurrency::Btc {
                        status &= self.check_fee_address_btc(&tx, receivers);
                    }
                    status &= self.checked_fee_amount(&tx, currency, TradeRole::Taker, height, schedule);
                }
                status
            }
            Err(e) => {
                self.record_parse_failure(TradeRole::Taker, &e);
                false
            }
        };
        self.record("Taker fee tx validation", status)
    }

    /// Counts confirmations of the transaction against the chain height
    /// the claim was built with. Returns -1 when the document fails the
    /// sanity checks and 0 for an unconfirmed transaction.
    pub fn evaluate_confirmations(&mut self, body: &str) -> i64 {
        self.set_response(body);
        let confirms = match serde_json::from_str::<TxInfo>(body) {
            Ok(tx) if self.sanity_checks(&tx) => {
                let block_height = tx.resolved_height();
                if block_height > 0 {
                    let chain_height = self.block_height.unwrap_or(0);
                    // a tx in the current block has one confirmation
                    (chain_height - block_height) + 1
                } else {
                    0
                }
            }
            _ => -1,
        };
        self.confirmations = Some(confirms);
        confirms
    }

    /// Reads the deposit tx id out of the outspends of the maker fee tx.
    /// Output 0 funds the fee, output 1 is reserved for the trade, so a
    /// spent output 1 points at the deposit tx. `None` means the deposit
    /// tx has not been broadcast yet.
    pub fn deposit_tx_id_from_outspends(&self) -> Result<Option<String>> {
        let body = self
            .response
            .as_deref()
            .ok_or_else(|| anyhow!("no explorer response recorded"))?;
        let outspends: Vec<Outspend> = serde_json::from_str(body)?;
        if outspends.len() < 2 {
            bail!("not enough outspends");
        }
        let reserved = &outspends[1];
        if reserved.spent == Some(true) {
            match &reserved.txid {
                Some(tx_id) => Ok(Some(tx_id.clone())),
                None => bail!("spent outspend is missing its txid"),
            }
        } else {
            Ok(None)
        }
    }

    /// Given the fetched deposit tx, returns the taker fee tx id as the
    /// input that is not the known maker fee tx. Ids are matched case
    /// insensitively and exactly one input has to match.
    pub fn taker_tx_id_from_deposit_tx(&self, maker_tx_id: &str) -> Result<String> {
        let body = self
            .response
            .as_deref()
            .ok_or_else(|| anyhow!("no explorer response recorded"))?;
        let tx: TxInfo = serde_json::from_str(body)?;
        let (vin, _) = vin_and_vout(&tx)?;
        if vin.len() != 2 {
            bail!("not a deposit tx, as it did not have 2 inputs");
        }
        let first = vin[0]
            .txid
            .as_deref()
            .ok_or_else(|| anyhow!("vin/vout missing data"))?;
        let second = vin[1]
            .txid
            .as_deref()
            .ok_or_else(|| anyhow!("vin/vout missing data"))?;
        match (
            first.eq_ignore_ascii_case(maker_tx_id),
            second.eq_ignore_ascii_case(maker_tx_id),
        ) {
            (true, false) => Ok(second.to_string()),
            (false, true) => Ok(first.to_string()),
            (true, true) => bail!("both deposit tx inputs spend the maker fee tx"),
            (false, false) => bail!("deposit tx does not spend the maker fee tx"),
        }
    }

    /// Logs the verdict and folds it into the violation list. Returns
    /// whether the claim still holds overall.
    pub fn record(&mut self, title: &str, passed: bool) -> bool {
        info!("{} : {}", title, if passed { "SUCCESS" } else { "FAIL" });
        if !passed {
            self.violations.push(title.to_string());
        }
        self.is_success()
    }

    /// Violations joined and truncated for compact log lines.
    pub fn error_summary(&self) -> String {
        self.to_string().chars().take(ERROR_SUMMARY_LIMIT).collect()
    }

    /// The document must carry a status object, the txid we asked for
    /// and a confirmed flag, otherwise the explorer does not really
    /// know the transaction.
    fn sanity_checks(&self, tx: &TxInfo) -> bool {
        let Some(status) = &tx.status else {
            return false;
        };
        if tx.txid.as_deref() != Some(self.tx_id.as_str()) {
            return false;
        }
        status.confirmed.is_some()
    }

    fn check_fee_address_btc(&mut self, tx: &TxInfo, receivers: &KnownFeeReceivers) -> bool {
        match Self::fee_receiver_address(tx) {
            Ok(address) => {
                debug!("fee address: {}", address);
                if receivers.contains(address) {
                    true
                } else if tx.resolved_height() < FEE_GRANDFATHER_HEIGHT {
                    warn!(
                        "Leniency rule, unrecognised fee receiver but its a really old offer so let it pass, {}",
                        address
                    );
                    true
                } else {
                    let error = format!("fee address: {} was not a known BTC fee receiver", address);
                    info!("{}", error);
                    self.violations.push(error);
                    false
                }
            }
            Err(e) => {
                let error = e.to_string();
                warn!("{}", error);
                self.violations.push(error);
                false
            }
        }
    }

    /// Amount check with failures folded into the violation list, so
    /// callers can chain it with `&=` like the address check.
    fn checked_fee_amount(
        &mut self,
        tx: &TxInfo,
        currency: FeeCurrency,
        role: TradeRole,
        block_height: i64,
        schedule: &dyn FeeSchedule,
    ) -> bool {
        match self.check_fee_amount(tx, currency, role, block_height, schedule) {
            Ok(passed) => passed,
            Err(e) => {
                let error = format!("The {} fee tx JSON validation failed with reason: {}", role, e);
                warn!("{}", error);
                self.violations.push(error);
                false
            }
        }
    }

    fn check_fee_amount(
        &mut self,
        tx: &TxInfo,
        currency: FeeCurrency,
        role: TradeRole,
        block_height: i64,
        schedule: &dyn FeeSchedule,
    ) -> Result<bool> {
        let (vin, vout) = vin_and_vout(tx)?;
        let input_value = vin[0].prevout.as_ref().and_then(|prevout| prevout.value);
        let output_value = vout[0].value;
        let (Some(input_value), Some(output_value)) = (input_value, output_value) else {
            bail!("vin/vout missing data");
        };
        let Some(trade_amount) = self.trade_amount else {
            bail!("claim is missing its trade amount");
        };

        let rate = schedule.fee_rate(currency, role, block_height.max(0) as u64);
        let expected = fee_from_rate(rate, trade_amount) as i64;
        let paid = match currency {
            FeeCurrency::Btc => {
                debug!("BTC fee: {}", output_value);
                output_value as i64
            }
            FeeCurrency::Bsq => {
                let mut burned = input_value as i64 - output_value as i64;
                // when output 0 exceeds input 0 a second input was spent
                // to cover the fee
                if output_value > input_value {
                    let second = vin
                        .get(1)
                        .and_then(|input| input.prevout.as_ref())
                        .and_then(|prevout| prevout.value)
                        .ok_or_else(|| anyhow!("vin/vout missing data"))?;
                    burned += second as i64;
                }
                debug!("burnt BSQ fee: {} BSQ ({} sats)", describe_bsq(burned), burned);
                burned
            }
        };

        let leniency = paid as f64 / expected as f64;
        let description = match currency {
            FeeCurrency::Btc => {
                format!("Expected BTC fee: {} sats , actual fee paid: {} sats", expected, paid)
            }
            FeeCurrency::Bsq => format!(
                "Expected fee: {} BSQ, actual fee paid: {} BSQ",
                describe_bsq(expected),
                describe_bsq(paid)
            ),
        };
        if expected == paid {
            debug!("The fee matched what we expected");
            Ok(true)
        } else if expected < paid {
            warn!("The fee was more than what we expected: {}", description);
            Ok(true)
        } else if leniency > FEE_LENIENCY_RATIO {
            warn!(
                "Leniency rule: the fee was low, but above {:.0}% of what was expected {} {}",
                FEE_LENIENCY_RATIO * 100.0,
                leniency,
                description
            );
            Ok(true)
        } else {
            let error = format!("UNDERPAID. {}", description);
            warn!("{}", error);
            self.violations.push(error);
            Ok(false)
        }
    }

    /// A first output paying a recognized receiver marks a BTC fee,
    /// anything else is treated as a BSQ burn. The probe records
    /// nothing, only the chosen branch reports violations.
    fn infer_fee_currency(tx: &TxInfo, receivers: &KnownFeeReceivers) -> FeeCurrency {
        let address = tx
            .vout
            .as_deref()
            .and_then(|vout: &[TxOutput]| vout.first())
            .and_then(|out| out.scriptpubkey_address.as_deref());
        match address {
            Some(address) if receivers.contains(address) => FeeCurrency::Btc,
            _ => FeeCurrency::Bsq,
        }
    }

    fn fee_receiver_address(tx: &TxInfo) -> Result<&str> {
        let (_, vout) = vin_and_vout(tx)?;
        vout[0]
            .scriptpubkey_address
            .as_deref()
            .ok_or_else(|| anyhow!("vin/vout missing data"))
    }

    fn record_parse_failure(&mut self, role: TradeRole, e: &serde_json::Error) {
        let error = format!("The {} fee tx JSON validation failed with reason: {}", role, e);
        warn!("{}", error);
        self.violations.push(error);
    }
}

impl Display for TransactionClaim {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.violations.join(", "))
    }
}

/// A fee tx always has at least one input and two outputs, the fee and
/// the reserved trade amount, plus an optional change output.
fn vin_and_vout(tx: &TxInfo) -> Result<(&[TxInput], &[TxOutput])> {
    let (Some(vin), Some(vout)) = (tx.vin.as_deref(), tx.vout.as_deref()) else {
        bail!("missing vin/vout");
    };
    if vin.is_empty() || vout.len() < 2 {
        bail!("not enough vins/vouts");
    }
    Ok((vin, vout))
}

fn describe_bsq(units: i64) -> String {
    if units < 0 {
        format!("-{}", format_bsq(units.unsigned_abs()))
    } else {
        format_bsq(units as u64)
    }
}
