use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, RwLock,
};

use log::{info, warn};
use reqwest::Client;
use tokio::sync::mpsc;
use url::Url;

use feeaudit_common::{
    config::{DONATION_ADDRESSES, MAX_OUTSTANDING_REQUESTS},
    fee::{FeeSchedule, KnownFeeReceivers},
    filter::TradeFilter,
    network::Network,
};

use crate::{
    claim::TransactionClaim,
    config::Config,
    explorer::{
        build_http_client, fetch_with_failover, parse_mirrors, ExplorerError, ExplorerRequest,
        FetchOutcome, TxSource,
    },
};

pub type SharedFeeVerificationService = Arc<FeeVerificationService>;

/// Callback receiving the final claim of one verification.
pub type ResultHandler = Box<dyn FnOnce(TransactionClaim) + Send + 'static>;

struct Completion {
    claim: TransactionClaim,
    handler: ResultHandler,
    holds_slot: bool,
}

/// Verifies fee claims against the configured explorer mirrors.
///
/// Each dispatched verification owns one of a fixed number of slots
/// from dispatch until its result has been delivered, and all results
/// are delivered one at a time in dispatch order.
pub struct FeeVerificationService {
    network: Network,
    bypass_fee_validation: bool,
    http: Client,
    mirrors: Vec<Url>,
    schedule: Arc<dyn FeeSchedule>,
    filter: RwLock<Option<TradeFilter>>,
    receivers: RwLock<KnownFeeReceivers>,
    outstanding: AtomicUsize,
    completions: mpsc::UnboundedSender<Completion>,
}

impl FeeVerificationService {
    /// Builds the service and spawns its delivery task, so a tokio
    /// runtime must be running.
    pub fn new(
        config: &Config,
        schedule: Arc<dyn FeeSchedule>,
    ) -> Result<SharedFeeVerificationService, ExplorerError> {
        let mirrors = parse_mirrors(&config.explorer.mirrors_or_default())?;
        let http = build_http_client(&config.explorer)?;
        let receivers = KnownFeeReceivers::from_sources::<String>(&[], &DONATION_ADDRESSES);
        info!("Known BTC fee receivers: {}", receivers);

        let (completions, mut rx) = mpsc::unbounded_channel::<Completion>();
        let service = Arc::new(Self {
            network: config.network,
            bypass_fee_validation: config.bypass_fee_validation,
            http,
            mirrors,
            schedule,
            filter: RwLock::new(None),
            receivers: RwLock::new(receivers),
            outstanding: AtomicUsize::new(0),
            completions,
        });

        // single consumer, handlers run one at a time in dispatch order
        // and the slot is held until the handler has returned
        let weak = Arc::downgrade(&service);
        tokio::spawn(async move {
            while let Some(completion) = rx.recv().await {
                (completion.handler)(completion.claim);
                if completion.holds_slot {
                    if let Some(service) = weak.upgrade() {
                        service.release_slot();
                    }
                }
            }
        });

        Ok(service)
    }

    /// Installs the operator filter and rebuilds the receiver snapshot
    /// from its feed plus the static donation addresses.
    pub fn apply_filter(&self, filter: TradeFilter) {
        let receivers =
            KnownFeeReceivers::from_sources(&filter.btc_fee_receiver_addresses, &DONATION_ADDRESSES);
        info!("Known BTC fee receivers: {}", receivers);
        *write_lock(&self.receivers) = receivers;
        *write_lock(&self.filter) = Some(filter);
    }

    pub fn known_receivers(&self) -> KnownFeeReceivers {
        read_lock(&self.receivers).clone()
    }

    /// Verifies a maker fee claim. Returns false only when admission was
    /// refused, in which case the handler is never invoked.
    pub fn validate_maker_tx(self: &Arc<Self>, claim: TransactionClaim, handler: ResultHandler) -> bool {
        if !self.is_service_supported() {
            self.deliver_bypassed(claim, handler);
            return true;
        }
        if !self.try_admit() {
            return false;
        }
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let path = format!("tx/{}", claim.tx_id());
            let mut claim = claim;
            match service.fetch(&path).await {
                FetchOutcome::Completed(body) => {
                    let receivers = service.known_receivers();
                    claim.validate_maker_fee(&body, &receivers, service.schedule.as_ref());
                }
                FetchOutcome::Failed => {
                    claim.record("Maker Tx not found", false);
                }
            }
            service.deliver(claim, handler, true);
        });
        true
    }

    /// Verifies a taker fee claim, same contract as `validate_maker_tx`.
    pub fn validate_taker_tx(self: &Arc<Self>, claim: TransactionClaim, handler: ResultHandler) -> bool {
        if !self.is_service_supported() {
            self.deliver_bypassed(claim, handler);
            return true;
        }
        if !self.try_admit() {
            return false;
        }
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let path = format!("tx/{}", claim.tx_id());
            let mut claim = claim;
            match service.fetch(&path).await {
                FetchOutcome::Completed(body) => {
                    let receivers = service.known_receivers();
                    claim.validate_taker_fee(&body, &receivers, service.schedule.as_ref());
                }
                FetchOutcome::Failed => {
                    claim.record("Taker Tx not found", false);
                }
            }
            service.deliver(claim, handler, true);
        });
        true
    }

    /// Counts confirmations of a transaction, the claim must carry the
    /// current chain height. Single attempt, no mirror rotation.
    pub fn check_tx_confirmed(self: &Arc<Self>, claim: TransactionClaim, handler: ResultHandler) -> bool {
        if !self.is_service_supported() {
            self.deliver_bypassed(claim, handler);
            return true;
        }
        if !self.try_admit() {
            return false;
        }
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let path = format!("tx/{}", claim.tx_id());
            let mut claim = claim;
            match service.fetch_once(&path).await {
                Ok(body) => {
                    claim.evaluate_confirmations(&body);
                }
                Err(e) => {
                    warn!("confirmation lookup for {} failed: {}", claim.tx_id(), e);
                    claim.record("Tx not found", false);
                }
            }
            service.deliver(claim, handler, true);
        });
        true
    }

    /// Fetches the outspends of a maker fee tx. The delivered claim
    /// carries the raw document for `deposit_tx_id_from_outspends`.
    pub fn fetch_maker_outspends(self: &Arc<Self>, claim: TransactionClaim, handler: ResultHandler) -> bool {
        if !self.is_service_supported() {
            self.deliver_bypassed(claim, handler);
            return true;
        }
        if !self.try_admit() {
            return false;
        }
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let path = format!("tx/{}/outspends", claim.tx_id());
            let mut claim = claim;
            match service.fetch_once(&path).await {
                Ok(body) => claim.set_response(&body),
                Err(e) => {
                    warn!("outspends lookup for {} failed: {}", claim.tx_id(), e);
                    claim.record("Tx not found", false);
                }
            }
            service.deliver(claim, handler, true);
        });
        true
    }

    /// Fetches a deposit tx for `taker_tx_id_from_deposit_tx`.
    pub fn fetch_deposit_tx(self: &Arc<Self>, claim: TransactionClaim, handler: ResultHandler) -> bool {
        if !self.is_service_supported() {
            self.deliver_bypassed(claim, handler);
            return true;
        }
        if !self.try_admit() {
            return false;
        }
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let path = format!("tx/{}", claim.tx_id());
            let mut claim = claim;
            match service.fetch_once(&path).await {
                Ok(body) => claim.set_response(&body),
                Err(e) => {
                    warn!("deposit tx lookup for {} failed: {}", claim.tx_id(), e);
                    claim.record("Tx not found", false);
                }
            }
            service.deliver(claim, handler, true);
        });
        true
    }

    pub fn outstanding_requests(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    pub fn can_request_be_made(&self) -> bool {
        self.outstanding.load(Ordering::SeqCst) < MAX_OUTSTANDING_REQUESTS
    }

    /// Forces the counter back to zero. Results still in flight release
    /// against the floor of zero instead of underflowing.
    pub fn reset_outstanding(&self) {
        self.outstanding.store(0, Ordering::SeqCst);
    }

    async fn fetch(&self, path: &str) -> FetchOutcome {
        let mut source = ExplorerRequest::new(self.http.clone(), self.mirrors.clone());
        fetch_with_failover(&mut source, path).await
    }

    /// Mirror rotation is reserved for the fee verifications proper,
    /// confirmation and chain walk lookups get one attempt against the
    /// first mirror.
    async fn fetch_once(&self, path: &str) -> Result<String, ExplorerError> {
        let mut source = ExplorerRequest::new(self.http.clone(), self.mirrors.clone());
        source.fetch(path).await
    }

    fn is_service_supported(&self) -> bool {
        let filter_disabled = read_lock(&self.filter)
            .as_ref()
            .map(|filter| filter.disable_fee_validation)
            .unwrap_or(false);
        if filter_disabled {
            info!("fee verification bypassed by filter setting disable_fee_validation=true");
            return false;
        }
        if self.bypass_fee_validation {
            info!("fee verification bypassed by config setting bypass_fee_validation=true");
            return false;
        }
        if !self.network.is_mainnet() {
            info!("fee verification only supports mainnet");
            return false;
        }
        true
    }

    fn deliver_bypassed(&self, mut claim: TransactionClaim, handler: ResultHandler) {
        claim.mark_bypassed();
        claim.record("fee validation bypassed", true);
        self.deliver_completion(Completion {
            claim,
            handler,
            holds_slot: false,
        });
    }

    fn deliver(&self, claim: TransactionClaim, handler: ResultHandler, holds_slot: bool) {
        self.deliver_completion(Completion {
            claim,
            handler,
            holds_slot,
        });
    }

    fn deliver_completion(&self, completion: Completion) {
        if self.completions.send(completion).is_err() {
            warn!("completion channel closed, dropping a verification result");
        }
    }

    fn try_admit(&self) -> bool {
        let admitted = self
            .outstanding
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |outstanding| {
                if outstanding < MAX_OUTSTANDING_REQUESTS {
                    Some(outstanding + 1)
                } else {
                    None
                }
            })
            .is_ok();
        if !admitted {
            warn!(
                "request refused, we already have {} outstanding requests",
                MAX_OUTSTANDING_REQUESTS
            );
        }
        admitted
    }

    fn release_slot(&self) {
        // checked_sub keeps a release after reset_outstanding at zero
        let _ = self
            .outstanding
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |outstanding| {
                outstanding.checked_sub(1)
            });
    }
}

fn read_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn write_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
