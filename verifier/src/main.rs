use std::{fs::File, io::Write, path::Path};

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use tokio::sync::oneshot;

use feeaudit_common::{
    config::VERSION,
    fee::{TradeRole, MAINNET_FEE_SCHEDULE},
    filter::TradeFilter,
};
use feeaudit_verifier::{
    claim::TransactionClaim,
    config::Config,
    logger,
    service::FeeVerificationService,
};

#[tokio::main]
async fn main() -> Result<()> {
    let mut config: Config = Config::parse();
    if let Some(path) = config.config_file.as_ref() {
        if config.generate_config_template {
            if Path::new(path).exists() {
                eprintln!("Config file already exists at {}", path);
                return Ok(());
            }
            let mut file = File::create(path).context("Error while creating config file")?;
            let json = serde_json::to_string_pretty(&config)
                .context("Error while serializing config file")?;
            file.write_all(json.as_bytes()).context("Error while writing config file")?;
            println!("Config file template generated at {}", path);
            return Ok(());
        }

        let file = File::open(path).context("Error while opening config file")?;
        config = serde_json::from_reader(file).context("Error while reading config file")?;
    } else if config.generate_config_template {
        eprintln!("Provided config file path is required to generate the template with --config-file");
        return Ok(());
    }

    logger::setup_logger(&config.log).context("Error while initializing logger")?;
    info!("feeaudit v{} on {}", VERSION, config.network);

    let service = FeeVerificationService::new(&config, MAINNET_FEE_SCHEDULE.clone())?;

    if let Some(path) = config.filter_file.as_ref() {
        let file = File::open(path).context("Error while opening filter file")?;
        let filter: TradeFilter =
            serde_json::from_reader(file).context("Error while reading filter file")?;
        service.apply_filter(filter);
    }

    let Some(tx_id) = config.tx_id.clone() else {
        error!("No transaction specified. Use --tx-id to name the claimed fee tx.");
        return Ok(());
    };

    let (done, verdict) = oneshot::channel();
    let handler = Box::new(move |claim: TransactionClaim| {
        let _ = done.send(claim);
    });

    let dispatched = match config.role {
        Some(TradeRole::Maker) => {
            let Some(trade_amount) = config.trade_amount else {
                error!("Maker claims need --trade-amount");
                return Ok(());
            };
            let Some(fee_currency) = config.fee_currency else {
                error!("Maker claims need --fee-currency");
                return Ok(());
            };
            let claim = TransactionClaim::maker(tx_id, trade_amount, fee_currency, config.height_hint);
            service.validate_maker_tx(claim, handler)
        }
        Some(TradeRole::Taker) => {
            let Some(trade_amount) = config.trade_amount else {
                error!("Taker claims need --trade-amount");
                return Ok(());
            };
            let claim = TransactionClaim::taker(tx_id, trade_amount, config.fee_currency);
            service.validate_taker_tx(claim, handler)
        }
        None => {
            let Some(chain_height) = config.chain_height else {
                error!("Confirmation checks need --chain-height");
                return Ok(());
            };
            let claim = TransactionClaim::for_confirmation(tx_id, chain_height);
            service.check_tx_confirmed(claim, handler)
        }
    };
    if !dispatched {
        error!("The verification service refused the request");
        std::process::exit(1);
    }

    let claim = verdict.await.context("verification result was dropped")?;
    match config.role {
        Some(_) => {
            if claim.is_success() {
                if claim.was_bypassed() {
                    info!("fee claim for {} accepted without verification", claim.tx_id());
                } else {
                    info!("fee claim for {} accepted", claim.tx_id());
                }
                println!("ACCEPTED");
            } else {
                error!("fee claim for {} rejected: {}", claim.tx_id(), claim.error_summary());
                println!("REJECTED");
                std::process::exit(1);
            }
        }
        None => {
            let confirms = claim.confirmations().unwrap_or(-1);
            if claim.is_fail() || confirms < 0 {
                error!("confirmation check for {} failed: {}", claim.tx_id(), claim.error_summary());
                println!("UNKNOWN");
                std::process::exit(1);
            }
            println!("{} confirmations", confirms);
        }
    }

    Ok(())
}
