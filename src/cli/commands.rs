//! CLI command implementations

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use dialoguer::Confirm;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::format::{format_ether, format_time_left, render_session, render_snapshot, render_status};
use crate::network::wrong_network_warning;
use crate::vault::{OperationStatus, Receipt, VaultController, VaultSnapshot};
use crate::wallet::{parse_address, LocalWallet, WalletProvider};

/// Machine-readable `status --json` output
#[derive(Debug, Serialize)]
struct StatusReport {
    account: Option<String>,
    network_id: Option<u64>,
    eligible: bool,
    contract_address: String,
    time_left: Option<String>,
    balance_ether: Option<String>,
    snapshot: Option<VaultSnapshot>,
    status: OperationStatus,
}

/// Bring up a wallet session and network-gated vault client
async fn open_session(config: &Config) -> Result<(Arc<LocalWallet>, Arc<VaultController>)> {
    let wallet = Arc::new(LocalWallet::from_env(&config.network.rpc_url)?);
    let provider: Arc<dyn WalletProvider> = wallet.clone();
    let controller = Arc::new(VaultController::new(config, Some(provider))?);

    let network_id = controller
        .sync_network()
        .await
        .context("Failed to read network from RPC endpoint")?;
    debug!("RPC endpoint reports chain id {}", network_id);

    let account = match controller.connect().await {
        Ok(account) => account,
        Err(e) if e.is_user_rejection() => {
            bail!("Wallet connection failed: {} (is PRIVATE_KEY set?)", e)
        }
        Err(e) => return Err(e.into()),
    };
    info!("Connected as {}", account);

    Ok((wallet, controller))
}

/// Fail with the switch-network warning unless the vault client exists
fn ensure_eligible(config: &Config, controller: &VaultController) -> Result<()> {
    if !controller.state().view().eligible {
        bail!(wrong_network_warning(
            &config.network.name,
            config.network.required_chain_id
        ));
    }
    Ok(())
}

/// Report a transaction outcome; a refusal in the wallet is not a failure
fn report_action(result: crate::Result<Receipt>, controller: &VaultController) -> Result<bool> {
    println!("{}", render_status(&controller.state().status()));
    match result {
        Ok(receipt) => {
            println!("Transaction: {}", receipt.tx_hash);
            Ok(true)
        }
        Err(e) if e.is_user_rejection() => {
            println!("Declined in wallet; nothing was sent.");
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

/// Show the vault countdown, balance, owner and beneficiary
pub async fn status(config: &Config, json: bool) -> Result<()> {
    let (_wallet, controller) = open_session(config).await?;
    let refreshed = if controller.has_client() {
        Some(controller.refresh().await)
    } else {
        None
    };
    let state = controller.state();

    if json {
        let view = state.view();
        let snapshot = state.snapshot();
        let report = StatusReport {
            account: view.account.map(|a| a.to_checksum(None)),
            network_id: view.network_id,
            eligible: view.eligible,
            contract_address: controller.contract_address().to_checksum(None),
            time_left: snapshot.as_ref().map(|s| format_time_left(s.time_left_seconds)),
            balance_ether: snapshot.as_ref().map(|s| format_ether(s.balance_wei)),
            snapshot,
            status: state.status(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("\n=== LEGACY VAULT ===\n");
        println!("Contract:    {}", controller.contract_address().to_checksum(None));
        println!(
            "{}",
            render_session(
                &state.view(),
                &config.network.name,
                config.network.required_chain_id
            )
        );
        match state.snapshot() {
            Some(snapshot) => println!("{}", render_snapshot(&snapshot)),
            None => println!("Vault data unavailable."),
        }
    }

    controller.shutdown();
    ensure_eligible(config, &controller)?;
    if let Some(refreshed) = refreshed {
        refreshed?;
    }
    Ok(())
}

/// Follow the vault until Ctrl+C, printing every change
pub async fn watch(config: &Config) -> Result<()> {
    let (wallet, controller) = open_session(config).await?;
    let state = controller.state().clone();

    let cancel = CancellationToken::new();
    let watcher = wallet.watch_network(config.poll_interval(), cancel.clone());
    let runner = tokio::spawn(controller.clone().run(cancel.clone()));

    let mut view = state.subscribe_view();
    let mut snapshot = state.subscribe_snapshot();
    let mut status = state.subscribe_status();

    println!("Watching vault {} (Ctrl+C to stop)", controller.contract_address());
    // On the wrong network this shows the warning; the poller starts once the wallet switches
    println!(
        "{}",
        render_session(&state.view(), &config.network.name, config.network.required_chain_id)
    );

    loop {
        tokio::select! {
            Ok(()) = view.changed() => {
                let current = *view.borrow_and_update();
                println!(
                    "{}",
                    render_session(&current, &config.network.name, config.network.required_chain_id)
                );
            }
            Ok(()) = snapshot.changed() => {
                if let Some(current) = snapshot.borrow_and_update().clone() {
                    println!("\n{}", render_snapshot(&current));
                }
            }
            Ok(()) = status.changed() => {
                let line = render_status(&status.borrow_and_update());
                if !line.is_empty() {
                    println!("{}", line);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
            else => break,
        }
    }

    cancel.cancel();
    if let Err(e) = runner.await? {
        warn!("Controller exited with error: {}", e);
    }
    watcher.await?;

    Ok(())
}

/// Send keepAlive to reset the inactivity timer
pub async fn heartbeat(config: &Config, force: bool) -> Result<()> {
    let (_wallet, controller) = open_session(config).await?;
    ensure_eligible(config, &controller)?;

    if !force {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Send keepAlive to vault {}? This costs gas.",
                controller.contract_address()
            ))
            .default(true)
            .interact()?;

        if !confirmed {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let result = controller.heartbeat().await;
    if report_action(result, &controller)? {
        if let Some(snapshot) = controller.state().snapshot() {
            println!("Time left:   {}", format_time_left(snapshot.time_left_seconds));
        }
    }

    controller.shutdown();
    Ok(())
}

/// Assign a new beneficiary
pub async fn set_beneficiary(config: &Config, beneficiary: &str, force: bool) -> Result<()> {
    // Malformed input never reaches the wallet
    let address = parse_address(beneficiary).context("Invalid address.")?;
    let (_wallet, controller) = open_session(config).await?;
    ensure_eligible(config, &controller)?;

    if !force {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Set beneficiary of vault {} to {}? This cannot be undone.",
                controller.contract_address(),
                address
            ))
            .default(false)
            .interact()?;

        if !confirmed {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let result = controller.set_beneficiary(beneficiary).await;
    report_action(result, &controller)?;

    controller.shutdown();
    Ok(())
}

/// Show current configuration (secrets masked)
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.masked_display());
    Ok(())
}
