//! Settlement Coordinator (C9): reacts to `LiquidationCompleted` on the
//! Proxy and settles the corresponding Vault position at most once.

use std::collections::HashSet;
use std::sync::Arc;

use ethers::types::U256;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::chain_proxy::ProxyClient;
use crate::chain_vault::VaultClient;
use crate::errors::Result;
use crate::testmode::TestModeController;
use crate::xcm_builder;

/// Weight budget for the Vault-side `settleLiquidation` call wrapped inside
/// the remote-execute instruction the Proxy submits in production.
const SETTLEMENT_TRANSACT_WEIGHT: u64 = 1_000_000_000;

pub struct SettlementCoordinator {
	vault: Arc<VaultClient>,
	proxy: Arc<ProxyClient>,
	test_mode: Arc<TestModeController>,
	vault_address: String,
	custodial_para_id: u32,
	enable_passethub_transact_settlement: bool,
	remote_endpoint_configured: bool,
	settled: Mutex<HashSet<String>>,
}

impl SettlementCoordinator {
	pub fn new(
		vault: Arc<VaultClient>,
		proxy: Arc<ProxyClient>,
		test_mode: Arc<TestModeController>,
		vault_address: String,
		custodial_para_id: u32,
		enable_passethub_transact_settlement: bool,
		remote_endpoint_configured: bool,
	) -> Self {
		Self {
			vault,
			proxy,
			test_mode,
			vault_address,
			custodial_para_id,
			enable_passethub_transact_settlement,
			remote_endpoint_configured,
			settled: Mutex::new(HashSet::new()),
		}
	}

	/// Called for every `LiquidationCompleted` event observed on the Proxy.
	/// `total_base` is the authoritative amount computed on-chain.
	pub async fn settle(&self, vault_position_id: &str, total_base: U256) -> Result<()> {
		{
			let mut settled = self.settled.lock().await;
			if !settled.insert(vault_position_id.to_string()) {
				info!(%vault_position_id, "settlement already submitted, skipping duplicate");
				return Ok(());
			}
		}

		let result = if self.test_mode.should_skip_xcm() {
			self.vault.settle_liquidation(vault_position_id, total_base).await.map(|_| ())
		} else {
			self.settle_via_remote_transact(vault_position_id, total_base).await
		};

		if result.is_err() {
			// Allow a future retry attempt: a failed submission never
			// reached the chain, so it should not count against the
			// at-most-once guard.
			self.settled.lock().await.remove(vault_position_id);
		}
		result
	}

	async fn settle_via_remote_transact(&self, vault_position_id: &str, total_base: U256) -> Result<()> {
		let inner_call = xcm_builder::build_settlement_inner_call(
			self.enable_passethub_transact_settlement,
			self.remote_endpoint_configured,
			&self.vault_address,
			vault_position_id,
			total_base,
		)?;

		let tx_hash = self
			.proxy
			.submit_remote_transact(self.custodial_para_id, &inner_call, SETTLEMENT_TRANSACT_WEIGHT)
			.await?;
		info!(%vault_position_id, %tx_hash, "settlement submitted via remote transact");
		Ok(())
	}
}

impl SettlementCoordinator {
	/// Fire-and-forget entry point for the Event Listener's
	/// `LiquidationCompleted` callback: settlement must never block event
	/// dispatch, so failures are logged rather than propagated.
	pub fn spawn_settle(self: &Arc<Self>, vault_position_id: String, total_base: U256) {
		let this = self.clone();
		tokio::spawn(async move {
			if let Err(e) = this.settle(&vault_position_id, total_base).await {
				warn!(%vault_position_id, %e, "settlement attempt failed");
			}
		});
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::settings;
	use tokio_util::sync::CancellationToken;

	fn test_clients() -> (Arc<VaultClient>, Arc<ProxyClient>) {
		let settings = settings::Settings::new_test();
		let vault = Arc::new(
			VaultClient::new(&settings.vault, Default::default(), CancellationToken::new()).unwrap(),
		);
		let proxy = Arc::new(
			ProxyClient::new(&settings.proxy, Default::default(), CancellationToken::new()).unwrap(),
		);
		(vault, proxy)
	}

	#[tokio::test]
	async fn settle_is_idempotent_in_memory() {
		let (vault, proxy) = test_clients();
		let test_mode = Arc::new(TestModeController::new(true));
		let coordinator = SettlementCoordinator::new(
			vault,
			proxy,
			test_mode,
			"0x2222222222222222222222222222222222222222".into(),
			1000,
			false,
			false,
		);

		let mut settled = coordinator.settled.lock().await;
		assert!(settled.insert("pos-1".to_string()));
		assert!(!settled.insert("pos-1".to_string()));
	}
}
