//! Dispatcher (C8): `dispatchInvestmentWithXcm`, the single entry point
//! that turns an investment request into a submitted, XCM-wrapped Vault
//! transaction.

use std::sync::Arc;

use tracing::info;

use crate::chain_vault::{client::extract_vault_position_id, DispatchInvestmentRequest, VaultClient};
use crate::errors::{CoordinatorError, Result};
use crate::settings;
use crate::xcm_builder::{self, InvestmentXcmParams};

pub struct Dispatcher {
	vault: Arc<VaultClient>,
	vault_address: String,
	proxy_address: String,
	execution_para_id: u32,
}

impl Dispatcher {
	pub fn new(
		vault: Arc<VaultClient>,
		vault_settings: &settings::Vault,
		proxy_settings: &settings::Proxy,
	) -> Self {
		Self {
			vault,
			vault_address: vault_settings.contract_address.clone(),
			proxy_address: proxy_settings.contract_address.clone(),
			execution_para_id: proxy_settings.execution_para_id,
		}
	}

	/// 1. builds XCM params, 2. dry-runs them (fails fast on `!success`),
	/// 3. builds the real program, 4. submits it to the Vault, 5. extracts
	/// and returns the minted `vaultPositionId`.
	pub async fn dispatch_investment_with_xcm(&self, request: &DispatchInvestmentRequest) -> Result<String> {
		let params = InvestmentXcmParams {
			amount: request.amount,
			proxy_address: self.proxy_address.clone(),
			vault_address: self.vault_address.clone(),
			user_address: request.user_address.clone(),
			pool_id: request.pool_address.clone(),
			chain_id: request.chain_id,
			execution_para_id: self.execution_para_id,
			tick_range: xcm_builder::TickRange {
				lower_percent_bps: request.tick_range.lower_percent,
				upper_percent_bps: request.tick_range.upper_percent,
			},
		};

		let dry_run = xcm_builder::dry_run_investment(&params)?;
		if !dry_run.success {
			return Err(CoordinatorError::XcmBuild(format!(
				"dry run failed: {}",
				dry_run.failure_reason.unwrap_or_else(|| "unknown reason".to_string())
			)));
		}

		let program = xcm_builder::build_investment_program(&params)?;

		let (tx_hash, events) =
			self.vault.dispatch_investment(request, program.destination, program.message).await?;

		let vault_position_id = extract_vault_position_id(&events).ok_or_else(|| {
			CoordinatorError::XcmExecute {
				message: format!("no InvestmentInitiated event in receipt for tx {tx_hash}"),
				should_retry: false,
			}
		})?;

		info!(%tx_hash, %vault_position_id, "investment dispatched");
		Ok(vault_position_id)
	}
}
