//! One idempotent handler per observed event kind, wired into the Event
//! Listener's callback sets. Every handler wraps its body in a try/recover:
//! a single failure is logged and swallowed rather than propagated, so one
//! bad event can never bring down the listening loop.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{error, info, warn};

use crate::chain_proxy::ProxyEvent;
use crate::chain_vault::{VaultEvent, VaultHandlers};
use crate::listener::{Handlers, ProxyHandlers};

use super::repository::Repository;

/// Serializes per-`vaultPositionId` mutations so two events for the same
/// position can never race each other inside the repository, while events
/// for different positions still run concurrently.
#[derive(Clone)]
pub struct PositionLocks {
	locks: Arc<DashMap<String, Arc<AsyncMutex<()>>>>,
}

impl Default for PositionLocks {
	fn default() -> Self {
		Self { locks: Arc::new(DashMap::new()) }
	}
}

impl PositionLocks {
	pub fn handle_for(&self, vault_position_id: &str) -> Arc<AsyncMutex<()>> {
		self.locks.entry(vault_position_id.to_string()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
	}
}

pub struct Persister {
	repository: Arc<Repository>,
	locks: PositionLocks,
}

impl Persister {
	pub fn new(repository: Arc<Repository>) -> Self {
		Self { repository, locks: PositionLocks::default() }
	}

	/// Read-only access to the backing repository, for callers (e.g. an API
	/// layer) that need to query position/user state directly rather than
	/// through an event handler.
	pub fn repository(&self) -> &Repository {
		&self.repository
	}

	/// Builds the `Handlers` registration the Event Listener expects, with
	/// `on_liquidation_completed` also driving the Settlement Coordinator:
	/// the Event Listener only accepts one registered callback set per
	/// event kind (registering replaces whatever was installed), so the
	/// settlement trigger is spliced into the persister's own callback
	/// rather than registered separately.
	pub fn handlers_with_settlement(
		self: &Arc<Self>,
		settlement: &Arc<crate::settlement::SettlementCoordinator>,
	) -> Handlers {
		let mut handlers = self.handlers();
		let persisted = handlers.proxy.as_ref().and_then(|proxy| proxy.on_liquidation_completed.clone());
		let settlement = settlement.clone();
		let combined: crate::listener::ProxyCallback = Arc::new(move |event| {
			if let Some(persisted) = &persisted {
				persisted(event.clone());
			}
			if let ProxyEvent::LiquidationCompleted { vault_position_id, received_amount, .. } = &event {
				settlement.spawn_settle(vault_position_id.clone(), *received_amount);
			}
		});
		if let Some(proxy) = handlers.proxy.as_mut() {
			proxy.on_liquidation_completed = Some(combined);
		}
		handlers
	}

	/// Builds the `Handlers` registration the Event Listener expects, with
	/// one closure per tracked event kind.
	pub fn handlers(self: &Arc<Self>) -> Handlers {
		let vault = self.clone();
		let proxy = self.clone();
		Handlers {
			vault: Some(VaultHandlers {
				on_deposit: Some(Arc::new({
					let this = vault.clone();
					move |event| this.spawn_handle_vault(event)
				})),
				on_withdrawal: Some(Arc::new({
					let this = vault.clone();
					move |event| this.spawn_handle_vault(event)
				})),
				on_investment_initiated: Some(Arc::new({
					let this = vault.clone();
					move |event| this.spawn_handle_vault(event)
				})),
				on_position_execution_confirmed: Some(Arc::new({
					let this = vault.clone();
					move |event| this.spawn_handle_vault(event)
				})),
				on_position_liquidated: Some(Arc::new({
					let this = vault.clone();
					move |event| this.spawn_handle_vault(event)
				})),
				on_liquidation_settled: Some(Arc::new({
					let this = vault.clone();
					move |event| this.spawn_handle_vault(event)
				})),
				on_chain_added: Some(Arc::new({
					let this = vault.clone();
					move |event| this.spawn_handle_vault(event)
				})),
				on_xcm_message_sent: Some(Arc::new({
					let this = vault.clone();
					move |event| this.spawn_handle_vault(event)
				})),
			}),
			proxy: Some(ProxyHandlers {
				on_assets_received: Some(Arc::new({
					let this = proxy.clone();
					move |event| this.spawn_handle_proxy(event)
				})),
				on_pending_position_created: Some(Arc::new({
					let this = proxy.clone();
					move |event| this.spawn_handle_proxy(event)
				})),
				on_position_executed: Some(Arc::new({
					let this = proxy.clone();
					move |event| this.spawn_handle_proxy(event)
				})),
				on_position_liquidated: Some(Arc::new({
					let this = proxy.clone();
					move |event| this.spawn_handle_proxy(event)
				})),
				on_liquidation_completed: Some(Arc::new({
					let this = proxy.clone();
					move |event| this.spawn_handle_proxy(event)
				})),
				on_assets_returned: Some(Arc::new({
					let this = proxy.clone();
					move |event| this.spawn_handle_proxy(event)
				})),
				on_pending_position_cancelled: Some(Arc::new({
					let this = proxy.clone();
					move |event| this.spawn_handle_proxy(event)
				})),
			}),
		}
	}

	fn spawn_handle_vault(self: &Arc<Self>, event: VaultEvent) {
		let this = self.clone();
		tokio::spawn(async move {
			if let Err(e) = this.handle_vault_event(event).await {
				error!(%e, "persister handler failed, event dropped");
			}
		});
	}

	fn spawn_handle_proxy(self: &Arc<Self>, event: ProxyEvent) {
		let this = self.clone();
		tokio::spawn(async move {
			if let Err(e) = this.handle_proxy_event(event).await {
				error!(%e, "persister handler failed, event dropped");
			}
		});
	}

	async fn handle_vault_event(&self, event: VaultEvent) -> crate::errors::Result<()> {
		match event {
			VaultEvent::Deposit { user_address, amount, .. } => {
				self.repository.upsert_user(&user_address).await?;
				info!(%user_address, %amount, "deposit recorded");
			},
			VaultEvent::Withdrawal { user_address, amount, .. } => {
				info!(%user_address, %amount, "withdrawal observed (analytics only)");
			},
			VaultEvent::InvestmentInitiated {
				vault_position_id,
				user_address,
				pool_address,
				amount,
				chain_id,
				tick_range,
				..
			} => {
				let lock = self.locks.handle_for(&vault_position_id);
				let _guard = lock.lock().await;

				let Some(user) = self.repository.get_user_by_address(&user_address).await? else {
					warn!(%user_address, %vault_position_id, "investment initiated for unknown user, dropping");
					return Ok(());
				};
				let Some(pool) = self.repository.get_pool_by_address(&pool_address).await? else {
					warn!(%pool_address, %vault_position_id, "investment initiated for unknown pool, dropping");
					return Ok(());
				};

				self.repository
					.insert_or_reset_position(
						&vault_position_id,
						user.id,
						pool.id,
						chain_id as i64,
						amount,
						tick_range.lower_percent,
						tick_range.upper_percent,
					)
					.await?;
			},
			VaultEvent::PositionExecutionConfirmed { vault_position_id, remote_position_id, liquidity, .. } => {
				let lock = self.locks.handle_for(&vault_position_id);
				let _guard = lock.lock().await;

				if self.repository.get_position_by_vault_id(&vault_position_id).await?.is_none() {
					warn!(%vault_position_id, "execution confirmed for unknown position, dropping");
					return Ok(());
				}
				self.repository.mark_position_active(&vault_position_id, &remote_position_id, liquidity).await?;
			},
			VaultEvent::PositionLiquidated { vault_position_id, final_amount, .. } => {
				let lock = self.locks.handle_for(&vault_position_id);
				let _guard = lock.lock().await;

				if self.repository.get_position_by_vault_id(&vault_position_id).await?.is_none() {
					warn!(%vault_position_id, "liquidation for unknown position, dropping");
					return Ok(());
				}
				self.repository.mark_position_liquidated(&vault_position_id, final_amount).await?;
			},
			VaultEvent::LiquidationSettled { vault_position_id, expected_amount, received_amount, .. } => {
				if !expected_amount.is_zero() && received_amount < expected_amount {
					let shortfall = expected_amount - received_amount;
					let slippage_bps = shortfall
						.checked_mul(10_000u64.into())
						.map(|scaled| scaled / expected_amount)
						.unwrap_or_default();
					warn!(%vault_position_id, %slippage_bps, "settlement received less than expected");
				}
			},
			VaultEvent::ChainAdded { chain_id, .. } => info!(chain_id, "chain added"),
			VaultEvent::XcmMessageSent { vault_position_id, .. } => info!(%vault_position_id, "xcm message sent"),
		}
		Ok(())
	}

	async fn handle_proxy_event(&self, event: ProxyEvent) -> crate::errors::Result<()> {
		match event {
			ProxyEvent::AssetsReceived { vault_position_id, .. } => {
				info!(%vault_position_id, "assets received on proxy (log only)");
			},
			ProxyEvent::PendingPositionCreated { vault_position_id, .. } => {
				info!(%vault_position_id, "pending position created on proxy (log only)");
			},
			ProxyEvent::PositionExecuted { vault_position_id, remote_position_id, liquidity, .. } => {
				let lock = self.locks.handle_for(&vault_position_id);
				let _guard = lock.lock().await;
				let updated = self
					.repository
					.update_proxy_position_best_effort(&vault_position_id, &remote_position_id, liquidity)
					.await?;
				if !updated {
					warn!(%vault_position_id, "position executed on proxy but no matching vault position");
				}
			},
			ProxyEvent::PositionLiquidated { vault_position_id, .. } => {
				info!(%vault_position_id, "position liquidated on proxy (log only)");
			},
			ProxyEvent::LiquidationCompleted { vault_position_id, .. } => {
				info!(%vault_position_id, "liquidation completed on proxy (log only)");
			},
			ProxyEvent::AssetsReturned { vault_position_id, .. } => {
				info!(%vault_position_id, "assets returned on proxy (log only)");
			},
			ProxyEvent::PendingPositionCancelled { vault_position_id, reason, .. } => {
				let lock = self.locks.handle_for(&vault_position_id);
				let _guard = lock.lock().await;
				if self.repository.get_position_by_vault_id(&vault_position_id).await?.is_none() {
					warn!(%vault_position_id, %reason, "cancellation for unknown position, dropping");
					return Ok(());
				}
				self.repository.mark_position_failed(&vault_position_id).await?;
			},
		}
		Ok(())
	}
}
