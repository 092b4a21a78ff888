//! Event Listener (C6): fans the two chain clients' event streams into
//! uniform typed events plus a statistics struct, with an atomically
//! replaceable callback registration.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::chain_proxy::{ProxyClient, ProxyEvent};
use crate::chain_vault::{VaultClient, VaultEvent, VaultHandlers};

pub type ProxyCallback = Arc<dyn Fn(ProxyEvent) + Send + Sync>;

#[derive(Clone, Default)]
pub struct ProxyHandlers {
	pub on_assets_received: Option<ProxyCallback>,
	pub on_pending_position_created: Option<ProxyCallback>,
	pub on_position_executed: Option<ProxyCallback>,
	pub on_position_liquidated: Option<ProxyCallback>,
	pub on_liquidation_completed: Option<ProxyCallback>,
	pub on_assets_returned: Option<ProxyCallback>,
	pub on_pending_position_cancelled: Option<ProxyCallback>,
}

impl ProxyHandlers {
	pub fn dispatch(&self, event: &ProxyEvent) {
		let callback = match event {
			ProxyEvent::AssetsReceived { .. } => &self.on_assets_received,
			ProxyEvent::PendingPositionCreated { .. } => &self.on_pending_position_created,
			ProxyEvent::PositionExecuted { .. } => &self.on_position_executed,
			ProxyEvent::PositionLiquidated { .. } => &self.on_position_liquidated,
			ProxyEvent::LiquidationCompleted { .. } => &self.on_liquidation_completed,
			ProxyEvent::AssetsReturned { .. } => &self.on_assets_returned,
			ProxyEvent::PendingPositionCancelled { .. } => &self.on_pending_position_cancelled,
		};
		if let Some(callback) = callback {
			callback(event.clone());
		}
	}
}

#[derive(Clone, Default)]
pub struct Handlers {
	pub vault: Option<VaultHandlers>,
	pub proxy: Option<ProxyHandlers>,
}

#[derive(Debug, Clone, Default)]
pub struct ListenerStats {
	pub counts: HashMap<&'static str, u64>,
	pub last_event_time: Option<DateTime<Utc>>,
	pub is_listening: bool,
}

pub struct EventListener {
	vault: Arc<VaultClient>,
	proxy: Arc<ProxyClient>,
	handlers: Arc<RwLock<Handlers>>,
	stats: Arc<Mutex<ListenerStats>>,
	running: Arc<AtomicBool>,
	cancellation: Mutex<Option<CancellationToken>>,
	tasks: Mutex<Option<JoinSet<()>>>,
}

impl EventListener {
	pub fn new(vault: Arc<VaultClient>, proxy: Arc<ProxyClient>) -> Self {
		Self {
			vault,
			proxy,
			handlers: Arc::new(RwLock::new(Handlers::default())),
			stats: Arc::new(Mutex::new(ListenerStats::default())),
			running: Arc::new(AtomicBool::new(false)),
			cancellation: Mutex::new(None),
			tasks: Mutex::new(None),
		}
	}

	pub fn is_listening(&self) -> bool {
		self.running.load(Ordering::SeqCst)
	}

	/// Replaces the current callback set. If already listening, restarts
	/// both subscriptions so the new set takes effect immediately.
	pub async fn register_handlers(&self, handlers: Handlers) {
		*self.handlers.write().await = handlers;
		if self.is_listening() {
			self.stop_listening().await;
			self.start_listening().await;
		}
	}

	pub async fn start_listening(&self) {
		if self.running.swap(true, Ordering::SeqCst) {
			return;
		}
		let cancellation = CancellationToken::new();
		*self.cancellation.lock().await = Some(cancellation.clone());

		let (vault_tx, mut vault_rx) = mpsc::unbounded_channel::<VaultEvent>();
		let (proxy_tx, mut proxy_rx) = mpsc::unbounded_channel::<ProxyEvent>();

		let mut tasks = JoinSet::new();

		{
			let vault = self.vault.clone();
			let token = cancellation.clone();
			tasks.spawn(async move { vault.subscribe_events(vault_tx, token).await });
		}
		{
			let proxy = self.proxy.clone();
			let token = cancellation.clone();
			tasks.spawn(async move { proxy.subscribe_events(proxy_tx, token).await });
		}

		{
			let handlers = self.handlers.clone();
			let stats = self.stats.clone();
			let token = cancellation.clone();
			tasks.spawn(async move {
				loop {
					tokio::select! {
						biased;
						_ = token.cancelled() => return,
						event = vault_rx.recv() => {
							let Some(event) = event else { return };
							record_event(&stats, event.kind()).await;
							if let Some(vault_handlers) = handlers.read().await.vault.as_ref() {
								vault_handlers.dispatch(&event);
							}
						},
					}
				}
			});
		}
		{
			let handlers = self.handlers.clone();
			let stats = self.stats.clone();
			let token = cancellation.clone();
			tasks.spawn(async move {
				loop {
					tokio::select! {
						biased;
						_ = token.cancelled() => return,
						event = proxy_rx.recv() => {
							let Some(event) = event else { return };
							record_event(&stats, event.kind()).await;
							if let Some(proxy_handlers) = handlers.read().await.proxy.as_ref() {
								proxy_handlers.dispatch(&event);
							}
						},
					}
				}
			});
		}

		*self.tasks.lock().await = Some(tasks);
		self.stats.lock().await.is_listening = true;
		info!("event listener started");
	}

	/// Detaches all subscriptions on both chain clients.
	pub async fn stop_listening(&self) {
		if !self.running.swap(false, Ordering::SeqCst) {
			return;
		}
		if let Some(token) = self.cancellation.lock().await.take() {
			token.cancel();
		}
		if let Some(mut tasks) = self.tasks.lock().await.take() {
			while tasks.join_next().await.is_some() {}
		}
		self.stats.lock().await.is_listening = false;
		info!("event listener stopped");
	}

	pub async fn get_stats(&self) -> ListenerStats {
		self.stats.lock().await.clone()
	}

	pub async fn reset_stats(&self) {
		let mut stats = self.stats.lock().await;
		let is_listening = stats.is_listening;
		*stats = ListenerStats { is_listening, ..ListenerStats::default() };
	}
}

async fn record_event(stats: &Arc<Mutex<ListenerStats>>, kind: &'static str) {
	let mut stats = stats.lock().await;
	*stats.counts.entry(kind).or_insert(0) += 1;
	stats.last_event_time = Some(Utc::now());
}
