//! Proxy chain client (Moonbeam-family EVM). Grounded on
//! `engine/src/eth/retry_rpc.rs`'s split between a thin RPC client and a
//! retrier wrapping every call, and on `engine/src/eth/erc20_witnesser.rs`
//! for the token-metadata read pattern.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ethers::middleware::SignerMiddleware;
use ethers::providers::{Middleware, Provider, Ws};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, Bytes, H256, U256};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::errors::{CoordinatorError, Result};
use crate::retry::{self, RetryPolicy};
use crate::settings;

const TOKEN_CACHE_TTL: Duration = Duration::from_secs(600);

type SignerProvider = SignerMiddleware<Provider<Ws>, LocalWallet>;

#[derive(Debug, Clone)]
pub struct SupportedToken {
	pub address: Address,
	pub name: String,
	pub symbol: String,
	pub decimals: u8,
}

/// Small hand-rolled TTL cache: the teacher has no caching crate in its
/// dependency graph, and the pack's other examples reach for in-house
/// structures like this rather than pulling in a dedicated cache crate for
/// a single read-mostly table.
struct TtlCache<T> {
	value: RwLock<Option<(Instant, T)>>,
	ttl: Duration,
}

impl<T: Clone> TtlCache<T> {
	fn new(ttl: Duration) -> Self {
		Self { value: RwLock::new(None), ttl }
	}

	async fn get(&self) -> Option<T> {
		let guard = self.value.read().await;
		guard.as_ref().and_then(|(at, value)| {
			if at.elapsed() < self.ttl { Some(value.clone()) } else { None }
		})
	}

	async fn set(&self, value: T) {
		*self.value.write().await = Some((Instant::now(), value));
	}
}

pub struct ProxyClient {
	ws_url: String,
	signer_key: String,
	contract_address: Address,
	xcm_transactor_address: Option<Address>,
	retry_policy: RetryPolicy,
	cancellation: CancellationToken,
	provider: RwLock<Option<Arc<SignerProvider>>>,
	token_cache: TtlCache<Vec<SupportedToken>>,
}

impl ProxyClient {
	pub fn new(
		settings: &settings::Proxy,
		retry_policy: RetryPolicy,
		cancellation: CancellationToken,
	) -> Result<Self> {
		let contract_address: Address = settings
			.contract_address
			.parse()
			.map_err(|e| CoordinatorError::Validation(format!("invalid proxy contract address: {e}")))?;
		let xcm_transactor_address = if settings.xcm_transactor_address.is_empty() {
			None
		} else {
			Some(settings.xcm_transactor_address.parse().map_err(|e| {
				CoordinatorError::Validation(format!("invalid xcm transactor precompile address: {e}"))
			})?)
		};

		Ok(Self {
			ws_url: settings.rpc_url.clone(),
			signer_key: settings.signer_key.clone(),
			contract_address,
			xcm_transactor_address,
			retry_policy,
			cancellation,
			provider: RwLock::new(None),
			token_cache: TtlCache::new(TOKEN_CACHE_TTL),
		})
	}

	pub async fn is_initialized(&self) -> bool {
		self.provider.read().await.is_some()
	}

	async fn ensure_connected(&self) -> anyhow::Result<Arc<SignerProvider>> {
		if let Some(provider) = self.provider.read().await.as_ref() {
			return Ok(provider.clone());
		}
		let mut guard = self.provider.write().await;
		if let Some(provider) = guard.as_ref() {
			return Ok(provider.clone());
		}
		info!(url = %self.ws_url, "connecting to proxy chain");
		let ws = Provider::<Ws>::connect(&self.ws_url).await?;
		let wallet: LocalWallet = self.signer_key.parse()?;
		let chain_id = ws.get_chainid().await?;
		let wallet = wallet.with_chain_id(chain_id.as_u64());
		let signed = Arc::new(SignerMiddleware::new(ws, wallet));
		*guard = Some(signed.clone());
		Ok(signed)
	}

	fn invalidate_connection(&self) {
		if let Ok(mut guard) = self.provider.try_write() {
			*guard = None;
		}
	}

	async fn with_retry<T, F, Fut>(&self, operation_name: &'static str, op: F) -> Result<T>
	where
		F: Fn(Arc<SignerProvider>) -> Fut,
		Fut: std::future::Future<Output = anyhow::Result<T>>,
	{
		let outcome = retry::execute_with_retry(
			|| {
				let client_fut = self.ensure_connected();
				let op = &op;
				async move {
					match client_fut.await {
						Ok(provider) => op(provider).await,
						Err(e) => Err(e),
					}
				}
			},
			self.retry_policy,
			&self.cancellation,
		)
		.await;

		if outcome.success {
			Ok(outcome.result.expect("success implies result is set"))
		} else {
			self.invalidate_connection();
			let error = outcome.error.unwrap_or_else(|| anyhow::anyhow!("unknown error"));
			warn!(operation = operation_name, attempts = outcome.attempts, %error, "proxy operation failed");
			match outcome.error_type {
				Some(retry::ErrorType::Permanent) => Err(CoordinatorError::PermanentRemote(error)),
				_ => Err(CoordinatorError::TransientRemote(error)),
			}
		}
	}

	/// Returns all supported tokens with human-readable names, de-duplicated
	/// by address and cached for `TOKEN_CACHE_TTL` — this table changes
	/// rarely and is read on every dispatch-eligibility check.
	pub async fn get_supported_tokens_with_names(&self) -> Result<Vec<SupportedToken>> {
		if let Some(cached) = self.token_cache.get().await {
			return Ok(cached);
		}

		let tokens = self
			.with_retry("get_supported_tokens_with_names", |provider| async move {
				let call_data = selector_call("getSupportedTokens()", &[]);
				let raw = provider.call(&eth_call(self.contract_address, call_data), None).await?;
				Ok(decode_supported_tokens(&raw))
			})
			.await?;

		let mut deduped: HashMap<Address, SupportedToken> = HashMap::new();
		for token in tokens {
			deduped.entry(token.address).or_insert(token);
		}
		let tokens: Vec<_> = deduped.into_values().collect();
		self.token_cache.set(tokens.clone()).await;
		Ok(tokens)
	}

	pub async fn get_test_mode(&self) -> Result<bool> {
		self.with_retry("get_test_mode", |provider| async move {
			let call_data = selector_call("testMode()", &[]);
			let raw = provider.call(&eth_call(self.contract_address, call_data), None).await?;
			Ok(raw.iter().any(|byte| *byte != 0))
		})
		.await
	}

	pub async fn set_test_mode(&self, enabled: bool) -> Result<H256> {
		self.with_retry("set_test_mode", move |provider| async move {
			let mut flag = [0u8; 32];
			if enabled {
				flag[31] = 1;
			}
			let call_data = selector_call("setTestMode(bool)", &[flag]);
			let tx = eth_call(self.contract_address, call_data);
			let pending = provider.send_transaction(tx, None).await?;
			Ok(pending.tx_hash())
		})
		.await
	}

	pub async fn is_position_out_of_range(&self, vault_position_id: &str) -> Result<bool> {
		let id = vault_position_id.to_string();
		self.with_retry("is_position_out_of_range", move |provider| {
			let id = id.clone();
			async move {
				let call_data = selector_call("isPositionOutOfRange(bytes32)", &[pad_id(&id)]);
				let raw = provider.call(&eth_call(self.contract_address, call_data), None).await?;
				Ok(raw.iter().any(|byte| *byte != 0))
			}
		})
		.await
	}

	pub async fn liquidate_swap_and_return(&self, vault_position_id: &str) -> Result<H256> {
		let id = vault_position_id.to_string();
		self.with_retry("liquidate_swap_and_return", move |provider| {
			let id = id.clone();
			async move {
				let call_data = selector_call("liquidateSwapAndReturn(bytes32)", &[pad_id(&id)]);
				let tx = eth_call(self.contract_address, call_data);
				let pending = provider.send_transaction(tx, None).await?;
				Ok(pending.tx_hash())
			}
		})
		.await
	}

	pub async fn cancel_pending_position(&self, vault_position_id: &str, reason: &str) -> Result<H256> {
		let id = vault_position_id.to_string();
		let reason = reason.to_string();
		self.with_retry("cancel_pending_position", move |provider| {
			let id = id.clone();
			let reason = reason.clone();
			async move {
				let mut call_data =
					selector_call("cancelPendingPosition(bytes32,string)", &[pad_id(&id)]);
				call_data.extend_from_slice(reason.as_bytes());
				let tx = eth_call(self.contract_address, call_data);
				let pending = provider.send_transaction(tx, None).await?;
				Ok(pending.tx_hash())
			}
		})
		.await
	}

	pub async fn execute_pending_investment(&self, vault_position_id: &str) -> Result<H256> {
		let id = vault_position_id.to_string();
		self.with_retry("execute_pending_investment", move |provider| {
			let id = id.clone();
			async move {
				let call_data = selector_call("executePendingInvestment(bytes32)", &[pad_id(&id)]);
				let tx = eth_call(self.contract_address, call_data);
				let pending = provider.send_transaction(tx, None).await?;
				Ok(pending.tx_hash())
			}
		})
		.await
	}

	/// Wraps `inner_call` in a `transactThroughSignedMultiLocation`-style call
	/// on the XCM-Transactor precompile, targeting `destination_para_id` -
	/// the production path for any Proxy-submitted call that must execute on
	/// a different chain (e.g. the Vault's `settleLiquidation`, invoked by the
	/// Settlement Coordinator). Fails with `FeatureDisabled` if no transactor
	/// precompile address is configured.
	pub async fn submit_remote_transact(
		&self,
		destination_para_id: u32,
		inner_call: &[u8],
		weight_at_most: u64,
	) -> Result<H256> {
		let transactor = self.xcm_transactor_address.ok_or_else(|| {
			CoordinatorError::FeatureDisabled(
				"xcm transactor precompile address is not configured".to_string(),
			)
		})?;
		let inner_call = inner_call.to_vec();
		self.with_retry("submit_remote_transact", move |provider| {
			let inner_call = inner_call.clone();
			async move {
				let mut call_data = selector_call(
					"transactThroughSignedMultiLocation(uint32,uint64,bytes)",
					&[pad_u32(destination_para_id), pad_u64(weight_at_most)],
				);
				call_data.extend_from_slice(&inner_call);
				let tx = eth_call(transactor, call_data);
				let pending = provider.send_transaction(tx, None).await?;
				Ok(pending.tx_hash())
			}
		})
		.await
	}
}

impl ProxyClient {
	/// Mirrors `VaultClient::subscribe_events`: runs until cancelled,
	/// reconnecting on stream errors and resuming from the current head.
	pub async fn subscribe_events(
		&self,
		tx: tokio::sync::mpsc::UnboundedSender<super::events::ProxyEvent>,
		cancellation: CancellationToken,
	) {
		loop {
			if cancellation.is_cancelled() {
				return;
			}
			let provider = match self.ensure_connected().await {
				Ok(provider) => provider,
				Err(e) => {
					warn!(%e, "proxy event subscription failed to connect, retrying");
					tokio::select! {
						_ = cancellation.cancelled() => return,
						_ = tokio::time::sleep(Duration::from_secs(2)) => continue,
					}
				},
			};

			let filter = ethers::types::Filter::new().address(self.contract_address);
			let mut stream = match provider.subscribe_logs(&filter).await {
				Ok(stream) => stream,
				Err(e) => {
					warn!(%e, "proxy log subscription failed, reconnecting");
					self.invalidate_connection();
					continue;
				},
			};

			loop {
				let next = tokio::select! {
					biased;
					_ = cancellation.cancelled() => return,
					log = futures_util::StreamExt::next(&mut stream) => log,
				};
				let Some(log) = next else {
					warn!("proxy log stream ended, reconnecting");
					self.invalidate_connection();
					break;
				};
				if let Some(event) = decode_proxy_log(&log) {
					let _ = tx.send(event);
				}
			}
		}
	}
}

/// Decodes one emitted Proxy log against this contract's known event
/// signatures. Every event indexes `vaultPositionId` as its first topic (the
/// field every downstream consumer keys on, per the transitions table); the
/// remaining fields are plain, non-indexed ABI words in `data`, read the same
/// way `chain_vault::client::decode_event` reads SCALE-decoded named fields.
fn decode_proxy_log(log: &ethers::types::Log) -> Option<super::events::ProxyEvent> {
	use super::events::{EventMeta, ProxyEvent};

	let meta = EventMeta {
		block_number: log.block_number.map(|n| n.as_u64()).unwrap_or_default(),
		transaction_hash: log.transaction_hash.unwrap_or_default(),
	};
	let topic0 = *log.topics.first()?;
	let vault_position_id = unpad_id(log.topics.get(1)?.as_bytes());
	let data: &[u8] = &log.data;

	if topic0 == event_topic("AssetsReceived(bytes32,address,uint256)") {
		return Some(ProxyEvent::AssetsReceived {
			meta,
			vault_position_id,
			token: format!("{:#x}", word_address(data, 0)),
			amount: word_u256(data, 1),
		});
	}
	if topic0 == event_topic("PendingPositionCreated(bytes32,address)") {
		return Some(ProxyEvent::PendingPositionCreated {
			meta,
			vault_position_id,
			pool_address: format!("{:#x}", word_address(data, 0)),
		});
	}
	if topic0 == event_topic("PositionExecuted(bytes32,uint256,uint256)") {
		return Some(ProxyEvent::PositionExecuted {
			meta,
			vault_position_id,
			remote_position_id: word_u256(data, 0).to_string(),
			liquidity: word_u256(data, 1),
		});
	}
	if topic0 == event_topic("PositionLiquidated(bytes32,uint256,uint256)") {
		return Some(ProxyEvent::PositionLiquidated {
			meta,
			vault_position_id,
			amount0: word_u256(data, 0),
			amount1: word_u256(data, 1),
		});
	}
	if topic0 == event_topic("LiquidationCompleted(bytes32,uint256)") {
		return Some(ProxyEvent::LiquidationCompleted {
			meta,
			vault_position_id,
			received_amount: word_u256(data, 0),
		});
	}
	if topic0 == event_topic("AssetsReturned(bytes32,uint256)") {
		return Some(ProxyEvent::AssetsReturned { meta, vault_position_id, amount: word_u256(data, 0) });
	}
	if topic0 == event_topic("PendingPositionCancelled(bytes32,string)") {
		return Some(ProxyEvent::PendingPositionCancelled {
			meta,
			vault_position_id,
			reason: decode_dynamic_string(data, 0),
		});
	}
	None
}

fn event_topic(signature: &str) -> H256 {
	H256::from(ethers::utils::keccak256(signature.as_bytes()))
}

/// Reverses `pad_id`: strips the trailing zero padding and reads the
/// remainder as UTF-8, recovering the original identifier string.
fn unpad_id(word: &[u8]) -> String {
	let end = word.iter().rposition(|b| *b != 0).map(|i| i + 1).unwrap_or(0);
	String::from_utf8_lossy(&word[..end]).into_owned()
}

fn word(data: &[u8], index: usize) -> [u8; 32] {
	let mut buf = [0u8; 32];
	let start = index * 32;
	if data.len() >= start + 32 {
		buf.copy_from_slice(&data[start..start + 32]);
	}
	buf
}

fn word_u256(data: &[u8], index: usize) -> U256 {
	U256::from_big_endian(&word(data, index))
}

fn word_address(data: &[u8], index: usize) -> Address {
	Address::from_slice(&word(data, index)[12..])
}

/// Decodes a dynamic `string` field whose offset (relative to `data`'s
/// start) lives at word `offset_word_index`, per the standard ABI tail
/// encoding: a length word followed by the UTF-8 bytes.
fn decode_dynamic_string(data: &[u8], offset_word_index: usize) -> String {
	decode_string_at(data, word_u256(data, offset_word_index).as_usize())
}

fn decode_string_at(data: &[u8], start: usize) -> String {
	if data.len() < start + 32 {
		return String::new();
	}
	let len = U256::from_big_endian(&data[start..start + 32]).as_usize();
	let bytes_start = start + 32;
	if data.len() < bytes_start + len {
		return String::new();
	}
	String::from_utf8_lossy(&data[bytes_start..bytes_start + len]).into_owned()
}

fn pad_id(id: &str) -> [u8; 32] {
	let mut padded = [0u8; 32];
	let bytes = id.as_bytes();
	let len = bytes.len().min(32);
	padded[..len].copy_from_slice(&bytes[..len]);
	padded
}

fn pad_u32(value: u32) -> [u8; 32] {
	let mut buf = [0u8; 32];
	buf[28..].copy_from_slice(&value.to_be_bytes());
	buf
}

fn pad_u64(value: u64) -> [u8; 32] {
	let mut buf = [0u8; 32];
	buf[24..].copy_from_slice(&value.to_be_bytes());
	buf
}

fn selector_call(signature: &str, args: &[[u8; 32]]) -> Vec<u8> {
	let hash = ethers::utils::keccak256(signature.as_bytes());
	let mut call = hash[..4].to_vec();
	for arg in args {
		call.extend_from_slice(arg);
	}
	call
}

fn eth_call(to: Address, data: Vec<u8>) -> ethers::types::TransactionRequest {
	ethers::types::TransactionRequest::new().to(to).data(Bytes::from(data))
}

/// Decodes the `(address[], string[], string[], uint8[])` tuple
/// `getSupportedTokens()` returns: a head of four offset words, each
/// pointing at a length-prefixed array of its own.
fn decode_supported_tokens(raw: &Bytes) -> Vec<SupportedToken> {
	let data: &[u8] = raw;
	if data.len() < 4 * 32 {
		return vec![];
	}
	let addresses = decode_address_array(data, word_u256(data, 0).as_usize());
	let names = decode_string_array(data, word_u256(data, 1).as_usize());
	let symbols = decode_string_array(data, word_u256(data, 2).as_usize());
	let decimals = decode_u8_array(data, word_u256(data, 3).as_usize());

	(0..addresses.len())
		.map(|i| SupportedToken {
			address: addresses[i],
			name: names.get(i).cloned().unwrap_or_default(),
			symbol: symbols.get(i).cloned().unwrap_or_default(),
			decimals: decimals.get(i).copied().unwrap_or_default(),
		})
		.collect()
}

fn array_len_at(data: &[u8], offset: usize) -> usize {
	if data.len() < offset + 32 {
		return 0;
	}
	U256::from_big_endian(&data[offset..offset + 32]).as_usize()
}

fn decode_address_array(data: &[u8], offset: usize) -> Vec<Address> {
	let len = array_len_at(data, offset);
	let start = offset + 32;
	(0..len)
		.filter_map(|i| {
			let word_start = start + i * 32;
			(data.len() >= word_start + 32)
				.then(|| Address::from_slice(&data[word_start + 12..word_start + 32]))
		})
		.collect()
}

fn decode_u8_array(data: &[u8], offset: usize) -> Vec<u8> {
	let len = array_len_at(data, offset);
	let start = offset + 32;
	(0..len)
		.filter_map(|i| {
			let word_start = start + i * 32;
			(data.len() >= word_start + 32).then(|| data[word_start + 31])
		})
		.collect()
}

fn decode_string_array(data: &[u8], offset: usize) -> Vec<String> {
	let len = array_len_at(data, offset);
	let elements_start = offset + 32;
	(0..len)
		.filter_map(|i| {
			let rel_offset_word = elements_start + i * 32;
			if data.len() < rel_offset_word + 32 {
				return None;
			}
			let rel_offset = U256::from_big_endian(&data[rel_offset_word..rel_offset_word + 32]).as_usize();
			Some(decode_string_at(data, elements_start + rel_offset))
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn pad_id_truncates_long_identifiers() {
		let id = "x".repeat(64);
		let padded = pad_id(&id);
		assert_eq!(padded.len(), 32);
	}

	#[test]
	fn selector_call_has_four_byte_selector_prefix() {
		let call = selector_call("isPositionOutOfRange(bytes32)", &[[0u8; 32]]);
		assert_eq!(call.len(), 4 + 32);
	}

	#[tokio::test]
	async fn ttl_cache_expires() {
		let cache: TtlCache<u32> = TtlCache::new(Duration::from_millis(10));
		cache.set(7).await;
		assert_eq!(cache.get().await, Some(7));
		tokio::time::sleep(Duration::from_millis(20)).await;
		assert_eq!(cache.get().await, None);
	}

	fn word_u64(v: u64) -> [u8; 32] {
		let mut buf = [0u8; 32];
		buf[24..].copy_from_slice(&v.to_be_bytes());
		buf
	}

	fn push_string(buf: &mut Vec<u8>, s: &str) {
		buf.extend_from_slice(&word_u64(s.len() as u64));
		let mut padded = s.as_bytes().to_vec();
		padded.resize(padded.len().div_ceil(32) * 32, 0);
		buf.extend_from_slice(&padded);
	}

	fn sample_log(signature: &str, vault_position_id: &str, data: Vec<u8>) -> ethers::types::Log {
		ethers::types::Log {
			address: Address::zero(),
			topics: vec![event_topic(signature), H256::from(pad_id(vault_position_id))],
			data: Bytes::from(data),
			block_number: Some(42u64.into()),
			transaction_hash: Some(H256::repeat_byte(7)),
			..Default::default()
		}
	}

	#[test]
	fn decodes_liquidation_completed_log() {
		let mut data = Vec::new();
		data.extend_from_slice(&word_u64(1_500_000u64));
		let log = sample_log("LiquidationCompleted(bytes32,uint256)", "pos-1", data);

		let event = decode_proxy_log(&log).expect("decodes");
		match event {
			super::super::events::ProxyEvent::LiquidationCompleted {
				vault_position_id,
				received_amount,
				..
			} => {
				assert_eq!(vault_position_id, "pos-1");
				assert_eq!(received_amount, U256::from(1_500_000u64));
			},
			other => panic!("wrong variant: {other:?}"),
		}
	}

	#[test]
	fn decodes_pending_position_cancelled_log_with_dynamic_string() {
		let mut data = Vec::new();
		data.extend_from_slice(&word_u64(32)); // offset to the string
		push_string(&mut data, "out of range");
		let log = sample_log("PendingPositionCancelled(bytes32,string)", "pos-9", data);

		let event = decode_proxy_log(&log).expect("decodes");
		match event {
			super::super::events::ProxyEvent::PendingPositionCancelled {
				vault_position_id,
				reason,
				..
			} => {
				assert_eq!(vault_position_id, "pos-9");
				assert_eq!(reason, "out of range");
			},
			other => panic!("wrong variant: {other:?}"),
		}
	}

	#[test]
	fn decode_proxy_log_returns_none_for_unknown_topic() {
		let log = sample_log("SomeOtherEvent(bytes32)", "pos-1", vec![]);
		assert!(decode_proxy_log(&log).is_none());
	}

	#[test]
	fn decodes_supported_tokens_tuple() {
		let mut data = Vec::new();
		// Head: four offsets to each array section.
		data.extend_from_slice(&word_u64(128)); // addresses section
		data.extend_from_slice(&word_u64(192)); // names section
		data.extend_from_slice(&word_u64(320)); // symbols section
		data.extend_from_slice(&word_u64(448)); // decimals section

		// addresses: [len=1][address word]
		data.extend_from_slice(&word_u64(1));
		let mut addr_word = [0u8; 32];
		addr_word[12..].copy_from_slice(Address::repeat_byte(0xAB).as_bytes());
		data.extend_from_slice(&addr_word);

		// names: [len=1][rel_offset=32]["Foo"]
		data.extend_from_slice(&word_u64(1));
		data.extend_from_slice(&word_u64(32));
		push_string(&mut data, "Foo");

		// symbols: [len=1][rel_offset=32]["FOO"]
		data.extend_from_slice(&word_u64(1));
		data.extend_from_slice(&word_u64(32));
		push_string(&mut data, "FOO");

		// decimals: [len=1][18]
		data.extend_from_slice(&word_u64(1));
		data.extend_from_slice(&word_u64(18));

		let tokens = decode_supported_tokens(&Bytes::from(data));
		assert_eq!(tokens.len(), 1);
		assert_eq!(tokens[0].address, Address::repeat_byte(0xAB));
		assert_eq!(tokens[0].name, "Foo");
		assert_eq!(tokens[0].symbol, "FOO");
		assert_eq!(tokens[0].decimals, 18);
	}

	#[test]
	fn decode_supported_tokens_empty_on_short_input() {
		assert!(decode_supported_tokens(&Bytes::from(vec![0u8; 16])).is_empty());
	}

	#[tokio::test]
	async fn submit_remote_transact_fails_fast_without_transactor_address() {
		let mut settings = crate::settings::Settings::new_test().proxy;
		settings.xcm_transactor_address = String::new();
		let client =
			ProxyClient::new(&settings, RetryPolicy::default(), CancellationToken::new()).unwrap();

		let err = client.submit_remote_transact(1000, &[], 1_000_000_000).await.unwrap_err();
		assert!(matches!(err, CoordinatorError::FeatureDisabled(_)));
	}
}
