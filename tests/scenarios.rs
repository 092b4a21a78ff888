//! End-to-end scenario tests, one per testable property listed in the
//! position state machine and retry engine's specification.
//!
//! Scenarios 1-3 drive the Persister's public handler set the way the
//! Event Listener would: dispatch fires a detached task per event (see
//! `Persister::handlers`), so assertions poll the repository briefly
//! rather than assuming synchronous completion, the same style the
//! in-tree `integration_test.rs` uses for its witness test.
//!
//! Scenario 6 (test-mode sync against both chains) needs a live
//! connection to observe and set the on-chain flag and is exercised at
//! the unit level in `src/testmode.rs` instead, against the controller's
//! own reconciliation logic.

use std::sync::Arc;
use std::time::Duration;

use ethers::types::U256;
use liquidot_coordinator::chain_proxy::{self, ProxyEvent};
use liquidot_coordinator::chain_vault::{self, TickRange, VaultEvent};
use liquidot_coordinator::persister::{Persister, PositionStatus, Repository};
use liquidot_coordinator::retry::{self, RetryPolicy};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

async fn fresh_persister() -> Arc<Persister> {
	let repository = Repository::connect("sqlite::memory:").await.unwrap();
	repository.migrate().await.unwrap();
	Arc::new(Persister::new(Arc::new(repository)))
}

async fn seed_pool(repository: &Repository, address: &str, chain_id: i64) -> Uuid {
	repository.upsert_pool(address, "0xtoken0", "0xtoken1", chain_id).await.unwrap().id
}

async fn poll_until<F>(mut check: F)
where
	F: FnMut() -> std::pin::Pin<Box<dyn std::future::Future<Output = bool> + Send>>,
{
	for _ in 0..50 {
		if check().await {
			return;
		}
		tokio::time::sleep(Duration::from_millis(20)).await;
	}
	panic!("condition was never satisfied within the polling window");
}

fn vault_meta() -> chain_vault::EventMeta {
	chain_vault::EventMeta { block_number: 1, transaction_hash: "0xabc".into() }
}

fn proxy_meta() -> chain_proxy::EventMeta {
	chain_proxy::EventMeta { block_number: 1, transaction_hash: ethers::types::H256::zero() }
}

/// Scenario 1: deposit then withdraw creates exactly one user row.
#[tokio::test]
async fn deposit_then_withdraw_creates_one_user_row() {
	let persister = fresh_persister().await;
	let handlers = persister.handlers();
	let vault_handlers = handlers.vault.unwrap();

	vault_handlers.dispatch(&VaultEvent::Deposit {
		meta: vault_meta(),
		user_address: "0x1111111111111111111111111111111111111111".into(),
		amount: U256::from(1_000_000_000_000_000_000u64),
	});

	poll_until(|| {
		let persister = persister.clone();
		Box::pin(async move {
			persister
				.repository()
				.get_user_by_address("0x1111111111111111111111111111111111111111")
				.await
				.unwrap()
				.is_some()
		})
	})
	.await;

	vault_handlers.dispatch(&VaultEvent::Withdrawal {
		meta: vault_meta(),
		user_address: "0x1111111111111111111111111111111111111111".into(),
		amount: U256::from(1_000_000_000_000_000_000u64),
	});
	tokio::time::sleep(Duration::from_millis(50)).await;

	let user = persister
		.repository()
		.get_user_by_address("0x1111111111111111111111111111111111111111")
		.await
		.unwrap()
		.unwrap();
	assert!(user.is_active);
}

/// Scenario 2: dispatch -> execute -> liquidate walks a position through
/// every forward status transition, ending with a non-negative returned
/// amount.
#[tokio::test]
async fn dispatch_execute_liquidate_walks_full_lifecycle() {
	let persister = fresh_persister().await;
	let repository = persister.repository();
	repository.upsert_user("0x1111111111111111111111111111111111111111").await.unwrap();
	seed_pool(repository, "pool-abc", 1284).await;

	let handlers = persister.handlers();
	let vault_handlers = handlers.vault.unwrap();
	let proxy_handlers = handlers.proxy.unwrap();

	vault_handlers.dispatch(&VaultEvent::InvestmentInitiated {
		meta: vault_meta(),
		vault_position_id: "pos-123".into(),
		user_address: "0x1111111111111111111111111111111111111111".into(),
		pool_address: "pool-abc".into(),
		amount: U256::from(500_000_000_000_000_000u64),
		chain_id: 1284,
		tick_range: TickRange { lower_percent: -500, upper_percent: 500 },
	});

	poll_until(|| {
		let persister = persister.clone();
		Box::pin(async move { persister.repository().get_position_by_vault_id("pos-123").await.unwrap().is_some() })
	})
	.await;

	let position = repository.get_position_by_vault_id("pos-123").await.unwrap().unwrap();
	assert_eq!(position.status, PositionStatus::PendingExecution);

	vault_handlers.dispatch(&VaultEvent::PositionExecutionConfirmed {
		meta: vault_meta(),
		vault_position_id: "pos-123".into(),
		remote_position_id: "mb-456".into(),
		liquidity: U256::from(1_000_000_000_000_000_000u64),
	});

	poll_until(|| {
		let persister = persister.clone();
		Box::pin(async move {
			persister
				.repository()
				.get_position_by_vault_id("pos-123")
				.await
				.unwrap()
				.map(|p| p.status == PositionStatus::Active)
				.unwrap_or(false)
		})
	})
	.await;

	let position = repository.get_position_by_vault_id("pos-123").await.unwrap().unwrap();
	assert_eq!(position.proxy_position_id.as_deref(), Some("mb-456"));
	assert_eq!(position.liquidity, Some(U256::from(1_000_000_000_000_000_000u64)));

	vault_handlers.dispatch(&VaultEvent::PositionLiquidated {
		meta: vault_meta(),
		vault_position_id: "pos-123".into(),
		final_amount: U256::from(1_200_000_000_000_000_000u64),
	});

	poll_until(|| {
		let persister = persister.clone();
		Box::pin(async move {
			persister
				.repository()
				.get_position_by_vault_id("pos-123")
				.await
				.unwrap()
				.map(|p| p.status == PositionStatus::Liquidated)
				.unwrap_or(false)
		})
	})
	.await;

	let position = repository.get_position_by_vault_id("pos-123").await.unwrap().unwrap();
	assert_eq!(position.returned_amount, Some(U256::from(1_200_000_000_000_000_000u64)));
	let _ = &proxy_handlers; // exercised fully in the cancellation scenario below
}

/// Scenario 3: a cancellation observed after `InvestmentInitiated` moves
/// the position straight to `Failed`, never through `Active`.
#[tokio::test]
async fn cancellation_after_initiation_marks_position_failed() {
	let persister = fresh_persister().await;
	let repository = persister.repository();
	repository.upsert_user("0x1111111111111111111111111111111111111111").await.unwrap();
	seed_pool(repository, "pool-abc", 1284).await;

	let handlers = persister.handlers();
	let vault_handlers = handlers.vault.unwrap();
	let proxy_handlers = handlers.proxy.unwrap();

	vault_handlers.dispatch(&VaultEvent::InvestmentInitiated {
		meta: vault_meta(),
		vault_position_id: "pos-123".into(),
		user_address: "0x1111111111111111111111111111111111111111".into(),
		pool_address: "pool-abc".into(),
		amount: U256::from(500_000_000_000_000_000u64),
		chain_id: 1284,
		tick_range: TickRange { lower_percent: -500, upper_percent: 500 },
	});

	poll_until(|| {
		let persister = persister.clone();
		Box::pin(async move { persister.repository().get_position_by_vault_id("pos-123").await.unwrap().is_some() })
	})
	.await;

	proxy_handlers.dispatch(&ProxyEvent::PendingPositionCancelled {
		meta: proxy_meta(),
		vault_position_id: "pos-123".into(),
		reason: "insufficient liquidity".into(),
	});

	poll_until(|| {
		let persister = persister.clone();
		Box::pin(async move {
			persister
				.repository()
				.get_position_by_vault_id("pos-123")
				.await
				.unwrap()
				.map(|p| p.status == PositionStatus::Failed)
				.unwrap_or(false)
		})
	})
	.await;
}

/// Scenario 4: three transient failures then a success costs exactly
/// four attempts and reports no error type.
#[tokio::test]
async fn retry_succeeds_after_three_transient_failures() {
	let policy = RetryPolicy { max_attempts: 5, base_delay_ms: 1, backoff_multiplier: 2, max_delay_ms: 10, jitter: false };
	let cancellation = CancellationToken::new();
	let calls = std::sync::atomic::AtomicU32::new(0);

	let outcome = retry::execute_with_retry(
		|| {
			let attempt = calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
			async move {
				if attempt < 3 {
					Err(anyhow::anyhow!("nonce too low"))
				} else {
					Ok::<_, anyhow::Error>("settled")
				}
			}
		},
		policy,
		&cancellation,
	)
	.await;

	assert!(outcome.success);
	assert_eq!(outcome.attempts, 4);
	assert_eq!(outcome.result, Some("settled"));
	assert!(outcome.error_type.is_none() || outcome.error.is_none());
}

/// Scenario 5: a permanently classified failure aborts after one attempt.
#[tokio::test]
async fn permanent_failure_aborts_after_one_attempt() {
	let policy = RetryPolicy::default();
	let cancellation = CancellationToken::new();

	let outcome = retry::execute_with_retry(
		|| async { Err::<(), _>(anyhow::anyhow!("execution reverted: slippage")) },
		policy,
		&cancellation,
	)
	.await;

	assert!(!outcome.success);
	assert_eq!(outcome.attempts, 1);
	assert_eq!(outcome.error_type, Some(retry::ErrorType::Permanent));
}
