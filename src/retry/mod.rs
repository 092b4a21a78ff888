//! Generic, bounded request retrier.
//!
//! Unlike the teacher's `retrier.rs`/`eth/retry_rpc.rs` actor, which retries
//! forever behind a request queue, this retry engine is a direct
//! `executeWithRetry(operation, policy) -> outcome` contract: it classifies
//! each failure, stops immediately on a permanent error, and gives up after
//! `policy.max_attempts`. The per-attempt timeout/backoff shape (apply a
//! timeout, then exponential backoff with jitter before the next attempt)
//! is carried over from the teacher's approach.

pub mod classify;

use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;

pub use classify::{classify_error, deepest_message, Classification};

pub type Attempt = u32;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
	pub max_attempts: Attempt,
	pub base_delay_ms: u64,
	pub backoff_multiplier: u32,
	pub max_delay_ms: u64,
	pub jitter: bool,
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_attempts: 3,
			base_delay_ms: 1000,
			backoff_multiplier: 2,
			max_delay_ms: 30_000,
			jitter: true,
		}
	}
}

impl From<&crate::settings::RetryPolicySettings> for RetryPolicy {
	fn from(settings: &crate::settings::RetryPolicySettings) -> Self {
		Self {
			max_attempts: settings.max_attempts,
			base_delay_ms: settings.base_delay_ms,
			backoff_multiplier: settings.backoff_multiplier,
			max_delay_ms: settings.max_delay_ms,
			jitter: true,
		}
	}
}

/// Delay before retrying attempt `n` (1-indexed: the delay waited *after*
/// attempt `n` fails, before attempt `n + 1`), pre-jitter.
pub fn base_delay_for_attempt(policy: &RetryPolicy, attempt: Attempt) -> Duration {
	let multiplier = (policy.backoff_multiplier as u64).saturating_pow(attempt.saturating_sub(1));
	let delay_ms = policy.base_delay_ms.saturating_mul(multiplier).min(policy.max_delay_ms);
	Duration::from_millis(delay_ms)
}

/// Applies +/-25% jitter to a pre-computed delay, flooring to an integer
/// number of milliseconds.
fn apply_jitter(delay: Duration, jitter: bool) -> Duration {
	if !jitter {
		return delay;
	}
	let factor = rand::thread_rng().gen_range(0.75..=1.25);
	Duration::from_millis((delay.as_millis() as f64 * factor).floor() as u64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
	Transient,
	Permanent,
	Unknown,
}

impl From<Classification> for ErrorType {
	fn from(classification: Classification) -> Self {
		match classification {
			Classification::Transient => ErrorType::Transient,
			Classification::Permanent => ErrorType::Permanent,
			Classification::Unknown => ErrorType::Unknown,
		}
	}
}

#[derive(Debug)]
pub struct RetryOutcome<T> {
	pub success: bool,
	pub result: Option<T>,
	pub error: Option<anyhow::Error>,
	pub attempts: Attempt,
	pub total_duration: Duration,
	pub error_type: Option<ErrorType>,
}

/// Runs `operation` until it succeeds, a permanent error is classified, the
/// cancellation token fires, or `policy.max_attempts` is exhausted.
///
/// `operation` is re-invoked from scratch on every attempt (it is an `Fn`
/// returning a fresh future), mirroring how the teacher's retrier clones a
/// closure per submission rather than retrying a single in-flight future.
pub async fn execute_with_retry<F, Fut, T>(
	mut operation: F,
	policy: RetryPolicy,
	cancellation: &CancellationToken,
) -> RetryOutcome<T>
where
	F: FnMut() -> Fut,
	Fut: std::future::Future<Output = anyhow::Result<T>>,
{
	let start = tokio::time::Instant::now();
	let mut attempt: Attempt = 0;
	let mut last_error: Option<anyhow::Error> = None;
	let mut last_error_type: Option<ErrorType> = None;

	loop {
		attempt += 1;

		let attempt_result = tokio::select! {
			biased;
			_ = cancellation.cancelled() => {
				return RetryOutcome {
					success: false,
					result: None,
					error: last_error,
					attempts: attempt.saturating_sub(1).max(1),
					total_duration: start.elapsed(),
					error_type: last_error_type,
				};
			},
			result = operation() => result,
		};

		match attempt_result {
			Ok(value) =>
				return RetryOutcome {
					success: true,
					result: Some(value),
					error: None,
					attempts: attempt,
					total_duration: start.elapsed(),
					error_type: None,
				},
			Err(error) => {
				let classification = classify_error(&error);
				let error_type: ErrorType = classification.into();
				last_error_type = Some(error_type);

				if !classification.should_retry() {
					last_error = Some(error);
					return RetryOutcome {
						success: false,
						result: None,
						error: last_error,
						attempts: attempt,
						total_duration: start.elapsed(),
						error_type: last_error_type,
					};
				}

				last_error = Some(error);

				if attempt >= policy.max_attempts {
					return RetryOutcome {
						success: false,
						result: None,
						error: last_error,
						attempts: attempt,
						total_duration: start.elapsed(),
						error_type: last_error_type,
					};
				}

				let delay = apply_jitter(base_delay_for_attempt(&policy, attempt), policy.jitter);

				tokio::select! {
					biased;
					_ = cancellation.cancelled() => {
						return RetryOutcome {
							success: false,
							result: None,
							error: last_error,
							attempts: attempt,
							total_duration: start.elapsed(),
							error_type: last_error_type,
						};
					},
					_ = tokio::time::sleep(delay) => {},
				}
			},
		}
	}
}

/// Pure utility for decoding the error blob carried inside an emitted
/// XCM-failure event, independent of the generic retry loop above.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XcmEventError {
	pub error_type: ErrorType,
	pub message: String,
	pub should_retry: bool,
}

pub fn parse_xcm_event_error(raw: &[u8]) -> XcmEventError {
	let text = String::from_utf8_lossy(raw).to_string();
	let message = deepest_message(&text);
	let classification = classify::classify_message(&message);
	XcmEventError {
		error_type: classification.into(),
		message,
		should_retry: classification.should_retry(),
	}
}

pub fn parse_xcm_event_error_str(raw: &str) -> XcmEventError {
	parse_xcm_event_error(raw.as_bytes())
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicU32, Ordering};

	fn policy() -> RetryPolicy {
		RetryPolicy { max_attempts: 3, base_delay_ms: 1, backoff_multiplier: 2, max_delay_ms: 10, jitter: false }
	}

	#[tokio::test]
	async fn succeeds_first_try_has_attempts_one() {
		let token = CancellationToken::new();
		let outcome = execute_with_retry(|| async { Ok::<_, anyhow::Error>(42) }, policy(), &token).await;
		assert!(outcome.success);
		assert_eq!(outcome.attempts, 1);
		assert_eq!(outcome.result, Some(42));
		assert!(outcome.error_type.is_none());
	}

	#[tokio::test]
	async fn retries_transient_then_succeeds() {
		let counter = AtomicU32::new(0);
		let token = CancellationToken::new();
		let outcome = execute_with_retry(
			|| {
				let n = counter.fetch_add(1, Ordering::SeqCst);
				async move {
					if n < 3 {
						Err(anyhow::anyhow!("nonce too low"))
					} else {
						Ok(7)
					}
				}
			},
			RetryPolicy { max_attempts: 10, ..policy() },
			&token,
		)
		.await;

		assert!(outcome.success);
		assert_eq!(outcome.attempts, 4);
		assert_eq!(outcome.result, Some(7));
	}

	#[tokio::test]
	async fn aborts_immediately_on_permanent_error() {
		let token = CancellationToken::new();
		let outcome: RetryOutcome<()> = execute_with_retry(
			|| async { Err(anyhow::anyhow!("execution reverted: slippage")) },
			policy(),
			&token,
		)
		.await;

		assert!(!outcome.success);
		assert_eq!(outcome.attempts, 1);
		assert_eq!(outcome.error_type, Some(ErrorType::Permanent));
	}

	#[tokio::test]
	async fn stops_at_max_attempts_on_unknown_error() {
		let token = CancellationToken::new();
		let outcome: RetryOutcome<()> = execute_with_retry(
			|| async { Err(anyhow::anyhow!("completely novel failure")) },
			RetryPolicy { max_attempts: 3, ..policy() },
			&token,
		)
		.await;

		assert!(!outcome.success);
		assert_eq!(outcome.attempts, 3);
		assert_eq!(outcome.error_type, Some(ErrorType::Unknown));
	}

	#[tokio::test]
	async fn cancellation_stops_pending_sleep() {
		let token = CancellationToken::new();
		token.cancel();
		let outcome: RetryOutcome<()> = execute_with_retry(
			|| async { Err(anyhow::anyhow!("nonce too low")) },
			RetryPolicy { max_attempts: 10, base_delay_ms: 1, ..policy() },
			&token,
		)
		.await;
		assert!(!outcome.success);
	}

	#[test]
	fn delay_at_attempt_one_equals_base_delay() {
		let policy = RetryPolicy { base_delay_ms: 1000, backoff_multiplier: 2, max_delay_ms: 30_000, ..RetryPolicy::default() };
		assert_eq!(base_delay_for_attempt(&policy, 1), Duration::from_millis(1000));
	}

	#[test]
	fn delay_clamps_to_max_delay() {
		let policy = RetryPolicy { base_delay_ms: 1000, backoff_multiplier: 2, max_delay_ms: 30_000, ..RetryPolicy::default() };
		// ceil(log2(30000/1000)) + 1 = ceil(4.9) + 1 = 6
		let clamp_attempt = 6;
		assert_eq!(base_delay_for_attempt(&policy, clamp_attempt), Duration::from_millis(30_000));
	}

	#[test]
	fn parses_embedded_xcm_event_error() {
		let raw = br#"{"reason":"WeightExceeded"}"#;
		let parsed = parse_xcm_event_error(raw);
		assert_eq!(parsed.error_type, ErrorType::Transient);
		assert!(parsed.should_retry);
	}
}
