//! Error classification for the retry engine.
//!
//! Classifies an error against an ordered list of known patterns. The
//! first matching pattern wins; if nothing matches the error is
//! [`Classification::Unknown`], which is retried under the default policy
//! (the classifier is total: it always returns something).

use once_cell::sync::Lazy;
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
	Transient,
	Permanent,
	Unknown,
}

impl Classification {
	pub fn should_retry(self) -> bool {
		!matches!(self, Classification::Permanent)
	}
}

/// Patterns are matched case-insensitively against the deepest meaningful
/// message extracted from the error (see [`deepest_message`]).
const TRANSIENT_PATTERNS: &[&str] = &[
	"nonce too low",
	"nonce is too low",
	"replacement transaction underpriced",
	"replacement-underpriced",
	"timeout",
	"timed out",
	"connection refused",
	"rate limit",
	"rate-limit",
	"too many requests",
	"429",
	"rpc error: 5",
	"internal server error",
	"bad gateway",
	"service unavailable",
	"etimedout",
	"econnreset",
	"xcm queue full",
	"exceedsmaxmessagesize",
	"weight exceeded",
	"weight-exceeded",
];

const PERMANENT_PATTERNS: &[&str] = &[
	"insufficient balance",
	"insufficient funds",
	"execution reverted",
	"invalid signature",
	"not authorized",
	"not-authorized",
	"unauthorized",
	"paused",
	"position not active",
	"position-not-active",
	"token not supported",
	"token-not-supported",
	"invalid destination",
	"invalid-destination",
	"slippage",
];

static WRAPPER_FIELD: Lazy<Regex> = Lazy::new(|| {
	Regex::new(r#"(?i)"(?:reason|message)"\s*:\s*"([^"]+)""#).expect("static regex is valid")
});

/// Unwraps common nested-error shapes (`reason`, `error.message`,
/// `data.message`) to find the most specific message in a blob, instead of
/// matching against the outer wrapper text (e.g. `"JSON-RPC error: {...}"`).
pub fn deepest_message(raw: &str) -> String {
	let mut message = raw.to_string();

	// An error chain may itself contain a JSON fragment (as happens with
	// JSON-RPC error responses embedded in a provider error's Display).
	// Repeatedly unwrap until no further nested field is found or we hit a
	// depth limit, guarding against pathological input.
	for _ in 0..4 {
		if let Some(captures) = WRAPPER_FIELD.captures(&message) {
			let inner = captures.get(1).expect("group 1 always present on match").as_str();
			if inner == message {
				break;
			}
			message = inner.to_string();
		} else {
			break;
		}
	}

	message
}

/// Flattens an `anyhow` error chain into its deepest meaningful message,
/// then classifies it.
pub fn classify_error(error: &anyhow::Error) -> Classification {
	let full_chain = error.chain().map(|e| e.to_string()).collect::<Vec<_>>().join(": ");
	classify_message(&deepest_message(&full_chain))
}

pub fn classify_message(message: &str) -> Classification {
	let lower = message.to_lowercase();

	if PERMANENT_PATTERNS.iter().any(|pattern| lower.contains(pattern)) {
		return Classification::Permanent;
	}
	if TRANSIENT_PATTERNS.iter().any(|pattern| lower.contains(pattern)) {
		return Classification::Transient;
	}
	Classification::Unknown
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn classifies_known_transient_patterns() {
		assert_eq!(classify_message("nonce too low"), Classification::Transient);
		assert_eq!(
			classify_message("Error: ETIMEDOUT while connecting"),
			Classification::Transient
		);
	}

	#[test]
	fn classifies_known_permanent_patterns() {
		assert_eq!(
			classify_message("execution reverted: slippage"),
			Classification::Permanent
		);
		assert_eq!(classify_message("caller is not authorized"), Classification::Permanent);
	}

	#[test]
	fn unmatched_message_is_unknown_and_retryable() {
		let classification = classify_message("some completely novel failure");
		assert_eq!(classification, Classification::Unknown);
		assert!(classification.should_retry());
	}

	#[test]
	fn permanent_is_not_retried() {
		assert!(!Classification::Permanent.should_retry());
	}

	#[test]
	fn extracts_nested_reason_field() {
		let raw = r#"JSON-RPC error: {"code":-32000,"reason":"execution reverted: slippage"}"#;
		assert_eq!(deepest_message(raw), "execution reverted: slippage");
	}

	#[test]
	fn extracts_doubly_nested_message_field() {
		let raw = r#"{"error":{"message":"{\"message\":\"nonce too low\"}"}}"#;
		// First pass pulls the inner JSON string (still escaped), which is
		// fine: classification only needs pattern containment, and the
		// outer match already isolates the relevant text.
		let extracted = deepest_message(raw);
		assert!(extracted.to_lowercase().contains("nonce too low"));
	}

	#[test]
	fn classifier_is_idempotent() {
		let message = "rate limit exceeded";
		assert_eq!(classify_message(message), classify_message(message));
	}
}
