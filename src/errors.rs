//! The coordinator's error taxonomy.
//!
//! Every fallible operation surfaces one of these kinds rather than a raw
//! transport or database error, so that callers (and the retry engine) can
//! branch on classification instead of on a specific error type.

use thiserror::Error;

/// Coarse classification used by the retry engine and by callers that need
/// to decide whether an error is worth surfacing to a human vs. retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
	Validation,
	NotFound,
	TransientRemote,
	PermanentRemote,
	XcmBuild,
	XcmExecute,
	ConfigFrozen,
}

#[derive(Debug, Error)]
pub enum CoordinatorError {
	#[error("validation failed: {0}")]
	Validation(String),

	#[error("not found: {0}")]
	NotFound(String),

	#[error("transient remote error: {0}")]
	TransientRemote(#[source] anyhow::Error),

	#[error("permanent remote error: {0}")]
	PermanentRemote(#[source] anyhow::Error),

	#[error("xcm build failed: {0}")]
	XcmBuild(String),

	#[error("xcm executed but failed remotely: {message} (retryable: {should_retry})")]
	XcmExecute { message: String, should_retry: bool },

	#[error("attempted to mutate an immutable setting: {0}")]
	ConfigFrozen(String),

	#[error("feature disabled: {0}")]
	FeatureDisabled(String),
}

impl CoordinatorError {
	pub fn kind(&self) -> ErrorKind {
		match self {
			CoordinatorError::Validation(_) => ErrorKind::Validation,
			CoordinatorError::NotFound(_) => ErrorKind::NotFound,
			CoordinatorError::TransientRemote(_) => ErrorKind::TransientRemote,
			CoordinatorError::PermanentRemote(_) => ErrorKind::PermanentRemote,
			CoordinatorError::XcmBuild(_) => ErrorKind::XcmBuild,
			CoordinatorError::XcmExecute { should_retry, .. } =>
				if *should_retry {
					ErrorKind::TransientRemote
				} else {
					ErrorKind::XcmExecute
				},
			CoordinatorError::ConfigFrozen(_) => ErrorKind::ConfigFrozen,
			CoordinatorError::FeatureDisabled(_) => ErrorKind::Validation,
		}
	}
}

pub type Result<T> = std::result::Result<T, CoordinatorError>;
