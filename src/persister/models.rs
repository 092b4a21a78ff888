//! Entities backing the `users`, `pools`, and `positions` tables.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use ethers::types::U256;
use uuid::Uuid;

/// Domain-side status; the `positions.status` column itself is plain TEXT,
/// converted at the repository boundary via `as_str`/`FromStr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionStatus {
	PendingExecution,
	Active,
	Liquidated,
	Failed,
}

impl PositionStatus {
	pub fn as_str(self) -> &'static str {
		match self {
			PositionStatus::PendingExecution => "PendingExecution",
			PositionStatus::Active => "Active",
			PositionStatus::Liquidated => "Liquidated",
			PositionStatus::Failed => "Failed",
		}
	}
}

impl std::fmt::Display for PositionStatus {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.as_str())
	}
}

impl FromStr for PositionStatus {
	type Err = crate::errors::CoordinatorError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"PendingExecution" => Ok(PositionStatus::PendingExecution),
			"Active" => Ok(PositionStatus::Active),
			"Liquidated" => Ok(PositionStatus::Liquidated),
			"Failed" => Ok(PositionStatus::Failed),
			other => Err(crate::errors::CoordinatorError::Validation(format!(
				"unknown position status: {other}"
			))),
		}
	}
}

#[derive(Debug, Clone)]
pub struct User {
	pub id: Uuid,
	pub wallet_address: String,
	pub is_active: bool,
	pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Pool {
	pub id: Uuid,
	pub address: String,
	pub token0: String,
	pub token1: String,
	pub chain_id: i64,
}

#[derive(Debug, Clone)]
pub struct Position {
	pub id: Uuid,
	pub vault_position_id: String,
	pub proxy_position_id: Option<String>,
	pub user_id: Uuid,
	pub pool_id: Uuid,
	pub chain_id: i64,
	pub amount: U256,
	pub liquidity: Option<U256>,
	pub returned_amount: Option<U256>,
	pub status: PositionStatus,
	pub tick_lower_bps: i32,
	pub tick_upper_bps: i32,
	pub created_at: DateTime<Utc>,
	pub executed_at: Option<DateTime<Utc>>,
	pub liquidated_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn position_status_round_trips_through_str() {
		for status in [
			PositionStatus::PendingExecution,
			PositionStatus::Active,
			PositionStatus::Liquidated,
			PositionStatus::Failed,
		] {
			assert_eq!(status.as_str().parse::<PositionStatus>().unwrap(), status);
		}
	}

	#[test]
	fn position_status_rejects_unknown_value() {
		assert!("Bogus".parse::<PositionStatus>().is_err());
	}
}
