//! Typed Vault events, decoded off the dynamic `subxt` event stream.
//!
//! Every event carries the block number and transaction hash alongside its
//! typed payload, per the External Interfaces contract in the spec.

use ethers::types::U256;

#[derive(Debug, Clone)]
pub struct EventMeta {
	pub block_number: u64,
	pub transaction_hash: String,
}

#[derive(Debug, Clone)]
pub struct TickRange {
	pub lower_percent: i32,
	pub upper_percent: i32,
}

#[derive(Debug, Clone)]
pub enum VaultEvent {
	Deposit { meta: EventMeta, user_address: String, amount: U256 },
	Withdrawal { meta: EventMeta, user_address: String, amount: U256 },
	InvestmentInitiated {
		meta: EventMeta,
		vault_position_id: String,
		user_address: String,
		pool_address: String,
		amount: U256,
		chain_id: u64,
		tick_range: TickRange,
	},
	PositionExecutionConfirmed {
		meta: EventMeta,
		vault_position_id: String,
		remote_position_id: String,
		liquidity: U256,
	},
	PositionLiquidated { meta: EventMeta, vault_position_id: String, final_amount: U256 },
	LiquidationSettled {
		meta: EventMeta,
		vault_position_id: String,
		expected_amount: U256,
		received_amount: U256,
	},
	ChainAdded { meta: EventMeta, chain_id: u64 },
	XcmMessageSent { meta: EventMeta, vault_position_id: String },
}

impl VaultEvent {
	pub fn meta(&self) -> &EventMeta {
		match self {
			VaultEvent::Deposit { meta, .. }
			| VaultEvent::Withdrawal { meta, .. }
			| VaultEvent::InvestmentInitiated { meta, .. }
			| VaultEvent::PositionExecutionConfirmed { meta, .. }
			| VaultEvent::PositionLiquidated { meta, .. }
			| VaultEvent::LiquidationSettled { meta, .. }
			| VaultEvent::ChainAdded { meta, .. }
			| VaultEvent::XcmMessageSent { meta, .. } => meta,
		}
	}

	pub fn kind(&self) -> &'static str {
		match self {
			VaultEvent::Deposit { .. } => "Deposit",
			VaultEvent::Withdrawal { .. } => "Withdrawal",
			VaultEvent::InvestmentInitiated { .. } => "InvestmentInitiated",
			VaultEvent::PositionExecutionConfirmed { .. } => "PositionExecutionConfirmed",
			VaultEvent::PositionLiquidated { .. } => "PositionLiquidated",
			VaultEvent::LiquidationSettled { .. } => "LiquidationSettled",
			VaultEvent::ChainAdded { .. } => "ChainAdded",
			VaultEvent::XcmMessageSent { .. } => "XcmMessageSent",
		}
	}
}
