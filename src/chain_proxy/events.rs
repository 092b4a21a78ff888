//! Typed Proxy events, decoded off `ethers` contract logs.

use ethers::types::{H256, U256};

#[derive(Debug, Clone)]
pub struct EventMeta {
	pub block_number: u64,
	pub transaction_hash: H256,
}

#[derive(Debug, Clone)]
pub enum ProxyEvent {
	AssetsReceived { meta: EventMeta, vault_position_id: String, token: String, amount: U256 },
	PendingPositionCreated { meta: EventMeta, vault_position_id: String, pool_address: String },
	PositionExecuted {
		meta: EventMeta,
		vault_position_id: String,
		remote_position_id: String,
		liquidity: U256,
	},
	PositionLiquidated { meta: EventMeta, vault_position_id: String, amount0: U256, amount1: U256 },
	LiquidationCompleted { meta: EventMeta, vault_position_id: String, received_amount: U256 },
	AssetsReturned { meta: EventMeta, vault_position_id: String, amount: U256 },
	PendingPositionCancelled { meta: EventMeta, vault_position_id: String, reason: String },
}

impl ProxyEvent {
	pub fn meta(&self) -> &EventMeta {
		match self {
			ProxyEvent::AssetsReceived { meta, .. }
			| ProxyEvent::PendingPositionCreated { meta, .. }
			| ProxyEvent::PositionExecuted { meta, .. }
			| ProxyEvent::PositionLiquidated { meta, .. }
			| ProxyEvent::LiquidationCompleted { meta, .. }
			| ProxyEvent::AssetsReturned { meta, .. }
			| ProxyEvent::PendingPositionCancelled { meta, .. } => meta,
		}
	}

	pub fn vault_position_id(&self) -> &str {
		match self {
			ProxyEvent::AssetsReceived { vault_position_id, .. }
			| ProxyEvent::PendingPositionCreated { vault_position_id, .. }
			| ProxyEvent::PositionExecuted { vault_position_id, .. }
			| ProxyEvent::PositionLiquidated { vault_position_id, .. }
			| ProxyEvent::LiquidationCompleted { vault_position_id, .. }
			| ProxyEvent::AssetsReturned { vault_position_id, .. }
			| ProxyEvent::PendingPositionCancelled { vault_position_id, .. } => vault_position_id,
		}
	}

	pub fn kind(&self) -> &'static str {
		match self {
			ProxyEvent::AssetsReceived { .. } => "AssetsReceived",
			ProxyEvent::PendingPositionCreated { .. } => "PendingPositionCreated",
			ProxyEvent::PositionExecuted { .. } => "PositionExecuted",
			ProxyEvent::PositionLiquidated { .. } => "PositionLiquidated",
			ProxyEvent::LiquidationCompleted { .. } => "LiquidationCompleted",
			ProxyEvent::AssetsReturned { .. } => "AssetsReturned",
			ProxyEvent::PendingPositionCancelled { .. } => "PendingPositionCancelled",
		}
	}
}
