//! Vault chain client (C1): connection management, typed reads/writes, and
//! event decoding for the custodial Substrate-family chain.

pub mod client;
pub mod events;

pub use client::{
	DispatchInvestmentRequest, Page, Pagination, PositionView, VaultClient, VaultHandlers,
};
pub use events::{EventMeta, TickRange, VaultEvent};
