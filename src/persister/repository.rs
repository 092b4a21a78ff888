//! Repository facade over the three entities, backed by `sqlx`'s `Any`
//! driver so the same query text runs against Postgres in production and
//! SQLite in tests. Rows are mapped by hand rather than `derive(FromRow)`:
//! the `Any` driver only round-trips a small common subset of column types
//! (strings, integers, blobs), so richer domain types (`Uuid`, `U256`,
//! `DateTime<Utc>`) are parsed from their text form at the boundary.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use ethers::types::U256;
use sqlx::any::{install_default_drivers, AnyPoolOptions, AnyRow};
use sqlx::{AnyPool, Row};
use uuid::Uuid;

use crate::errors::{CoordinatorError, Result};

use super::models::{Pool, Position, PositionStatus, User};

pub struct Repository {
	pool: AnyPool,
}

impl Repository {
	pub async fn connect(database_url: &str) -> Result<Self> {
		install_default_drivers();
		let pool = AnyPoolOptions::new()
			.max_connections(10)
			.connect(database_url)
			.await
			.map_err(|e| CoordinatorError::PermanentRemote(e.into()))?;
		Ok(Self { pool })
	}

	pub async fn close(&self) {
		self.pool.close().await;
	}

	pub async fn migrate(&self) -> Result<()> {
		let statements = [
			"CREATE TABLE IF NOT EXISTS users (
				id TEXT PRIMARY KEY,
				wallet_address TEXT UNIQUE NOT NULL,
				is_active INTEGER NOT NULL,
				created_at TEXT NOT NULL
			)",
			"CREATE TABLE IF NOT EXISTS pools (
				id TEXT PRIMARY KEY,
				address TEXT NOT NULL,
				token0 TEXT NOT NULL,
				token1 TEXT NOT NULL,
				chain_id INTEGER NOT NULL
			)",
			"CREATE TABLE IF NOT EXISTS positions (
				id TEXT PRIMARY KEY,
				vault_position_id TEXT UNIQUE NOT NULL,
				proxy_position_id TEXT,
				user_id TEXT NOT NULL,
				pool_id TEXT NOT NULL,
				chain_id INTEGER NOT NULL,
				amount TEXT NOT NULL,
				liquidity TEXT,
				returned_amount TEXT,
				status TEXT NOT NULL,
				tick_lower_bps INTEGER NOT NULL,
				tick_upper_bps INTEGER NOT NULL,
				created_at TEXT NOT NULL,
				executed_at TEXT,
				liquidated_at TEXT
			)",
		];
		for statement in statements {
			sqlx::query(statement)
				.execute(&self.pool)
				.await
				.map_err(|e| CoordinatorError::PermanentRemote(e.into()))?;
		}
		Ok(())
	}

	pub async fn upsert_user(&self, wallet_address: &str) -> Result<User> {
		let wallet_address = wallet_address.to_lowercase();
		if let Some(existing) = self.get_user_by_address(&wallet_address).await? {
			return Ok(existing);
		}
		let id = Uuid::new_v4();
		let created_at = Utc::now();
		sqlx::query(
			"INSERT INTO users (id, wallet_address, is_active, created_at) VALUES (?, ?, ?, ?)",
		)
		.bind(id.to_string())
		.bind(&wallet_address)
		.bind(true)
		.bind(created_at.to_rfc3339())
		.execute(&self.pool)
		.await
		.map_err(|e| CoordinatorError::PermanentRemote(e.into()))?;

		Ok(User { id, wallet_address, is_active: true, created_at })
	}

	pub async fn get_user_by_address(&self, wallet_address: &str) -> Result<Option<User>> {
		let row = sqlx::query("SELECT id, wallet_address, is_active, created_at FROM users WHERE wallet_address = ?")
			.bind(wallet_address.to_lowercase())
			.fetch_optional(&self.pool)
			.await
			.map_err(|e| CoordinatorError::PermanentRemote(e.into()))?;
		row.map(row_to_user).transpose()
	}

	pub async fn upsert_pool(&self, address: &str, token0: &str, token1: &str, chain_id: i64) -> Result<Pool> {
		if let Some(existing) = self.get_pool_by_address(address).await? {
			return Ok(existing);
		}
		let id = Uuid::new_v4();
		sqlx::query("INSERT INTO pools (id, address, token0, token1, chain_id) VALUES (?, ?, ?, ?, ?)")
			.bind(id.to_string())
			.bind(address)
			.bind(token0)
			.bind(token1)
			.bind(chain_id)
			.execute(&self.pool)
			.await
			.map_err(|e| CoordinatorError::PermanentRemote(e.into()))?;
		Ok(Pool { id, address: address.to_string(), token0: token0.to_string(), token1: token1.to_string(), chain_id })
	}

	pub async fn get_pool_by_address(&self, address: &str) -> Result<Option<Pool>> {
		let row = sqlx::query("SELECT id, address, token0, token1, chain_id FROM pools WHERE address = ?")
			.bind(address)
			.fetch_optional(&self.pool)
			.await
			.map_err(|e| CoordinatorError::PermanentRemote(e.into()))?;
		row.map(row_to_pool).transpose()
	}

	pub async fn get_position_by_vault_id(&self, vault_position_id: &str) -> Result<Option<Position>> {
		let row = sqlx::query(SELECT_POSITION_COLUMNS)
			.bind(vault_position_id)
			.fetch_optional(&self.pool)
			.await
			.map_err(|e| CoordinatorError::PermanentRemote(e.into()))?;
		row.map(row_to_position).transpose()
	}

	pub async fn insert_or_reset_position(
		&self,
		vault_position_id: &str,
		user_id: Uuid,
		pool_id: Uuid,
		chain_id: i64,
		amount: U256,
		tick_lower_bps: i32,
		tick_upper_bps: i32,
	) -> Result<Position> {
		if let Some(mut existing) = self.get_position_by_vault_id(vault_position_id).await? {
			sqlx::query("UPDATE positions SET status = ? WHERE vault_position_id = ?")
				.bind(PositionStatus::PendingExecution.as_str())
				.bind(vault_position_id)
				.execute(&self.pool)
				.await
				.map_err(|e| CoordinatorError::PermanentRemote(e.into()))?;
			existing.status = PositionStatus::PendingExecution;
			return Ok(existing);
		}

		let id = Uuid::new_v4();
		let created_at = Utc::now();
		sqlx::query(
			"INSERT INTO positions (
				id, vault_position_id, proxy_position_id, user_id, pool_id, chain_id,
				amount, liquidity, returned_amount, status, tick_lower_bps, tick_upper_bps,
				created_at, executed_at, liquidated_at
			) VALUES (?, ?, NULL, ?, ?, ?, ?, NULL, NULL, ?, ?, ?, ?, NULL, NULL)",
		)
		.bind(id.to_string())
		.bind(vault_position_id)
		.bind(user_id.to_string())
		.bind(pool_id.to_string())
		.bind(chain_id)
		.bind(amount.to_string())
		.bind(PositionStatus::PendingExecution.as_str())
		.bind(tick_lower_bps)
		.bind(tick_upper_bps)
		.bind(created_at.to_rfc3339())
		.execute(&self.pool)
		.await
		.map_err(|e| CoordinatorError::PermanentRemote(e.into()))?;

		Ok(Position {
			id,
			vault_position_id: vault_position_id.to_string(),
			proxy_position_id: None,
			user_id,
			pool_id,
			chain_id,
			amount,
			liquidity: None,
			returned_amount: None,
			status: PositionStatus::PendingExecution,
			tick_lower_bps,
			tick_upper_bps,
			created_at,
			executed_at: None,
			liquidated_at: None,
		})
	}

	pub async fn mark_position_active(
		&self,
		vault_position_id: &str,
		proxy_position_id: &str,
		liquidity: U256,
	) -> Result<()> {
		sqlx::query(
			"UPDATE positions SET status = ?, proxy_position_id = ?, liquidity = ?, executed_at = ?
			 WHERE vault_position_id = ?",
		)
		.bind(PositionStatus::Active.as_str())
		.bind(proxy_position_id)
		.bind(liquidity.to_string())
		.bind(Utc::now().to_rfc3339())
		.bind(vault_position_id)
		.execute(&self.pool)
		.await
		.map_err(|e| CoordinatorError::PermanentRemote(e.into()))?;
		Ok(())
	}

	pub async fn mark_position_liquidated(
		&self,
		vault_position_id: &str,
		returned_amount: U256,
	) -> Result<()> {
		sqlx::query(
			"UPDATE positions SET status = ?, returned_amount = ?, liquidated_at = ? WHERE vault_position_id = ?",
		)
		.bind(PositionStatus::Liquidated.as_str())
		.bind(returned_amount.to_string())
		.bind(Utc::now().to_rfc3339())
		.bind(vault_position_id)
		.execute(&self.pool)
		.await
		.map_err(|e| CoordinatorError::PermanentRemote(e.into()))?;
		Ok(())
	}

	pub async fn mark_position_failed(&self, vault_position_id: &str) -> Result<()> {
		sqlx::query("UPDATE positions SET status = ? WHERE vault_position_id = ?")
			.bind(PositionStatus::Failed.as_str())
			.bind(vault_position_id)
			.execute(&self.pool)
			.await
			.map_err(|e| CoordinatorError::PermanentRemote(e.into()))?;
		Ok(())
	}

	/// Best-effort update of the proxy-reported position id and liquidity,
	/// used when the Proxy observes `PositionExecuted` ahead of - or instead
	/// of - the Vault's own `PositionExecutionConfirmed`.
	pub async fn update_proxy_position_best_effort(
		&self,
		vault_position_id: &str,
		proxy_position_id: &str,
		liquidity: U256,
	) -> Result<bool> {
		let result = sqlx::query(
			"UPDATE positions SET proxy_position_id = ?, liquidity = ? WHERE vault_position_id = ?",
		)
		.bind(proxy_position_id)
		.bind(liquidity.to_string())
		.bind(vault_position_id)
		.execute(&self.pool)
		.await
		.map_err(|e| CoordinatorError::PermanentRemote(e.into()))?;
		Ok(result.rows_affected() > 0)
	}
}

const SELECT_POSITION_COLUMNS: &str = "SELECT id, vault_position_id, proxy_position_id, user_id, pool_id, chain_id, amount, liquidity, returned_amount, status, tick_lower_bps, tick_upper_bps, created_at, executed_at, liquidated_at FROM positions WHERE vault_position_id = ?";

fn parse_uuid(raw: &str) -> Result<Uuid> {
	Uuid::from_str(raw).map_err(|e| CoordinatorError::Validation(format!("invalid uuid in row: {e}")))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
	DateTime::parse_from_rfc3339(raw)
		.map(|dt| dt.with_timezone(&Utc))
		.map_err(|e| CoordinatorError::Validation(format!("invalid timestamp in row: {e}")))
}

fn parse_u256(raw: &str) -> Result<U256> {
	U256::from_dec_str(raw).map_err(|e| CoordinatorError::Validation(format!("invalid u256 in row: {e}")))
}

fn row_to_user(row: AnyRow) -> Result<User> {
	Ok(User {
		id: parse_uuid(&row.try_get::<String, _>("id").unwrap_or_default())?,
		wallet_address: row.try_get("wallet_address").unwrap_or_default(),
		is_active: row.try_get::<i64, _>("is_active").unwrap_or(0) != 0,
		created_at: parse_timestamp(&row.try_get::<String, _>("created_at").unwrap_or_default())?,
	})
}

fn row_to_pool(row: AnyRow) -> Result<Pool> {
	Ok(Pool {
		id: parse_uuid(&row.try_get::<String, _>("id").unwrap_or_default())?,
		address: row.try_get("address").unwrap_or_default(),
		token0: row.try_get("token0").unwrap_or_default(),
		token1: row.try_get("token1").unwrap_or_default(),
		chain_id: row.try_get("chain_id").unwrap_or_default(),
	})
}

fn row_to_position(row: AnyRow) -> Result<Position> {
	let amount: String = row.try_get("amount").unwrap_or_default();
	let liquidity: Option<String> = row.try_get("liquidity").ok();
	let returned_amount: Option<String> = row.try_get("returned_amount").ok();
	let executed_at: Option<String> = row.try_get("executed_at").ok();
	let liquidated_at: Option<String> = row.try_get("liquidated_at").ok();
	let status: String = row.try_get("status").unwrap_or_default();

	Ok(Position {
		id: parse_uuid(&row.try_get::<String, _>("id").unwrap_or_default())?,
		vault_position_id: row.try_get("vault_position_id").unwrap_or_default(),
		proxy_position_id: row.try_get("proxy_position_id").ok(),
		user_id: parse_uuid(&row.try_get::<String, _>("user_id").unwrap_or_default())?,
		pool_id: parse_uuid(&row.try_get::<String, _>("pool_id").unwrap_or_default())?,
		chain_id: row.try_get("chain_id").unwrap_or_default(),
		amount: parse_u256(&amount)?,
		liquidity: liquidity.filter(|v| !v.is_empty()).map(|v| parse_u256(&v)).transpose()?,
		returned_amount: returned_amount.filter(|v| !v.is_empty()).map(|v| parse_u256(&v)).transpose()?,
		status: PositionStatus::from_str(&status)?,
		tick_lower_bps: row.try_get("tick_lower_bps").unwrap_or_default(),
		tick_upper_bps: row.try_get("tick_upper_bps").unwrap_or_default(),
		created_at: parse_timestamp(&row.try_get::<String, _>("created_at").unwrap_or_default())?,
		executed_at: executed_at.filter(|v| !v.is_empty()).map(|v| parse_timestamp(&v)).transpose()?,
		liquidated_at: liquidated_at.filter(|v| !v.is_empty()).map(|v| parse_timestamp(&v)).transpose()?,
	})
}

#[cfg(test)]
impl Repository {
	pub(crate) fn pool_for_tests(&self) -> &AnyPool {
		&self.pool
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	async fn test_repository() -> Repository {
		let repo = Repository::connect("sqlite::memory:").await.unwrap();
		repo.migrate().await.unwrap();
		repo
	}

	#[tokio::test]
	async fn upsert_user_is_idempotent_and_lowercases_address() {
		let repo = test_repository().await;
		let a = repo.upsert_user("0xABCDEF").await.unwrap();
		let b = repo.upsert_user("0xabcdef").await.unwrap();
		assert_eq!(a.id, b.id);
		assert_eq!(a.wallet_address, "0xabcdef");
	}

	#[tokio::test]
	async fn insert_or_reset_position_resets_existing_to_pending() {
		let repo = test_repository().await;
		let user = repo.upsert_user("0xuser").await.unwrap();
		let pool_id = Uuid::new_v4();
		sqlx::query("INSERT INTO pools (id, address, token0, token1, chain_id) VALUES (?, ?, ?, ?, ?)")
			.bind(pool_id.to_string())
			.bind("0xpool")
			.bind("0xtoken0")
			.bind("0xtoken1")
			.bind(1284i64)
			.execute(&repo.pool)
			.await
			.unwrap();

		let created = repo
			.insert_or_reset_position("pos-1", user.id, pool_id, 1284, U256::from(500u64), -500, 500)
			.await
			.unwrap();
		assert_eq!(created.status, PositionStatus::PendingExecution);

		repo.mark_position_active("pos-1", "proxy-1", U256::from(999u64)).await.unwrap();
		let active = repo.get_position_by_vault_id("pos-1").await.unwrap().unwrap();
		assert_eq!(active.status, PositionStatus::Active);

		let reset =
			repo.insert_or_reset_position("pos-1", user.id, pool_id, 1284, U256::from(500u64), -500, 500)
				.await
				.unwrap();
		assert_eq!(reset.status, PositionStatus::PendingExecution);
	}

	#[tokio::test]
	async fn mark_position_liquidated_sets_returned_amount() {
		let repo = test_repository().await;
		let user = repo.upsert_user("0xuser").await.unwrap();
		let pool_id = Uuid::new_v4();
		sqlx::query("INSERT INTO pools (id, address, token0, token1, chain_id) VALUES (?, ?, ?, ?, ?)")
			.bind(pool_id.to_string())
			.bind("0xpool")
			.bind("0xtoken0")
			.bind("0xtoken1")
			.bind(1284i64)
			.execute(&repo.pool)
			.await
			.unwrap();
		repo.insert_or_reset_position("pos-2", user.id, pool_id, 1284, U256::from(500u64), -500, 500)
			.await
			.unwrap();

		repo.mark_position_liquidated("pos-2", U256::from(480u64)).await.unwrap();
		let position = repo.get_position_by_vault_id("pos-2").await.unwrap().unwrap();
		assert_eq!(position.status, PositionStatus::Liquidated);
		assert_eq!(position.returned_amount, Some(U256::from(480u64)));
	}
}
