//! Position State Machine / Persister (C7): one idempotent handler per
//! observed event kind, backed by the `users`/`pools`/`positions` tables.

pub mod handlers;
pub mod models;
pub mod repository;

pub use handlers::Persister;
pub use models::{Pool, Position, PositionStatus, User};
pub use repository::Repository;
