//! SQLite storage implementations using sqlx.

pub mod checkpoint;
pub mod pool;
