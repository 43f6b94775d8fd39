//! SQLite storage layer.
//!
//! Character and transcript persistence backed by SQLite with WAL mode and
//! split read/write connection pools.

pub mod character;
pub mod pool;
