//! Durable storage: SQLite pool, schema migrations, backups.

pub mod backup;
pub mod db;
pub mod migrations;

pub use db::{DbConnection, DbPool, create_pool, get_connection};
