//! Database layer
//!
//! Supports SQLite (default, a single file or `:memory:`) and MySQL behind
//! the `DatabasePool` trait. The driver comes from configuration.
//!
//! ```ignore
//! use authors::config::DatabaseConfig;
//! use authors::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
