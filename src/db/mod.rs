//! Database layer
//!
//! Connection pooling (SQLite or MySQL, chosen by configuration), the
//! embedded schema migrations and one repository per entity.
//!
//! # Usage
//!
//! ```ignore
//! use inkblog::config::DatabaseConfig;
//! use inkblog::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
