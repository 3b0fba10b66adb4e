//! PostgreSQL backend for schoolseed.
//!
//! [`PgStore`] runs every generation phase inside its own transaction, and
//! [`schema`] applies or tears down the school tables.

pub mod options;
pub mod schema;
pub mod store;

pub use options::ConnectOptions;
pub use schema::{DdlFailure, DdlReport, apply_ddl, drop_tables, split_statements};
pub use store::PgStore;
