#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Gatekeep shared infrastructure
//!
//! Database plumbing used by the API binary: connection pools and the
//! embedded schema migrations for the credential store.

pub mod db;

pub use db::{create_pool, run_migrations, DbError};
