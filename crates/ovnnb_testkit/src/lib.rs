//! # OVN Northbound Testkit
//!
//! Test utilities for OVN Northbound clients.
//!
//! This crate provides:
//! - `MemoryDatabase`, an in-memory Northbound database with OVSDB
//!   transaction semantics and update notifications
//! - Immediate or deferred update delivery
//! - Fault injection for failed and truncated replies
//! - Fixtures for common topologies
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ovnnb_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_database() {
//!     let db = MemoryDatabase::new();
//!     seed_switch(&db, "ls1", &["p1", "p2"]);
//!     assert_eq!(db.row_count("Logical_Switch_Port"), 2);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod database;
mod error;
pub mod fixtures;
pub mod generators;
pub mod schema;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::{Delivery, MemoryDatabase, MemoryDatabaseConfig};
}

pub use config::{Delivery, MemoryDatabaseConfig};
pub use database::{MemoryDatabase, Subscriber};
pub use error::{DatabaseError, DatabaseResult};
pub use fixtures::*;
pub use generators::*;
