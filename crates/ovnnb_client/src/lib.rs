//! # OVN Northbound Client
//!
//! Cache-backed client for the OVN Northbound database.
//!
//! This crate provides:
//! - A local cache of the Northbound tables, seeded from a monitor snapshot
//!   and kept current from update notifications
//! - Port and ACL creation/deletion events
//! - Command builders for switches, ports, ACLs, address sets and DHCP
//!   options, checked against the cache
//! - A transaction executor that batches commands into one atomic
//!   transaction and validates the reply
//! - Typed projections of cached rows
//!
//! ## Architecture
//!
//! Writes never touch the cache directly:
//! 1. A builder reads the cache and returns a `Command`
//! 2. The executor sends the commands as one transaction
//! 3. The server's update notification reaches the synchronizer
//! 4. The synchronizer applies the batch and emits events
//!
//! The cache is therefore eventually consistent with the client's own
//! writes.
//!
//! ## Key Invariants
//!
//! - Every update batch is applied atomically with respect to readers
//! - Relationship columns are read in both wire shapes
//! - Transactions are serialized per client
//! - The reply must carry one result per operation

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
mod cache;
mod client;
mod command;
mod config;
mod error;
mod events;
mod executor;
mod matcher;
mod projection;
mod sync;
mod transport;

pub use api::{AclApi, AclSpec, AddressSetApi, DhcpOptionsApi, LogicalPortApi, LogicalSwitchApi};
pub use cache::{Cache, TableRows, Tables};
pub use client::{ClientState, NbClient};
pub use command::{Command, CommandReply};
pub use config::{ClientConfig, DEFAULT_ENDPOINT};
pub use error::{NbError, NbResult, OperationFailure, TransactionFailure};
pub use events::{EventChannel, EventHandler, NbEvent};
pub use executor::validate_reply;
pub use matcher::{find_acl, find_acls, references_contain, Criteria, Expect};
pub use projection::{Acl, AddressSet, DhcpOptions, FromRow, LogicalSwitch, LogicalSwitchPort};
pub use sync::{BatchStats, Synchronizer};
pub use transport::{MockTransport, Transport, UpdateListener};
