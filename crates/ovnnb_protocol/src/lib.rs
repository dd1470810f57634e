//! # OVN Northbound Protocol
//!
//! Wire types for talking to an OVN Northbound database over the OVSDB
//! management protocol (RFC 7047).
//!
//! This crate provides:
//! - `RowId`, `RefSet`, `FieldValue` and `Row` for table contents
//! - `Operation`, `Condition`, `Mutation` and `OperationResult` for
//!   transactions
//! - `TableUpdates` for monitor snapshots and update notifications
//! - Names and relationships of the modelled Northbound tables
//! - Encoding to and from OVSDB JSON notation
//!
//! This is a pure protocol crate with no I/O operations. JSON-RPC framing is
//! left to the transport.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod operation;
pub mod schema;
mod update;
mod value;

pub use error::{ProtocolError, ProtocolResult};
pub use operation::{
    transact_params, Condition, Function, Mutation, Mutator, OpKind, Operation, OperationResult,
};
pub use schema::{Table, NB_DATABASE};
pub use update::{RowUpdate, TableUpdate, TableUpdates};
pub use value::{FieldValue, RefSet, Row, RowId};
