//! Database abstraction layer.
//!
//! This module provides the procedure-call core:
//! - Connection seams and the MySQL pool
//! - Procedure invocation with multi-cursor consumption
//! - Result draining into domain records
//! - Atomic batched writes
//! - Scoped connection leases
//! - Gateway scaffolding macros

pub mod connection;
pub mod invoker;
pub mod lease;
#[macro_use]
pub mod macros;
pub mod mapper;
pub mod mysql;
pub mod params;
pub mod pool;
pub mod transaction;
pub mod types;

pub use connection::{ConnectionPool, ProcedureConnection};
pub use invoker::{Cursor, PreparedCall};
pub use lease::ConnectionLease;
pub use mapper::{drain_cursor, drain_first, drain_next, skip_cursor};
pub use mysql::MySqlProcedureConnection;
pub use pool::{MySqlConnectionPool, PoolStats};
pub use transaction::{BatchTemplate, execute_atomic};
pub use types::ResultRow;
