//! Clinic Registry Gateway Library
//!
//! This library is the data-access gateway of a clinic registry: it runs
//! stored procedures on pooled MySQL connections, consumes their result
//! cursors and output parameters in a fixed order, makes batched writes
//! atomic, and maps rows into domain records.

pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod models;

pub use config::Config;
pub use error::DbError;
pub use gateway::Registry;
