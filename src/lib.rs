//! Skein: Content-Addressed Object-Graph Synchronization
//!
//! A synchronization engine for CAD/BIM interchange: object graphs with
//! content-hash identity, flattened and converted per host application, and
//! moved between hosts through content-addressed transports with structural
//! deduplication.

pub mod attributes;
pub mod config;
pub mod convert;
pub mod error;
pub mod flatten;
pub mod host;
pub mod logging;
pub mod model;
pub mod progress;
pub mod session;
pub mod stream;
pub mod sync;
pub mod transport;
pub mod types;
