//! Infrastructure layer: I/O implementations, HTTP server and DI container
//!
//! This layer implements I/O boundary traits and wires up services.

pub mod di;
pub mod error;
pub mod fetch;
pub mod server;
pub mod traits;

pub use error::{InfraError, InfraResult};
