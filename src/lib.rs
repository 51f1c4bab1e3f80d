//! Generic paginated-operation invoker for AWS services
//!
//! Operations are described by data ([`operation::OperationDescriptor`]);
//! the engine turns bound parameters into requests, walks cursor
//! pagination and unwraps each page for the caller.

pub mod aws;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod operation;

pub use error::{Error, Result};
