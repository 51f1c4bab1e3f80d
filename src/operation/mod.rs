//! Data-driven operation engine
//!
//! Operations are described in JSON definition files; the engine builds
//! requests from bound parameters, drives pagination and unwraps responses
//! without any per-operation code.

pub mod batch;
pub mod descriptor;
pub mod handlers;
pub mod invoker;
pub mod params;
pub mod path_extractor;
pub mod registry;
pub mod request;
pub mod unwrap;

pub use batch::{run_batch, BatchEvent, BatchSummary};
pub use descriptor::{ApiProtocol, OperationDescriptor};
pub use invoker::{
    invoke_paginated, InvocationFailure, InvokeOptions, PaginationOutcome, RemoteClient,
};
pub use params::BoundParams;
pub use registry::registry;
pub use request::{build_request, RequestValue};
pub use unwrap::{Page, Selector};
