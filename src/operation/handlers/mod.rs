//! Protocol handlers for the AWS wire protocols in the operation table
//!
//! Each handler turns a [`RequestValue`] into an HTTP call and parses the
//! raw response back into an envelope.

mod query;
mod rest_json;

pub use self::query::QueryProtocolHandler;
pub use self::rest_json::RestJsonProtocolHandler;

use super::descriptor::{ApiProtocol, OperationDescriptor};
use super::request::RequestValue;
use crate::aws::http::AwsHttpClient;
use crate::error::Result;
use serde_json::Value;

/// Protocol-specific response parsing
///
/// Kept synchronous so handlers stay dyn-compatible; the async request side
/// lives on each handler as `execute_impl`.
pub trait ProtocolHandler: Send + Sync {
    /// Parse a raw response body into the envelope for `descriptor`
    fn parse_envelope(&self, response: &str, descriptor: &OperationDescriptor) -> Result<Value>;
}

/// Dispatches to the handler for one protocol
pub struct UnifiedProtocolHandler {
    protocol: ApiProtocol,
}

impl UnifiedProtocolHandler {
    pub fn new(protocol: ApiProtocol) -> Self {
        Self { protocol }
    }

    pub async fn execute(
        &self,
        http: &AwsHttpClient,
        descriptor: &OperationDescriptor,
        request: &RequestValue,
    ) -> Result<String> {
        match self.protocol {
            ApiProtocol::Query => QueryProtocolHandler.execute_impl(http, descriptor, request).await,
            ApiProtocol::RestJson => {
                RestJsonProtocolHandler
                    .execute_impl(http, descriptor, request)
                    .await
            }
        }
    }

    pub fn parse_envelope(&self, response: &str, descriptor: &OperationDescriptor) -> Result<Value> {
        match self.protocol {
            ApiProtocol::Query => QueryProtocolHandler.parse_envelope(response, descriptor),
            ApiProtocol::RestJson => RestJsonProtocolHandler.parse_envelope(response, descriptor),
        }
    }

    /// Full pipeline: send the request and parse the envelope
    pub async fn invoke(
        &self,
        http: &AwsHttpClient,
        descriptor: &OperationDescriptor,
        request: &RequestValue,
    ) -> Result<Value> {
        let response = self.execute(http, descriptor, request).await?;
        self.parse_envelope(&response, descriptor)
    }
}

pub fn get_protocol_handler(protocol: ApiProtocol) -> UnifiedProtocolHandler {
    UnifiedProtocolHandler::new(protocol)
}
