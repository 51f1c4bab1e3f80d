//! AWS Client - Lightweight HTTP-based client
//!
//! Uses SigV4 signing with direct HTTP calls instead of heavy SDK

use super::credentials::{load_credentials, Credentials};
use super::http::AwsHttpClient;
use crate::error::{Error, Result};
use crate::operation::handlers::get_protocol_handler;
use crate::operation::{OperationDescriptor, RemoteClient, RequestValue};
use serde_json::Value;
use tracing::debug;

/// Root-cause fragments that mean the endpoint host name did not resolve
const NAME_RESOLUTION_MARKERS: &[&str] = &[
    "dns error",
    "failed to lookup address",
    "name or service not known",
    "nodename nor servname",
    "no such host",
    "temporary failure in name resolution",
];

/// Container for AWS HTTP client
pub struct AwsClients {
    pub http: AwsHttpClient,
    pub region: String,
    pub profile: String,
}

impl AwsClients {
    /// Create AWS client for a given profile and region
    /// Note: credential files are read on a blocking thread
    pub async fn new(
        profile: &str,
        region: &str,
        endpoint_url: Option<String>,
    ) -> anyhow::Result<Self> {
        let profile_for_closure = profile.to_string();
        let credentials =
            tokio::task::spawn_blocking(move || load_credentials(&profile_for_closure)).await??;

        Ok(Self::with_credentials(credentials, profile, region, endpoint_url))
    }

    pub fn with_credentials(
        credentials: Credentials,
        profile: &str,
        region: &str,
        endpoint_url: Option<String>,
    ) -> Self {
        Self {
            http: AwsHttpClient::new(credentials, region, endpoint_url),
            region: region.to_string(),
            profile: profile.to_string(),
        }
    }
}

impl RemoteClient for AwsClients {
    async fn invoke(&self, descriptor: &OperationDescriptor, request: &RequestValue) -> Result<Value> {
        get_protocol_handler(descriptor.protocol)
            .invoke(&self.http, descriptor, request)
            .await
    }

    /// Name-resolution failures become transport errors carrying the
    /// endpoint, region and profile; everything else passes through.
    fn normalize_error(&self, descriptor: &OperationDescriptor, err: Error) -> Error {
        match err {
            Error::Other(source) if is_name_resolution_failure(&source) => {
                let endpoint = self
                    .http
                    .endpoint(&descriptor.service)
                    .unwrap_or_else(|_| descriptor.service.clone());
                debug!("{}: name resolution failed for {}", descriptor.name, endpoint);
                Error::Transport {
                    endpoint,
                    region: self.region.clone(),
                    profile: self.profile.clone(),
                    message: source.root_cause().to_string(),
                    source,
                }
            }
            other => other,
        }
    }
}

/// Whether any error in the chain is a DNS lookup failure
pub fn is_name_resolution_failure(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        let text = cause.to_string().to_lowercase();
        NAME_RESOLUTION_MARKERS.iter().any(|m| text.contains(m))
    })
}

/// A short remediation hint for common failures
pub fn error_hint(err: &Error) -> Option<&'static str> {
    match err {
        Error::Transport { .. } => Some("check the region, endpoint URL and network connection"),
        Error::RemoteService { code, .. } => match code.as_str() {
            "InvalidClientTokenId" | "UnrecognizedClientException" | "SignatureDoesNotMatch" => {
                Some("invalid credentials - run 'aws configure'")
            }
            "ExpiredToken" | "ExpiredTokenException" => {
                Some("credentials expired - refresh or reconfigure")
            }
            "AccessDenied" | "AccessDeniedException" => Some("access denied - check IAM permissions"),
            "Throttling" | "ThrottlingException" | "TooManyRequestsException" => {
                Some("request throttled - retry later")
            }
            _ => None,
        },
        _ => None,
    }
}
