//! Error types crossing the invocation engine boundary
//!
//! Application plumbing (CLI, config loading) uses `anyhow`. Anything the
//! engine hands back to a caller is an [`Error`] so callers can branch on
//! the kind of failure.

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// A parameter problem detected locally, before any network call
    #[error("{operation}: {message}")]
    Configuration { operation: String, message: String },

    /// The endpoint could not be reached (name resolution failed)
    #[error("could not resolve endpoint {endpoint} (region: {region}, profile: {profile}): {message}")]
    Transport {
        endpoint: String,
        region: String,
        profile: String,
        message: String,
        #[source]
        source: anyhow::Error,
    },

    /// An error reported by the remote service itself
    #[error("{code} ({status}): {message}")]
    RemoteService {
        status: u16,
        code: String,
        message: String,
    },

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn configuration(operation: &str, message: impl Into<String>) -> Self {
        Error::Configuration {
            operation: operation.to_string(),
            message: message.into(),
        }
    }

    pub fn missing_parameter(operation: &str, parameter: &str) -> Self {
        Self::configuration(
            operation,
            format!("missing required parameter '{}'", parameter),
        )
    }

    /// Remote error code, when the service declared one
    pub fn remote_code(&self) -> Option<&str> {
        match self {
            Error::RemoteService { code, .. } => Some(code),
            _ => None,
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration { .. })
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Other(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_parameter_message() {
        let err = Error::missing_parameter("DescribeStackEvents", "StackName");
        assert!(err.is_configuration());
        assert_eq!(
            err.to_string(),
            "DescribeStackEvents: missing required parameter 'StackName'"
        );
    }

    #[test]
    fn test_remote_code_only_for_service_errors() {
        let err = Error::RemoteService {
            status: 400,
            code: "ValidationError".to_string(),
            message: "Stack with id foo does not exist".to_string(),
        };
        assert_eq!(err.remote_code(), Some("ValidationError"));
        assert_eq!(
            err.to_string(),
            "ValidationError (400): Stack with id foo does not exist"
        );

        let other = Error::Other(anyhow::anyhow!("boom"));
        assert_eq!(other.remote_code(), None);
    }
}
