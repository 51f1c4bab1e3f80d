//! Profile, region and endpoint resolution
//!
//! Flags and environment variables arrive already merged by clap; this fills
//! in what is still missing from the shared config file.

use crate::aws::credentials::ProfileFiles;
use tracing::debug;

pub const DEFAULT_PROFILE: &str = "default";
pub const DEFAULT_REGION: &str = "us-east-1";

/// Connection settings for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub profile: String,
    pub region: String,
    pub endpoint_url: Option<String>,
}

impl ConnectionConfig {
    /// Resolve from explicit values, falling back to the profile's region in
    /// the config file and finally us-east-1
    pub fn resolve(
        profile: Option<String>,
        region: Option<String>,
        endpoint_url: Option<String>,
        files: Option<&ProfileFiles>,
    ) -> Self {
        let profile = profile
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| DEFAULT_PROFILE.to_string());

        let region = region
            .filter(|r| !r.is_empty())
            .or_else(|| files.and_then(|f| f.region(&profile)))
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        let endpoint_url = endpoint_url.filter(|e| !e.is_empty());

        debug!(
            "Resolved profile={}, region={}, endpoint_url={:?}",
            profile, region, endpoint_url
        );
        Self {
            profile,
            region,
            endpoint_url,
        }
    }
}
