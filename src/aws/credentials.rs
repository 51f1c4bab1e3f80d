//! AWS credentials and profile settings
//!
//! Supports:
//! - Environment variables (AWS_ACCESS_KEY_ID, AWS_SECRET_ACCESS_KEY, AWS_SESSION_TOKEN)
//! - Static keys in ~/.aws/credentials and ~/.aws/config
//! - Profile region from ~/.aws/config

use anyhow::anyhow;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, trace};

#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("No credentials found for profile '{profile}'. Run 'aws configure' or set AWS_ACCESS_KEY_ID/AWS_SECRET_ACCESS_KEY")]
    NotFound { profile: String },

    #[error("Profile '{profile}' is missing '{key}'")]
    Incomplete { profile: String, key: &'static str },

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// AWS credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

type Sections = HashMap<String, HashMap<String, String>>;

/// Locations of the shared config and credentials files
#[derive(Debug, Clone)]
pub struct ProfileFiles {
    pub config: PathBuf,
    pub credentials: PathBuf,
}

impl ProfileFiles {
    /// Standard locations, honoring AWS_CONFIG_FILE and AWS_SHARED_CREDENTIALS_FILE
    pub fn locate() -> anyhow::Result<Self> {
        let config = match env::var("AWS_CONFIG_FILE") {
            Ok(path) => PathBuf::from(path),
            Err(_) => aws_config_dir()?.join("config"),
        };
        let credentials = match env::var("AWS_SHARED_CREDENTIALS_FILE") {
            Ok(path) => PathBuf::from(path),
            Err(_) => aws_config_dir()?.join("credentials"),
        };
        Ok(Self { config, credentials })
    }

    /// Static credentials for a profile; the credentials file wins over config
    pub fn credentials(&self, profile: &str) -> Result<Credentials, CredentialsError> {
        for path in [&self.credentials, &self.config] {
            let sections = read_sections(path)?;
            let Some(section) = sections.get(profile) else {
                trace!("Profile '{}' not in {:?}", profile, path);
                continue;
            };
            if let Some(creds) = static_credentials(profile, section)? {
                debug!("Loaded credentials for profile '{}' from {:?}", profile, path);
                return Ok(creds);
            }
        }
        Err(CredentialsError::NotFound {
            profile: profile.to_string(),
        })
    }

    /// Region configured for a profile in the config file
    pub fn region(&self, profile: &str) -> Option<String> {
        read_sections(&self.config)
            .ok()?
            .get(profile)?
            .get("region")
            .filter(|r| !r.is_empty())
            .cloned()
    }
}

/// Load credentials for a profile.
///
/// Environment variables are only consulted for the default profile, so an
/// explicitly chosen profile is never shadowed by ambient keys.
pub fn load_credentials(profile: &str) -> Result<Credentials, CredentialsError> {
    if profile == "default" {
        if let Some(creds) = credentials_from_vars(|k| env::var(k).ok()) {
            debug!("Loaded credentials from environment variables");
            return Ok(creds);
        }
    }
    ProfileFiles::locate()?.credentials(profile)
}

/// Credentials from AWS_* variables, when both keys are present
fn credentials_from_vars(var: impl Fn(&str) -> Option<String>) -> Option<Credentials> {
    Some(Credentials {
        access_key_id: var("AWS_ACCESS_KEY_ID").filter(|v| !v.is_empty())?,
        secret_access_key: var("AWS_SECRET_ACCESS_KEY").filter(|v| !v.is_empty())?,
        session_token: var("AWS_SESSION_TOKEN").filter(|v| !v.is_empty()),
    })
}

fn static_credentials(
    profile: &str,
    section: &HashMap<String, String>,
) -> Result<Option<Credentials>, CredentialsError> {
    let Some(access_key_id) = section.get("aws_access_key_id") else {
        return Ok(None);
    };
    let secret_access_key =
        section
            .get("aws_secret_access_key")
            .ok_or_else(|| CredentialsError::Incomplete {
                profile: profile.to_string(),
                key: "aws_secret_access_key",
            })?;

    Ok(Some(Credentials {
        access_key_id: access_key_id.clone(),
        secret_access_key: secret_access_key.clone(),
        session_token: section.get("aws_session_token").cloned(),
    }))
}

/// Get AWS config directory
pub fn aws_config_dir() -> anyhow::Result<PathBuf> {
    dirs::home_dir()
        .map(|h| h.join(".aws"))
        .ok_or_else(|| anyhow!("Could not find home directory"))
}

/// Sections of an INI file; a missing file has none
fn read_sections(path: &Path) -> anyhow::Result<Sections> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(parse_ini_file(&content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Sections::new()),
        Err(e) => Err(anyhow!("Could not read {:?}: {}", path, e)),
    }
}

/// Parse an INI-style file into sections keyed by profile name
fn parse_ini_file(content: &str) -> Sections {
    let mut sections = Sections::new();
    let mut current: Option<String> = None;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if let Some(header) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let header = header.trim();
            // config file uses "[profile name]", credentials file "[name]"
            let name = header.strip_prefix("profile ").unwrap_or(header).trim();
            sections.entry(name.to_string()).or_default();
            current = Some(name.to_string());
            continue;
        }

        if let (Some(section), Some((key, value))) = (&current, line.split_once('=')) {
            sections
                .entry(section.clone())
                .or_default()
                .insert(key.trim().to_string(), value.trim().to_string());
        }
    }

    sections
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn profile_files(config: &str, credentials: &str) -> (TempDir, ProfileFiles) {
        let dir = tempfile::tempdir().unwrap();
        let files = ProfileFiles {
            config: dir.path().join("config"),
            credentials: dir.path().join("credentials"),
        };
        fs::File::create(&files.config)
            .unwrap()
            .write_all(config.as_bytes())
            .unwrap();
        fs::File::create(&files.credentials)
            .unwrap()
            .write_all(credentials.as_bytes())
            .unwrap();
        (dir, files)
    }

    #[test]
    fn test_parse_ini_file() {
        let content = r#"
# comment
[default]
aws_access_key_id = AKIADEFAULT
aws_secret_access_key = secret_default

[profile dev]
region=eu-west-1
"#;
        let sections = parse_ini_file(content);

        assert_eq!(sections["default"]["aws_access_key_id"], "AKIADEFAULT");
        assert_eq!(sections["dev"]["region"], "eu-west-1");
    }

    #[test]
    fn test_credentials_file_wins_over_config() {
        let (_dir, files) = profile_files(
            "[profile dev]\naws_access_key_id = FROMCONFIG\naws_secret_access_key = s1\n",
            "[dev]\naws_access_key_id = FROMCREDS\naws_secret_access_key = s2\naws_session_token = tok\n",
        );

        let creds = files.credentials("dev").unwrap();
        assert_eq!(creds.access_key_id, "FROMCREDS");
        assert_eq!(creds.session_token.as_deref(), Some("tok"));
    }

    #[test]
    fn test_credentials_from_config_only() {
        let (_dir, files) = profile_files(
            "[profile ci]\naws_access_key_id = AKIACI\naws_secret_access_key = s\n",
            "",
        );
        assert_eq!(files.credentials("ci").unwrap().access_key_id, "AKIACI");
    }

    #[test]
    fn test_missing_profile_and_incomplete_keys() {
        let (_dir, files) = profile_files("", "[half]\naws_access_key_id = AKIAHALF\n");

        assert!(matches!(
            files.credentials("nobody"),
            Err(CredentialsError::NotFound { .. })
        ));
        assert!(matches!(
            files.credentials("half"),
            Err(CredentialsError::Incomplete { key: "aws_secret_access_key", .. })
        ));
    }

    #[test]
    fn test_missing_files_are_empty() {
        let dir = tempfile::tempdir().unwrap();
        let files = ProfileFiles {
            config: dir.path().join("nope"),
            credentials: dir.path().join("nope-either"),
        };
        assert!(matches!(
            files.credentials("default"),
            Err(CredentialsError::NotFound { .. })
        ));
        assert_eq!(files.region("default"), None);
    }

    #[test]
    fn test_profile_region() {
        let (_dir, files) = profile_files(
            "[default]\nregion = us-west-2\n[profile dev]\nregion =\n",
            "",
        );
        assert_eq!(files.region("default").as_deref(), Some("us-west-2"));
        assert_eq!(files.region("dev"), None);
    }

    #[test]
    fn test_credentials_from_vars() {
        let vars: HashMap<&str, &str> = [
            ("AWS_ACCESS_KEY_ID", "AKIAENV"),
            ("AWS_SECRET_ACCESS_KEY", "secret"),
        ]
        .into_iter()
        .collect();

        let creds = credentials_from_vars(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(creds.access_key_id, "AKIAENV");
        assert_eq!(creds.session_token, None);

        assert!(credentials_from_vars(|k| {
            (k == "AWS_ACCESS_KEY_ID").then(|| "AKIAENV".to_string())
        })
        .is_none());
    }
}
