//! Operation registry
//!
//! Loads the embedded JSON definition files (one per service) into a
//! process-wide table of [`OperationDescriptor`]s.

use super::descriptor::{ApiProtocol, FieldLocation, OperationDescriptor};
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::OnceLock;

const DEFINITIONS: &[(&str, &str)] = &[
    (
        "cloudformation.json",
        include_str!("definitions/cloudformation.json"),
    ),
    (
        "emr-serverless.json",
        include_str!("definitions/emr-serverless.json"),
    ),
    (
        "pinpoint-email.json",
        include_str!("definitions/pinpoint-email.json"),
    ),
];

/// One definition file: a service and its operations
#[derive(Debug, Deserialize)]
struct DefinitionFile {
    service: String,
    #[serde(default)]
    protocol: ApiProtocol,
    operations: Vec<OperationDescriptor>,
}

#[derive(Debug, Default)]
pub struct Registry {
    operations: Vec<OperationDescriptor>,
}

static REGISTRY: OnceLock<std::result::Result<Registry, String>> = OnceLock::new();

/// The process-wide registry, parsed on first use
pub fn registry() -> Result<&'static Registry> {
    REGISTRY
        .get_or_init(|| Registry::from_sources(DEFINITIONS).map_err(|e| format!("{:#}", e)))
        .as_ref()
        .map_err(|e| anyhow!("Invalid operation definitions: {}", e))
}

impl Registry {
    fn from_sources(sources: &[(&str, &str)]) -> Result<Self> {
        let mut operations = Vec::new();
        for (file_name, content) in sources {
            let file: DefinitionFile = serde_json::from_str(content)
                .with_context(|| format!("Failed to parse {}", file_name))?;
            for mut op in file.operations {
                op.service = file.service.clone();
                op.protocol = file.protocol;
                operations.push(op);
            }
        }
        Ok(Self { operations })
    }

    pub fn operations(&self) -> &[OperationDescriptor] {
        &self.operations
    }

    /// Find an operation by name (case-insensitive), optionally qualified as
    /// `service:Operation` when two services share a name.
    pub fn get(&self, name: &str) -> Option<&OperationDescriptor> {
        let (service, op_name) = match name.split_once(':') {
            Some((service, op)) => (Some(service), op),
            None => (None, name),
        };

        self.operations.iter().find(|op| {
            op.name.eq_ignore_ascii_case(op_name)
                && service.map_or(true, |s| op.service.eq_ignore_ascii_case(s))
        })
    }

    pub fn services(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for op in &self.operations {
            if !seen.contains(&op.service.as_str()) {
                seen.push(op.service.as_str());
            }
        }
        seen
    }

    /// Consistency problems in the loaded definitions
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let mut names = HashSet::new();

        for op in &self.operations {
            let key = format!("{}:{}", op.service, op.name);
            if !names.insert(key.to_lowercase()) {
                problems.push(format!("{}: duplicate operation", key));
            }

            if let Some(pagination) = &op.pagination {
                if op.cursor_field().is_none() {
                    problems.push(format!(
                        "{}: cursor parameter '{}' is not a declared field",
                        key, pagination.input_token
                    ));
                }
                if let Some(size) = &pagination.page_size_param {
                    if op.page_size_field().is_none() {
                        problems.push(format!(
                            "{}: page size parameter '{}' is not a declared field",
                            key, size
                        ));
                    }
                }
            }

            let mut field_names = HashSet::new();
            for field in &op.fields {
                if !field_names.insert(field.name.to_lowercase()) {
                    problems.push(format!("{}: duplicate field '{}'", key, field.name));
                }
            }

            match op.protocol {
                ApiProtocol::Query => {
                    if op.fields.iter().any(|f| f.location != FieldLocation::Body) {
                        problems.push(format!("{}: query protocol only supports body fields", key));
                    }
                }
                ApiProtocol::RestJson => {
                    let Some(path) = &op.path else {
                        problems.push(format!("{}: rest-json operation without a path", key));
                        continue;
                    };
                    for field in op.fields.iter().filter(|f| f.location == FieldLocation::Uri) {
                        if !path.contains(&format!("{{{}}}", field.name)) {
                            problems.push(format!(
                                "{}: uri field '{}' missing from path {}",
                                key, field.name, path
                            ));
                        }
                    }
                    for placeholder in placeholders(path) {
                        let bound = op
                            .field(placeholder)
                            .is_some_and(|f| f.location == FieldLocation::Uri);
                        if !bound {
                            problems.push(format!(
                                "{}: placeholder {{{}}} has no uri field",
                                key, placeholder
                            ));
                        }
                    }
                }
            }
        }

        problems
    }
}

/// `{name}` placeholders in a path template
fn placeholders(path: &str) -> Vec<&str> {
    let mut found = Vec::new();
    let mut rest = path;
    while let Some(start) = rest.find('{') {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        found.push(&rest[start + 1..start + len]);
        rest = &rest[start + len + 1..];
    }
    found
}
