//! Operation descriptors
//!
//! One [`OperationDescriptor`] per supported remote call. Descriptors are
//! pure data, deserialized from the embedded JSON definition files, and are
//! consumed by the generic request builder, invoker and unwrapper.

use serde::{Deserialize, Serialize};

/// AWS API protocol types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApiProtocol {
    /// CloudFormation style: Action=X&Version=Y form parameters, XML response
    Query,
    /// REST with JSON body, path and query string parameters (EMR Serverless, Pinpoint Email)
    RestJson,
}

impl Default for ApiProtocol {
    fn default() -> Self {
        ApiProtocol::Query
    }
}

/// How a bound value is coerced before it is placed in the request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldKind {
    #[default]
    String,
    Integer,
    Boolean,
    /// Sequence of strings (comma separated on the command line)
    List,
    /// String to string map (`k=v,k2=v2` on the command line)
    Map,
    /// Arbitrary JSON structure
    Json,
    /// RFC 3339 date-time or epoch seconds
    Timestamp,
}

/// Where a field travels on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldLocation {
    /// `{placeholder}` in the REST path
    Uri,
    Querystring,
    Header,
    /// JSON body (REST-JSON) or form parameters (Query)
    #[default]
    Body,
}

/// One user-facing parameter of an operation
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FieldSpec {
    /// Parameter name as the caller binds it (e.g., "StackName")
    pub name: String,

    /// Path of the member inside its location, "/" separated.
    /// Defaults to "/{name}". Nested paths build sub-structures.
    #[serde(default)]
    pub target: Option<String>,

    #[serde(default)]
    pub kind: FieldKind,

    #[serde(default)]
    pub location: FieldLocation,

    #[serde(default)]
    pub required: bool,
}

impl FieldSpec {
    pub fn target_path(&self) -> String {
        match &self.target {
            Some(t) => t.clone(),
            None => format!("/{}", self.name),
        }
    }

    /// Path placeholders are always mandatory: the URL cannot be built without them
    pub fn is_mandatory(&self) -> bool {
        self.required || self.location == FieldLocation::Uri
    }
}

/// Predicate deciding when a returned cursor means "no more pages"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EndOfPages {
    /// Only an absent or null cursor ends pagination
    Null,
    /// An empty string ends pagination as well
    #[default]
    NullOrEmpty,
}

impl EndOfPages {
    pub fn is_exhausted(&self, cursor: Option<&str>) -> bool {
        match (self, cursor) {
            (_, None) => true,
            (EndOfPages::Null, Some(_)) => false,
            (EndOfPages::NullOrEmpty, Some(c)) => c.is_empty(),
        }
    }
}

/// Pagination configuration for list operations
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PaginationSpec {
    /// Parameter carrying the cursor into the request (e.g., "NextToken")
    pub input_token: String,
    /// Path of the next cursor inside the response envelope
    pub output_token: String,
    /// Parameter controlling the page size, if the operation has one
    #[serde(default)]
    pub page_size_param: Option<String>,
    #[serde(default)]
    pub end_of_pages: EndOfPages,
}

/// Which part of the envelope is the primary output
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OutputSpec {
    /// Path inside the envelope; `None` emits the whole envelope
    #[serde(default)]
    pub path: Option<String>,
    /// The payload is a sequence of records
    #[serde(default)]
    pub list: bool,
}

/// Static metadata for one remote call
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OperationDescriptor {
    /// Operation name (e.g., "DescribeStacks")
    pub name: String,

    /// Service key used to look up the endpoint (filled from the definition file)
    #[serde(default)]
    pub service: String,

    #[serde(default)]
    pub protocol: ApiProtocol,

    /// Query protocol action; defaults to the operation name
    #[serde(default)]
    pub action: Option<String>,

    /// HTTP method for REST protocols
    #[serde(default)]
    pub method: Option<String>,

    /// REST path template (e.g., "/applications/{applicationId}/jobruns")
    #[serde(default)]
    pub path: Option<String>,

    /// Node of the parsed response treated as the envelope
    /// (e.g., "/DescribeStacksResponse/DescribeStacksResult")
    #[serde(default)]
    pub result_root: Option<String>,

    #[serde(default)]
    pub fields: Vec<FieldSpec>,

    #[serde(default)]
    pub pagination: Option<PaginationSpec>,

    #[serde(default)]
    pub output: OutputSpec,

    /// Mutating operation that the command line gates behind a confirmation
    #[serde(default)]
    pub confirm: bool,
}

impl OperationDescriptor {
    pub fn action(&self) -> &str {
        self.action.as_deref().unwrap_or(&self.name)
    }

    pub fn method(&self) -> &str {
        self.method.as_deref().unwrap_or("GET")
    }

    pub fn is_paginated(&self) -> bool {
        self.pagination.is_some()
    }

    /// Look up a field by parameter name, ignoring ASCII case
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
    }

    /// The field that carries the cursor into the request
    pub fn cursor_field(&self) -> Option<&FieldSpec> {
        self.pagination
            .as_ref()
            .and_then(|p| self.field(&p.input_token))
    }

    pub fn page_size_field(&self) -> Option<&FieldSpec> {
        self.pagination
            .as_ref()
            .and_then(|p| p.page_size_param.as_deref())
            .and_then(|name| self.field(name))
    }
}
