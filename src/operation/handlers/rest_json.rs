//! REST-JSON Protocol Handler
//!
//! Handles the AWS REST-JSON protocol (EMR Serverless, Pinpoint Email)
//! - Request: HTTP method and path template, with fields placed in the URI,
//!   querystring, headers or JSON body
//! - Response: JSON

use super::ProtocolHandler;
use crate::aws::http::AwsHttpClient;
use crate::error::{Error, Result};
use crate::operation::descriptor::OperationDescriptor;
use crate::operation::path_extractor::value_to_string;
use crate::operation::request::RequestValue;
use serde_json::{Map, Value};

pub struct RestJsonProtocolHandler;

impl RestJsonProtocolHandler {
    pub async fn execute_impl(
        &self,
        http: &AwsHttpClient,
        descriptor: &OperationDescriptor,
        request: &RequestValue,
    ) -> Result<String> {
        let method = descriptor.method();
        let path = request_path(descriptor, request)?;
        let headers = request_headers(request);
        let body = request_body(method, &request.body)?;

        http.rest_json_request(&descriptor.service, method, &path, body.as_deref(), &headers)
            .await
    }
}

/// Expand the path template and append the querystring
pub fn request_path(descriptor: &OperationDescriptor, request: &RequestValue) -> Result<String> {
    let template = descriptor.path.as_deref().ok_or_else(|| {
        Error::configuration(&descriptor.name, "REST-JSON operation has no path")
    })?;

    let mut path = template.to_string();
    for (key, value) in &request.uri {
        let segment = value_to_string(value, "");
        path = path.replace(&format!("{{{}}}", key), &urlencoding::encode(&segment));
    }
    if let Some(start) = path.find('{') {
        let name = path[start + 1..].split('}').next().unwrap_or_default();
        return Err(Error::missing_parameter(&descriptor.name, name));
    }

    let query = querystring(&request.querystring);
    if !query.is_empty() {
        path.push(if path.contains('?') { '&' } else { '?' });
        path.push_str(&query);
    }
    Ok(path)
}

/// Encode querystring fields; list values repeat the key
pub fn querystring(fields: &Map<String, Value>) -> String {
    let mut parts = Vec::new();
    for (key, value) in fields {
        let values = match value {
            Value::Null => continue,
            Value::Array(items) => items.clone(),
            other => vec![other.clone()],
        };
        for item in values {
            parts.push(format!(
                "{}={}",
                urlencoding::encode(key),
                urlencoding::encode(&value_to_string(&item, ""))
            ));
        }
    }
    parts.join("&")
}

fn request_headers(request: &RequestValue) -> Vec<(String, String)> {
    request
        .header
        .iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| (k.clone(), value_to_string(v, "")))
        .collect()
}

/// JSON body; write methods always send an object, reads only when fields are bound
fn request_body(method: &str, body: &Map<String, Value>) -> Result<Option<String>> {
    if body.is_empty() && !matches!(method, "POST" | "PUT" | "PATCH") {
        return Ok(None);
    }
    Ok(Some(serde_json::to_string(body)?))
}

impl ProtocolHandler for RestJsonProtocolHandler {
    fn parse_envelope(&self, response: &str, _descriptor: &OperationDescriptor) -> Result<Value> {
        if response.trim().is_empty() {
            return Ok(Value::Object(Map::new()));
        }
        Ok(serde_json::from_str(response)?)
    }
}
