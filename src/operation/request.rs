//! Request builder
//!
//! Turns a [`BoundParams`] into a [`RequestValue`] for one descriptor.
//! Only bound fields are written; everything else is left for the remote
//! service to default.

use super::descriptor::{FieldKind, FieldLocation, FieldSpec, OperationDescriptor};
use super::params::BoundParams;
use super::path_extractor::{extract_by_path, insert_at_path, remove_at_path};
use crate::error::{Error, Result};
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde_json::{Map, Value};
use tracing::trace;

/// A built request, split by wire location
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestValue {
    pub operation: String,
    pub uri: Map<String, Value>,
    pub querystring: Map<String, Value>,
    pub header: Map<String, Value>,
    pub body: Map<String, Value>,
}

impl RequestValue {
    pub fn location(&self, location: FieldLocation) -> &Map<String, Value> {
        match location {
            FieldLocation::Uri => &self.uri,
            FieldLocation::Querystring => &self.querystring,
            FieldLocation::Header => &self.header,
            FieldLocation::Body => &self.body,
        }
    }

    fn location_mut(&mut self, location: FieldLocation) -> &mut Map<String, Value> {
        match location {
            FieldLocation::Uri => &mut self.uri,
            FieldLocation::Querystring => &mut self.querystring,
            FieldLocation::Header => &mut self.header,
            FieldLocation::Body => &mut self.body,
        }
    }

    /// Value of a field in this request, `Value::Null` when absent
    pub fn get(&self, field: &FieldSpec) -> Value {
        let map = self.location(field.location);
        extract_by_path(&Value::Object(map.clone()), &field.target_path())
    }

    pub fn contains(&self, field: &FieldSpec) -> bool {
        !self.get(field).is_null()
    }

    /// A copy of this request with the cursor field set to `cursor`, or
    /// removed when `cursor` is `None`. Any previous cursor is overwritten.
    pub fn with_cursor(&self, field: &FieldSpec, cursor: Option<&str>) -> RequestValue {
        let mut next = self.clone();
        let path = field.target_path();
        let map = next.location_mut(field.location);
        remove_at_path(map, &path);
        if let Some(c) = cursor {
            insert_at_path(map, &path, Value::String(c.to_string()));
        }
        next
    }
}

/// Build a request from bound parameters.
///
/// Fails with [`Error::Configuration`] for unknown parameters, values that
/// cannot be coerced to the field's kind, and unbound mandatory fields.
pub fn build_request(descriptor: &OperationDescriptor, params: &BoundParams) -> Result<RequestValue> {
    for name in params.names() {
        if descriptor.field(name).is_none() {
            return Err(Error::configuration(
                &descriptor.name,
                format!("unknown parameter '{}'", name),
            ));
        }
    }

    let mut request = RequestValue {
        operation: descriptor.name.clone(),
        ..Default::default()
    };

    for field in &descriptor.fields {
        match params.get(&field.name) {
            Some(raw) => {
                let value = coerce(raw, field).map_err(|message| {
                    Error::configuration(
                        &descriptor.name,
                        format!("invalid value for '{}': {}", field.name, message),
                    )
                })?;
                insert_at_path(
                    request.location_mut(field.location),
                    &field.target_path(),
                    value,
                );
            }
            None if field.is_mandatory() => {
                return Err(Error::missing_parameter(&descriptor.name, &field.name));
            }
            None => {}
        }
    }

    trace!("Built request for {}: {:?}", descriptor.name, request);
    Ok(request)
}

/// Coerce a bound value to the field's kind.
///
/// Always produces a fresh value; nothing in the result aliases the
/// caller's binding.
fn coerce(raw: &Value, field: &FieldSpec) -> std::result::Result<Value, String> {
    match field.kind {
        FieldKind::String => match raw {
            Value::String(_) => Ok(raw.clone()),
            Value::Number(n) => Ok(Value::String(n.to_string())),
            Value::Bool(b) => Ok(Value::String(b.to_string())),
            Value::Array(arr) if arr.len() == 1 => coerce(&arr[0], field),
            _ => Err(format!("expected a string, got {}", raw)),
        },
        FieldKind::Integer => match raw {
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(raw.clone()),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| format!("expected an integer, got '{}'", s)),
            _ => Err(format!("expected an integer, got {}", raw)),
        },
        FieldKind::Boolean => match raw {
            Value::Bool(_) => Ok(raw.clone()),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(Value::Bool(true)),
                "false" | "0" | "no" => Ok(Value::Bool(false)),
                _ => Err(format!("expected true or false, got '{}'", s)),
            },
            _ => Err(format!("expected a boolean, got {}", raw)),
        },
        FieldKind::List => match raw {
            Value::Array(items) => Ok(Value::Array(items.to_vec())),
            Value::String(s) if s.is_empty() => Ok(Value::Array(vec![])),
            Value::String(s) => Ok(Value::Array(
                s.split(',')
                    .map(|part| Value::String(part.trim().to_string()))
                    .collect(),
            )),
            other => Ok(Value::Array(vec![other.clone()])),
        },
        FieldKind::Map => match raw {
            Value::Object(map) => Ok(Value::Object(map.clone())),
            Value::String(s) if s.trim_start().starts_with('{') => parse_json_object(s),
            Value::String(s) => parse_key_values(s),
            Value::Array(items) => {
                let mut merged = Map::new();
                for item in items {
                    if let Value::Object(map) = coerce(item, field)? {
                        merged.extend(map);
                    }
                }
                Ok(Value::Object(merged))
            }
            _ => Err(format!("expected key=value pairs, got {}", raw)),
        },
        FieldKind::Json => match raw {
            Value::String(s) => {
                serde_json::from_str(s).map_err(|e| format!("invalid JSON: {}", e))
            }
            other => Ok(other.clone()),
        },
        FieldKind::Timestamp => coerce_timestamp(raw),
    }
}

fn parse_json_object(s: &str) -> std::result::Result<Value, String> {
    match serde_json::from_str::<Value>(s) {
        Ok(v @ Value::Object(_)) => Ok(v),
        Ok(_) => Err("expected a JSON object".to_string()),
        Err(e) => Err(format!("invalid JSON: {}", e)),
    }
}

fn parse_key_values(s: &str) -> std::result::Result<Value, String> {
    let mut map = Map::new();
    for pair in s.split(',').filter(|p| !p.trim().is_empty()) {
        let (k, v) = pair
            .split_once('=')
            .ok_or_else(|| format!("expected key=value, got '{}'", pair))?;
        map.insert(k.trim().to_string(), Value::String(v.trim().to_string()));
    }
    Ok(Value::Object(map))
}

fn coerce_timestamp(raw: &Value) -> std::result::Result<Value, String> {
    let parsed: DateTime<Utc> = match raw {
        Value::Number(n) => n
            .as_i64()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .ok_or_else(|| format!("invalid epoch seconds {}", n))?,
        Value::String(s) if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) => s
            .parse::<i64>()
            .ok()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .ok_or_else(|| format!("invalid epoch seconds '{}'", s))?,
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| format!("invalid RFC 3339 timestamp '{}': {}", s, e))?,
        _ => return Err(format!("expected a timestamp, got {}", raw)),
    };
    Ok(Value::String(
        parsed.to_rfc3339_opts(SecondsFormat::Secs, true),
    ))
}
