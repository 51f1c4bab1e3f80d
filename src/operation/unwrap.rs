//! Response unwrapping
//!
//! Pulls the primary payload out of a response envelope while keeping the
//! envelope and the next cursor alongside it as metadata.

use super::descriptor::OperationDescriptor;
use super::params::BoundParams;
use super::path_extractor::{extract_by_path, extract_list, extract_str};
use serde_json::{json, Value};
use std::str::FromStr;

/// Which part of a response becomes the primary payload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Selector {
    /// The descriptor's output field
    #[default]
    Default,
    /// `*`: the whole envelope
    Envelope,
    /// `^Name`: the bound value of parameter `Name`
    Parameter(String),
    /// Any other path into the envelope
    Field(String),
}

impl FromStr for Selector {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Ok(if s.is_empty() {
            Selector::Default
        } else if s == "*" {
            Selector::Envelope
        } else if let Some(name) = s.strip_prefix('^') {
            Selector::Parameter(name.to_string())
        } else if s.starts_with('/') {
            Selector::Field(s.to_string())
        } else {
            Selector::Field(format!("/{}", s))
        })
    }
}

/// One emitted page of results
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// 1-based position in the pagination sequence
    pub page_number: usize,
    pub payload: Value,
    /// Cursor returned with this page, if any
    pub cursor: Option<String>,
    pub envelope: Value,
}

impl Page {
    /// The payload as individual records
    pub fn records(&self) -> Vec<Value> {
        match &self.payload {
            Value::Array(items) => items.clone(),
            Value::Null => vec![],
            other => vec![other.clone()],
        }
    }

    pub fn record_count(&self) -> usize {
        match &self.payload {
            Value::Array(items) => items.len(),
            Value::Null => 0,
            _ => 1,
        }
    }

    /// Payload plus metadata, for machine-readable output
    pub fn to_json(&self, include_envelope: bool) -> Value {
        let mut out = json!({ "payload": self.payload });
        if let Some(cursor) = &self.cursor {
            out["_next_token"] = json!(cursor);
        }
        if include_envelope {
            out["_envelope"] = self.envelope.clone();
        }
        out
    }
}

/// Split an envelope into payload, cursor and envelope
pub fn unwrap_response(
    descriptor: &OperationDescriptor,
    envelope: Value,
    selector: &Selector,
    params: &BoundParams,
) -> Page {
    let cursor = descriptor
        .pagination
        .as_ref()
        .and_then(|p| extract_str(&envelope, &p.output_token));

    let payload = match selector {
        Selector::Default => match &descriptor.output.path {
            Some(path) if descriptor.output.list => Value::Array(extract_list(&envelope, path)),
            Some(path) => extract_by_path(&envelope, path),
            None => envelope.clone(),
        },
        Selector::Envelope => envelope.clone(),
        Selector::Parameter(name) => params.get(name).cloned().unwrap_or(Value::Null),
        Selector::Field(path) => extract_by_path(&envelope, path),
    };

    Page {
        page_number: 0,
        payload,
        cursor,
        envelope,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::descriptor::{OutputSpec, PaginationSpec};

    fn list_stacks() -> OperationDescriptor {
        OperationDescriptor {
            name: "ListStacks".to_string(),
            pagination: Some(PaginationSpec {
                input_token: "NextToken".to_string(),
                output_token: "/NextToken".to_string(),
                ..Default::default()
            }),
            output: OutputSpec {
                path: Some("/StackSummaries/member".to_string()),
                list: true,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_selector_parse() {
        assert_eq!("".parse::<Selector>().unwrap(), Selector::Default);
        assert_eq!("*".parse::<Selector>().unwrap(), Selector::Envelope);
        assert_eq!(
            "^StackName".parse::<Selector>().unwrap(),
            Selector::Parameter("StackName".to_string())
        );
        assert_eq!(
            "Stacks/member".parse::<Selector>().unwrap(),
            Selector::Field("/Stacks/member".to_string())
        );
    }

    #[test]
    fn test_unwrap_list_payload_and_cursor() {
        let envelope = json!({
            "StackSummaries": {"member": [{"StackName": "a"}, {"StackName": "b"}]},
            "NextToken": "abc"
        });

        let page = unwrap_response(
            &list_stacks(),
            envelope.clone(),
            &Selector::Default,
            &BoundParams::new(),
        );

        assert_eq!(page.record_count(), 2);
        assert_eq!(page.cursor, Some("abc".to_string()));
        assert_eq!(page.envelope, envelope);
    }

    #[test]
    fn test_unwrap_single_member_becomes_one_record() {
        let envelope = json!({"StackSummaries": {"member": {"StackName": "only"}}});
        let page = unwrap_response(
            &list_stacks(),
            envelope,
            &Selector::Default,
            &BoundParams::new(),
        );

        assert_eq!(page.records(), vec![json!({"StackName": "only"})]);
        assert_eq!(page.cursor, None);
    }

    #[test]
    fn test_scalar_payload_keeps_envelope() {
        let op = OperationDescriptor {
            name: "DetectStackDrift".to_string(),
            output: OutputSpec {
                path: Some("/StackDriftDetectionId".to_string()),
                list: false,
            },
            ..Default::default()
        };
        let envelope = json!({"StackDriftDetectionId": "d-1"});

        let page = unwrap_response(&op, envelope.clone(), &Selector::Default, &BoundParams::new());
        assert_eq!(page.payload, json!("d-1"));
        assert_eq!(page.envelope, envelope);
        assert_eq!(page.record_count(), 1);
    }

    #[test]
    fn test_parameter_and_envelope_selectors() {
        let params = BoundParams::new().with("StackName", "web");
        let envelope = json!({"StackSummaries": {"member": []}});

        let page = unwrap_response(
            &list_stacks(),
            envelope.clone(),
            &Selector::Parameter("stackname".to_string()),
            &params,
        );
        assert_eq!(page.payload, json!("web"));

        let page = unwrap_response(&list_stacks(), envelope.clone(), &Selector::Envelope, &params);
        assert_eq!(page.payload, envelope);
    }

    #[test]
    fn test_to_json_metadata() {
        let page = Page {
            page_number: 1,
            payload: json!([1, 2]),
            cursor: Some("next".to_string()),
            envelope: json!({"k": "v"}),
        };

        assert_eq!(
            page.to_json(false),
            json!({"payload": [1, 2], "_next_token": "next"})
        );
        assert_eq!(page.to_json(true)["_envelope"], json!({"k": "v"}));
    }
}
