//! Bound parameter sets
//!
//! A [`BoundParams`] holds only what the caller explicitly supplied. A name
//! that is absent was not bound; a name bound to `0`, `false` or `""` was.

use anyhow::{anyhow, Result};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundParams {
    values: BTreeMap<String, Value>,
}

impl BoundParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name`, replacing any previous binding that differs only in case
    pub fn bind(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        let name = name.into();
        self.values.retain(|k, _| !k.eq_ignore_ascii_case(&name));
        self.values.insert(name, value.into());
        self
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.bind(name, value);
        self
    }

    /// Bind a command-line value; repeating a name accumulates a list
    pub fn bind_repeated(&mut self, name: &str, value: String) {
        let existing = self
            .values
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v);

        match existing {
            Some(Value::Array(items)) => items.push(Value::String(value)),
            Some(previous) => {
                let old = previous.take();
                *previous = Value::Array(vec![old, Value::String(value)]);
            }
            None => {
                self.values.insert(name.to_string(), Value::String(value));
            }
        }
    }

    pub fn unbind(&mut self, name: &str) -> Option<Value> {
        let key = self
            .values
            .keys()
            .find(|k| k.eq_ignore_ascii_case(name))
            .cloned()?;
        self.values.remove(&key)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(|k| k.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Parse `Name=Value` command-line assignments
    pub fn from_assignments<I, S>(assignments: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut params = Self::new();
        for assignment in assignments {
            let (name, value) = parse_assignment(assignment.as_ref())?;
            params.bind_repeated(name, value.to_string());
        }
        Ok(params)
    }
}

/// Split `Name=Value`; the value may itself contain '='
pub fn parse_assignment(assignment: &str) -> Result<(&str, &str)> {
    let (name, value) = assignment
        .split_once('=')
        .ok_or_else(|| anyhow!("Expected Name=Value, got '{}'", assignment))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(anyhow!("Missing parameter name in '{}'", assignment));
    }
    Ok((name, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_zero_values_count_as_bound() {
        let params = BoundParams::new()
            .with("MaxResults", 0)
            .with("SendingEnabled", false)
            .with("Prefix", "");

        assert!(params.is_bound("MaxResults"));
        assert!(params.is_bound("SendingEnabled"));
        assert!(params.is_bound("Prefix"));
        assert!(!params.is_bound("NextToken"));
    }

    #[test]
    fn test_bind_replaces_case_insensitively() {
        let mut params = BoundParams::new();
        params.bind("stackname", "a");
        params.bind("StackName", "b");

        assert_eq!(params.names().count(), 1);
        assert_eq!(params.get("STACKNAME"), Some(&json!("b")));
        assert_eq!(params.unbind("stackName"), Some(json!("b")));
        assert!(params.is_empty());
    }

    #[test]
    fn test_from_assignments_accumulates_repeats() {
        let params = BoundParams::from_assignments([
            "StackStatusFilter=CREATE_COMPLETE",
            "StackStatusFilter=UPDATE_COMPLETE",
            "TemplateURL=https://example.com/t.yaml?a=b",
        ])
        .unwrap();

        assert_eq!(
            params.get("StackStatusFilter"),
            Some(&json!(["CREATE_COMPLETE", "UPDATE_COMPLETE"]))
        );
        assert_eq!(
            params.get("TemplateURL"),
            Some(&json!("https://example.com/t.yaml?a=b"))
        );
    }

    #[test]
    fn test_parse_assignment_errors() {
        assert!(parse_assignment("StackName").is_err());
        assert!(parse_assignment("=value").is_err());
        assert_eq!(parse_assignment("A=").unwrap(), ("A", ""));
    }
}
