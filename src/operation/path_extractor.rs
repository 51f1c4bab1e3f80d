//! Path-based access into JSON values
//!
//! Paths use '/' as separator, like JSON pointers, but arrays met on the way
//! are flattened instead of indexed. The same paths address members when a
//! request is built ([`insert_at_path`]) and when a response is unwrapped
//! ([`extract_by_path`]).

use serde_json::{Map, Value};

fn split_path(path: &str) -> Vec<&str> {
    path.trim_start_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .collect()
}

/// Extract a value from JSON using a path expression.
///
/// Returns `Value::Null` when the path does not resolve.
pub fn extract_by_path(json: &Value, path: &str) -> Value {
    if path.is_empty() || path == "/" {
        return json.clone();
    }

    extract_by_parts(json, &split_path(path))
}

fn extract_by_parts(json: &Value, parts: &[&str]) -> Value {
    let Some((part, remaining)) = parts.split_first() else {
        return json.clone();
    };

    match json {
        Value::Object(map) => match map.get(*part) {
            Some(value) => extract_by_parts(value, remaining),
            None => Value::Null,
        },
        Value::Array(arr) => {
            // Flatten: extract from each item and collect what resolved
            let mut results: Vec<Value> = arr
                .iter()
                .map(|item| extract_by_parts(item, parts))
                .filter(|v| !v.is_null())
                .collect();

            match results.len() {
                0 => Value::Null,
                1 => results.remove(0),
                _ => Value::Array(results),
            }
        }
        _ => Value::Null,
    }
}

/// Extract a list of items from JSON using a path expression.
///
/// XML-to-JSON conversion turns a single `<member>` into an object rather
/// than a one-element array; this always returns a Vec.
pub fn extract_list(json: &Value, path: &str) -> Vec<Value> {
    match extract_by_path(json, path) {
        Value::Array(arr) => arr,
        Value::Null => vec![],
        other => vec![other],
    }
}

/// Extract a string value, if the path resolves to one
pub fn extract_str(json: &Value, path: &str) -> Option<String> {
    match extract_by_path(json, path) {
        Value::String(s) => Some(s),
        _ => None,
    }
}

/// Insert `value` at `path`, creating intermediate objects on the way.
///
/// Intermediate objects only come into existence when a member is written,
/// so a structure with no written members never appears.
pub fn insert_at_path(root: &mut Map<String, Value>, path: &str, value: Value) {
    let parts = split_path(path);
    let Some((last, parents)) = parts.split_last() else {
        return;
    };

    let mut current = root;
    for part in parents {
        let entry = current
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        current = match entry {
            Value::Object(map) => map,
            _ => unreachable!("entry was just made an object"),
        };
    }

    current.insert(last.to_string(), value);
}

/// Remove the member at `path`, leaving parents in place
pub fn remove_at_path(root: &mut Map<String, Value>, path: &str) -> Option<Value> {
    let parts = split_path(path);
    let (last, parents) = parts.split_last()?;

    let mut current = root;
    for part in parents {
        current = current.get_mut(*part)?.as_object_mut()?;
    }
    current.remove(*last)
}

/// Convert a JSON value to a plain string for text output
pub fn value_to_string(value: &Value, default: &str) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => default.to_string(),
        Value::Array(arr) => arr
            .iter()
            .map(|v| value_to_string(v, default))
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(_) => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_simple_path() {
        let json = json!({
            "name": "test",
            "value": 42
        });

        assert_eq!(extract_by_path(&json, "/name"), json!("test"));
        assert_eq!(extract_by_path(&json, "/value"), json!(42));
        assert_eq!(extract_by_path(&json, "/missing"), Value::Null);
        assert_eq!(extract_by_path(&json, "/"), json);
    }

    #[test]
    fn test_extract_from_array() {
        let json = json!({
            "Stacks": [
                {"StackName": "web", "StackStatus": "CREATE_COMPLETE"},
                {"StackName": "db", "StackStatus": "UPDATE_COMPLETE"}
            ]
        });

        let result = extract_by_path(&json, "/Stacks/StackName");
        assert_eq!(result, json!(["web", "db"]));
    }

    #[test]
    fn test_extract_list_single_object() {
        // XML-to-JSON produces an object for a single <member>
        let json = json!({
            "StackSummaries": {
                "member": {"StackName": "web"}
            }
        });

        let list = extract_list(&json, "/StackSummaries/member");
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["StackName"], "web");
        assert!(extract_list(&json, "/Missing").is_empty());
    }

    #[test]
    fn test_extract_str() {
        let json = json!({"NextToken": "abc", "Count": 3});
        assert_eq!(extract_str(&json, "/NextToken"), Some("abc".to_string()));
        assert_eq!(extract_str(&json, "/Count"), None);
        assert_eq!(extract_str(&json, "/Missing"), None);
    }

    #[test]
    fn test_insert_at_path_builds_nested_objects() {
        let mut root = Map::new();
        insert_at_path(&mut root, "/jobDriver/sparkSubmit/entryPoint", json!("s3://b/main.py"));
        insert_at_path(
            &mut root,
            "/jobDriver/sparkSubmit/entryPointArguments",
            json!(["--day", "1"]),
        );
        insert_at_path(&mut root, "/name", json!("nightly"));

        assert_eq!(
            Value::Object(root),
            json!({
                "jobDriver": {
                    "sparkSubmit": {
                        "entryPoint": "s3://b/main.py",
                        "entryPointArguments": ["--day", "1"]
                    }
                },
                "name": "nightly"
            })
        );
    }

    #[test]
    fn test_remove_at_path() {
        let mut root = Map::new();
        insert_at_path(&mut root, "/a/b", json!(1));
        assert_eq!(remove_at_path(&mut root, "/a/b"), Some(json!(1)));
        assert_eq!(remove_at_path(&mut root, "/a/b"), None);
        assert_eq!(remove_at_path(&mut root, "/x/y"), None);
    }

    #[test]
    fn test_value_to_string() {
        assert_eq!(value_to_string(&json!(true), "-"), "true");
        assert_eq!(value_to_string(&json!(null), "-"), "-");
        assert_eq!(value_to_string(&json!(["a", 1]), "-"), "a, 1");
    }
}
