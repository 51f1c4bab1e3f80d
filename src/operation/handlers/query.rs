//! Query Protocol Handler
//!
//! Handles the AWS Query protocol (CloudFormation)
//! - Request: form-encoded POST with Action=X&Version=Y
//! - Response: XML, with the result under `<Action>Response/<Action>Result`

use super::ProtocolHandler;
use crate::aws::http::{xml_to_json, AwsHttpClient};
use crate::error::Result;
use crate::operation::descriptor::OperationDescriptor;
use crate::operation::path_extractor::extract_by_path;
use crate::operation::request::RequestValue;
use serde_json::Value;

pub struct QueryProtocolHandler;

impl QueryProtocolHandler {
    pub async fn execute_impl(
        &self,
        http: &AwsHttpClient,
        descriptor: &OperationDescriptor,
        request: &RequestValue,
    ) -> Result<String> {
        let params = form_params(request);
        http.query_request(&descriptor.service, descriptor.action(), &params)
            .await
    }
}

/// Flatten the request body into Query protocol form parameters.
///
/// Nested objects join with `.`, lists become `Name.member.N` and an empty
/// list is sent as a bare `Name=` so the service sees it was cleared.
pub fn form_params(request: &RequestValue) -> Vec<(String, String)> {
    let mut params = Vec::new();
    for (key, value) in &request.body {
        flatten(key, value, &mut params);
    }
    params
}

fn flatten(prefix: &str, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Null => {}
        Value::String(s) => out.push((prefix.to_string(), s.clone())),
        Value::Number(n) => out.push((prefix.to_string(), n.to_string())),
        Value::Bool(b) => out.push((prefix.to_string(), b.to_string())),
        Value::Array(items) if items.is_empty() => out.push((prefix.to_string(), String::new())),
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                flatten(&format!("{}.member.{}", prefix, i + 1), item, out);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                flatten(&format!("{}.{}", prefix, key), item, out);
            }
        }
    }
}

impl ProtocolHandler for QueryProtocolHandler {
    fn parse_envelope(&self, response: &str, descriptor: &OperationDescriptor) -> Result<Value> {
        let json = xml_to_json(response)?;
        let root = match &descriptor.result_root {
            Some(root) => root.clone(),
            None => format!(
                "/{action}Response/{action}Result",
                action = descriptor.action()
            ),
        };
        Ok(extract_by_path(&json, &root))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn describe_stacks() -> OperationDescriptor {
        OperationDescriptor {
            name: "DescribeStacks".to_string(),
            service: "cloudformation".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_form_params_flattening() {
        let mut request = RequestValue::default();
        request.body.insert("StackName".to_string(), json!("web"));
        request.body.insert("MaxResults".to_string(), json!(25));
        request.body.insert("RetainResources".to_string(), json!(["Bucket", "Queue"]));
        request.body.insert(
            "StackStatusFilter".to_string(),
            json!([]),
        );
        request.body.insert(
            "Parameters".to_string(),
            json!({"Key": "Env", "UsePrevious": true}),
        );

        let params = form_params(&request);
        let pairs: Vec<(&str, &str)> = params.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();

        assert!(pairs.contains(&("StackName", "web")));
        assert!(pairs.contains(&("MaxResults", "25")));
        assert!(pairs.contains(&("RetainResources.member.1", "Bucket")));
        assert!(pairs.contains(&("RetainResources.member.2", "Queue")));
        assert!(pairs.contains(&("StackStatusFilter", "")));
        assert!(pairs.contains(&("Parameters.Key", "Env")));
        assert!(pairs.contains(&("Parameters.UsePrevious", "true")));
    }

    #[test]
    fn test_form_params_skip_null() {
        let mut request = RequestValue::default();
        request.body.insert("NextToken".to_string(), Value::Null);
        assert!(form_params(&request).is_empty());
    }

    #[test]
    fn test_parse_describe_stacks_response() {
        let xml = r#"<DescribeStacksResponse xmlns="http://cloudformation.amazonaws.com/doc/2010-05-15/">
            <DescribeStacksResult>
                <Stacks>
                    <member>
                        <StackName>web</StackName>
                        <StackStatus>CREATE_COMPLETE</StackStatus>
                    </member>
                </Stacks>
                <NextToken>page-2</NextToken>
            </DescribeStacksResult>
            <ResponseMetadata><RequestId>r-1</RequestId></ResponseMetadata>
        </DescribeStacksResponse>"#;

        let envelope = QueryProtocolHandler
            .parse_envelope(xml, &describe_stacks())
            .unwrap();

        assert_eq!(envelope["NextToken"], "page-2");
        assert_eq!(envelope["Stacks"]["member"][0]["StackName"], "web");
        assert!(envelope.get("ResponseMetadata").is_none());
    }

    #[test]
    fn test_parse_response_without_result() {
        let op = OperationDescriptor {
            name: "DeleteStack".to_string(),
            ..Default::default()
        };
        let xml = r#"<DeleteStackResponse><ResponseMetadata><RequestId>r-2</RequestId></ResponseMetadata></DeleteStackResponse>"#;

        let envelope = QueryProtocolHandler.parse_envelope(xml, &op).unwrap();
        assert_eq!(envelope, Value::Null);
    }

    #[test]
    fn test_explicit_result_root() {
        let op = OperationDescriptor {
            name: "GetTemplate".to_string(),
            result_root: Some("/GetTemplateResponse".to_string()),
            ..Default::default()
        };
        let xml = "<GetTemplateResponse><GetTemplateResult><TemplateBody>{}</TemplateBody></GetTemplateResult></GetTemplateResponse>";

        let envelope = QueryProtocolHandler.parse_envelope(xml, &op).unwrap();
        assert_eq!(envelope["GetTemplateResult"]["TemplateBody"], "{}");
    }
}
