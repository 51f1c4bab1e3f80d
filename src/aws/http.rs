//! Lightweight AWS HTTP client with SigV4 signing
//!
//! Covers the two wire protocols the operation table needs: Query
//! (CloudFormation) and REST-JSON (EMR Serverless, Pinpoint Email).

use crate::error::{Error, Result};
use anyhow::{anyhow, Context};
use aws_sigv4::http_request::{sign, SignableBody, SignableRequest, SigningSettings};
use aws_sigv4::sign::v4::SigningParams;
use aws_smithy_runtime_api::client::identity::Identity;
use reqwest::header::HeaderMap;
use reqwest::Client;
use serde_json::Value;
use std::time::SystemTime;
use tracing::{debug, trace, warn};

use super::credentials::Credentials;

const EUSC_PREFIX: &str = "eusc-";
const CN_PREFIX: &str = "cn-";

/// Mask sensitive credential values for logging
pub(crate) fn mask_credential(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 8 {
        "*".repeat(chars.len())
    } else {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    }
}

/// AWS service endpoint and signing details
#[derive(Debug, Clone)]
pub struct ServiceDefinition {
    /// Service signing name (e.g., "cloudformation", "ses")
    pub signing_name: &'static str,
    /// Endpoint host prefix (e.g., "email" for Pinpoint Email)
    pub endpoint_prefix: &'static str,
    /// API version sent with Query protocol requests
    pub api_version: &'static str,
}

/// Service definitions for the services in the operation table
pub fn get_service(name: &str) -> Option<ServiceDefinition> {
    match name {
        "cloudformation" => Some(ServiceDefinition {
            signing_name: "cloudformation",
            endpoint_prefix: "cloudformation",
            api_version: "2010-05-15",
        }),
        "emr-serverless" => Some(ServiceDefinition {
            signing_name: "emr-serverless",
            endpoint_prefix: "emr-serverless",
            api_version: "2021-07-13",
        }),
        "pinpoint-email" => Some(ServiceDefinition {
            signing_name: "ses",
            endpoint_prefix: "email",
            api_version: "2018-07-26",
        }),
        _ => None,
    }
}

pub struct AwsHttpClient {
    http_client: Client,
    credentials: Credentials,
    region: String,
    endpoint_url: Option<String>,
}

impl AwsHttpClient {
    pub fn new(credentials: Credentials, region: &str, endpoint_url: Option<String>) -> Self {
        debug!(
            "Creating AWS HTTP client for region: {}, access_key: {}, endpoint_url: {:?}",
            region,
            mask_credential(&credentials.access_key_id),
            endpoint_url
        );
        Self {
            http_client: Client::new(),
            credentials,
            region: region.to_string(),
            endpoint_url,
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Endpoint domain for a region's partition
    fn endpoint_domain(region: &str) -> &'static str {
        if region.starts_with(EUSC_PREFIX) {
            "amazonaws.eu"
        } else if region.starts_with(CN_PREFIX) {
            "amazonaws.com.cn"
        } else {
            "amazonaws.com"
        }
    }

    /// Endpoint URL for a service; a custom endpoint applies to every service
    pub fn endpoint(&self, service_name: &str) -> Result<String> {
        let service = lookup_service(service_name)?;
        Ok(self.service_endpoint(&service))
    }

    fn service_endpoint(&self, service: &ServiceDefinition) -> String {
        if let Some(endpoint) = &self.endpoint_url {
            return endpoint.trim_end_matches('/').to_string();
        }
        format!(
            "https://{}.{}.{}",
            service.endpoint_prefix,
            self.region,
            Self::endpoint_domain(&self.region)
        )
    }

    /// Make a Query protocol request (CloudFormation)
    pub async fn query_request(
        &self,
        service_name: &str,
        action: &str,
        params: &[(String, String)],
    ) -> Result<String> {
        debug!("Query request: service={}, action={}", service_name, action);
        trace!("Query params: {:?}", params);

        let service = lookup_service(service_name)?;
        let endpoint = self.service_endpoint(&service);

        let mut form: Vec<(&str, &str)> = vec![("Action", action), ("Version", service.api_version)];
        form.extend(params.iter().map(|(k, v)| (k.as_str(), v.as_str())));

        let body = form
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        let url = format!("{}/", endpoint);
        let headers = vec![(
            "content-type".to_string(),
            "application/x-www-form-urlencoded; charset=utf-8".to_string(),
        )];

        self.signed_request(&service, "POST", &url, &body, &headers)
            .await
    }

    /// Make a REST-JSON request (EMR Serverless, Pinpoint Email)
    pub async fn rest_json_request(
        &self,
        service_name: &str,
        method: &str,
        path: &str,
        body: Option<&str>,
        extra_headers: &[(String, String)],
    ) -> Result<String> {
        debug!(
            "REST-JSON request: service={}, method={}, path={}",
            service_name, method, path
        );
        trace!("REST-JSON body: {:?}", body);

        let service = lookup_service(service_name)?;
        let url = format!("{}{}", self.service_endpoint(&service), path);

        let mut headers = extra_headers.to_vec();
        if body.is_some() {
            headers.push(("content-type".to_string(), "application/json".to_string()));
        }

        self.signed_request(&service, method, &url, body.unwrap_or(""), &headers)
            .await
    }

    async fn signed_request(
        &self,
        service: &ServiceDefinition,
        method: &str,
        url: &str,
        body: &str,
        extra_headers: &[(String, String)],
    ) -> Result<String> {
        let parsed_url = url::Url::parse(url).with_context(|| format!("Invalid URL {}", url))?;
        let host = match (parsed_url.host_str(), parsed_url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => return Err(anyhow!("Invalid URL {}", url).into()),
        };
        let path_and_query = match parsed_url.query() {
            Some(query) => format!("{}?{}", parsed_url.path(), query),
            None => parsed_url.path().to_string(),
        };

        let mut headers = vec![("host".to_string(), host)];
        headers.extend(
            extra_headers
                .iter()
                .map(|(k, v)| (k.to_lowercase(), v.clone())),
        );

        let creds = aws_credential_types::Credentials::new(
            &self.credentials.access_key_id,
            &self.credentials.secret_access_key,
            self.credentials.session_token.clone(),
            None,
            "awsinvoke",
        );
        let identity: Identity = creds.into();

        let signing_params = SigningParams::builder()
            .identity(&identity)
            .region(&self.region)
            .name(service.signing_name)
            .time(SystemTime::now())
            .settings(SigningSettings::default())
            .build()
            .context("Failed to build signing parameters")?
            .into();

        let signable_request = SignableRequest::new(
            method,
            &path_and_query,
            headers.iter().map(|(k, v)| (k.as_str(), v.as_str())),
            SignableBody::Bytes(body.as_bytes()),
        )
        .context("Failed to prepare request for signing")?;

        let (signing_instructions, _signature) = sign(signable_request, &signing_params)
            .context("Failed to sign request")?
            .into_parts();

        let mut request = match method {
            "GET" => self.http_client.get(url),
            "POST" => self.http_client.post(url),
            "PUT" => self.http_client.put(url),
            "DELETE" => self.http_client.delete(url),
            "PATCH" => self.http_client.patch(url),
            _ => return Err(anyhow!("Unsupported HTTP method: {}", method).into()),
        };

        for (name, value) in signing_instructions.headers() {
            request = request.header(name.to_string(), value.to_string());
        }
        for (k, v) in extra_headers {
            request = request.header(k, v);
        }
        if !body.is_empty() {
            request = request.body(body.to_string());
        }

        trace!("Sending {} request to {}", method, url);
        let response = request
            .send()
            .await
            .map_err(|e| anyhow::Error::new(e).context(format!("{} {} failed", method, url)))?;
        let status = response.status();
        let response_headers = response.headers().clone();
        let text = response
            .text()
            .await
            .with_context(|| format!("Failed to read response from {}", url))?;

        debug!("Response status: {}", status);
        trace!(
            "Response body (first 2000 chars): {}",
            preview(&text, 2000)
        );

        if !status.is_success() {
            warn!(
                "AWS request failed: status={}, body={}",
                status,
                preview(&text, 500)
            );
            return Err(parse_service_error(status.as_u16(), &response_headers, &text));
        }

        Ok(text)
    }
}

/// At most `max` bytes of `text`, cut on a char boundary
fn preview(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

fn lookup_service(name: &str) -> Result<ServiceDefinition> {
    get_service(name).ok_or_else(|| Error::Other(anyhow!("Unknown service: {}", name)))
}

/// Turn a non-2xx response into a remote service error, keeping the
/// service's own error code and message
pub fn parse_service_error(status: u16, headers: &HeaderMap, body: &str) -> Error {
    let header_code = headers
        .get("x-amzn-errortype")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(':').next().unwrap_or(v).to_string());

    let (body_code, message) = if body.trim_start().starts_with('<') {
        parse_xml_error(body)
    } else {
        parse_json_error(body)
    };

    Error::RemoteService {
        status,
        code: header_code
            .or(body_code)
            .unwrap_or_else(|| format!("HTTP{}", status)),
        message: message.unwrap_or_else(|| body.trim().to_string()),
    }
}

fn parse_xml_error(body: &str) -> (Option<String>, Option<String>) {
    let Ok(json) = xml_to_json(body) else {
        return (None, None);
    };
    let error = json
        .pointer("/ErrorResponse/Error")
        .or_else(|| json.pointer("/Error"))
        .cloned()
        .unwrap_or(Value::Null);
    (
        error.get("Code").and_then(|v| v.as_str()).map(String::from),
        error.get("Message").and_then(|v| v.as_str()).map(String::from),
    )
}

fn parse_json_error(body: &str) -> (Option<String>, Option<String>) {
    let Ok(json) = serde_json::from_str::<Value>(body) else {
        return (None, None);
    };
    let code = json
        .get("__type")
        .or_else(|| json.get("code"))
        .or_else(|| json.get("Code"))
        .and_then(|v| v.as_str())
        // "com.amazonaws.emrserverless#ValidationException"
        .map(|c| c.rsplit('#').next().unwrap_or(c).to_string());
    let message = json
        .get("message")
        .or_else(|| json.get("Message"))
        .and_then(|v| v.as_str())
        .map(String::from);
    (code, message)
}

/// Parse an XML response into JSON.
///
/// Repeated sibling elements become arrays, text-only elements become
/// strings and empty elements become null.
pub fn xml_to_json(xml: &str) -> anyhow::Result<Value> {
    use quick_xml::escape::resolve_predefined_entity;
    use quick_xml::events::{BytesRef, Event};
    use quick_xml::Reader;
    use serde_json::Map;

    // Query protocol list items are always <member>; keep them a list even
    // when only one is present
    const LIST_ITEM: &str = "member";

    fn insert_child(map: &mut Map<String, Value>, tag: String, child: Value) {
        match map.get_mut(&tag) {
            Some(Value::Array(arr)) => arr.push(child),
            Some(existing) => {
                let old = existing.take();
                *existing = Value::Array(vec![old, child]);
            }
            None if tag == LIST_ITEM => {
                map.insert(tag, Value::Array(vec![child]));
            }
            None => {
                map.insert(tag, child);
            }
        }
    }

    /// Text for `&name;` or `&#NN;`; unknown entities are kept verbatim
    fn resolve_reference(reference: &BytesRef) -> anyhow::Result<String> {
        if let Some(ch) = reference.resolve_char_ref()? {
            return Ok(ch.to_string());
        }
        let name = reference.decode()?;
        Ok(match resolve_predefined_entity(&name) {
            Some(text) => text.to_string(),
            None => format!("&{};", name),
        })
    }

    fn parse_element(reader: &mut Reader<&[u8]>) -> anyhow::Result<Value> {
        let mut children: Map<String, Value> = Map::new();
        let mut text = String::new();
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
                    let child = parse_element(reader)?;
                    insert_child(&mut children, tag, child);
                }
                Ok(Event::Empty(e)) => {
                    let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
                    insert_child(&mut children, tag, Value::Null);
                }
                Ok(Event::Text(e)) => {
                    text.push_str(&e.xml_content()?);
                }
                Ok(Event::GeneralRef(e)) => {
                    text.push_str(&resolve_reference(&e)?);
                }
                Ok(Event::CData(e)) => {
                    text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
                Ok(Event::End(_)) | Ok(Event::Eof) => break,
                Err(e) => return Err(anyhow!("XML parse error: {}", e)),
                _ => {}
            }
            buf.clear();
        }

        // Whitespace between child elements is layout, not content
        if children.is_empty() {
            Ok(if text.trim().is_empty() {
                Value::Null
            } else {
                Value::String(text)
            })
        } else {
            Ok(Value::Object(children))
        }
    }

    let mut reader = Reader::from_str(xml);

    let mut root: Map<String, Value> = Map::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
                let child = parse_element(&mut reader)?;
                root.insert(tag, child);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(anyhow!("XML parse error: {}", e)),
        }
        buf.clear();
    }

    Ok(Value::Object(root))
}
