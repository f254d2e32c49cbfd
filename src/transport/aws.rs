use async_trait::async_trait;
use log::debug;
use rusoto_core::signature::SignedRequest;
use rusoto_core::{DispatchSignedRequest, HttpClient};
use rusoto_credential::ProvideAwsCredentials;
use serde_json::{Map, Value};

use super::client::{create_http_client, parse_region, CredentialSource};
use super::endpoints::{Endpoint, Protocol};
use super::xml::{error_from_xml, query_response_to_json, rest_response_to_json, upper_camel};
use super::{s3, ApiRequest, ProviderError, RequestContext, SignatureVersion, Transport, TransportConfig};

/// CloudFront API version used for REST paths.
const CLOUDFRONT_API_VERSION: &str = "2020-05-31";

/// Transport backed by rusoto's SigV4 signer and HTTP client.
pub struct AwsTransport {
    credentials: CredentialSource,
    http: HttpClient,
}

impl AwsTransport {
    pub fn new(config: &TransportConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            credentials: CredentialSource::from_config(config),
            http: create_http_client()?,
        })
    }

    async fn send(&self, ctx: &RequestContext, mut signed: SignedRequest) -> Result<(u16, String), ProviderError> {
        let credentials = self
            .credentials
            .credentials()
            .await
            .map_err(|e| ProviderError::Credentials(e.to_string()))?;
        signed.sign(&credentials);

        let mut response = self
            .http
            .dispatch(signed, Some(ctx.config().request_timeout))
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        let response = response.buffer().await.map_err(|e| ProviderError::Transport(e.to_string()))?;

        let body = String::from_utf8_lossy(&response.body).to_string();
        Ok((response.status.as_u16(), body))
    }

    fn new_request(endpoint: &Endpoint, ctx: &RequestContext, method: &str, path: &str) -> SignedRequest {
        let region = parse_region(endpoint.signing_region(ctx.region()));
        let mut signed = SignedRequest::new(method, endpoint.signing_name, &region, path);
        signed.set_hostname(Some(endpoint.hostname(ctx.region())));
        signed
    }

    async fn invoke_json(
        &self,
        endpoint: &Endpoint,
        target_prefix: &str,
        ctx: &RequestContext,
        request: &ApiRequest,
    ) -> Result<Value, ProviderError> {
        let mut signed = Self::new_request(endpoint, ctx, "POST", "/");
        let target = format!("{}.{}", target_prefix, upper_camel(&request.operation));
        signed.add_header("x-amz-target", &target);
        signed.set_content_type("application/x-amz-json-1.1".to_string());
        let payload = serde_json::to_vec(&Value::Object(request.params.clone()))
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        signed.set_payload(Some(payload));

        let (status, body) = self.send(ctx, signed).await?;
        if !(200..300).contains(&status) {
            return Err(json_error(status, &body));
        }
        if body.trim().is_empty() {
            return Ok(Value::Object(Map::new()));
        }
        serde_json::from_str(&body).map_err(|e| ProviderError::Transport(format!("Invalid JSON response: {}", e)))
    }

    async fn invoke_query(
        &self,
        endpoint: &Endpoint,
        version: &str,
        ctx: &RequestContext,
        request: &ApiRequest,
    ) -> Result<Value, ProviderError> {
        let mut signed = Self::new_request(endpoint, ctx, "POST", "/");
        signed.set_content_type("application/x-www-form-urlencoded".to_string());
        let body = query_body(&upper_camel(&request.operation), version, &request.params, endpoint.signing_name == "ec2");
        signed.set_payload(Some(body.into_bytes()));

        let (status, body) = self.send(ctx, signed).await?;
        if !(200..300).contains(&status) {
            return Err(xml_error(status, body));
        }
        query_response_to_json(&body)
    }

    async fn invoke_rest(
        &self,
        endpoint: &Endpoint,
        ctx: &RequestContext,
        request: &ApiRequest,
    ) -> Result<Value, ProviderError> {
        let path = match (endpoint.signing_name, request.operation.as_str()) {
            ("cloudfront", "listDistributions") => format!("/{}/distribution", CLOUDFRONT_API_VERSION),
            _ => return Err(ProviderError::Unsupported(format!("No REST mapping for {}", request))),
        };
        let signed = Self::new_request(endpoint, ctx, "GET", &path);

        let (status, body) = self.send(ctx, signed).await?;
        if !(200..300).contains(&status) {
            return Err(xml_error(status, body));
        }
        rest_response_to_json(&body)
    }
}

#[async_trait]
impl Transport for AwsTransport {
    async fn invoke(&self, ctx: &RequestContext, request: &ApiRequest) -> Result<Value, ProviderError> {
        if ctx.signature() == SignatureVersion::V2 {
            return Err(ProviderError::Unsupported(format!(
                "{} requested signature version {}, only v4 is supported",
                request,
                ctx.signature()
            )));
        }

        let endpoint = Endpoint::for_service(&request.service)?;
        debug!("Invoking {} in {}", request, ctx.region());

        match endpoint.protocol {
            Protocol::Json { target_prefix } => self.invoke_json(&endpoint, target_prefix, ctx, request).await,
            Protocol::Query { version } => self.invoke_query(&endpoint, version, ctx, request).await,
            Protocol::RestXml => self.invoke_rest(&endpoint, ctx, request).await,
            Protocol::S3 => s3::invoke(&self.credentials, ctx, request).await,
        }
    }
}

/// Form body of a query-protocol call.
///
/// EC2 names list members by the singular list name (`Filter.1.Name`,
/// `Filter.1.Value.1`); every other query service uses `.member.N`.
pub fn query_body(action: &str, version: &str, params: &Map<String, Value>, ec2_style: bool) -> String {
    let mut pairs = Vec::new();
    for (name, value) in params {
        flatten_param(name, value, ec2_style, &mut pairs);
    }

    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    serializer.append_pair("Action", action);
    serializer.append_pair("Version", version);
    for (name, value) in &pairs {
        serializer.append_pair(name, value);
    }
    serializer.finish()
}

fn flatten_param(prefix: &str, value: &Value, ec2_style: bool, out: &mut Vec<(String, String)>) {
    match value {
        Value::Null => {}
        Value::String(s) => out.push((prefix.to_string(), s.clone())),
        Value::Bool(b) => out.push((prefix.to_string(), b.to_string())),
        Value::Number(n) => out.push((prefix.to_string(), n.to_string())),
        Value::Object(map) => {
            for (name, value) in map {
                flatten_param(&format!("{}.{}", prefix, name), value, ec2_style, out);
            }
        }
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                let name = if ec2_style {
                    format!("{}.{}", prefix.strip_suffix('s').unwrap_or(prefix), index + 1)
                } else {
                    format!("{}.member.{}", prefix, index + 1)
                };
                flatten_param(&name, item, ec2_style, out);
            }
        }
    }
}

fn json_error(status: u16, body: &str) -> ProviderError {
    let parsed: Value = serde_json::from_str(body).unwrap_or(Value::Null);
    let code = parsed
        .get("__type")
        .and_then(Value::as_str)
        .map(|t| t.rsplit('#').next().unwrap_or(t).to_string())
        .unwrap_or_else(|| format!("HTTP{}", status));
    let message = parsed
        .get("message")
        .or_else(|| parsed.get("Message"))
        .and_then(Value::as_str)
        .unwrap_or(body)
        .to_string();
    ProviderError::Service { code, message, status }
}

fn xml_error(status: u16, body: String) -> ProviderError {
    match error_from_xml(&body) {
        Some((code, message)) => ProviderError::Service { code, message, status },
        None => ProviderError::Service { code: format!("HTTP{}", status), message: body, status },
    }
}
