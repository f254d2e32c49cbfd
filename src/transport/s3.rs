use log::debug;
use rusoto_core::RusotoError;
use rusoto_s3::{
    GetBucketAclRequest, GetBucketLoggingRequest, GetBucketVersioningRequest, Grant, Owner, S3Client, S3,
};
use serde_json::{json, Map, Value};

use super::client::{create_http_client, parse_region, CredentialSource};
use super::xml::error_from_xml;
use super::{ApiRequest, ProviderError, RequestContext};

/// Serve an S3 operation through the typed client, mapping the output to
/// JSON with the SDK member names.
pub async fn invoke(
    credentials: &CredentialSource,
    ctx: &RequestContext,
    request: &ApiRequest,
) -> Result<Value, ProviderError> {
    let client = S3Client::new_with(create_http_client()?, credentials.clone(), parse_region(ctx.region()));
    debug!("S3 {} in {}", request.operation, ctx.region());

    let output = match request.operation.as_str() {
        "listBuckets" => {
            let output = client.list_buckets().await.map_err(map_error)?;
            json!({
                "Buckets": output.buckets.unwrap_or_default().into_iter().map(|bucket| json!({
                    "Name": bucket.name,
                    "CreationDate": bucket.creation_date,
                })).collect::<Vec<_>>(),
                "Owner": output.owner.map(owner_to_json),
            })
        }
        "getBucketLogging" => {
            let output = client
                .get_bucket_logging(GetBucketLoggingRequest {
                    bucket: bucket_param(request)?,
                    ..Default::default()
                })
                .await
                .map_err(map_error)?;
            json!({
                "LoggingEnabled": output.logging_enabled.map(|logging| json!({
                    "TargetBucket": logging.target_bucket,
                    "TargetPrefix": logging.target_prefix,
                })),
            })
        }
        "getBucketVersioning" => {
            let output = client
                .get_bucket_versioning(GetBucketVersioningRequest {
                    bucket: bucket_param(request)?,
                    ..Default::default()
                })
                .await
                .map_err(map_error)?;
            json!({ "Status": output.status, "MFADelete": output.mfa_delete })
        }
        "getBucketAcl" => {
            let output = client
                .get_bucket_acl(GetBucketAclRequest {
                    bucket: bucket_param(request)?,
                    ..Default::default()
                })
                .await
                .map_err(map_error)?;
            json!({
                "Owner": output.owner.map(owner_to_json),
                "Grants": output.grants.unwrap_or_default().into_iter().map(grant_to_json).collect::<Vec<_>>(),
            })
        }
        other => return Err(ProviderError::Unsupported(format!("S3 operation '{}' is not supported", other))),
    };

    Ok(prune_nulls(output))
}

fn bucket_param(request: &ApiRequest) -> Result<String, ProviderError> {
    request
        .params
        .get("Bucket")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ProviderError::Unsupported(format!("{} requires a Bucket parameter", request)))
}

fn owner_to_json(owner: Owner) -> Value {
    json!({ "DisplayName": owner.display_name, "ID": owner.id })
}

fn grant_to_json(grant: Grant) -> Value {
    json!({
        "Grantee": grant.grantee.map(|grantee| json!({
            "Type": grantee.type_,
            "ID": grantee.id,
            "DisplayName": grantee.display_name,
            "URI": grantee.uri,
            "EmailAddress": grantee.email_address,
        })),
        "Permission": grant.permission,
    })
}

/// Drop `null` members so absent SDK fields are absent in the payload.
fn prune_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, prune_nulls(v)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(prune_nulls).collect()),
        other => other,
    }
}

fn map_error<E: std::error::Error + 'static>(err: RusotoError<E>) -> ProviderError {
    match err {
        RusotoError::Service(e) => ProviderError::Service {
            code: "ServiceError".to_string(),
            message: e.to_string(),
            status: 400,
        },
        RusotoError::Unknown(response) => {
            let body = String::from_utf8_lossy(&response.body).to_string();
            let (code, message) = error_from_xml(&body).unwrap_or_else(|| ("Unknown".to_string(), body));
            ProviderError::Service { code, message, status: response.status.as_u16() }
        }
        RusotoError::HttpDispatch(e) => ProviderError::Transport(e.to_string()),
        RusotoError::Credentials(e) => ProviderError::Credentials(e.to_string()),
        other => ProviderError::Transport(other.to_string()),
    }
}
