use async_trait::async_trait;
use common::domain::{DeviceRegistry, RegistryError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Directory service client speaking JSON request/reply over core NATS.
///
/// Lookups go to `{prefix}.describe_device` and `{prefix}.list_groups`; the
/// directory answers with either the data or an error code, which is
/// classified into the router's failure taxonomy. Authorization is entirely
/// the directory side's concern.
pub struct NatsDirectoryClient {
    client: async_nats::Client,
    subject_prefix: String,
}

#[derive(Debug, Serialize)]
struct LookupRequest<'a> {
    device_id: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum DirectoryReply<T> {
    Ok(T),
    Error(DirectoryErrorReply),
}

#[derive(Debug, Deserialize)]
struct DirectoryErrorReply {
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct AttributesReply {
    attributes: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct GroupsReply {
    groups: Vec<String>,
}

impl NatsDirectoryClient {
    pub fn new(client: async_nats::Client, subject_prefix: String) -> Self {
        debug!(subject_prefix = %subject_prefix, "initialized NatsDirectoryClient");
        Self {
            client,
            subject_prefix,
        }
    }

    async fn lookup<T: DeserializeOwned>(
        &self,
        operation: &str,
        device_id: &str,
    ) -> Result<T, RegistryError> {
        let subject = format!("{}.{}", self.subject_prefix, operation);
        let request = serde_json::to_vec(&LookupRequest { device_id })
            .map_err(|e| RegistryError::Lookup(e.into()))?;

        let reply = self
            .client
            .request(subject, request.into())
            .await
            .map_err(|e| RegistryError::Lookup(anyhow::anyhow!(e)))?;

        parse_reply(&reply.payload, device_id)
    }
}

/// Decode a directory reply, converting error codes into the lookup taxonomy
fn parse_reply<T: DeserializeOwned>(payload: &[u8], device_id: &str) -> Result<T, RegistryError> {
    let reply: DirectoryReply<T> = serde_json::from_slice(payload)
        .map_err(|e| RegistryError::Lookup(anyhow::anyhow!("malformed directory reply: {e}")))?;

    match reply {
        DirectoryReply::Ok(value) => Ok(value),
        DirectoryReply::Error(err) => Err(classify_error(&err, device_id)),
    }
}

fn classify_error(err: &DirectoryErrorReply, device_id: &str) -> RegistryError {
    match err.code.as_str() {
        "NOT_FOUND" => RegistryError::NotFound(device_id.to_string()),
        "ACCESS_DENIED" => RegistryError::AccessDenied(device_id.to_string()),
        "THROTTLED" => RegistryError::Throttled(device_id.to_string()),
        code => RegistryError::Lookup(anyhow::anyhow!(
            "directory error {code}: {}",
            err.message
        )),
    }
}

#[async_trait]
impl DeviceRegistry for NatsDirectoryClient {
    async fn describe_device(
        &self,
        device_id: &str,
    ) -> Result<HashMap<String, String>, RegistryError> {
        let reply: AttributesReply = self.lookup("describe_device", device_id).await?;
        Ok(reply.attributes)
    }

    async fn list_groups(&self, device_id: &str) -> Result<Vec<String>, RegistryError> {
        let reply: GroupsReply = self.lookup("list_groups", device_id).await?;
        Ok(reply.groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_attributes_reply() {
        let payload = br#"{"ok": {"attributes": {"deviceType": "sensor", "location": "Tokyo"}}}"#;
        let reply: AttributesReply = parse_reply(payload, "test-device-001").unwrap();
        assert_eq!(reply.attributes["deviceType"], "sensor");
        assert_eq!(reply.attributes["location"], "Tokyo");
    }

    #[test]
    fn test_parse_groups_reply() {
        let payload = br#"{"ok": {"groups": ["production-devices"]}}"#;
        let reply: GroupsReply = parse_reply(payload, "test-device-001").unwrap();
        assert_eq!(reply.groups, vec!["production-devices".to_string()]);
    }

    #[test]
    fn test_not_found_reply_classifies() {
        let payload = br#"{"error": {"code": "NOT_FOUND", "message": "no such thing"}}"#;
        let result: Result<AttributesReply, _> = parse_reply(payload, "ghost-001");
        assert!(matches!(result, Err(RegistryError::NotFound(id)) if id == "ghost-001"));
    }

    #[test]
    fn test_access_denied_reply_classifies() {
        let payload = br#"{"error": {"code": "ACCESS_DENIED"}}"#;
        let result: Result<GroupsReply, _> = parse_reply(payload, "test-device-001");
        assert!(matches!(result, Err(RegistryError::AccessDenied(_))));
    }

    #[test]
    fn test_throttled_reply_classifies() {
        let payload = br#"{"error": {"code": "THROTTLED"}}"#;
        let result: Result<GroupsReply, _> = parse_reply(payload, "test-device-001");
        assert!(matches!(result, Err(RegistryError::Throttled(_))));
    }

    #[test]
    fn test_unrecognized_error_code_becomes_lookup_error() {
        let payload = br#"{"error": {"code": "INTERNAL", "message": "boom"}}"#;
        let result: Result<AttributesReply, _> = parse_reply(payload, "test-device-001");
        assert!(matches!(result, Err(RegistryError::Lookup(_))));
    }

    #[test]
    fn test_malformed_reply_becomes_lookup_error() {
        let payload = b"not json";
        let result: Result<AttributesReply, _> = parse_reply(payload, "test-device-001");
        assert!(matches!(result, Err(RegistryError::Lookup(_))));
    }
}
