use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// One CloudTrail entry as it appears in a delivered log object.
///
/// Every scalar defaults to empty when missing or `null`; nested structures
/// that are absent stay `None`, which means "not applicable" rather than a
/// decode failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    /// Assigned by CloudTrail; the deduplication key.
    #[serde(rename = "eventID", default, deserialize_with = "nullable_string")]
    pub event_id: String,

    #[serde(default, deserialize_with = "nullable_string")]
    pub event_version: String,

    /// Kept as the raw ISO-8601 string; watermarks come from object names.
    #[serde(default, deserialize_with = "nullable_string")]
    pub event_time: String,

    #[serde(default, deserialize_with = "nullable_string")]
    pub event_source: String,

    #[serde(default, deserialize_with = "nullable_string")]
    pub event_name: String,

    #[serde(default, deserialize_with = "nullable_string")]
    pub event_category: String,

    #[serde(default, deserialize_with = "nullable_string")]
    pub event_type: String,

    #[serde(default, deserialize_with = "nullable_string")]
    pub aws_region: String,

    #[serde(default, deserialize_with = "nullable_bool")]
    pub read_only: bool,

    #[serde(rename = "requestID", default, deserialize_with = "nullable_string")]
    pub request_id: String,

    /// Hostname or address literal, unvalidated here.
    #[serde(rename = "sourceIPAddress", default, deserialize_with = "nullable_string")]
    pub source_ip_address: String,

    #[serde(default, deserialize_with = "nullable_string")]
    pub user_agent: String,

    #[serde(default, deserialize_with = "nullable_bool")]
    pub management_event: bool,

    #[serde(default, deserialize_with = "nullable_string")]
    pub recipient_account_id: String,

    #[serde(default, deserialize_with = "nullable_identity")]
    pub user_identity: ActorIdentity,

    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub session_credential_from_console: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_event_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_details: Option<TlsDetails>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_parameters: Option<Map<String, Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_elements: Option<Map<String, Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insight_details: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<Value>,
}

/// The principal that made the call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorIdentity {
    #[serde(rename = "type", default, deserialize_with = "nullable_string")]
    pub identity_type: String,

    #[serde(default, deserialize_with = "nullable_string")]
    pub principal_id: String,

    #[serde(default, deserialize_with = "nullable_string")]
    pub arn: String,

    #[serde(default, deserialize_with = "nullable_string")]
    pub account_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_context: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TlsDetails {
    #[serde(default, deserialize_with = "nullable_string")]
    pub tls_version: String,

    #[serde(default, deserialize_with = "nullable_string")]
    pub cipher_suite: String,

    #[serde(default, deserialize_with = "nullable_string")]
    pub client_provided_host_header: String,
}

/// The outer `{"Records": [...]}` document of a log object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventEnvelope {
    #[serde(rename = "Records", default)]
    pub records: Vec<EventRecord>,
}

impl EventEnvelope {
    pub fn new(records: Vec<EventRecord>) -> Self {
        Self { records }
    }

    pub fn total_events(&self) -> usize {
        self.records.len()
    }
}

fn nullable_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn nullable_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or_default())
}

fn nullable_identity<'de, D>(deserializer: D) -> Result<ActorIdentity, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<ActorIdentity>::deserialize(deserializer)?.unwrap_or_default())
}

// CloudTrail writes this flag as "true"/"false" but older trails used booleans.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_entry() -> Value {
        json!({
            "eventVersion": "1.09",
            "userIdentity": {
                "type": "IAMUser",
                "principalId": "AIDAEXAMPLE",
                "arn": "arn:aws:iam::123456789012:user/alice",
                "accountId": "123456789012",
                "accessKeyId": "AKIAEXAMPLE",
                "userName": "alice"
            },
            "eventTime": "2025-09-03T00:01:12Z",
            "eventSource": "s3.amazonaws.com",
            "eventName": "GetObject",
            "awsRegion": "ap-northeast-2",
            "sourceIPAddress": "203.0.113.7",
            "userAgent": "aws-cli/2.15",
            "requestParameters": {"bucketName": "data"},
            "responseElements": null,
            "requestID": "REQ1",
            "eventID": "0b0d6a9e-1111-2222-3333-444455556666",
            "readOnly": true,
            "eventType": "AwsApiCall",
            "managementEvent": false,
            "recipientAccountId": "123456789012",
            "eventCategory": "Data",
            "sessionCredentialFromConsole": "true",
            "tlsDetails": {
                "tlsVersion": "TLSv1.3",
                "cipherSuite": "TLS_AES_128_GCM_SHA256",
                "clientProvidedHostHeader": "data.s3.ap-northeast-2.amazonaws.com"
            },
            "resources": [{"ARN": "arn:aws:s3:::data/key", "type": "AWS::S3::Object"}]
        })
    }

    #[test]
    fn test_decode_full_entry() {
        let record: EventRecord = serde_json::from_value(sample_entry()).unwrap();

        assert_eq!(record.event_id, "0b0d6a9e-1111-2222-3333-444455556666");
        assert_eq!(record.event_name, "GetObject");
        assert!(record.read_only);
        assert!(!record.management_event);
        assert_eq!(record.user_identity.identity_type, "IAMUser");
        assert_eq!(record.user_identity.user_name.as_deref(), Some("alice"));
        assert_eq!(record.session_credential_from_console.as_deref(), Some("true"));
        assert_eq!(record.tls_details.unwrap().tls_version, "TLSv1.3");
        assert_eq!(record.request_parameters.unwrap()["bucketName"], "data");
        assert!(record.response_elements.is_none());
        assert!(record.resources.unwrap().is_array());
        assert!(record.error_code.is_none());
    }

    #[test]
    fn test_missing_and_null_fields_default() {
        let record: EventRecord = serde_json::from_value(json!({
            "eventID": "x",
            "userAgent": null,
            "userIdentity": null,
            "readOnly": null
        }))
        .unwrap();

        assert_eq!(record.event_id, "x");
        assert_eq!(record.user_agent, "");
        assert!(!record.read_only);
        assert_eq!(record.user_identity, ActorIdentity::default());
        assert!(record.tls_details.is_none());
    }

    #[test]
    fn test_boolean_console_flag_is_kept_as_text() {
        let record: EventRecord = serde_json::from_value(json!({
            "eventID": "x",
            "sessionCredentialFromConsole": true
        }))
        .unwrap();

        assert_eq!(record.session_credential_from_console.as_deref(), Some("true"));
    }

    #[test]
    fn test_serialization_omits_absent_optionals() {
        let record: EventRecord = serde_json::from_value(json!({
            "eventID": "x",
            "eventName": "ConsoleLogin"
        }))
        .unwrap();

        let encoded = serde_json::to_value(&record).unwrap();
        let object = encoded.as_object().unwrap();

        assert_eq!(object["eventID"], "x");
        assert!(object.contains_key("userIdentity"));
        assert!(!object.contains_key("tlsDetails"));
        assert!(!object.contains_key("errorCode"));
        assert!(!object.contains_key("insightDetails"));
        assert!(!object["userIdentity"].as_object().unwrap().contains_key("accessKeyId"));
    }
}
