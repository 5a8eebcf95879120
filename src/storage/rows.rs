use super::traits::StorageError;
use crate::event::EventRecord;
use std::net::IpAddr;
use uuid::Uuid;

pub const SOURCE_PRODUCT: &str = "cloudtrail";

/// The address column only holds IPv4/IPv6 literals; anything else
/// (AWS service hostnames, empty strings) is stored as NULL.
pub fn normalize_source_ip(raw: &str) -> Option<String> {
    raw.trim().parse::<IpAddr>().ok().map(|ip| ip.to_string())
}

/// Column values for one event, ready to bind.
#[derive(Debug, Clone)]
pub struct EventRow {
    pub id: Uuid,
    pub source_ip: Option<String>,
    pub user_identity: String,
    pub tls_details: Option<String>,
    pub request_parameters: Option<String>,
    pub response_elements: Option<String>,
    pub insight_details: Option<String>,
    pub resources: Option<String>,
    pub event: EventRecord,
}

impl EventRow {
    pub fn from_event(event: &EventRecord) -> Result<Self, StorageError> {
        Ok(Self {
            id: Uuid::new_v4(),
            source_ip: normalize_source_ip(&event.source_ip_address),
            user_identity: serde_json::to_string(&event.user_identity)?,
            tls_details: to_json(&event.tls_details)?,
            request_parameters: to_json(&event.request_parameters)?,
            response_elements: to_json(&event.response_elements)?,
            insight_details: to_json(&event.insight_details)?,
            resources: to_json(&event.resources)?,
            event: event.clone(),
        })
    }
}

fn to_json<T: serde::Serialize>(value: &Option<T>) -> Result<Option<String>, StorageError> {
    value
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(StorageError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_source_ip() {
        assert_eq!(normalize_source_ip("203.0.113.7").as_deref(), Some("203.0.113.7"));
        assert_eq!(
            normalize_source_ip("2001:db8::1").as_deref(),
            Some("2001:db8::1")
        );
        assert_eq!(normalize_source_ip("s3.amazonaws.com"), None);
        assert_eq!(normalize_source_ip("AWS Internal"), None);
        assert_eq!(normalize_source_ip("256.1.1.1"), None);
        assert_eq!(normalize_source_ip(""), None);
    }

    #[test]
    fn test_row_json_columns() {
        let event: EventRecord = serde_json::from_value(json!({
            "eventID": "e1",
            "sourceIPAddress": "cloudformation.amazonaws.com",
            "userIdentity": {"type": "AWSService", "invokedBy": "x"},
            "requestParameters": {"stackName": "s"}
        }))
        .unwrap();

        let row = EventRow::from_event(&event).unwrap();

        assert!(row.source_ip.is_none());
        assert!(row.tls_details.is_none());
        assert!(row.response_elements.is_none());
        assert_eq!(row.request_parameters.as_deref(), Some(r#"{"stackName":"s"}"#));

        let identity: serde_json::Value = serde_json::from_str(&row.user_identity).unwrap();
        assert_eq!(identity["type"], "AWSService");
        assert!(identity.get("userName").is_none());
    }
}
