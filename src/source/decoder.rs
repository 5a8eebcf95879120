use crate::event::{EventNameFilter, EventRecord};
use crate::object_store::{ObjectStore, ObjectStoreError};
use flate2::read::MultiGzDecoder;
use serde::Deserialize;
use serde_json::Value;
use std::io::Read;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error(transparent)]
    Fetch(#[from] ObjectStoreError),

    #[error("failed to decompress '{key}': {source}")]
    Decompress {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse envelope of '{key}': {source}")]
    Envelope {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(rename = "Records", default)]
    records: Vec<Value>,
}

/// Records pulled from one object.
#[derive(Debug, Clone, Default)]
pub struct DecodedObject {
    pub records: Vec<EventRecord>,
    /// Entries dropped by the event-name filter.
    pub filtered: usize,
    /// Entries that did not fit the record schema.
    pub malformed: usize,
}

/// Fetches a log object, gunzips it and decodes its `Records` array.
pub struct ObjectDecoder {
    store: Arc<dyn ObjectStore>,
}

impl ObjectDecoder {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    pub async fn decode(
        &self,
        bucket: &str,
        key: &str,
        filter: Option<&EventNameFilter>,
    ) -> Result<DecodedObject, DecodeError> {
        let bytes = self.store.get_object(bucket, key).await?;
        decode_bytes(key, &bytes, filter)
    }
}

/// Decode a gzip-compressed envelope.
///
/// A broken archive or envelope fails the whole object; a single entry that
/// does not decode is counted in `malformed` and logged.
pub fn decode_bytes(
    key: &str,
    bytes: &[u8],
    filter: Option<&EventNameFilter>,
) -> Result<DecodedObject, DecodeError> {
    let mut text = String::new();
    MultiGzDecoder::new(bytes)
        .read_to_string(&mut text)
        .map_err(|source| DecodeError::Decompress {
            key: key.to_string(),
            source,
        })?;

    let envelope: RawEnvelope =
        serde_json::from_str(&text).map_err(|source| DecodeError::Envelope {
            key: key.to_string(),
            source,
        })?;

    let mut decoded = DecodedObject::default();

    for (index, entry) in envelope.records.into_iter().enumerate() {
        if let Some(filter) = filter {
            let name = entry.get("eventName").and_then(Value::as_str).unwrap_or("");
            if !filter.allows(name) {
                decoded.filtered += 1;
                continue;
            }
        }

        match serde_json::from_value::<EventRecord>(entry) {
            // the id is the dedup key and must be present
            Ok(record) if record.event_id.trim().is_empty() => {
                warn!(key = %key, index, "Skipping entry without eventID");
                decoded.malformed += 1;
            }
            Ok(record) => decoded.records.push(record),
            Err(e) => {
                warn!(key = %key, index, error = %e, "Skipping malformed entry");
                decoded.malformed += 1;
            }
        }
    }

    debug!(
        key = %key,
        records = decoded.records.len(),
        filtered = decoded.filtered,
        malformed = decoded.malformed,
        "Decoded object"
    );

    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_store::MemoryObjectStore;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use serde_json::json;
    use std::io::Write;

    fn gzip(value: &Value) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(serde_json::to_string(value).unwrap().as_bytes())
            .unwrap();
        encoder.finish().unwrap()
    }

    fn envelope() -> Value {
        json!({
            "Records": [
                {"eventID": "a", "eventName": "ConsoleLogin"},
                {"eventID": "b", "eventName": "GetObject"},
                {"eventID": "c", "eventName": "ConsoleLogin", "readOnly": "yes"},
                {"eventID": "d", "eventName": "DeleteBucket"}
            ]
        })
    }

    #[test]
    fn test_decode_all_entries() {
        let decoded = decode_bytes("k", &gzip(&envelope()), None).unwrap();

        let ids: Vec<_> = decoded.records.iter().map(|r| r.event_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "d"]);
        assert_eq!(decoded.malformed, 1);
        assert_eq!(decoded.filtered, 0);
    }

    #[test]
    fn test_decode_with_filter() {
        let filter = EventNameFilter::from_names(["ConsoleLogin", "DeleteBucket"]).unwrap();
        let decoded = decode_bytes("k", &gzip(&envelope()), Some(&filter)).unwrap();

        let ids: Vec<_> = decoded.records.iter().map(|r| r.event_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "d"]);
        assert_eq!(decoded.filtered, 1);
        assert_eq!(decoded.malformed, 1);
    }

    #[test]
    fn test_entries_without_id_are_malformed() {
        let body = json!({
            "Records": [
                {"eventName": "ConsoleLogin"},
                {"eventID": "kept", "eventName": "ConsoleLogin"},
                {"eventName": "ConsoleLogin"},
                {"eventID": null, "eventName": "ConsoleLogin"},
                {"eventID": "  ", "eventName": "ConsoleLogin"}
            ]
        });
        let decoded = decode_bytes("k", &gzip(&body), None).unwrap();

        let ids: Vec<_> = decoded.records.iter().map(|r| r.event_id.as_str()).collect();
        assert_eq!(ids, vec!["kept"]);
        assert_eq!(decoded.malformed, 4);
    }

    #[test]
    fn test_empty_envelope() {
        let decoded = decode_bytes("k", &gzip(&json!({})), None).unwrap();
        assert!(decoded.records.is_empty());
    }

    #[test]
    fn test_not_gzip() {
        let err = decode_bytes("k", b"{\"Records\": []}", None).unwrap_err();
        assert!(matches!(err, DecodeError::Decompress { .. }));
    }

    #[test]
    fn test_bad_envelope() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"{not json").unwrap();
        let bytes = encoder.finish().unwrap();

        let err = decode_bytes("k", &bytes, None).unwrap_err();
        assert!(matches!(err, DecodeError::Envelope { .. }));
    }

    #[tokio::test]
    async fn test_decode_fetches_from_store() {
        let store = Arc::new(MemoryObjectStore::new());
        store.put("bucket", "k.json.gz", gzip(&envelope()));

        let decoder = ObjectDecoder::new(store.clone());
        let decoded = decoder.decode("bucket", "k.json.gz", None).await.unwrap();
        assert_eq!(decoded.records.len(), 3);

        let missing = decoder.decode("bucket", "nope.json.gz", None).await;
        assert!(matches!(missing, Err(DecodeError::Fetch(ObjectStoreError::NotFound { .. }))));
    }
}
