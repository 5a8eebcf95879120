use super::record::{EventEnvelope, EventRecord};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("failed to write '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode records: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Writes records as a pretty-printed `{"Records": [...]}` document.
pub fn save_envelope(path: &Path, records: &[EventRecord]) -> Result<(), ArchiveError> {
    let io_err = |source| ArchiveError::Io {
        path: path.display().to_string(),
        source,
    };

    let file = File::create(path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);

    let envelope = EventEnvelope::new(records.to_vec());
    serde_json::to_writer_pretty(&mut writer, &envelope)?;
    writer.flush().map_err(io_err)?;

    tracing::info!(path = %path.display(), count = records.len(), "Exported records");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_save_envelope_writes_records_key() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("export.json");

        let record: EventRecord = serde_json::from_value(json!({
            "eventID": "abc",
            "eventName": "ConsoleLogin"
        }))
        .unwrap();

        save_envelope(&path, &[record]).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["Records"][0]["eventID"], "abc");
        assert!(written["Records"][0].get("errorCode").is_none());
    }

    #[test]
    fn test_save_envelope_reports_path_on_failure() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing").join("export.json");

        let err = save_envelope(&path, &[]).unwrap_err();
        assert!(err.to_string().contains("export.json"));
    }
}
