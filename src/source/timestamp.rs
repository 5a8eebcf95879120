use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;

/// Suffix of CloudTrail log objects.
pub const LOG_SUFFIX: &str = ".json.gz";

const KEY_TIMESTAMP_PATTERN: &str = r"_(?P<ts>\d{8}T\d{4})Z_";
const KEY_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M";

/// Recognises log objects by suffix and pulls the delivery timestamp
/// out of their file names.
///
/// CloudTrail names objects
/// `<account>_CloudTrail_<region>_<YYYYMMDD>T<HHMM>Z_<unique>.json.gz`;
/// only the `_<date>T<time>Z_` token is used.
#[derive(Debug, Clone)]
pub struct KeyTimestampExtractor {
    pattern: Regex,
    suffix: String,
}

impl Default for KeyTimestampExtractor {
    fn default() -> Self {
        Self::new(LOG_SUFFIX)
    }
}

impl KeyTimestampExtractor {
    pub fn new(suffix: &str) -> Self {
        Self {
            pattern: Regex::new(KEY_TIMESTAMP_PATTERN).expect("key timestamp pattern is valid"),
            suffix: suffix.to_string(),
        }
    }

    pub fn has_log_suffix(&self, key: &str) -> bool {
        key.ends_with(&self.suffix)
    }

    /// Timestamp embedded in the last path segment of `key`.
    ///
    /// Returns `None` when the token is missing or names an impossible date.
    pub fn extract(&self, key: &str) -> Option<DateTime<Utc>> {
        let file_name = key.rsplit('/').next().unwrap_or(key);
        let captures = self.pattern.captures(file_name)?;
        let value = captures.name("ts")?.as_str();

        NaiveDateTime::parse_from_str(value, KEY_TIMESTAMP_FORMAT)
            .ok()
            .map(|naive| naive.and_utc())
    }

    /// Suffix check followed by timestamp extraction.
    pub fn log_timestamp(&self, key: &str) -> Option<DateTime<Utc>> {
        if !self.has_log_suffix(key) {
            return None;
        }
        self.extract(key)
    }
}
