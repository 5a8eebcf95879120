use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, alias = "s3_buckets")]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub aws: AwsConfig,
    pub database: DatabaseConfig,
    /// Tenant the ingested events are filed under.
    pub group_id: String,
    #[serde(default)]
    pub collection: CollectionConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
}

/// One monitored bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(alias = "bucket_name")]
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default, alias = "max_files")]
    pub max_objects: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsConfig {
    #[serde(default = "default_region")]
    pub region: String,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
        }
    }
}

fn default_region() -> String {
    "ap-northeast-2".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

fn default_pool_size() -> u32 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    #[serde(with = "humantime_serde", default = "default_poll_interval")]
    pub poll_interval: Duration,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Object cap for sources that do not set their own.
    #[serde(default = "default_max_objects")]
    pub max_objects: usize,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            batch_size: default_batch_size(),
            max_objects: default_max_objects(),
        }
    }
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(300)
}

fn default_batch_size() -> usize {
    100
}

fn default_max_objects() -> usize {
    50
}

/// Where to look for CloudTrail logs in buckets without a prefix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default = "default_probes")]
    pub probes: Vec<String>,
    #[serde(default = "default_marker")]
    pub marker: String,
    #[serde(default = "default_fallback")]
    pub fallback: String,
    #[serde(default = "default_probe_limit")]
    pub probe_limit: i32,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            probes: default_probes(),
            marker: default_marker(),
            fallback: default_fallback(),
            probe_limit: default_probe_limit(),
        }
    }
}

fn default_probes() -> Vec<String> {
    vec![
        "AWSLogs/".to_string(),
        "CloudTrail/".to_string(),
        "logs/".to_string(),
    ]
}

fn default_marker() -> String {
    "CloudTrail".to_string()
}

fn default_fallback() -> String {
    "AWSLogs/".to_string()
}

fn default_probe_limit() -> i32 {
    10
}
