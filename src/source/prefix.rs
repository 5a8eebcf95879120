use super::timestamp::LOG_SUFFIX;
use crate::config::types::DiscoveryConfig;
use crate::object_store::ObjectStore;
use tracing::{debug, info};

/// Best-effort search for the CloudTrail prefix inside a bucket that has no
/// configured prefix.
///
/// Each probe root is listed once (bounded by `probe_limit` keys). The first
/// log key containing the marker directory yields a prefix rooted at that
/// marker; if nothing matches, the fallback root is used and normal listing
/// simply finds no logs.
#[derive(Debug, Clone)]
pub struct PrefixDiscovery {
    probes: Vec<String>,
    marker: String,
    fallback: String,
    probe_limit: i32,
}

impl Default for PrefixDiscovery {
    fn default() -> Self {
        Self::from(&DiscoveryConfig::default())
    }
}

impl From<&DiscoveryConfig> for PrefixDiscovery {
    fn from(config: &DiscoveryConfig) -> Self {
        Self {
            probes: config.probes.clone(),
            marker: config.marker.clone(),
            fallback: config.fallback.clone(),
            probe_limit: config.probe_limit,
        }
    }
}

impl PrefixDiscovery {
    /// Whether a listed key looks like a log of the expected family.
    pub fn matches(&self, key: &str) -> bool {
        key.contains(&self.marker) && key.ends_with(LOG_SUFFIX)
    }

    /// Derive a listing prefix from a matching key.
    ///
    /// `AWSLogs/<account>/CloudTrail/<region>/...` becomes
    /// `AWSLogs/<account>/CloudTrail/<region>/`; with a region override the
    /// region segment is replaced by the override.
    pub fn prefix_from_key(&self, key: &str, region: Option<&str>) -> Option<String> {
        let parts: Vec<&str> = key.split('/').collect();
        // the last segment is the file name, never a directory
        let dirs = &parts[..parts.len().saturating_sub(1)];
        let pos = dirs.iter().position(|part| *part == self.marker)?;

        let prefix = match region {
            Some(region) => format!("{}/{}/", dirs[..=pos].join("/"), region),
            None => {
                let end = (pos + 2).min(dirs.len());
                format!("{}/", dirs[..end].join("/"))
            }
        };
        Some(prefix)
    }

    pub async fn discover(
        &self,
        store: &dyn ObjectStore,
        bucket: &str,
        region: Option<&str>,
    ) -> String {
        for probe in &self.probes {
            let page = match store
                .list_page(bucket, probe, None, Some(self.probe_limit))
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    debug!(bucket = %bucket, probe = %probe, error = %e, "Prefix probe failed");
                    continue;
                }
            };

            let found = page
                .keys
                .iter()
                .filter(|key| self.matches(key))
                .find_map(|key| self.prefix_from_key(key, region));

            if let Some(prefix) = found {
                info!(bucket = %bucket, prefix = %prefix, "Discovered CloudTrail prefix");
                return prefix;
            }
        }

        debug!(bucket = %bucket, fallback = %self.fallback, "No CloudTrail prefix found, using fallback");
        self.fallback.clone()
    }
}
