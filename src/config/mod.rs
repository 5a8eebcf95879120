pub mod parse;
pub mod types;

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub use parse::{load_config, parse_config, ConfigError};
pub use types::{CollectionConfig, Config, DatabaseConfig, DiscoveryConfig, SourceConfig};

const SYSTEM_CONFIG: &str = "/etc/trailsync/config.yml";
const USER_CONFIG: &str = ".config/trailsync/config.yml";

/// Matches `$env{NAME}`; group 1 is the variable name.
pub(crate) fn env_var_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$env\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("env var pattern is valid")
    })
}

/// Substitute `$env{NAME}` references. Unset variables stay as written so
/// the parser can report all of them at once.
pub fn expand_env_vars(text: &str) -> String {
    env_var_regex()
        .replace_all(text, |caps: &regex::Captures| match std::env::var(&caps[1]) {
            Ok(value) => value,
            Err(_) => caps[0].to_string(),
        })
        .into_owned()
}

/// `~` and `~/rest` resolve against the home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) if rest.as_os_str().is_empty() => home,
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

/// Config lookup order: an explicit `--config` (taken as given), then the
/// per-user file, then the system-wide one.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(expand_tilde(path));
    }

    dirs::home_dir()
        .map(|home| home.join(USER_CONFIG))
        .into_iter()
        .chain(std::iter::once(PathBuf::from(SYSTEM_CONFIG)))
        .find(|candidate| candidate.is_file())
}
