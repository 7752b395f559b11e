//! Configuration file parsing and management.
//!
//! Handles loading TOML configuration files, reading `DOMSCAN_*` environment
//! variables and merging both into a `LookupConfig` with proper precedence.

use crate::error::LookupError;
use crate::types::{LookupConfig, MAX_PARALLELISM};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration loaded from TOML files.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct FileConfig {
    /// Default values for CLI options
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<DefaultsConfig>,

    /// TLD -> WHOIS server overrides
    #[serde(skip_serializing_if = "Option::is_none")]
    pub servers: Option<HashMap<String, String>>,

    /// Extra "no match" phrases for the classifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patterns: Option<PatternsConfig>,
}

/// Default values that map to CLI options.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct DefaultsConfig {
    /// Number of concurrent workers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel: Option<usize>,

    /// Per-request timeout ("5s", "2m", "30"); "0" disables the deadline
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    /// Server queried for TLDs missing from the registry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_server: Option<String>,

    /// Ask IANA for servers of unknown TLDs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discover_servers: Option<bool>,

    /// Print the raw WHOIS response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_whois: Option<bool>,

    /// Print elapsed times
    #[serde(skip_serializing_if = "Option::is_none")]
    pub benchmark: Option<bool>,

    /// Emit JSON lines instead of colored text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json: Option<bool>,
}

/// Classifier phrase configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PatternsConfig {
    /// Phrases applied to every response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generic: Option<Vec<String>>,

    /// Registry-specific phrases keyed by TLD
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tld: Option<HashMap<String, Vec<String>>>,
}

/// Configuration discovery and loading functionality.
pub struct ConfigManager {
    /// Whether to log which files were picked up
    pub verbose: bool,
}

impl ConfigManager {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Load configuration from a specific file.
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<FileConfig, LookupError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(LookupError::file_error(
                path.to_string_lossy(),
                "Configuration file not found",
            ));
        }

        let content = fs::read_to_string(path).map_err(|e| {
            LookupError::file_error(
                path.to_string_lossy(),
                format!("Failed to read configuration file: {}", e),
            )
        })?;

        let config: FileConfig = toml::from_str(&content)
            .map_err(|e| LookupError::config(format!("Failed to parse TOML configuration: {}", e)))?;

        self.validate_config(&config)?;

        Ok(config)
    }

    /// Discover and load configuration files in precedence order.
    ///
    /// XDG config < home config < local config; later files win per field.
    pub fn discover_and_load(&self) -> Result<FileConfig, LookupError> {
        let mut merged_config = FileConfig::default();
        let mut loaded_files = Vec::new();

        let candidates = [
            self.get_xdg_config_path(),
            self.get_global_config_path(),
            self.get_local_config_path(),
        ];

        for path in candidates.into_iter().flatten() {
            match self.load_file(&path) {
                Ok(config) => {
                    merged_config = self.merge_configs(merged_config, config);
                    loaded_files.push(path);
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping config file"),
            }
        }

        if self.verbose {
            for path in &loaded_files {
                debug!(path = %path.display(), "Loaded config file");
            }
        }

        Ok(merged_config)
    }

    fn get_local_config_path(&self) -> Option<PathBuf> {
        ["./domscan.toml", "./.domscan.toml"]
            .iter()
            .map(Path::new)
            .find(|p| p.exists())
            .map(Path::to_path_buf)
    }

    fn get_global_config_path(&self) -> Option<PathBuf> {
        let home = env::var_os("HOME")?;
        [".domscan.toml", "domscan.toml"]
            .iter()
            .map(|candidate| Path::new(&home).join(candidate))
            .find(|p| p.exists())
    }

    /// `$XDG_CONFIG_HOME/domscan/config.toml`, falling back to `~/.config`.
    fn get_xdg_config_path(&self) -> Option<PathBuf> {
        let config_dir = env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| env::var_os("HOME").map(|home| Path::new(&home).join(".config")))?;

        let path = config_dir.join("domscan").join("config.toml");
        if path.exists() {
            Some(path)
        } else {
            None
        }
    }

    /// Merge two configurations. Values from `higher` take precedence.
    pub fn merge_configs(&self, lower: FileConfig, higher: FileConfig) -> FileConfig {
        FileConfig {
            defaults: match (lower.defaults, higher.defaults) {
                (Some(lower), Some(higher)) => Some(DefaultsConfig {
                    parallel: higher.parallel.or(lower.parallel),
                    timeout: higher.timeout.or(lower.timeout),
                    default_server: higher.default_server.or(lower.default_server),
                    discover_servers: higher.discover_servers.or(lower.discover_servers),
                    show_whois: higher.show_whois.or(lower.show_whois),
                    benchmark: higher.benchmark.or(lower.benchmark),
                    json: higher.json.or(lower.json),
                }),
                (lower, higher) => higher.or(lower),
            },
            servers: match (lower.servers, higher.servers) {
                (Some(mut lower), Some(higher)) => {
                    lower.extend(higher);
                    Some(lower)
                }
                (lower, higher) => higher.or(lower),
            },
            patterns: match (lower.patterns, higher.patterns) {
                (Some(lower), Some(higher)) => Some(PatternsConfig {
                    generic: merge_lists(lower.generic, higher.generic),
                    tld: match (lower.tld, higher.tld) {
                        (Some(mut lower), Some(higher)) => {
                            lower.extend(higher);
                            Some(lower)
                        }
                        (lower, higher) => higher.or(lower),
                    },
                }),
                (lower, higher) => higher.or(lower),
            },
        }
    }

    fn validate_config(&self, config: &FileConfig) -> Result<(), LookupError> {
        if let Some(defaults) = &config.defaults {
            if let Some(parallel) = defaults.parallel {
                if parallel == 0 || parallel > MAX_PARALLELISM {
                    return Err(LookupError::config(format!(
                        "parallel must be between 1 and {}",
                        MAX_PARALLELISM
                    )));
                }
            }

            if let Some(timeout) = &defaults.timeout {
                if parse_timeout_string(timeout).is_none() {
                    return Err(LookupError::config(format!(
                        "Invalid timeout format '{}'. Use format like '5s', '30s', '2m'",
                        timeout
                    )));
                }
            }

            if let Some(server) = &defaults.default_server {
                if server.trim().is_empty() {
                    return Err(LookupError::config("default_server cannot be empty"));
                }
            }
        }

        if let Some(servers) = &config.servers {
            for (tld, server) in servers {
                if tld.is_empty() || tld.contains(' ') || server.trim().is_empty() {
                    return Err(LookupError::config(format!(
                        "Invalid server mapping '{}' = '{}'",
                        tld, server
                    )));
                }
            }
        }

        Ok(())
    }
}

// Additive: phrases from both files are kept
fn merge_lists(lower: Option<Vec<String>>, higher: Option<Vec<String>>) -> Option<Vec<String>> {
    match (lower, higher) {
        (Some(mut lower), Some(higher)) => {
            for item in higher {
                if !lower.contains(&item) {
                    lower.push(item);
                }
            }
            Some(lower)
        }
        (lower, higher) => higher.or(lower),
    }
}

/// Apply a file configuration on top of a `LookupConfig`.
pub fn apply_file_config(mut config: LookupConfig, file_config: &FileConfig) -> LookupConfig {
    if let Some(defaults) = &file_config.defaults {
        if let Some(parallel) = defaults.parallel {
            config = config.with_parallelism(parallel);
        }
        if let Some(timeout) = defaults.timeout.as_deref().and_then(parse_timeout_string) {
            config.timeout = timeout;
        }
        if let Some(server) = &defaults.default_server {
            config.default_server = Some(server.clone());
        }
        if let Some(discover) = defaults.discover_servers {
            config.discover_servers = discover;
        }
    }

    if let Some(servers) = &file_config.servers {
        for (tld, server) in servers {
            config = config.with_server(tld.as_str(), server.as_str());
        }
    }

    if let Some(patterns) = &file_config.patterns {
        if let Some(generic) = &patterns.generic {
            config.extra_patterns.extend(generic.iter().cloned());
        }
        if let Some(tld) = &patterns.tld {
            for (tld, phrases) in tld {
                config
                    .tld_patterns
                    .entry(tld.to_lowercase())
                    .or_default()
                    .extend(phrases.iter().cloned());
            }
        }
    }

    config
}

/// Configuration values from `DOMSCAN_*` environment variables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvConfig {
    pub parallel: Option<usize>,
    pub timeout: Option<String>,
    pub server: Option<String>,
    pub config: Option<String>,
    pub json: Option<bool>,
}

/// Load configuration from environment variables.
///
/// Invalid values are logged and ignored.
pub fn load_env_config() -> EnvConfig {
    env_config_from(|key| env::var(key).ok())
}

fn env_config_from<F>(lookup: F) -> EnvConfig
where
    F: Fn(&str) -> Option<String>,
{
    let mut env_config = EnvConfig::default();

    if let Some(val) = lookup("DOMSCAN_PARALLEL") {
        match val.trim().parse::<usize>() {
            Ok(parallel) if (1..=MAX_PARALLELISM).contains(&parallel) => {
                debug!(parallel, "Using DOMSCAN_PARALLEL");
                env_config.parallel = Some(parallel);
            }
            _ => warn!(value = %val, "Invalid DOMSCAN_PARALLEL, must be 1-{}", MAX_PARALLELISM),
        }
    }

    if let Some(val) = lookup("DOMSCAN_TIMEOUT") {
        if parse_timeout_string(&val).is_some() {
            debug!(timeout = %val, "Using DOMSCAN_TIMEOUT");
            env_config.timeout = Some(val);
        } else {
            warn!(value = %val, "Invalid DOMSCAN_TIMEOUT, use format like '5s', '30s', '2m'");
        }
    }

    if let Some(val) = lookup("DOMSCAN_SERVER") {
        if !val.trim().is_empty() {
            env_config.server = Some(val.trim().to_string());
        }
    }

    if let Some(val) = lookup("DOMSCAN_CONFIG") {
        if !val.trim().is_empty() {
            env_config.config = Some(val);
        }
    }

    if let Some(val) = lookup("DOMSCAN_JSON") {
        match parse_bool(&val) {
            Some(json) => env_config.json = Some(json),
            None => warn!(value = %val, "Invalid DOMSCAN_JSON, use true/false"),
        }
    }

    env_config
}

/// Apply environment configuration on top of a `LookupConfig`.
pub fn apply_env_config(mut config: LookupConfig, env_config: &EnvConfig) -> LookupConfig {
    if let Some(parallel) = env_config.parallel {
        config = config.with_parallelism(parallel);
    }
    if let Some(timeout) = env_config.timeout.as_deref().and_then(parse_timeout_string) {
        config.timeout = timeout;
    }
    if let Some(server) = &env_config.server {
        config.default_server = Some(server.clone());
    }
    config
}

fn parse_bool(val: &str) -> Option<bool> {
    match val.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a timeout string like "5s", "30s", "2m" or "10".
///
/// Returns `Some(None)` for a zero timeout, meaning "no deadline".
pub fn parse_timeout_string(timeout_str: &str) -> Option<Option<Duration>> {
    let timeout_str = timeout_str.trim().to_lowercase();

    let secs = if let Some(ms) = timeout_str.strip_suffix("ms") {
        return ms
            .parse::<u64>()
            .ok()
            .map(|ms| (ms > 0).then(|| Duration::from_millis(ms)));
    } else if let Some(s) = timeout_str.strip_suffix('s') {
        s.parse::<u64>().ok()
    } else if let Some(m) = timeout_str.strip_suffix('m') {
        m.parse::<u64>().ok().and_then(|m| m.checked_mul(60))
    } else {
        timeout_str.parse::<u64>().ok()
    }?;

    Some((secs > 0).then(|| Duration::from_secs(secs)))
}
