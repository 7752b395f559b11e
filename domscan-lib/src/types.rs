//! Core data types for WHOIS lookups.
//!
//! This module defines the unit of work submitted to the pool, the record produced
//! for it, and the configuration that drives a lookup run.

use crate::error::LookupError;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Default number of concurrent workers.
pub const DEFAULT_PARALLELISM: usize = 4;

/// Upper bound accepted from configuration sources.
pub const MAX_PARALLELISM: usize = 100;

/// Default per-request deadline for a WHOIS round-trip.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Server queried when a TLD has no entry in the registry.
pub const DEFAULT_WHOIS_SERVER: &str = "whois.iana.org";

/// A single domain name submitted to the pool.
///
/// Requests are immutable once created and are consumed by exactly one worker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LookupRequest {
    name: String,
}

impl LookupRequest {
    pub fn new<N: Into<String>>(name: N) -> Self {
        Self { name: name.into() }
    }

    /// The domain name to query.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn into_name(self) -> String {
        self.name
    }
}

impl From<String> for LookupRequest {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl From<&str> for LookupRequest {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for LookupRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Outcome of processing one `LookupRequest`.
///
/// `available` is only meaningful when `error` is `None`; callers must branch on
/// the error before trusting it. Records are never mutated after creation.
#[derive(Debug, Clone, Serialize)]
pub struct LookupRecord {
    /// The domain that was queried
    pub name: String,

    /// Raw WHOIS response text, empty if the lookup failed
    pub response: String,

    /// Whether the classifier considered the domain available
    pub available: bool,

    /// Failure cause, `None` on success
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_error"
    )]
    pub error: Option<LookupError>,

    /// Wall-clock duration of the round-trip
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

impl LookupRecord {
    /// Build a record for a completed round-trip.
    pub fn success(name: String, response: String, available: bool, elapsed: Duration) -> Self {
        Self {
            name,
            response,
            available,
            error: None,
            elapsed,
        }
    }

    /// Build a record for a failed round-trip. No partial response is kept.
    pub fn failure(name: String, error: LookupError, elapsed: Duration) -> Self {
        Self {
            name,
            response: String::new(),
            available: false,
            error: Some(error),
            elapsed,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Availability, or `None` if the lookup failed.
    pub fn availability(&self) -> Option<bool> {
        match self.error {
            Some(_) => None,
            None => Some(self.available),
        }
    }
}

fn serialize_error<S: Serializer>(
    error: &Option<LookupError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match error {
        Some(err) => serializer.serialize_str(&err.to_string()),
        None => serializer.serialize_none(),
    }
}

fn serialize_millis<S: Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(elapsed.as_millis() as u64)
}

/// Configuration for a lookup run.
#[derive(Debug, Clone)]
pub struct LookupConfig {
    /// Number of concurrent workers. Zero is coerced to one by the pool.
    pub parallelism: usize,

    /// Deadline for a single round-trip; `None` waits indefinitely
    pub timeout: Option<Duration>,

    /// Server used when the TLD is not in the registry; `None` makes unknown TLDs fail
    pub default_server: Option<String>,

    /// Ask IANA for the authoritative server of TLDs missing from the registry.
    /// On by default; answers, including denials, are cached for the process.
    pub discover_servers: bool,

    /// Server asked for TLD referrals
    pub referral_server: String,

    /// TLD -> server overrides, consulted before the built-in table
    pub server_overrides: HashMap<String, String>,

    /// Extra "no match" phrases applied to every response
    pub extra_patterns: Vec<String>,

    /// Registry-specific "no match" phrases keyed by TLD
    pub tld_patterns: HashMap<String, Vec<String>>,

    /// Capacity of the result channel; `None` uses the parallelism
    pub channel_capacity: Option<usize>,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            parallelism: DEFAULT_PARALLELISM,
            timeout: Some(DEFAULT_TIMEOUT),
            default_server: Some(DEFAULT_WHOIS_SERVER.to_string()),
            discover_servers: true,
            referral_server: DEFAULT_WHOIS_SERVER.to_string(),
            server_overrides: HashMap::new(),
            extra_patterns: Vec::new(),
            tld_patterns: HashMap::new(),
            channel_capacity: None,
        }
    }
}

impl LookupConfig {
    /// Set the worker count. Zero is raised to one; values above the cap are clamped.
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.clamp(1, MAX_PARALLELISM);
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_default_server(mut self, server: Option<String>) -> Self {
        self.default_server = server;
        self
    }

    pub fn with_discovery(mut self, enabled: bool) -> Self {
        self.discover_servers = enabled;
        self
    }

    pub fn with_referral_server<S: Into<String>>(mut self, server: S) -> Self {
        self.referral_server = server.into();
        self
    }

    /// Point a TLD at a specific server (`host` or `host:port`).
    pub fn with_server<T: Into<String>, S: Into<String>>(mut self, tld: T, server: S) -> Self {
        self.server_overrides
            .insert(tld.into().to_lowercase(), server.into());
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = Some(capacity.max(1));
        self
    }

    /// Effective worker count, never zero.
    pub fn effective_parallelism(&self) -> usize {
        self.parallelism.max(1)
    }
}
