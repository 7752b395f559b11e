//! # domscan Library
//!
//! Concurrent WHOIS lookups with a best-effort availability verdict per domain.
//!
//! Names are fanned out to a fixed number of workers; each worker performs a
//! raw WHOIS exchange over TCP port 43 and classifies the response text.
//! Records stream back in completion order, exactly one per requested name.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use domscan_lib::{lookup_multiple, CancellationToken};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() {
//!     let cancel = CancellationToken::new();
//!     let mut records = lookup_multiple(Some(cancel), ["example.com", "example.org"], 2);
//!
//!     while let Some(record) = records.next().await {
//!         println!("{}: available={}", record.name, record.available);
//!     }
//! }
//! ```
//!
//! ## Features
//!
//! - **Worker pool**: bounded parallelism with backpressure on the result stream
//! - **Cancellation**: a shared token aborts outstanding round-trips
//! - **Per-request deadline**: a hung server cannot stall a worker forever
//! - **Pluggable matchers**: registry-specific "no match" phrases per TLD
//! - **Server discovery**: IANA referral for unknown TLDs, cached per process

pub use checker::{lookup_multiple, WhoisChecker};
pub use classifier::{AvailabilityMatcher, Classifier, PatternMatcher, GENERIC_NO_MATCH_PATTERNS};
pub use config::{
    apply_env_config, apply_file_config, load_env_config, parse_timeout_string, ConfigManager,
    DefaultsConfig, EnvConfig, FileConfig, PatternsConfig,
};
pub use error::LookupError;
pub use pool::LookupStream;
pub use protocols::{
    discover_whois_server, extract_tld, get_all_known_tlds, get_whois_server, ServerResolver,
    WhoisClient, WhoisQuery,
};
pub use types::{
    LookupConfig, LookupRecord, LookupRequest, DEFAULT_PARALLELISM, DEFAULT_TIMEOUT,
    DEFAULT_WHOIS_SERVER, MAX_PARALLELISM,
};

/// Cancellation handle accepted by [`lookup_multiple`].
pub use tokio_util::sync::CancellationToken;

mod checker;
mod classifier;
mod config;
mod error;
mod pool;
mod protocols;
mod types;

pub type Result<T> = std::result::Result<T, LookupError>;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const AUTHOR: &str = env!("CARGO_PKG_AUTHORS");

/// Get library information for debugging or display purposes.
pub fn info() -> LibraryInfo {
    LibraryInfo {
        version: VERSION,
        author: AUTHOR,
        features: get_enabled_features(),
    }
}

/// Information about the library build and features
#[derive(Debug, Clone)]
pub struct LibraryInfo {
    pub version: &'static str,
    pub author: &'static str,
    pub features: Vec<&'static str>,
}

#[allow(clippy::vec_init_then_push)]
fn get_enabled_features() -> Vec<&'static str> {
    let mut features = Vec::new();

    #[cfg(feature = "discovery")]
    features.push("discovery");

    features
}
