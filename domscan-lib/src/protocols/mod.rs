//! WHOIS protocol plumbing.
//!
//! This module contains the TCP client for the WHOIS protocol and the
//! registry that maps TLDs to the servers answering for them.

/// WHOIS protocol client and referral discovery
pub mod whois;

/// TLD to WHOIS server mappings
pub mod servers;

pub use servers::{extract_tld, get_all_known_tlds, get_whois_server, ServerResolver};
pub use whois::{discover_whois_server, WhoisClient, WhoisQuery};
