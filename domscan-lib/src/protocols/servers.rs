//! WHOIS server registry.
//!
//! Maps TLDs to the registry WHOIS server that answers for them. Lookups consult
//! configured overrides first, then the built-in table, then servers discovered
//! through IANA referrals, and finally the configured default server.

use crate::error::LookupError;
use crate::protocols::whois::discover_whois_server;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

lazy_static::lazy_static! {
    static ref WHOIS_SERVERS: HashMap<&'static str, &'static str> = HashMap::from([
        // Generic TLDs
        ("com", "whois.verisign-grs.com"),
        ("net", "whois.verisign-grs.com"),
        ("org", "whois.pir.org"),
        ("info", "whois.nic.info"),
        ("biz", "whois.nic.biz"),
        ("name", "whois.nic.name"),
        ("mobi", "whois.nic.mobi"),
        ("pro", "whois.nic.pro"),
        ("aero", "whois.aero"),
        ("asia", "whois.nic.asia"),
        ("coop", "whois.nic.coop"),
        ("edu", "whois.educause.edu"),
        ("gov", "whois.dotgov.gov"),
        ("int", "whois.iana.org"),
        ("jobs", "whois.nic.jobs"),
        ("museum", "whois.nic.museum"),
        ("tel", "whois.nic.tel"),
        ("travel", "whois.nic.travel"),
        // Google registry
        ("app", "whois.nic.google"),
        ("dev", "whois.nic.google"),
        ("page", "whois.nic.google"),
        // Popular new gTLDs
        ("xyz", "whois.nic.xyz"),
        ("online", "whois.nic.online"),
        ("site", "whois.nic.site"),
        ("tech", "whois.nic.tech"),
        ("store", "whois.nic.store"),
        ("shop", "whois.nic.shop"),
        ("blog", "whois.nic.blog"),
        ("cloud", "whois.nic.cloud"),
        ("club", "whois.nic.club"),
        ("live", "whois.nic.live"),
        ("digital", "whois.nic.digital"),
        ("email", "whois.nic.email"),
        ("network", "whois.nic.network"),
        ("software", "whois.nic.software"),
        ("studio", "whois.nic.studio"),
        ("design", "whois.nic.design"),
        // Country code TLDs
        ("io", "whois.nic.io"),
        ("ai", "whois.nic.ai"),
        ("co", "whois.nic.co"),
        ("me", "whois.nic.me"),
        ("tv", "whois.nic.tv"),
        ("cc", "ccwhois.verisign-grs.com"),
        ("us", "whois.nic.us"),
        ("uk", "whois.nic.uk"),
        ("de", "whois.denic.de"),
        ("fr", "whois.nic.fr"),
        ("nl", "whois.domain-registry.nl"),
        ("be", "whois.dns.be"),
        ("eu", "whois.eu"),
        ("it", "whois.nic.it"),
        ("es", "whois.nic.es"),
        ("ch", "whois.nic.ch"),
        ("at", "whois.nic.at"),
        ("se", "whois.iis.se"),
        ("nu", "whois.iis.nu"),
        ("dk", "whois.punktum.dk"),
        ("no", "whois.norid.no"),
        ("fi", "whois.fi"),
        ("pl", "whois.dns.pl"),
        ("ca", "whois.cira.ca"),
        ("au", "whois.auda.org.au"),
        ("nz", "whois.irs.net.nz"),
        ("jp", "whois.jprs.jp"),
        ("kr", "whois.kr"),
        ("cn", "whois.cnnic.cn"),
        ("in", "whois.registry.in"),
        ("br", "whois.registro.br"),
        ("ru", "whois.tcinet.ru"),
        ("gg", "whois.gg"),
        ("ly", "whois.nic.ly"),
    ]);

    // TLD -> server learned from referrals during this process. `None` marks a
    // TLD the referral server does not know.
    static ref DISCOVERED_SERVERS: Mutex<HashMap<String, Option<String>>> = Mutex::new(HashMap::new());
}

/// IANA root WHOIS server, authoritative for TLD referrals.
pub const IANA_WHOIS_SERVER: &str = "whois.iana.org";

/// Extract the TLD used to pick a WHOIS server.
///
/// The last label is returned lowercased. A trailing root dot is ignored and an
/// unqualified name is its own TLD.
pub fn extract_tld(name: &str) -> String {
    let trimmed = name.trim().trim_end_matches('.');
    trimmed
        .rsplit('.')
        .next()
        .unwrap_or(trimmed)
        .to_lowercase()
}

/// Look up the built-in WHOIS server for a TLD.
pub fn get_whois_server(tld: &str) -> Option<&'static str> {
    WHOIS_SERVERS.get(tld.to_lowercase().as_str()).copied()
}

/// All TLDs with a known WHOIS server, built-in and discovered, sorted.
pub fn get_all_known_tlds() -> Vec<String> {
    let mut tlds: Vec<String> = WHOIS_SERVERS.keys().map(|k| k.to_string()).collect();

    if let Ok(cache) = DISCOVERED_SERVERS.lock() {
        for (tld, server) in cache.iter() {
            if server.is_some() && !tlds.contains(tld) {
                tlds.push(tld.clone());
            }
        }
    }

    tlds.sort();
    tlds
}

fn cached_server(tld: &str) -> Option<String> {
    DISCOVERED_SERVERS
        .lock()
        .ok()
        .and_then(|cache| cache.get(tld).cloned().flatten())
}

fn is_unknown_tld(tld: &str) -> bool {
    DISCOVERED_SERVERS
        .lock()
        .map(|cache| matches!(cache.get(tld), Some(None)))
        .unwrap_or(false)
}

/// Record the outcome of a referral for `tld`; `None` caches "no server".
pub(crate) fn remember_server(tld: &str, server: Option<&str>) {
    if let Ok(mut cache) = DISCOVERED_SERVERS.lock() {
        cache.insert(tld.to_string(), server.map(str::to_string));
    }
}

/// Picks the WHOIS server for a domain name.
#[derive(Debug, Clone)]
pub struct ServerResolver {
    overrides: HashMap<String, String>,
    default_server: Option<String>,
    discover: bool,
    referral_server: String,
    discovery_timeout: Duration,
}

impl ServerResolver {
    pub fn new(
        overrides: HashMap<String, String>,
        default_server: Option<String>,
        discover: bool,
    ) -> Self {
        let overrides = overrides
            .into_iter()
            .map(|(tld, server)| (tld.to_lowercase(), server))
            .collect();

        Self {
            overrides,
            default_server,
            discover,
            referral_server: IANA_WHOIS_SERVER.to_string(),
            discovery_timeout: crate::types::DEFAULT_TIMEOUT,
        }
    }

    /// Ask `server` instead of IANA for TLD referrals.
    pub fn with_referral_server<S: Into<String>>(mut self, server: S) -> Self {
        self.referral_server = server.into();
        self
    }

    pub fn with_discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }

    /// Whether `server` is the fallback used for TLDs without a known server.
    pub(crate) fn is_default_server(&self, server: &str) -> bool {
        self.default_server
            .as_deref()
            .is_some_and(|default| default.eq_ignore_ascii_case(server))
    }

    pub(crate) fn default_is_referral_server(&self) -> bool {
        self.is_default_server(&self.referral_server)
    }

    /// Resolve without network access: overrides, built-in table, discovered cache,
    /// then the default server.
    pub fn resolve_static(&self, name: &str) -> Result<String, LookupError> {
        let tld = extract_tld(name);
        if let Some(server) = self.lookup_known(&tld) {
            return Ok(server);
        }
        self.fallback(tld)
    }

    /// Resolve the server for `name`, asking the referral server about unknown
    /// TLDs when discovery is enabled.
    pub async fn resolve(&self, name: &str) -> Result<String, LookupError> {
        let tld = extract_tld(name);

        if let Some(server) = self.lookup_known(&tld) {
            return Ok(server);
        }

        if self.discover && cfg!(feature = "discovery") && !is_unknown_tld(&tld) {
            match discover_whois_server(&self.referral_server, &tld, self.discovery_timeout).await
            {
                Ok(Some(server)) => {
                    debug!(tld = %tld, server = %server, "Discovered WHOIS server via referral");
                    remember_server(&tld, Some(&server));
                    return Ok(server);
                }
                Ok(None) => {
                    debug!(tld = %tld, "Referral server knows no WHOIS server for TLD");
                    remember_server(&tld, None);
                }
                // Transient failures are not cached
                Err(e) => debug!(tld = %tld, error = %e, "WHOIS server discovery failed"),
            }
        }

        self.fallback(tld)
    }

    fn lookup_known(&self, tld: &str) -> Option<String> {
        self.overrides
            .get(tld)
            .cloned()
            .or_else(|| get_whois_server(tld).map(str::to_string))
            .or_else(|| cached_server(tld))
    }

    fn fallback(&self, tld: String) -> Result<String, LookupError> {
        // A TLD the referral server denied has no server there
        if is_unknown_tld(&tld) && self.default_is_referral_server() {
            return Err(LookupError::server_not_found(tld));
        }

        self.default_server
            .clone()
            .ok_or(LookupError::server_not_found(tld))
    }
}

impl Default for ServerResolver {
    fn default() -> Self {
        Self::new(
            HashMap::new(),
            Some(crate::types::DEFAULT_WHOIS_SERVER.to_string()),
            true,
        )
    }
}
