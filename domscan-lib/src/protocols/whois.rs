//! WHOIS protocol client.
//!
//! A WHOIS round-trip is plain text over TCP port 43: the client sends the
//! query followed by CRLF and the server answers until it closes the connection.

use crate::error::LookupError;
use crate::protocols::servers::{extract_tld, remember_server, ServerResolver};
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, instrument};

/// Well-known WHOIS port.
pub const WHOIS_PORT: u16 = 43;

/// Responses larger than this are rejected.
pub const MAX_RESPONSE_SIZE: usize = 1024 * 1024;

/// A single WHOIS round-trip for one domain name.
///
/// The worker pool only depends on this trait, so any transport (or a test stub)
/// can stand in for the TCP client.
#[async_trait]
pub trait WhoisQuery: Send + Sync {
    /// Return the raw response text for `name`, or the reason the lookup failed.
    async fn query(&self, name: &str) -> Result<String, LookupError>;
}

/// WHOIS client talking to registry servers directly over TCP.
#[derive(Debug, Clone)]
pub struct WhoisClient {
    resolver: ServerResolver,
    /// Deadline for one full round-trip, `None` waits forever
    timeout: Option<Duration>,
}

impl WhoisClient {
    /// Create a client with the built-in server table and the default timeout.
    pub fn new() -> Self {
        Self {
            resolver: ServerResolver::default(),
            timeout: Some(crate::types::DEFAULT_TIMEOUT),
        }
    }

    pub fn with_resolver(resolver: ServerResolver) -> Self {
        Self {
            resolver,
            timeout: Some(crate::types::DEFAULT_TIMEOUT),
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolve the server and query it. An answer from the default server that
    /// refers elsewhere is followed once.
    async fn lookup(&self, name: &str) -> Result<String, LookupError> {
        let server = self.resolver.resolve(name).await?;
        debug!(server = %server, "Querying WHOIS server");

        let response = query_server(&server, name).await?;
        if !self.resolver.is_default_server(&server) {
            return Ok(response);
        }

        let tld = extract_tld(name);
        match read_referral(&response) {
            ReferralAnswer::Server(next) if !next.eq_ignore_ascii_case(&server) => {
                debug!(tld = %tld, server = %next, "Following referral from default server");
                remember_server(&tld, Some(&next));
                query_server(&next, name).await
            }
            ReferralAnswer::UnknownTld if self.resolver.default_is_referral_server() => {
                remember_server(&tld, None);
                Err(LookupError::server_not_found(tld))
            }
            _ => Ok(response),
        }
    }
}

impl Default for WhoisClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WhoisQuery for WhoisClient {
    #[instrument(skip(self), fields(domain = %name))]
    async fn query(&self, name: &str) -> Result<String, LookupError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LookupError::invalid_domain(name, "Domain name cannot be empty"));
        }

        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.lookup(name))
                .await
                .map_err(|_| LookupError::timeout(format!("WHOIS lookup of {}", name), limit))?,
            None => self.lookup(name).await,
        }
    }
}

/// Split a `host[:port]` server string into host and port.
///
/// Bare hosts (and IPv6 literals without brackets) use the WHOIS port.
fn split_server_addr(server: &str) -> (&str, u16) {
    if let Some(inner) = server.strip_prefix('[') {
        if let Some((host, rest)) = inner.split_once(']') {
            let port = rest
                .strip_prefix(':')
                .and_then(|p| p.parse().ok())
                .unwrap_or(WHOIS_PORT);
            return (host, port);
        }
    }

    match server.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') => match port.parse() {
            Ok(port) => (host, port),
            Err(_) => (server, WHOIS_PORT),
        },
        _ => (server, WHOIS_PORT),
    }
}

/// Perform one raw WHOIS exchange with `server`.
///
/// The connection is owned by this call and dropped before it returns.
async fn query_server(server: &str, query: &str) -> Result<String, LookupError> {
    let (host, port) = split_server_addr(server);

    let mut stream = TcpStream::connect((host, port))
        .await
        .map_err(|e| LookupError::connection(server, format!("connect failed: {}", e)))?;

    stream
        .write_all(format!("{}\r\n", query).as_bytes())
        .await
        .map_err(|e| LookupError::connection(server, format!("failed to send query: {}", e)))?;

    let mut response = Vec::new();
    let mut buf = [0u8; 4096];

    loop {
        let n = stream
            .read(&mut buf)
            .await
            .map_err(|e| LookupError::connection(server, format!("read failed: {}", e)))?;
        if n == 0 {
            break;
        }
        response.extend_from_slice(&buf[..n]);
        if response.len() > MAX_RESPONSE_SIZE {
            return Err(LookupError::ResponseTooLarge {
                server: server.to_string(),
                limit: MAX_RESPONSE_SIZE,
            });
        }
    }

    debug!(server = %server, bytes = response.len(), "WHOIS response received");

    Ok(String::from_utf8_lossy(&response).into_owned())
}

/// What a referral server said about a TLD.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ReferralAnswer {
    /// Authoritative server named by a `refer:` (or `whois:`) line
    Server(String),
    /// The referral server has no record of the TLD
    UnknownTld,
    /// A record without a server
    Silent,
}

const UNKNOWN_TLD_MARKERS: &[&str] = &[
    "returned 0 objects",
    "no whois server is known",
    "invalid tld",
    "unknown tld",
    "tld not found",
    "no such tld",
];

/// Read the referral out of a WHOIS answer.
///
/// A `refer:` line wins over `whois:`, which IANA also uses for the same purpose.
pub(crate) fn read_referral(response: &str) -> ReferralAnswer {
    let mut whois_line = None;

    for line in response.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        match key.trim().to_ascii_lowercase().as_str() {
            "refer" => return ReferralAnswer::Server(value.to_string()),
            "whois" if whois_line.is_none() => whois_line = Some(value.to_string()),
            _ => {}
        }
    }

    if let Some(server) = whois_line {
        return ReferralAnswer::Server(server);
    }

    let lower = response.to_lowercase();
    if UNKNOWN_TLD_MARKERS.iter().any(|marker| lower.contains(marker)) {
        ReferralAnswer::UnknownTld
    } else {
        ReferralAnswer::Silent
    }
}

/// Ask `referral_server` which WHOIS server is authoritative for `tld`.
///
/// `Ok(None)` means the referral server answered without naming one.
pub async fn discover_whois_server(
    referral_server: &str,
    tld: &str,
    timeout: Duration,
) -> Result<Option<String>, LookupError> {
    let response = tokio::time::timeout(timeout, query_server(referral_server, tld))
        .await
        .map_err(|_| LookupError::timeout(format!("referral query to {}", referral_server), timeout))??;

    match read_referral(&response) {
        ReferralAnswer::Server(server) => Ok(Some(server)),
        ReferralAnswer::UnknownTld | ReferralAnswer::Silent => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tokio::io::AsyncBufReadExt;
    use tokio::net::TcpListener;

    /// Fake WHOIS server answering one connection. Returns its address and a handle
    /// yielding the query line it received.
    async fn spawn_fake_server(
        answer: impl Into<String>,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let answer = answer.into();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let handle = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut reader = tokio::io::BufReader::new(socket);
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            let mut socket = reader.into_inner();
            socket.write_all(answer.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            line
        });

        (addr, handle)
    }

    fn client_for(tld: &str, addr: &str) -> WhoisClient {
        let overrides = HashMap::from([(tld.to_string(), addr.to_string())]);
        WhoisClient::with_resolver(ServerResolver::new(overrides, None, false))
            .with_timeout(Some(Duration::from_secs(5)))
    }

    #[test]
    fn test_split_server_addr() {
        assert_eq!(split_server_addr("whois.pir.org"), ("whois.pir.org", 43));
        assert_eq!(split_server_addr("127.0.0.1:4343"), ("127.0.0.1", 4343));
        assert_eq!(split_server_addr("[::1]:4343"), ("::1", 4343));
        assert_eq!(split_server_addr("::1"), ("::1", 43));
    }

    #[test]
    fn test_read_referral() {
        let refer = "% IANA WHOIS server\n\nrefer:        whois.verisign-grs.com\n\ndomain:       COM\n";
        assert_eq!(
            read_referral(refer),
            ReferralAnswer::Server("whois.verisign-grs.com".to_string())
        );

        let whois_line = "whois:        whois.nic.example\n\ndomain:       EXAMPLE\n";
        assert_eq!(
            read_referral(whois_line),
            ReferralAnswer::Server("whois.nic.example".to_string())
        );

        let both = "whois:        whois.old-server.com\nrefer:        whois.correct-server.com\n";
        assert_eq!(
            read_referral(both),
            ReferralAnswer::Server("whois.correct-server.com".to_string())
        );

        // Registry fields that merely mention WHOIS are not referrals
        let registry = "Domain Name: EXAMPLE.COM\nRegistrar WHOIS Server: whois.example-registrar.com\n";
        assert_eq!(read_referral(registry), ReferralAnswer::Silent);

        let no_refer = "% IANA WHOIS server\ndomain: TEST\nstatus: ACTIVE\n";
        assert_eq!(read_referral(no_refer), ReferralAnswer::Silent);

        let unknown = "% IANA WHOIS server\n% for more information on IANA, visit http://www.iana.org\n% This query returned 0 objects.\n";
        assert_eq!(read_referral(unknown), ReferralAnswer::UnknownTld);
    }

    #[tokio::test]
    async fn test_discover_whois_server_reports_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let _server = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let err = discover_whois_server(&addr, "slowtld", Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, LookupError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_default_server_referral_is_followed() {
        let (registry, registry_seen) =
            spawn_fake_server("No match for \"SURELY-UNREGISTERED.REFTLD\".\r\n").await;
        let referral = format!(
            "% IANA WHOIS server\n\nrefer:        {}\n\ndomain:       REFTLD\nstatus:       ACTIVE\n",
            registry
        );
        let (default, default_seen) = spawn_fake_server(referral).await;

        let resolver = ServerResolver::new(HashMap::new(), Some(default.clone()), false)
            .with_referral_server(default);
        let client = WhoisClient::with_resolver(resolver).with_timeout(Some(Duration::from_secs(5)));

        let response = client.query("surely-unregistered.reftld").await.unwrap();
        assert!(response.starts_with("No match for"));
        assert_eq!(default_seen.await.unwrap(), "surely-unregistered.reftld\r\n");
        assert_eq!(registry_seen.await.unwrap(), "surely-unregistered.reftld\r\n");

        // The referral is remembered for the TLD
        let resolver = ServerResolver::new(HashMap::new(), None, false);
        assert_eq!(resolver.resolve_static("other.reftld").unwrap(), registry);
    }

    #[tokio::test]
    async fn test_unknown_tld_from_default_referral_server_is_not_found() {
        let (default, _seen) = spawn_fake_server(
            "% IANA WHOIS server\n% This query returned 0 objects.\n",
        )
        .await;

        let resolver = ServerResolver::new(HashMap::new(), Some(default.clone()), false)
            .with_referral_server(default.clone());
        let client = WhoisClient::with_resolver(resolver).with_timeout(Some(Duration::from_secs(5)));

        let err = client.query("surely-unregistered.nosuchtld").await.unwrap_err();
        assert_eq!(err, LookupError::server_not_found("nosuchtld"));

        // Cached: the fake only serves one connection, a second lookup must not dial it
        let resolver = ServerResolver::new(HashMap::new(), Some(default.clone()), false)
            .with_referral_server(default);
        let err = WhoisClient::with_resolver(resolver)
            .query("again.nosuchtld")
            .await
            .unwrap_err();
        assert_eq!(err, LookupError::server_not_found("nosuchtld"));
    }

    #[tokio::test]
    async fn test_answer_from_override_is_not_treated_as_referral() {
        let (addr, _seen) = spawn_fake_server("refer: whois.elsewhere.test\r\nDomain Name: X.OVRTLD\r\n").await;
        let client = client_for("ovrtld", &addr);

        let response = client.query("x.ovrtld").await.unwrap();
        assert!(response.contains("Domain Name: X.OVRTLD"));
    }

    #[tokio::test]
    async fn test_query_sends_crlf_terminated_line() {
        let (addr, server) = spawn_fake_server("No match for \"EXAMPLE.COM\".\r\n").await;
        let client = client_for("com", &addr);

        let response = client.query("example.com").await.unwrap();
        assert!(response.contains("No match for"));

        let received = server.await.unwrap();
        assert_eq!(received, "example.com\r\n");
    }

    #[tokio::test]
    async fn test_unqualified_name_passed_through() {
        let (addr, server) = spawn_fake_server("Domain Name: LOCALHOST\r\n").await;
        let client = client_for("localhost", &addr);

        let response = client.query("localhost").await.unwrap();
        assert!(response.contains("LOCALHOST"));
        assert_eq!(server.await.unwrap(), "localhost\r\n");
    }

    #[tokio::test]
    async fn test_connection_refused_is_lookup_failure() {
        // Bind then drop to get a port nothing listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let client = client_for("invalid", &addr);
        let err = client.query("bad-server.invalid").await.unwrap_err();
        assert!(matches!(err, LookupError::Connection { .. }));
        assert!(err.is_lookup_failure());
    }

    #[tokio::test]
    async fn test_unknown_tld_without_default_fails() {
        let client = WhoisClient::with_resolver(ServerResolver::new(HashMap::new(), None, false));
        let err = client.query("example.unknowntld").await.unwrap_err();
        assert_eq!(err, LookupError::server_not_found("unknowntld"));
    }

    #[tokio::test]
    async fn test_empty_name_rejected() {
        let err = WhoisClient::new().query("   ").await.unwrap_err();
        assert!(matches!(err, LookupError::InvalidDomain { .. }));
    }

    #[tokio::test]
    async fn test_hung_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let _server = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let client = client_for("com", &addr).with_timeout(Some(Duration::from_millis(100)));
        let err = client.query("example.com").await.unwrap_err();
        assert!(matches!(err, LookupError::Timeout { .. }));
    }

    #[tokio::test]
    #[ignore] // hits the network
    async fn test_live_lookup_verisign() {
        let response = WhoisClient::new().query("google.com").await.unwrap();
        assert!(response.to_lowercase().contains("registrar"));
    }
}
