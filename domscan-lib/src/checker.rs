//! Main availability checker.
//!
//! `WhoisChecker` ties together the protocol client, the classifier and the
//! worker pool behind one configured entry point.

use crate::classifier::Classifier;
use crate::pool::{spawn_pool, LookupStream};
use crate::protocols::{ServerResolver, WhoisClient, WhoisQuery};
use crate::types::{LookupConfig, LookupRecord, LookupRequest, DEFAULT_TIMEOUT};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Checks domain availability over WHOIS.
///
/// # Example
///
/// ```rust,no_run
/// use domscan_lib::WhoisChecker;
/// use futures::StreamExt;
///
/// #[tokio::main]
/// async fn main() {
///     let checker = WhoisChecker::new();
///     let names = vec!["example.com".to_string(), "example.org".to_string()];
///
///     let mut stream = checker.lookup_multiple(None, names, 2);
///     while let Some(record) = stream.next().await {
///         match &record.error {
///             Some(e) => println!("{}: error ({})", record.name, e),
///             None => println!("{}: available={}", record.name, record.available),
///         }
///     }
/// }
/// ```
#[derive(Clone)]
pub struct WhoisChecker {
    config: LookupConfig,
    client: Arc<dyn WhoisQuery>,
    classifier: Arc<Classifier>,
}

impl WhoisChecker {
    /// Create a checker with the default configuration.
    pub fn new() -> Self {
        Self::with_config(LookupConfig::default())
    }

    /// Create a checker whose TCP client and classifier follow `config`.
    pub fn with_config(config: LookupConfig) -> Self {
        let client = build_client(&config);
        let classifier = Classifier::from_patterns(&config.extra_patterns, &config.tld_patterns);

        Self {
            config,
            client: Arc::new(client),
            classifier: Arc::new(classifier),
        }
    }

    /// Use a custom protocol client, e.g. a different transport or a test stub.
    pub fn with_client<C>(mut self, client: C) -> Self
    where
        C: WhoisQuery + 'static,
    {
        self.client = Arc::new(client);
        self
    }

    /// Replace the classifier.
    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }

    /// Look up a single domain and classify the response.
    pub async fn check_domain(&self, name: &str) -> LookupRecord {
        let start = Instant::now();
        let outcome = self.client.query(name).await;
        let elapsed = start.elapsed();

        match outcome {
            Ok(response) => {
                let available = self.classifier.classify(name, &response);
                LookupRecord::success(name.to_string(), response, available, elapsed)
            }
            Err(error) => LookupRecord::failure(name.to_string(), error, elapsed),
        }
    }

    /// Look up many domains with `parallelism` concurrent workers.
    ///
    /// Records arrive in completion order; exactly one per input name, duplicates
    /// included. Cancelling `cancel` aborts outstanding round-trips and the
    /// remaining records carry a cancellation error.
    pub fn lookup_multiple<I, S>(
        &self,
        cancel: Option<CancellationToken>,
        names: I,
        parallelism: usize,
    ) -> LookupStream
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let requests: Vec<LookupRequest> = names
            .into_iter()
            .map(LookupRequest::new)
            .collect();

        spawn_pool(
            Arc::clone(&self.client),
            Arc::clone(&self.classifier),
            cancel,
            requests,
            parallelism,
            self.config.channel_capacity,
        )
    }

    /// Stream lookups using the configured parallelism.
    pub fn check_domains_stream<I, S>(&self, names: I) -> LookupStream
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lookup_multiple(None, names, self.config.effective_parallelism())
    }

    /// Look up many domains and collect every record.
    ///
    /// Results are in completion order, not input order.
    pub async fn check_domains(&self, names: &[String]) -> Vec<LookupRecord> {
        self.check_domains_stream(names.iter().cloned())
            .collect()
            .await
    }

    pub fn config(&self) -> &LookupConfig {
        &self.config
    }

    /// Replace the configuration, rebuilding the TCP client and the classifier.
    pub fn set_config(&mut self, config: LookupConfig) {
        self.client = Arc::new(build_client(&config));
        self.classifier = Arc::new(Classifier::from_patterns(
            &config.extra_patterns,
            &config.tld_patterns,
        ));
        self.config = config;
    }
}

impl Default for WhoisChecker {
    fn default() -> Self {
        Self::new()
    }
}

fn build_client(config: &LookupConfig) -> WhoisClient {
    let resolver = ServerResolver::new(
        config.server_overrides.clone(),
        config.default_server.clone(),
        config.discover_servers,
    )
    .with_referral_server(config.referral_server.clone())
    .with_discovery_timeout(config.timeout.unwrap_or(DEFAULT_TIMEOUT));
    WhoisClient::with_resolver(resolver).with_timeout(config.timeout)
}

/// Look up `names` with a default-configured checker.
///
/// Convenience wrapper over [`WhoisChecker::lookup_multiple`].
pub fn lookup_multiple<I, S>(
    cancel: Option<CancellationToken>,
    names: I,
    parallelism: usize,
) -> LookupStream
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    WhoisChecker::new().lookup_multiple(cancel, names, parallelism)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LookupError;
    use async_trait::async_trait;
    use std::time::Duration;

    struct FixedClient;

    #[async_trait]
    impl WhoisQuery for FixedClient {
        async fn query(&self, name: &str) -> Result<String, LookupError> {
            match name {
                "example.com" => Ok("No match for \"EXAMPLE.COM\".".to_string()),
                "bad-server.invalid" => Err(LookupError::connection(
                    "whois.invalid",
                    "connection refused",
                )),
                _ => Ok("Domain Name: TAKEN\nRegistrar: Someone\n".to_string()),
            }
        }
    }

    #[tokio::test]
    async fn test_check_domain_success_and_failure() {
        let checker = WhoisChecker::new().with_client(FixedClient);

        let record = checker.check_domain("example.com").await;
        assert!(record.error.is_none());
        assert!(record.available);

        let record = checker.check_domain("bad-server.invalid").await;
        assert!(record.error.is_some());
        assert!(record.response.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_example_pair_end_to_end() {
        let checker = WhoisChecker::new().with_client(FixedClient);
        let records: Vec<LookupRecord> = checker
            .lookup_multiple(None, ["example.com", "example.org"], 2)
            .collect()
            .await;

        assert_eq!(records.len(), 2);
        let available: Vec<bool> = {
            let mut sorted = records.clone();
            sorted.sort_by(|a, b| a.name.cmp(&b.name));
            sorted.iter().map(|r| r.available).collect()
        };
        assert_eq!(available, vec![true, false]);
        assert!(records.iter().all(|r| r.error.is_none()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_check_domains_uses_config_parallelism() {
        let config = LookupConfig::default()
            .with_parallelism(3)
            .with_timeout(Some(Duration::from_secs(1)));
        let checker = WhoisChecker::with_config(config).with_client(FixedClient);

        let names: Vec<String> = vec!["a.com".into(), "b.com".into(), "example.com".into()];
        let records = checker.check_domains(&names).await;
        assert_eq!(records.len(), 3);
        assert_eq!(checker.config().parallelism, 3);
    }

    #[test]
    fn test_set_config_rebuilds() {
        let mut checker = WhoisChecker::new();
        let config = LookupConfig::default()
            .with_parallelism(8)
            .with_default_server(None);
        checker.set_config(config);
        assert_eq!(checker.config().parallelism, 8);
        assert!(checker.config().default_server.is_none());
    }
}
