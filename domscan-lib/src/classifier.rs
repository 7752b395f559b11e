//! Availability classification of raw WHOIS responses.
//!
//! WHOIS answers are free text and every registry phrases "this domain is not
//! registered" differently. Classification is a best-effort scan for known
//! "no match" phrases: a hit means available, anything else means registered.
//! Registry-specific matchers can be plugged in per TLD; the generic phrase set
//! is always consulted as a fallback.

use crate::protocols::servers::extract_tld;
use std::collections::HashMap;
use std::sync::Arc;

/// Phrases that registries use to say a domain has no registration.
pub const GENERIC_NO_MATCH_PATTERNS: &[&str] = &[
    "no match for",
    "no match",
    "not found",
    "no data found",
    "no entries found",
    "no matching record",
    "no matching entry",
    "domain not found",
    "domain name not found",
    "status: available",
    "status: free",
    "status:\tfree",
    "no object found",
    "object does not exist",
    "the queried object does not exist",
    "this domain name has not been registered",
    "is available for registration",
    "not registered",
];

/// Decides whether a raw WHOIS response describes an unregistered domain.
pub trait AvailabilityMatcher: Send + Sync {
    fn is_available(&self, response: &str) -> bool;
}

/// Case-insensitive substring matcher over a fixed phrase list.
#[derive(Debug, Clone, Default)]
pub struct PatternMatcher {
    patterns: Vec<String>,
}

impl PatternMatcher {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| p.as_ref().trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        Self { patterns }
    }

    /// The built-in vocabulary shared by most registries.
    pub fn generic() -> Self {
        Self::new(GENERIC_NO_MATCH_PATTERNS)
    }

    pub fn extend<I, S>(&mut self, patterns: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for pattern in patterns {
            let pattern = pattern.as_ref().trim().to_lowercase();
            if !pattern.is_empty() && !self.patterns.contains(&pattern) {
                self.patterns.push(pattern);
            }
        }
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

impl AvailabilityMatcher for PatternMatcher {
    fn is_available(&self, response: &str) -> bool {
        let lower = response.to_lowercase();
        self.patterns.iter().any(|p| lower.contains(p.as_str()))
    }
}

/// Classifier combining per-TLD matchers with the generic phrase set.
#[derive(Clone)]
pub struct Classifier {
    generic: PatternMatcher,
    by_tld: HashMap<String, Arc<dyn AvailabilityMatcher>>,
}

impl Classifier {
    /// Classifier with only the generic vocabulary.
    pub fn new() -> Self {
        Self {
            generic: PatternMatcher::generic(),
            by_tld: HashMap::new(),
        }
    }

    /// Build a classifier from configured phrases.
    pub fn from_patterns(extra: &[String], tld_patterns: &HashMap<String, Vec<String>>) -> Self {
        let mut classifier = Self::new();
        classifier.generic.extend(extra);
        for (tld, patterns) in tld_patterns {
            classifier = classifier.with_matcher(tld, PatternMatcher::new(patterns));
        }
        classifier
    }

    /// Register a matcher for a TLD. It is consulted before the generic phrases.
    pub fn with_matcher<M>(mut self, tld: &str, matcher: M) -> Self
    where
        M: AvailabilityMatcher + 'static,
    {
        self.by_tld
            .insert(tld.trim_start_matches('.').to_lowercase(), Arc::new(matcher));
        self
    }

    /// Decide availability of `name` from its raw response.
    ///
    /// Never fails. Unrecognised responses, including empty ones, are
    /// classified as unavailable.
    pub fn classify(&self, name: &str, response: &str) -> bool {
        if let Some(matcher) = self.by_tld.get(&extract_tld(name)) {
            if matcher.is_available(response) {
                return true;
            }
        }
        self.generic.is_available(response)
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Classifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut tlds: Vec<&String> = self.by_tld.keys().collect();
        tlds.sort();
        f.debug_struct("Classifier")
            .field("generic", &self.generic)
            .field("tlds", &tlds)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERISIGN_NO_MATCH: &str = "No match for \"DOMAIN.COM\".\r\n>>> Last update of whois database: 2024-05-01T10:00:00Z <<<\r\n";

    const VERISIGN_REGISTERED: &str = "   Domain Name: GOOGLE.COM\r\n\
   Registry Domain ID: 2138514_DOMAIN_COM-VRSN\r\n\
   Registrar WHOIS Server: whois.markmonitor.com\r\n\
   Registrar: MarkMonitor Inc.\r\n\
   Creation Date: 1997-09-15T04:00:00Z\r\n\
   Registrant Organization: Google LLC\r\n\
   Name Server: NS1.GOOGLE.COM\r\n";

    #[test]
    fn test_no_match_is_available() {
        let classifier = Classifier::new();
        assert!(classifier.classify("domain.com", VERISIGN_NO_MATCH));
    }

    #[test]
    fn test_registered_record_is_unavailable() {
        let classifier = Classifier::new();
        assert!(!classifier.classify("google.com", VERISIGN_REGISTERED));
    }

    #[test]
    fn test_case_insensitive() {
        let classifier = Classifier::new();
        assert!(classifier.classify("example.org", "NOT FOUND"));
        assert!(classifier.classify("example.net", "no data found"));
        assert!(classifier.classify("example.de", "Status: free"));
    }

    #[test]
    fn test_unrecognised_and_empty_default_to_unavailable() {
        let classifier = Classifier::new();
        assert!(!classifier.classify("example.com", ""));
        assert!(!classifier.classify("example.com", "Server busy, come back later"));
    }

    #[test]
    fn test_tld_matcher_takes_priority_and_falls_back() {
        let classifier = Classifier::new()
            .with_matcher(".xx", PatternMatcher::new(["nothing registered here"]));

        assert!(classifier.classify("example.xx", "NOTHING REGISTERED HERE"));
        // Generic phrases still apply to the same TLD
        assert!(classifier.classify("example.xx", "No match for example.xx"));
        // The TLD matcher does not leak into other TLDs
        assert!(!classifier.classify("example.com", "nothing registered here"));
    }

    #[test]
    fn test_from_patterns() {
        let extra = vec!["Available for purchase".to_string()];
        let tld_patterns =
            HashMap::from([("yy".to_string(), vec!["libre".to_string()])]);
        let classifier = Classifier::from_patterns(&extra, &tld_patterns);

        assert!(classifier.classify("example.com", "This name is AVAILABLE FOR PURCHASE"));
        assert!(classifier.classify("example.yy", "estado: libre"));
        assert!(!classifier.classify("example.com", "estado: libre"));
    }

    #[test]
    fn test_pattern_matcher_ignores_blank_and_duplicate_phrases() {
        let mut matcher = PatternMatcher::new(["", "  ", "No Match"]);
        matcher.extend(["no match", "gone"]);
        assert_eq!(matcher.patterns(), &["no match".to_string(), "gone".to_string()]);
    }

    #[test]
    fn test_custom_matcher_trait_object() {
        struct EmptyMeansFree;
        impl AvailabilityMatcher for EmptyMeansFree {
            fn is_available(&self, response: &str) -> bool {
                response.trim().is_empty()
            }
        }

        let classifier = Classifier::new().with_matcher("zz", EmptyMeansFree);
        assert!(classifier.classify("example.zz", "   "));
        assert!(!classifier.classify("example.com", "   "));
    }
}
