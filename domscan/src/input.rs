//! Domain name collection from command arguments or piped text.

use lazy_static::lazy_static;
use regex::Regex;
use std::io::{self, IsTerminal, Read};

lazy_static! {
    static ref SEPARATORS: Regex = Regex::new(r"[\s,;]+").unwrap();
    static ref SCHEME: Regex = Regex::new(r"^[a-z][a-z0-9+.\-]*://").unwrap();
    static ref DOMAIN_NAME: Regex =
        Regex::new(r"^(?:[a-z0-9](?:[a-z0-9\-]{0,61}[a-z0-9])?\.)+[a-z0-9](?:[a-z0-9\-]{0,61}[a-z0-9])?$")
            .unwrap();
}

/// Extract domain names from free text.
///
/// Names may be separated by whitespace, commas or semicolons. URLs are reduced
/// to their host. Tokens that are not dotted host names are dropped. Output is
/// lowercased and keeps input order, duplicates included.
pub fn grab_domain_names(text: &str) -> Vec<String> {
    SEPARATORS
        .split(text)
        .filter_map(normalize_token)
        .collect()
}

fn normalize_token(token: &str) -> Option<String> {
    let token = token.trim().to_lowercase();
    let token = SCHEME.replace(&token, "");

    // Drop path, query and fragment
    let host = token.split(['/', '?', '#']).next()?;
    // Drop userinfo and port
    let host = host.rsplit('@').next()?;
    let host = host.split(':').next()?;
    let host = host.trim_matches(|c: char| c == '.' || c == '"' || c == '\'' || c == '(' || c == ')');

    if host.len() > 253 || !DOMAIN_NAME.is_match(host) {
        return None;
    }
    Some(host.to_string())
}

/// Read all of stdin when it is piped. Returns `None` for a terminal or a read error.
pub fn read_piped_stdin() -> Option<String> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return None;
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer).ok()?;
    Some(buffer)
}

/// Collect names to check.
///
/// Non-empty piped input wins over positional arguments.
pub fn collect_names(args: &[String], stdin: Option<String>) -> Vec<String> {
    match stdin {
        Some(text) if !text.trim().is_empty() => grab_domain_names(&text),
        _ => args.iter().flat_map(|arg| grab_domain_names(arg)).collect(),
    }
}
