//! Base domain (eTLD+1) resolution.
//!
//! Hosts are reduced to their registrable domain with the public suffix
//! list, so `mail.example.co.uk` and `www.example.co.uk` share one key.
//! Resolution never fails: anything the suffix list cannot place (IP
//! literals, bare suffixes, single labels like `localhost`) comes back as
//! the raw host.

use std::net::IpAddr;

use tracing::trace;

/// Return the registrable base domain of `host`, or `host` unchanged when it
/// has none.
///
/// ```
/// use blushproof::domain::base_domain;
///
/// assert_eq!(base_domain("mail.example.co.uk"), "example.co.uk");
/// assert_eq!(base_domain("localhost"), "localhost");
/// ```
#[must_use]
pub fn base_domain(host: &str) -> String {
    match resolve(host) {
        Some(domain) => domain,
        None => {
            trace!(host, "no base domain, using host as-is");
            host.to_string()
        }
    }
}

fn resolve(host: &str) -> Option<String> {
    let trimmed = host.trim().trim_end_matches('.');
    if trimmed.is_empty() || is_ip_literal(trimmed) {
        return None;
    }

    let lowered = trimmed.to_ascii_lowercase();
    psl::domain_str(&lowered).map(str::to_string)
}

fn is_ip_literal(host: &str) -> bool {
    let unbracketed = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    unbracketed.parse::<IpAddr>().is_ok()
}
