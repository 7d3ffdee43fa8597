//! Validation helpers for names sent to the hypervisor.

use regex::Regex;
use std::sync::OnceLock;

fn dns_label() -> &'static Regex {
    static DNS_LABEL: OnceLock<Regex> = OnceLock::new();
    DNS_LABEL.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?$").unwrap_or_else(|_| unreachable!())
    })
}

/// Returns true if `name` is a valid DNS label (letters, digits and inner
/// hyphens, at most 63 characters).
#[must_use]
pub fn is_dns_label(name: &str) -> bool {
    dns_label().is_match(name)
}
