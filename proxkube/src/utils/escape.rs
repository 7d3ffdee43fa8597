//! Percent-encoding for values embedded in hypervisor API parameters.

/// Percent-encodes `value` so it survives as a single form parameter.
///
/// Only unreserved characters are kept; spaces, `+`, `/`, `=`, `@` and line
/// breaks of an SSH public key are all encoded.
#[must_use]
pub fn path_escape(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}
