//! Small shared helpers: timestamps, identifiers, escaping and validation.

mod escape;
pub mod timestamps;
mod uuid_utils;
mod validation;

pub use escape::path_escape;
pub use timestamps::{format_seconds, iso_timestamp, now_utc, Timestamp};
pub use uuid_utils::generate_uuid;
pub use validation::is_dns_label;
