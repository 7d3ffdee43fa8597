//! Identifier generation.

use uuid::Uuid;

/// Generates a new random correlation id.
#[must_use]
pub fn generate_uuid() -> Uuid {
    Uuid::new_v4()
}
