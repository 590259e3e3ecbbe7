//! Small shared helpers: id generation, timestamps, slug codes.

use chrono::Utc;

/// Generate a fresh v4 UUID string for a new row.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Current UTC timestamp in RFC 3339, the storage format for all
/// `created_at`/`updated_at` columns.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

/// Convert a display name to a kebab-case code.
///
/// Example: "Managed Services" → "managed-services". Used for settings
/// reference data when the caller does not supply a code.
pub fn slugify(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("Managed Services"), "managed-services");
    }

    #[test]
    fn test_slugify_strips_punctuation() {
        assert_eq!(slugify("SaaS (Annual)"), "saas-annual");
    }

    #[test]
    fn test_new_id_is_unique() {
        assert_ne!(new_id(), new_id());
    }
}
