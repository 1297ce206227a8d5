//! Idempotency key transport.

use std::collections::HashMap;

/// Request header carrying the client's idempotency key.
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// Store namespace for keys supplied by clients. Keys the service derives
/// itself, such as `webhook:<event_id>`, live outside it.
pub const CLIENT_KEY_SCOPE: &str = "client";

/// Store key for a client's idempotency key used against `resource`.
///
/// The same client key sent for two different resources maps to two
/// records, and no client key can name a key outside the client scope.
pub fn scoped_client_key(resource: &str, key: &str) -> String {
    format!("{}:{}:{}", CLIENT_KEY_SCOPE, resource, key)
}

/// Find the idempotency key in a header map.
///
/// Header names match case-insensitively. Surrounding whitespace is trimmed
/// and a blank value counts as absent.
pub fn extract_key(headers: &HashMap<String, String>) -> Option<&str> {
    headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(IDEMPOTENCY_KEY_HEADER))
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_extract_key() {
        assert_eq!(extract_key(&headers(&[("Idempotency-Key", "abc")])), Some("abc"));
        assert_eq!(extract_key(&headers(&[("idempotency-key", " abc ")])), Some("abc"));
    }

    #[test]
    fn test_scoped_client_key() {
        assert_eq!(scoped_client_key("sale:S1", "abc"), "client:sale:S1:abc");
        assert_ne!(
            scoped_client_key("sale:S1", "abc"),
            scoped_client_key("sale:S2", "abc")
        );
        assert!(scoped_client_key("sale:S1", "webhook:evt_1").starts_with("client:"));
    }

    #[test]
    fn test_blank_or_missing_key() {
        assert_eq!(extract_key(&headers(&[("Idempotency-Key", "  ")])), None);
        assert_eq!(extract_key(&headers(&[("Content-Type", "application/json")])), None);
    }
}
