use std::str::FromStr;

/// Resolve a config key from the environment
///
/// `PRICEBATCH_{key}` wins over bare `{key}`, so deployments can namespace
/// their settings without breaking ones that reuse existing variables.
pub fn env_var(key: &str) -> Option<String> {
    std::env::var(format!("PRICEBATCH_{key}"))
        .or_else(|_| std::env::var(key))
        .ok()
}

/// Resolve a config key and parse it into the target type
///
/// Unset and malformed values both yield `None`, leaving the caller's
/// default in place.
pub fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env_var(key)?.parse().ok()
}
