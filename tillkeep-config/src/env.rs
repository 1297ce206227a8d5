// Environment variable loading

use crate::{ConfigError, Result};
use std::collections::HashMap;
use std::env;

/// Default prefix for every tillkeep variable (`TILLKEEP_WEBHOOK_SECRET`, ...)
pub const DEFAULT_PREFIX: &str = "TILLKEEP";

/// Reads process environment variables, optionally restricted to a prefix.
///
/// Keys are normalised to lowercase with the prefix and its separator
/// removed, so `TILLKEEP_POLL_SCHEDULE` becomes `poll_schedule`.
#[derive(Debug, Clone)]
pub struct EnvLoader {
    prefix: Option<String>,
}

impl EnvLoader {
    pub fn new(prefix: Option<String>) -> Self {
        Self { prefix }
    }

    /// Loader scoped to [`DEFAULT_PREFIX`].
    pub fn tillkeep() -> Self {
        Self::new(Some(DEFAULT_PREFIX.to_string()))
    }

    /// Load all matching variables.
    pub fn load(&self) -> Result<HashMap<String, String>> {
        Ok(self.collect(env::vars()))
    }

    /// Normalise an arbitrary set of variables. Split out from [`load`] so
    /// the prefix handling can be tested without touching the process env.
    ///
    /// [`load`]: EnvLoader::load
    pub fn collect<I>(&self, vars: I) -> HashMap<String, String>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut config = HashMap::new();

        for (key, value) in vars {
            match self.prefix {
                Some(ref prefix) => {
                    let stripped = key
                        .strip_prefix(prefix.as_str())
                        .and_then(|rest| rest.strip_prefix('_'));
                    if let Some(name) = stripped.filter(|name| !name.is_empty()) {
                        config.insert(name.to_lowercase(), value);
                    }
                }
                None => {
                    config.insert(key.to_lowercase(), value);
                }
            }
        }

        config
    }

    /// Load one variable by its short name.
    pub fn load_var(&self, key: &str) -> Result<String> {
        env::var(self.full_key(key)).map_err(ConfigError::EnvError)
    }

    pub fn load_var_or(&self, key: &str, default: &str) -> String {
        self.load_var(key).unwrap_or_else(|_| default.to_string())
    }

    /// The fully-qualified variable name for a short key.
    pub fn full_key(&self, key: &str) -> String {
        match self.prefix {
            Some(ref prefix) => format!("{}_{}", prefix, key.to_uppercase()),
            None => key.to_uppercase(),
        }
    }
}

impl Default for EnvLoader {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_collect_with_prefix() {
        let loader = EnvLoader::tillkeep();
        let config = loader.collect(vars(&[
            ("TILLKEEP_WEBHOOK_SECRET", "s3cret"),
            ("TILLKEEP_POLL_SCHEDULE", "0 */5 * * * *"),
            ("TILLKEEPER_OTHER", "ignored"),
            ("TILLKEEP_", "ignored"),
            ("PATH", "/usr/bin"),
        ]));

        assert_eq!(config.len(), 2);
        assert_eq!(config["webhook_secret"], "s3cret");
        assert_eq!(config["poll_schedule"], "0 */5 * * * *");
    }

    #[test]
    fn test_collect_without_prefix() {
        let loader = EnvLoader::default();
        let config = loader.collect(vars(&[("HOME", "/root")]));
        assert_eq!(config["home"], "/root");
    }

    #[test]
    fn test_full_key() {
        assert_eq!(
            EnvLoader::tillkeep().full_key("redis_url"),
            "TILLKEEP_REDIS_URL"
        );
        assert_eq!(EnvLoader::default().full_key("redis_url"), "REDIS_URL");
    }

    #[test]
    fn test_missing_var_falls_back() {
        let loader = EnvLoader::tillkeep();
        assert!(loader.load_var("DEFINITELY_NOT_SET_31337").is_err());
        assert_eq!(loader.load_var_or("DEFINITELY_NOT_SET_31337", "x"), "x");
    }
}
