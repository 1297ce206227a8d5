// Configuration validation

use crate::{ConfigError, Result};

/// Implemented by typed configuration structs.
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Reusable validation rules.
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn not_empty(value: &str, field: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "{} cannot be empty",
                field
            )));
        }
        Ok(())
    }

    pub fn in_range<T>(value: T, min: T, max: T, field: &str) -> Result<()>
    where
        T: PartialOrd + std::fmt::Display,
    {
        if value < min || value > max {
            return Err(ConfigError::ValidationError(format!(
                "{} must be between {} and {} (got {})",
                field, min, max, value
            )));
        }
        Ok(())
    }

    pub fn is_url(value: &str, field: &str) -> Result<()> {
        if !value.starts_with("http://") && !value.starts_with("https://") {
            return Err(ConfigError::ValidationError(format!(
                "{} must be an http(s) URL",
                field
            )));
        }
        Ok(())
    }

    /// Six-field cron expression (seconds first), e.g. `0 */15 * * * *`.
    pub fn is_cron(value: &str, field: &str) -> Result<()> {
        let fields = value.split_whitespace().count();
        if !(6..=7).contains(&fields) {
            return Err(ConfigError::ValidationError(format!(
                "{} must be a 6 or 7 field cron expression (got {} fields)",
                field, fields
            )));
        }
        Ok(())
    }
}
