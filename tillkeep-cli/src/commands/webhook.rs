//! `tillkeep sign` and `tillkeep verify`

use crate::error::{CliError, CliResult};
use tillkeep_webhooks::{sign, verify};

/// Signature header value for `body`.
pub fn sign_body(body: &[u8], secret: &str) -> CliResult<String> {
    Ok(sign(body, secret)?)
}

/// Check `signature` against `body`. A mismatch is an error so the process
/// exits non-zero.
pub fn verify_body(body: &[u8], signature: &str, secret: &str) -> CliResult<()> {
    if verify(body, Some(signature), Some(secret)) {
        Ok(())
    } else {
        Err(CliError::Rejected("INVALID_SIGNATURE".to_string()))
    }
}
