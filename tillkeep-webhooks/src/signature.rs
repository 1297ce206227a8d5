//! Webhook signature generation and verification

use crate::{Result, WebhookError};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use std::collections::HashMap;
use std::fmt;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Scheme prefix carried by signature headers.
pub const SIGNATURE_SCHEME: &str = "sha256=";

/// Verify `provided` as the HMAC-SHA256 of `raw_body` under `secret`.
///
/// Fails closed: a missing or empty secret, a missing or empty signature, or
/// a signature that is not valid hex all return `false`. An optional
/// `sha256=` prefix is stripped before comparing. The comparison itself runs
/// in constant time.
pub fn verify(raw_body: &[u8], provided: Option<&str>, secret: Option<&str>) -> bool {
    let Some(secret) = secret.filter(|s| !s.is_empty()) else {
        return false;
    };
    let Some(provided) = provided.map(str::trim).filter(|s| !s.is_empty()) else {
        return false;
    };

    let encoded = provided.strip_prefix(SIGNATURE_SCHEME).unwrap_or(provided);
    let Ok(provided) = hex::decode(encoded) else {
        return false;
    };

    let Some(expected) = compute(raw_body, secret) else {
        return false;
    };

    expected.as_slice().ct_eq(&provided).into()
}

/// Sign `raw_body`, producing a `sha256=<hex>` header value.
pub fn sign(raw_body: &[u8], secret: &str) -> Result<String> {
    if secret.is_empty() {
        return Err(WebhookError::SecretMissing);
    }
    let digest = compute(raw_body, secret).ok_or(WebhookError::SecretMissing)?;
    Ok(format!("{}{}", SIGNATURE_SCHEME, hex::encode(digest)))
}

fn compute(raw_body: &[u8], secret: &str) -> Option<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(raw_body);
    Some(mac.finalize().into_bytes().to_vec())
}

/// Header names a delivery provider may put its signature in.
pub mod headers {
    pub const SIGNATURE: &str = "X-Signature";

    pub const WEBHOOK_SIGNATURE: &str = "X-Webhook-Signature";

    /// GitHub style
    pub const HUB_SIGNATURE: &str = "X-Hub-Signature-256";

    /// Lookup order.
    pub const ALL: [&str; 3] = [SIGNATURE, WEBHOOK_SIGNATURE, HUB_SIGNATURE];
}

/// Signature header value from a request, matching names case-insensitively.
pub fn signature_from_headers(headers: &HashMap<String, String>) -> Option<&str> {
    headers::ALL.iter().find_map(|wanted| {
        headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(wanted))
            .map(|(_, value)| value.as_str())
    })
}

/// Verifies inbound callbacks against a per-integration shared secret.
#[derive(Clone, Default)]
pub struct WebhookAuthenticator {
    secret: Option<SecretString>,
}

impl WebhookAuthenticator {
    /// `None` or an empty secret leaves the authenticator unconfigured, and
    /// an unconfigured authenticator rejects everything.
    pub fn new(secret: Option<String>) -> Self {
        Self {
            secret: secret
                .filter(|s| !s.is_empty())
                .map(SecretString::from),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.secret.is_some()
    }

    pub fn verify(&self, raw_body: &[u8], provided: Option<&str>) -> bool {
        let secret = self.secret.as_ref().map(|s| s.expose_secret());
        verify(raw_body, provided, secret)
    }

    /// Verify using whichever signature header the request carries.
    pub fn verify_headers(&self, raw_body: &[u8], headers: &HashMap<String, String>) -> bool {
        self.verify(raw_body, signature_from_headers(headers))
    }

    pub fn sign(&self, raw_body: &[u8]) -> Result<String> {
        match &self.secret {
            Some(secret) => sign(raw_body, secret.expose_secret()),
            None => Err(WebhookError::SecretMissing),
        }
    }
}

impl fmt::Debug for WebhookAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookAuthenticator")
            .field("configured", &self.is_configured())
            .finish()
    }
}
