//! GitHub webhook signature verification using HMAC-SHA256.
//!
//! GitHub signs each delivery with the secret configured on the webhook and
//! sends the result in `X-Hub-Signature-256` as `sha256=<hex>`. Verification
//! runs before the payload is looked at.

use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

/// A webhook secret, keyed once and reused for every delivery.
#[derive(Clone)]
pub struct WebhookSecret {
    mac: HmacSha256,
}

impl WebhookSecret {
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, InvalidLength> {
        Ok(WebhookSecret {
            mac: HmacSha256::new_from_slice(secret.as_ref())?,
        })
    }

    /// Checks a `X-Hub-Signature-256` header value against `payload`.
    ///
    /// Malformed headers fail verification. Comparison is constant-time.
    pub fn verify(&self, payload: &[u8], signature_header: &str) -> bool {
        let Some(expected) = parse_signature_header(signature_header) else {
            return false;
        };
        let mut mac = self.mac.clone();
        mac.update(payload);
        mac.verify_slice(&expected).is_ok()
    }

    /// Produces the header value GitHub would send for `payload`.
    pub fn sign(&self, payload: &[u8]) -> String {
        let mut mac = self.mac.clone();
        mac.update(payload);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }
}

impl fmt::Debug for WebhookSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WebhookSecret(..)")
    }
}

/// Parses `sha256=<hex>` into raw bytes. `None` for any other shape.
pub fn parse_signature_header(header: &str) -> Option<Vec<u8>> {
    let hex_sig = header.strip_prefix("sha256=")?;
    hex::decode(hex_sig).ok()
}
