//! Session cookie signing
//!
//! Cookie values have the form `s:<sid>.<signature>`, where the signature is the
//! HMAC-SHA256 of the session id keyed by the shared secret, base64 encoded with
//! trailing padding removed. On the wire the value is percent-encoded (`s%3A...`).

use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const SIGNED_PREFIX: &str = "s:";
const SESSION_ID_BYTES: usize = 24;

/// Generate a fresh session id (24 random bytes, base64url).
pub fn generate_session_id() -> String {
    let mut bytes = [0u8; SESSION_ID_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Sign a session id, producing the decoded cookie value `s:<sid>.<sig>`.
pub fn sign(session_id: &str, secret: &str) -> String {
    let signature = STANDARD_NO_PAD.encode(compute_mac(session_id, secret).finalize().into_bytes());
    format!("{}{}.{}", SIGNED_PREFIX, session_id, signature)
}

/// Verify a cookie value and return the session id it carries.
///
/// Accepts both the percent-encoded and the decoded form. Returns `None` for
/// unsigned values, malformed values and signature mismatches.
pub fn unsign(raw_value: &str, secret: &str) -> Option<String> {
    let decoded = urlencoding::decode(raw_value).ok()?;
    let signed = decoded.strip_prefix(SIGNED_PREFIX)?;
    let (session_id, signature) = signed.rsplit_once('.')?;

    if session_id.is_empty() {
        return None;
    }

    let expected = STANDARD_NO_PAD.decode(signature.trim_end_matches('=')).ok()?;
    compute_mac(session_id, secret)
        .verify_slice(&expected)
        .ok()
        .map(|_| session_id.to_string())
}

fn compute_mac(session_id: &str, secret: &str) -> HmacSha256 {
    // HMAC accepts keys of any length
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC-SHA256 accepts keys of any size"));
    mac.update(session_id.as_bytes());
    mac
}
