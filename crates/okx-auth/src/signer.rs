//! The shared signing primitive and timestamp helpers
//!
//! OKX signs every authenticated request the same way:
//!
//! 1. message = timestamp + method + path + body
//! 2. HMAC-SHA256(secret, message)
//! 3. Base64 encode the digest
//!
//! The timestamp format differs per surface and is part of the wire
//! contract: the WebSocket login uses a whole-second epoch string, REST
//! requests use millisecond ISO-8601 with a trailing `Z`. Signature
//! verification fails server-side if the precision is off.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{SecondsFormat, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};

type HmacSha256 = Hmac<Sha256>;

/// Sign a request
///
/// Pure function: same inputs always produce the same signature.
pub fn sign(secret: &str, timestamp: &str, method: &str, path: &str, body: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(timestamp.as_bytes());
    mac.update(method.as_bytes());
    mac.update(path.as_bytes());
    mac.update(body.as_bytes());
    let result = mac.finalize();

    BASE64.encode(result.into_bytes())
}

/// Whole-second epoch timestamp, as required by the WebSocket login frame
pub fn epoch_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_secs()
        .to_string()
}

/// Millisecond ISO-8601 timestamp with trailing `Z`, as required by REST requests
///
/// Example: `2020-12-08T09:08:57.715Z`
pub fn iso_millis() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
