//! QR payload wire format: base64url (unpadded) JSON `{v, tid, n, t}`.
//!
//! Kept apart from the state machine so the encoding can change without
//! touching scan logic. Decoding accepts padded input as well.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub const QR_FORMAT_VERSION: u8 = 1;

const NONCE_BYTES: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrPayload {
    /// Format version.
    pub v: u8,
    /// Ticket id.
    pub tid: Uuid,
    /// Nonce; must equal the ticket's current `qr_nonce`.
    pub n: String,
    /// Issued-at, epoch milliseconds.
    pub t: i64,
}

impl QrPayload {
    pub fn new(ticket_id: Uuid, nonce: String, issued_at_millis: i64) -> Self {
        Self {
            v: QR_FORMAT_VERSION,
            tid: ticket_id,
            n: nonce,
            t: issued_at_millis,
        }
    }
}

#[derive(Debug, Error)]
pub enum QrError {
    #[error("QR payload is not valid base64url: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("QR payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported QR payload version {0}")]
    UnsupportedVersion(u8),

    #[error("QR payload has an empty nonce")]
    EmptyNonce,
}

pub fn encode(payload: &QrPayload) -> Result<String, QrError> {
    let json = serde_json::to_vec(payload)?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

pub fn decode(raw: &str) -> Result<QrPayload, QrError> {
    let trimmed = raw.trim().trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD.decode(trimmed)?;
    let payload: QrPayload = serde_json::from_slice(&bytes)?;

    if payload.v != QR_FORMAT_VERSION {
        return Err(QrError::UnsupportedVersion(payload.v));
    }
    if payload.n.is_empty() {
        return Err(QrError::EmptyNonce);
    }
    Ok(payload)
}

/// Fresh 128-bit nonce, base64url encoded.
pub fn generate_nonce() -> String {
    let mut bytes = [0u8; NONCE_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoded_payload_is_url_safe_json() {
        let tid = Uuid::new_v4();
        let payload = QrPayload::new(tid, "abc".to_string(), 1_700_000_000_000);
        let encoded = encode(&payload).unwrap();

        assert!(!encoded.contains('+') && !encoded.contains('/') && !encoded.contains('='));

        let json: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(&encoded).unwrap()).unwrap();
        assert_eq!(json["v"], 1);
        assert_eq!(json["tid"], tid.to_string());
        assert_eq!(decode(&encoded).unwrap(), payload);
    }

    #[test]
    fn test_padded_input_accepted() {
        let payload = QrPayload::new(Uuid::new_v4(), "n0nce".to_string(), 1);
        let padded = base64::engine::general_purpose::URL_SAFE
            .encode(serde_json::to_vec(&payload).unwrap());
        assert_eq!(decode(&padded).unwrap(), payload);
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(decode("%%%"), Err(QrError::Encoding(_))));
        let not_json = URL_SAFE_NO_PAD.encode(b"hello");
        assert!(matches!(decode(&not_json), Err(QrError::Json(_))));
    }

    #[test]
    fn test_unknown_version_rejected() {
        let raw = URL_SAFE_NO_PAD.encode(
            serde_json::to_vec(&serde_json::json!({
                "v": 2, "tid": Uuid::new_v4(), "n": "x", "t": 0
            }))
            .unwrap(),
        );
        assert!(matches!(decode(&raw), Err(QrError::UnsupportedVersion(2))));
    }

    #[test]
    fn test_nonces_are_128_bit_and_distinct() {
        let a = generate_nonce();
        let b = generate_nonce();
        assert_eq!(URL_SAFE_NO_PAD.decode(&a).unwrap().len(), 16);
        assert_ne!(a, b);
    }
}
