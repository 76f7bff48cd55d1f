//! URL Signing
//!
//! Time-limited access URLs for objects in the blob store, using V4
//! query-string signing with an HMAC key (`GOOG4-HMAC-SHA256`).

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNING_ALGORITHM: &str = "GOOG4-HMAC-SHA256";

/// Longest lifetime a V4 signature may carry (7 days)
pub const MAX_EXPIRY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, thiserror::Error)]
pub enum SignError {
    #[error("Expiry of {0}s exceeds the 604800s maximum")]
    ExpiryTooLong(u64),

    #[error("Signing key rejected: {0}")]
    InvalidKey(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Put,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Put => "PUT",
        }
    }
}

/// One object access to sign
#[derive(Debug, Clone)]
pub struct SignRequest<'a> {
    pub bucket: &'a str,
    pub path: &'a str,
    pub method: HttpMethod,
    pub expires_in: Duration,
    /// Binds the URL to this `Content-Type` (uploads)
    pub content_type: Option<&'a str>,
    /// Signing time; the URL expires `expires_in` after it
    pub now: DateTime<Utc>,
}

/// Produces signed URLs
pub trait UrlSigner: Send + Sync {
    fn sign(&self, req: &SignRequest<'_>) -> Result<String, SignError>;
}

/// V4 signer backed by an HMAC access key
pub struct HmacV4Signer {
    access_id: String,
    secret: String,
    host: String,
}

impl HmacV4Signer {
    pub fn new(access_id: String, secret: String, host: String) -> Self {
        Self {
            access_id,
            secret,
            host,
        }
    }

    fn mac(key: &[u8], data: &[u8]) -> Result<Vec<u8>, SignError> {
        let mut mac =
            HmacSha256::new_from_slice(key).map_err(|e| SignError::InvalidKey(e.to_string()))?;
        mac.update(data);
        Ok(mac.finalize().into_bytes().to_vec())
    }

    fn signing_key(&self, date: &str) -> Result<Vec<u8>, SignError> {
        let key = Self::mac(format!("GOOG4{}", self.secret).as_bytes(), date.as_bytes())?;
        let key = Self::mac(&key, b"auto")?;
        let key = Self::mac(&key, b"storage")?;
        Self::mac(&key, b"goog4_request")
    }
}

impl UrlSigner for HmacV4Signer {
    fn sign(&self, req: &SignRequest<'_>) -> Result<String, SignError> {
        let expires = req.expires_in.as_secs();
        if req.expires_in > MAX_EXPIRY {
            return Err(SignError::ExpiryTooLong(expires));
        }

        let date = req.now.format("%Y%m%d").to_string();
        let datetime = req.now.format("%Y%m%dT%H%M%SZ").to_string();
        let scope = format!("{date}/auto/storage/goog4_request");

        let (signed_headers, canonical_headers) = match req.content_type {
            Some(content_type) => (
                "content-type;host",
                format!("content-type:{}\nhost:{}\n", content_type.trim(), self.host),
            ),
            None => ("host", format!("host:{}\n", self.host)),
        };

        // Already in sorted order
        let query = [
            ("X-Goog-Algorithm", SIGNING_ALGORITHM.to_string()),
            ("X-Goog-Credential", format!("{}/{}", self.access_id, scope)),
            ("X-Goog-Date", datetime.clone()),
            ("X-Goog-Expires", expires.to_string()),
            ("X-Goog-SignedHeaders", signed_headers.to_string()),
        ]
        .iter()
        .map(|(k, v)| format!("{}={}", uri_encode(k), uri_encode(v)))
        .collect::<Vec<_>>()
        .join("&");

        let resource = format!("/{}/{}", req.bucket, encode_path(req.path));

        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\nUNSIGNED-PAYLOAD",
            req.method.as_str(),
            resource,
            query,
            canonical_headers,
            signed_headers
        );

        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            SIGNING_ALGORITHM,
            datetime,
            scope,
            hex::encode(&Sha256::digest(canonical_request.as_bytes()))
        );

        let signature = hex::encode(&Self::mac(
            &self.signing_key(&date)?,
            string_to_sign.as_bytes(),
        )?);

        Ok(format!(
            "https://{}{}?{}&X-Goog-Signature={}",
            self.host, resource, query, signature
        ))
    }
}

/// Percent-encodes everything outside the RFC 3986 unreserved set
fn uri_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

/// Encodes each segment of an object path, keeping the separators
fn encode_path(path: &str) -> String {
    path.split('/').map(uri_encode).collect::<Vec<_>>().join("/")
}

mod hex {
    const DIGITS: &[u8; 16] = b"0123456789abcdef";

    pub fn encode(bytes: &[u8]) -> String {
        let mut out = String::with_capacity(bytes.len() * 2);
        for byte in bytes {
            out.push(DIGITS[(byte >> 4) as usize] as char);
            out.push(DIGITS[(byte & 0x0f) as usize] as char);
        }
        out
    }
}
