use base64::Engine as _;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use url::Url;

use crate::config::Credential;
use crate::error::{PusherError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Milliseconds since the Unix epoch, the timestamp DingTalk expects.
pub fn current_timestamp_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Compute the DingTalk robot signature.
/// Signed payload: "<timestamp>\n<secret>", keyed by the secret, base64 encoded.
pub fn sign(secret: &str, timestamp: &str) -> String {
    let string_to_sign = format!("{timestamp}\n{secret}");
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(string_to_sign.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
}

/// Verify a signature the way the receiving endpoint does.
/// `signature` is the already percent-decoded base64 value.
pub fn verify(secret: &str, timestamp: &str, signature: &str) -> bool {
    let decoded = match base64::engine::general_purpose::STANDARD.decode(signature) {
        Ok(b) => b,
        Err(_) => return false,
    };

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return false,
    };
    mac.update(format!("{timestamp}\n{secret}").as_bytes());
    mac.verify_slice(&decoded).is_ok()
}

/// A delivery URL signed for a single request. Never reuse one across calls.
#[derive(Debug, Clone)]
pub struct SignedRequest {
    pub timestamp: String,
    pub signature: String,
    pub url: Url,
}

impl SignedRequest {
    /// Sign `credential` at `timestamp_ms` and append `timestamp` and `sign`
    /// to the webhook URL, keeping any existing query (e.g. `access_token`).
    pub fn new(credential: &Credential, timestamp_ms: i64) -> Result<Self> {
        let mut url = parse_webhook_url(credential.webhook_url())?;
        let timestamp = timestamp_ms.to_string();
        let signature = sign(credential.secret(), &timestamp);

        url.query_pairs_mut()
            .append_pair("timestamp", &timestamp)
            .append_pair("sign", &signature);

        Ok(Self {
            timestamp,
            signature,
            url,
        })
    }

    /// Sign with the current time.
    pub fn now(credential: &Credential) -> Result<Self> {
        Self::new(credential, current_timestamp_ms())
    }
}

/// Parse and check a webhook base URL. Only absolute http(s) URLs are accepted.
pub fn parse_webhook_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| PusherError::InvalidConfiguration(format!("invalid webhook URL: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(PusherError::InvalidConfiguration(format!(
            "unsupported webhook URL scheme: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEBHOOK: &str = "https://oapi.dingtalk.com/robot/send?access_token=abc123";

    #[test]
    fn test_sign_known_vector() {
        // Contains '+', '/' and '=' so the query encoding below is meaningful.
        assert_eq!(
            sign("secret", "1700000000000"),
            "OuzzJR5+xZ4/EYwqtNt6sMYZQMTa/HEGvc9miJe7XzY="
        );
    }

    #[test]
    fn test_sign_is_deterministic() {
        let a = sign("SECabc", "1700000000000");
        let b = sign("SECabc", "1700000000000");
        assert_eq!(a, b);
    }

    #[test]
    fn test_sign_changes_with_secret_or_timestamp() {
        let base = sign("SECabc", "1700000000000");
        assert_ne!(base, sign("SECabd", "1700000000000"));
        assert_ne!(base, sign("SECabc", "1700000000001"));
    }

    #[test]
    fn test_verify_accepts_own_signature() {
        let sig = sign("SECabc", "1700000000000");
        assert!(verify("SECabc", "1700000000000", &sig));
        assert!(!verify("SECabc", "1700000000001", &sig));
        assert!(!verify("other", "1700000000000", &sig));
        assert!(!verify("SECabc", "1700000000000", "not base64!"));
    }

    #[test]
    fn test_signed_url_keeps_token_and_encodes_signature() {
        let credential = Credential::new(WEBHOOK, "secret");
        let signed = SignedRequest::new(&credential, 1_700_000_000_000).unwrap();

        assert_eq!(signed.timestamp, "1700000000000");
        assert_eq!(
            signed.url.as_str(),
            "https://oapi.dingtalk.com/robot/send?access_token=abc123\
             &timestamp=1700000000000\
             &sign=OuzzJR5%2BxZ4%2FEYwqtNt6sMYZQMTa%2FHEGvc9miJe7XzY%3D"
        );

        let sign_param = signed
            .url
            .query_pairs()
            .find(|(k, _)| k == "sign")
            .map(|(_, v)| v.into_owned());
        assert_eq!(sign_param.as_deref(), Some(signed.signature.as_str()));
    }

    #[test]
    fn test_signed_url_without_existing_query() {
        let credential = Credential::new("http://127.0.0.1:8080/robot/send", "secret");
        let signed = SignedRequest::new(&credential, 42).unwrap();
        assert!(signed
            .url
            .as_str()
            .starts_with("http://127.0.0.1:8080/robot/send?timestamp=42&sign="));
    }

    #[test]
    fn test_fresh_timestamp_per_request() {
        let credential = Credential::new(WEBHOOK, "secret");
        let first = SignedRequest::new(&credential, 1).unwrap();
        let second = SignedRequest::new(&credential, 2).unwrap();
        assert_ne!(first.signature, second.signature);
    }

    #[test]
    fn test_rejects_non_http_url() {
        assert!(parse_webhook_url("ftp://example.com/hook").is_err());
        assert!(parse_webhook_url("not a url").is_err());
    }
}
