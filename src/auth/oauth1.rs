//! OAuth 1.0a request signing (RFC 5849, HMAC-SHA1).

use super::{AuthError, Authenticator};
use crate::path::escape_segment;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use reqwest::Url;
use sha1::Sha1;
use std::collections::BTreeMap;
use uuid::Uuid;

const SIGNATURE_METHOD: &str = "HMAC-SHA1";

/// Consumer and token credentials for OAuth 1.0a.
#[derive(Debug, Clone)]
pub struct OAuth1 {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub token: String,
    pub token_secret: String,
    pub realm: String,
}

/// RFC 5849 3.4.2: base64(HMAC-SHA1(escape(consumer_secret) & escape(token_secret), text)).
pub fn hmac_sha1_sign(
    consumer_secret: &str,
    token_secret: &str,
    text: &str,
) -> Result<String, AuthError> {
    let key = format!(
        "{}&{}",
        escape_segment(consumer_secret),
        escape_segment(token_secret)
    );
    let mut mac = Hmac::<Sha1>::new_from_slice(key.as_bytes())
        .map_err(|e| AuthError::InvalidKey(e.to_string()))?;
    mac.update(text.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// RFC 5849 3.4.1 signature base string: method, base URL and sorted, encoded parameters.
fn signature_base(method: &str, url: &Url, oauth_params: &BTreeMap<&str, String>) -> String {
    let mut params: Vec<(String, String)> = oauth_params
        .iter()
        .map(|(k, v)| (escape_segment(k), escape_segment(v)))
        .collect();
    params.extend(
        url.query_pairs()
            .map(|(k, v)| (escape_segment(&k), escape_segment(&v))),
    );
    params.sort();
    let joined = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    let mut base_url = format!("{}://{}", url.scheme(), url.host_str().unwrap_or_default());
    if let Some(port) = url.port() {
        base_url.push_str(&format!(":{}", port));
    }
    base_url.push_str(url.path());

    format!(
        "{}&{}&{}",
        method.to_uppercase(),
        escape_segment(&base_url),
        escape_segment(&joined)
    )
}

fn nonce() -> String {
    Uuid::new_v4().simple().to_string()
}

impl OAuth1 {
    fn header_with(
        &self,
        method: &str,
        url: &Url,
        nonce: String,
        timestamp: i64,
    ) -> Result<String, AuthError> {
        let mut params: BTreeMap<&str, String> = BTreeMap::new();
        params.insert("oauth_consumer_key", self.consumer_key.clone());
        params.insert("oauth_nonce", nonce);
        params.insert("oauth_signature_method", SIGNATURE_METHOD.to_string());
        params.insert("oauth_timestamp", timestamp.to_string());
        params.insert("oauth_token", self.token.clone());
        params.insert("oauth_version", "1.0".to_string());

        let base = signature_base(method, url, &params);
        let signature = hmac_sha1_sign(&self.consumer_secret, &self.token_secret, &base)?;
        params.insert("oauth_signature", signature);

        let mut fields = vec![format!("realm=\"{}\"", escape_segment(&self.realm))];
        fields.extend(
            params
                .iter()
                .map(|(k, v)| format!("{}=\"{}\"", k, escape_segment(v))),
        );
        Ok(format!("OAuth {}", fields.join(", ")))
    }
}

impl Authenticator for OAuth1 {
    fn authorize(&self, method: &str, url: &Url) -> Result<(&'static str, String), AuthError> {
        let header = self.header_with(method, url, nonce(), chrono::Utc::now().timestamp())?;
        Ok(("Authorization", header))
    }
}
