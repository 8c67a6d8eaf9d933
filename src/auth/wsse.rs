//! WSSE UsernameToken authentication.

use super::{AuthError, Authenticator};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Url;
use sha1::{Digest, Sha1};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Wsse {
    pub username: String,
    pub password: String,
}

/// `X-WSSE` header value for the given nonce and creation time.
///
/// PasswordDigest is base64(sha1(nonce ‖ created ‖ password)); the nonce is sent base64 encoded.
pub fn wsse_header(username: &str, password: &str, nonce: &[u8], created: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(nonce);
    hasher.update(created.as_bytes());
    hasher.update(password.as_bytes());
    let digest = STANDARD.encode(hasher.finalize());
    format!(
        "UsernameToken Username=\"{}\", PasswordDigest=\"{}\", Nonce=\"{}\", Created=\"{}\"",
        username,
        digest,
        STANDARD.encode(nonce),
        created
    )
}

impl Authenticator for Wsse {
    fn authorize(&self, _method: &str, _url: &Url) -> Result<(&'static str, String), AuthError> {
        let nonce = Uuid::new_v4().into_bytes();
        let created = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%z").to_string();
        Ok((
            "X-WSSE",
            wsse_header(&self.username, &self.password, &nonce, &created),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_carries_digest_of_nonce_created_and_password() {
        let header = wsse_header("alice", "secret", b"0123456789abcdef", "2020-03-01T00:00:00+0000");

        let mut hasher = Sha1::new();
        hasher.update(b"0123456789abcdef2020-03-01T00:00:00+0000secret");
        let expected = STANDARD.encode(hasher.finalize());

        assert_eq!(
            header,
            format!(
                "UsernameToken Username=\"alice\", PasswordDigest=\"{}\", \
                 Nonce=\"MDEyMzQ1Njc4OWFiY2RlZg==\", Created=\"2020-03-01T00:00:00+0000\"",
                expected
            )
        );
    }

    #[test]
    fn authorize_sets_x_wsse_header() -> Result<(), AuthError> {
        let auth = Wsse {
            username: "alice".to_string(),
            password: "secret".to_string(),
        };
        let url = Url::parse("https://blog.hatena.ne.jp/alice/blog/atom/entry").expect("url");
        let (name, value) = auth.authorize("GET", &url)?;
        assert_eq!(name, "X-WSSE");
        assert!(value.starts_with("UsernameToken Username=\"alice\", PasswordDigest=\""));
        Ok(())
    }
}
