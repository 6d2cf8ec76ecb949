//! OAuth 1.0a Signatures
//!
//! HMAC-SHA1 request signing: signature base string construction, signing
//! key derivation and `Authorization` header rendering.

use base64::Engine;
use rand::distributions::Alphanumeric;
use rand::Rng;
use ring::hmac;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::core::transport::HttpMethod;
use crate::error::{ConfigurationError, SocialAuthError};

pub const SIGNATURE_METHOD: &str = "HMAC-SHA1";
pub const OAUTH_VERSION: &str = "1.0";

/// RFC 3986 percent-encoding (unreserved characters kept).
pub fn percent_encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Random alphanumeric nonce.
pub fn generate_nonce() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

/// Current Unix timestamp in seconds.
pub fn generate_timestamp() -> String {
    chrono::Utc::now().timestamp().to_string()
}

/// Token key/secret pair (request token or access token).
#[derive(Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub key: String,
    pub secret: String,
}

impl TokenPair {
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
        }
    }
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("key", &self.key)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// What is being signed.
#[derive(Debug)]
pub struct SignatureRequest<'a> {
    pub method: HttpMethod,
    pub url: &'a str,
    /// Form-encoded body parameters; multipart fields are not signed.
    pub body_params: &'a [(String, String)],
    pub token: Option<&'a TokenPair>,
    /// Protocol parameters such as `oauth_callback` or `oauth_verifier`.
    pub protocol_params: &'a [(&'a str, String)],
}

/// OAuth 1.0a request signer.
#[derive(Clone)]
pub struct OAuthSigner {
    consumer_key: String,
    consumer_secret: SecretString,
}

impl OAuthSigner {
    pub fn new(consumer_key: impl Into<String>, consumer_secret: SecretString) -> Self {
        Self {
            consumer_key: consumer_key.into(),
            consumer_secret,
        }
    }

    /// Produce the full `Authorization` header value for a request.
    pub fn authorization_header(
        &self,
        request: &SignatureRequest<'_>,
    ) -> Result<String, SocialAuthError> {
        let params = self.signed_parameters(request, &generate_nonce(), &generate_timestamp())?;
        Ok(render_authorization_header(&params))
    }

    /// `oauth_*` parameters including `oauth_signature`, for a fixed nonce and timestamp.
    pub fn signed_parameters(
        &self,
        request: &SignatureRequest<'_>,
        nonce: &str,
        timestamp: &str,
    ) -> Result<Vec<(String, String)>, SocialAuthError> {
        let mut oauth_params = vec![
            ("oauth_consumer_key".to_string(), self.consumer_key.clone()),
            ("oauth_nonce".to_string(), nonce.to_string()),
            (
                "oauth_signature_method".to_string(),
                SIGNATURE_METHOD.to_string(),
            ),
            ("oauth_timestamp".to_string(), timestamp.to_string()),
            ("oauth_version".to_string(), OAUTH_VERSION.to_string()),
        ];
        if let Some(token) = request.token {
            oauth_params.push(("oauth_token".to_string(), token.key.clone()));
        }
        for (name, value) in request.protocol_params {
            oauth_params.push((name.to_string(), value.clone()));
        }

        let base = signature_base_string(
            request.method,
            request.url,
            oauth_params.iter().chain(request.body_params.iter()),
        )?;
        let signature = self.sign(&base, request.token.map(|t| t.secret.as_str()));
        tracing::trace!(base = %base, "computed OAuth signature base string");

        oauth_params.push(("oauth_signature".to_string(), signature));
        Ok(oauth_params)
    }

    /// HMAC-SHA1 over the base string, keyed with `enc(consumer_secret)&enc(token_secret)`.
    pub fn sign(&self, base_string: &str, token_secret: Option<&str>) -> String {
        let signing_key = format!(
            "{}&{}",
            percent_encode(self.consumer_secret.expose_secret()),
            percent_encode(token_secret.unwrap_or(""))
        );
        let key = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, signing_key.as_bytes());
        let tag = hmac::sign(&key, base_string.as_bytes());
        base64::engine::general_purpose::STANDARD.encode(tag.as_ref())
    }
}

/// `METHOD&enc(base-url)&enc(normalized-params)`.
///
/// Query parameters of `url` are folded into the parameter set.
pub fn signature_base_string<'a>(
    method: HttpMethod,
    url: &str,
    params: impl Iterator<Item = &'a (String, String)>,
) -> Result<String, SocialAuthError> {
    let parsed = Url::parse(url).map_err(|_| {
        SocialAuthError::Configuration(ConfigurationError::InvalidEndpoint {
            url: url.to_string(),
        })
    })?;

    let mut encoded: Vec<(String, String)> = params
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect();
    encoded.extend(
        parsed
            .query_pairs()
            .map(|(k, v)| (percent_encode(&k), percent_encode(&v))),
    );
    encoded.sort();

    let normalized = encoded
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    Ok(format!(
        "{}&{}&{}",
        method.as_str(),
        percent_encode(&base_string_uri(&parsed)),
        percent_encode(&normalized)
    ))
}

/// Scheme, host, non-default port and path; no query or fragment.
fn base_string_uri(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    match url.port() {
        Some(port) => format!("{}://{}:{}{}", url.scheme(), host, port, url.path()),
        None => format!("{}://{}{}", url.scheme(), host, url.path()),
    }
}

/// `OAuth k="v", ...` with percent-encoded values.
pub fn render_authorization_header(params: &[(String, String)]) -> String {
    let rendered = params
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("OAuth {}", rendered)
}
