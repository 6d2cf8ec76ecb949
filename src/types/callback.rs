//! Callback Types
//!
//! Query/form parameters delivered to the application's callback URL.

use std::collections::HashMap;
use url::Url;

/// Parameters from the provider's redirect back to the application.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallbackParams {
    params: HashMap<String, String>,
}

/// Protocol family a callback belongs to, judged by its parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallbackShape {
    OAuth1,
    OAuth2,
    OpenId,
    Unknown,
}

impl CallbackParams {
    /// Create empty parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse callback parameters from URL.
    pub fn from_url(url: &Url) -> Self {
        url.query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    /// Parse callback parameters from URL string.
    pub fn from_url_str(url_str: &str) -> Result<Self, url::ParseError> {
        let url = Url::parse(url_str)?;
        Ok(Self::from_url(&url))
    }

    /// Parse an `application/x-www-form-urlencoded` query or form body.
    pub fn from_query(query: &str) -> Self {
        url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    /// Add a parameter.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Classify the callback by its discriminating keys.
    pub fn shape(&self) -> CallbackShape {
        if self.contains("openid.claimed_id") || self.contains("openid.mode") {
            CallbackShape::OpenId
        } else if self.contains("oauth_token")
            || self.contains("oauth_verifier")
            || self.contains("denied")
            || self.contains("oauth_problem")
        {
            CallbackShape::OAuth1
        } else if self.contains("code")
            || self.contains("access_token")
            || self.contains("wrap_verification_code")
            || self.contains("error")
        {
            CallbackShape::OAuth2
        } else {
            CallbackShape::Unknown
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for CallbackParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            params: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl From<HashMap<String, String>> for CallbackParams {
    fn from(params: HashMap<String, String>) -> Self {
        Self { params }
    }
}
