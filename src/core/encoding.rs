//! Wire Encodings
//!
//! Form encoding helpers and parsers for token endpoint bodies, which arrive
//! as JSON, `application/x-www-form-urlencoded` or OpenID key-value form.

use std::collections::{BTreeMap, HashMap};

use crate::core::signature::percent_encode;
use crate::error::{ProtocolError, SocialAuthError};
use crate::types::AttributeValue;

/// Encode parameters as `k=v&k=v` with RFC 3986 escaping.
pub fn encode_form(params: &[(String, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Append parameters to a URL's query string.
pub fn append_query(url: &str, params: &[(String, String)]) -> String {
    if params.is_empty() {
        return url.to_string();
    }
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}{}", url, separator, encode_form(params))
}

/// Decode a form-encoded body.
pub fn parse_form(body: &str) -> Vec<(String, String)> {
    url::form_urlencoded::parse(body.trim().as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

/// Parse a JSON body, attributing failures to `url`.
pub fn parse_json(url: &str, body: &str) -> Result<serde_json::Value, SocialAuthError> {
    serde_json::from_str(body).map_err(|e| {
        SocialAuthError::Protocol(ProtocolError::InvalidJson {
            url: url.to_string(),
            message: e.to_string(),
        })
    })
}

/// Parse OpenID key-value form (`key:value` per line).
pub fn parse_key_value_form(body: &str) -> HashMap<String, String> {
    body.lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}

/// Token endpoint response, independent of its wire encoding.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TokenResponse {
    pub access_token: Option<String>,
    pub expires_in: Option<i64>,
    pub refresh_token: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
    /// Every other field the provider returned.
    pub extra: BTreeMap<String, AttributeValue>,
}

impl TokenResponse {
    fn insert(&mut self, name: &str, value: AttributeValue) {
        match name {
            "access_token" => self.access_token = Some(value.to_string()),
            "expires_in" | "expires" => self.expires_in = value.as_i64(),
            "refresh_token" => self.refresh_token = Some(value.to_string()),
            "error" => self.error = Some(value.to_string()),
            "error_description" => self.error_description = Some(value.to_string()),
            _ => {
                self.extra.insert(name.to_string(), value);
            }
        }
    }
}

/// Parse a token endpoint body; JSON when it starts with `{`, form-encoded otherwise.
pub fn parse_token_response(url: &str, body: &str) -> Result<TokenResponse, SocialAuthError> {
    let mut response = TokenResponse::default();
    let trimmed = body.trim();

    if trimmed.starts_with('{') {
        let value = parse_json(url, trimmed)?;
        let object = value.as_object().ok_or_else(|| {
            SocialAuthError::Protocol(ProtocolError::InvalidResponse {
                url: url.to_string(),
                message: "token response is not a JSON object".to_string(),
            })
        })?;
        for (name, value) in object {
            if let Some(value) = json_attribute(value) {
                response.insert(name, value);
            }
        }
        // `{"error": {"message": ..}}` style errors
        if let Some(message) = object
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
        {
            response.error_description = Some(message.to_string());
        }
    } else {
        for (name, value) in parse_form(trimmed) {
            response.insert(&name, AttributeValue::Text(value));
        }
    }

    Ok(response)
}

/// JSON value as an attribute; nulls are dropped, nested values kept as JSON text.
pub fn json_attribute(value: &serde_json::Value) -> Option<AttributeValue> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(AttributeValue::Text(s.clone())),
        serde_json::Value::Number(n) => Some(
            n.as_i64()
                .map(AttributeValue::Integer)
                .unwrap_or_else(|| AttributeValue::Text(n.to_string())),
        ),
        other => Some(AttributeValue::Text(other.to_string())),
    }
}
