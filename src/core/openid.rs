//! OpenID 2.0 Association
//!
//! Association handshake, `checkid_setup` URL construction with Attribute
//! Exchange and the OAuth hybrid extension, positive assertion verification
//! and AX value extraction.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ring::hmac;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::core::encoding::{append_query, parse_key_value_form};
use crate::core::transport::{HttpMethod, HttpRequest, HttpTransport};
use crate::error::{
    ConfigurationError, ProtocolError, ProviderError, SocialAuthError, StateError,
};
use crate::types::CallbackParams;

pub const OPENID_NS: &str = "http://specs.openid.net/auth/2.0";
pub const IDENTIFIER_SELECT: &str = "http://specs.openid.net/auth/2.0/identifier_select";
pub const AX_NS: &str = "http://openid.net/srv/ax/1.0";
pub const OAUTH_EXTENSION_NS: &str = "http://specs.openid.net/extensions/oauth/1.0";

/// Attributes requested through Attribute Exchange, as `(alias, type URI)`.
const AX_ATTRIBUTES: &[(&str, &str)] = &[
    ("email", "http://axschema.org/contact/email"),
    ("firstname", "http://axschema.org/namePerson/first"),
    ("lastname", "http://axschema.org/namePerson/last"),
    ("country", "http://axschema.org/contact/country/home"),
    ("language", "http://axschema.org/pref/language"),
];

/// Assertion fields that must be covered by the signature.
const REQUIRED_SIGNED: &[&str] = &["return_to", "assoc_handle"];

/// Shared secret negotiated with the OpenID endpoint.
#[derive(Clone, Debug)]
pub struct Association {
    pub handle: String,
    /// Base64 HMAC-SHA1 key.
    pub mac_key: SecretString,
}

impl Association {
    pub fn new(handle: impl Into<String>, mac_key: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            mac_key: SecretString::new(mac_key.into()),
        }
    }
}

/// Establish an association with the OpenID endpoint.
pub async fn associate(
    transport: &dyn HttpTransport,
    provider_id: &str,
    endpoint: &str,
) -> Result<Association, SocialAuthError> {
    let params = vec![
        ("openid.ns".to_string(), OPENID_NS.to_string()),
        ("openid.mode".to_string(), "associate".to_string()),
        ("openid.assoc_type".to_string(), "HMAC-SHA1".to_string()),
        ("openid.session_type".to_string(), "no-encryption".to_string()),
    ];
    let url = append_query(endpoint, &params);

    tracing::debug!(provider = provider_id, endpoint, "requesting OpenID association");
    let response = transport.send(HttpRequest::new(HttpMethod::Get, &url)).await?;
    if !response.is_success() {
        return Err(SocialAuthError::Provider(ProviderError::UnexpectedStatus {
            provider_id: provider_id.to_string(),
            url: endpoint.to_string(),
            status: response.status,
            body: response.body,
        }));
    }

    let mut values = parse_key_value_form(&response.body);
    let handle = take_field(&mut values, "assoc_handle")?;
    let mac_key = take_field(&mut values, "mac_key")?;
    Ok(Association::new(handle, mac_key))
}

fn take_field(values: &mut HashMap<String, String>, field: &str) -> Result<String, SocialAuthError> {
    values
        .remove(field)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| missing_field(field))
}

fn missing_field(field: &str) -> SocialAuthError {
    SocialAuthError::Protocol(ProtocolError::MissingField {
        field: field.to_string(),
    })
}

fn invalid_signature(message: impl Into<String>) -> SocialAuthError {
    SocialAuthError::Protocol(ProtocolError::InvalidSignature {
        message: message.into(),
    })
}

/// Parameters of a `checkid_setup` request.
#[derive(Debug)]
pub struct CheckIdSetup<'a> {
    pub endpoint: &'a str,
    pub return_to: &'a str,
    pub assoc_handle: &'a str,
    /// Consumer key for the OAuth extension; `None` requests identity only.
    pub oauth_consumer: Option<&'a str>,
    pub oauth_scope: Option<&'a str>,
}

/// Build the OpenID 2.0 `checkid_setup` redirect URL.
pub fn checkid_setup_url(request: &CheckIdSetup<'_>) -> Result<String, SocialAuthError> {
    let realm = realm_of(request.return_to)?;

    let mut params = vec![
        ("openid.ns".to_string(), OPENID_NS.to_string()),
        ("openid.mode".to_string(), "checkid_setup".to_string()),
        ("openid.claimed_id".to_string(), IDENTIFIER_SELECT.to_string()),
        ("openid.identity".to_string(), IDENTIFIER_SELECT.to_string()),
        ("openid.return_to".to_string(), request.return_to.to_string()),
        ("openid.realm".to_string(), realm),
        ("openid.assoc_handle".to_string(), request.assoc_handle.to_string()),
        ("openid.ns.ax".to_string(), AX_NS.to_string()),
        ("openid.ax.mode".to_string(), "fetch_request".to_string()),
    ];
    for (alias, type_uri) in AX_ATTRIBUTES {
        params.push((format!("openid.ax.type.{}", alias), type_uri.to_string()));
    }
    let required = AX_ATTRIBUTES
        .iter()
        .map(|(alias, _)| *alias)
        .collect::<Vec<_>>()
        .join(",");
    params.push(("openid.ax.required".to_string(), required));

    if let Some(consumer) = request.oauth_consumer {
        params.push(("openid.ns.oauth".to_string(), OAUTH_EXTENSION_NS.to_string()));
        params.push(("openid.oauth.consumer".to_string(), consumer.to_string()));
        if let Some(scope) = request.oauth_scope {
            params.push(("openid.oauth.scope".to_string(), scope.to_string()));
        }
    }

    Ok(append_query(request.endpoint, &params))
}

/// `scheme://host[:port]/` of the return URL.
fn realm_of(return_to: &str) -> Result<String, SocialAuthError> {
    let url = Url::parse(return_to).map_err(|_| {
        SocialAuthError::Configuration(ConfigurationError::InvalidEndpoint {
            url: return_to.to_string(),
        })
    })?;
    Ok(format!("{}/", url.origin().ascii_serialization()))
}

/// Field names listed in `openid.signed`.
fn signed_fields(params: &CallbackParams) -> Result<Vec<&str>, SocialAuthError> {
    let signed = params
        .get("openid.signed")
        .filter(|signed| !signed.is_empty())
        .ok_or_else(|| missing_field("openid.signed"))?;
    Ok(signed
        .split(',')
        .map(str::trim)
        .filter(|field| !field.is_empty())
        .collect())
}

/// Key-value form of the signed fields, in `openid.signed` order.
fn signed_message(params: &CallbackParams) -> Result<String, SocialAuthError> {
    let mut message = String::new();
    for field in signed_fields(params)? {
        let key = format!("openid.{}", field);
        let value = params.get(&key).ok_or_else(|| missing_field(&key))?;
        message.push_str(field);
        message.push(':');
        message.push_str(value);
        message.push('\n');
    }
    Ok(message)
}

/// Base64 HMAC-SHA1 of the fields listed in `openid.signed`.
pub fn assertion_signature(mac_key: &[u8], params: &CallbackParams) -> Result<String, SocialAuthError> {
    let key = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, mac_key);
    let tag = hmac::sign(&key, signed_message(params)?.as_bytes());
    Ok(STANDARD.encode(tag.as_ref()))
}

/// Check a positive assertion against the association and return URL of the
/// redirect that started the flow.
///
/// On success returns only the parameters covered by the signature.
pub fn verify_assertion(
    provider_id: &str,
    params: &CallbackParams,
    association: &Association,
    return_to: &str,
) -> Result<CallbackParams, SocialAuthError> {
    let mismatch = |field: &str| {
        SocialAuthError::State(StateError::AssertionMismatch {
            provider_id: provider_id.to_string(),
            field: field.to_string(),
        })
    };
    if params.get("openid.assoc_handle") != Some(association.handle.as_str()) {
        return Err(mismatch("openid.assoc_handle"));
    }
    if params.get("openid.return_to") != Some(return_to) {
        return Err(mismatch("openid.return_to"));
    }

    let fields = signed_fields(params)?;
    if let Some(field) = REQUIRED_SIGNED.iter().find(|field| !fields.contains(*field)) {
        return Err(invalid_signature(format!("{} is not signed", field)));
    }

    let signature = params
        .get("openid.sig")
        .ok_or_else(|| missing_field("openid.sig"))?;
    let signature = STANDARD
        .decode(signature)
        .map_err(|_| invalid_signature("openid.sig is not base64"))?;
    let mac_key = STANDARD
        .decode(association.mac_key.expose_secret())
        .map_err(|_| invalid_signature("association mac_key is not base64"))?;

    let key = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, &mac_key);
    hmac::verify(&key, signed_message(params)?.as_bytes(), &signature)
        .map_err(|_| invalid_signature("signature does not match"))?;

    Ok(signed_params(params))
}

/// Parameters covered by `openid.signed`, keyed with their `openid.` prefix.
pub fn signed_params(params: &CallbackParams) -> CallbackParams {
    let mut signed = CallbackParams::new();
    for field in signed_fields(params).unwrap_or_default() {
        let key = format!("openid.{}", field);
        if let Some(value) = params.get(&key) {
            signed = signed.with(key, value);
        }
    }
    signed
}

/// Attribute Exchange values from a positive assertion.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AxAttributes {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub country: Option<String>,
    pub language: Option<String>,
}

/// Read AX values whatever extension alias the provider echoed back.
pub fn ax_attributes(params: &CallbackParams) -> AxAttributes {
    let mut attributes = AxAttributes::default();
    for (key, value) in params.iter() {
        let Some(rest) = key.strip_prefix("openid.") else {
            continue;
        };
        let Some((_, name)) = rest.split_once(".value.") else {
            continue;
        };
        let value = Some(value.to_string()).filter(|v| !v.is_empty());
        match name {
            "email" => attributes.email = value,
            "firstname" => attributes.first_name = value,
            "lastname" => attributes.last_name = value,
            "country" => attributes.country = value,
            "language" => attributes.language = value,
            _ => {}
        }
    }
    attributes
}

/// Pre-approved OAuth request token carried by a hybrid assertion.
pub fn request_token(params: &CallbackParams) -> Option<String> {
    params
        .iter()
        .find(|(key, _)| key.starts_with("openid.") && key.ends_with(".request_token"))
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}


/// Base64 MAC key shared by test associations (`secret-mac-key`).
#[cfg(test)]
pub(crate) const TEST_MAC_KEY: &str = "c2VjcmV0LW1hYy1rZXk=";

/// Sign every `openid.*` field except the mode, as an OpenID provider would.
#[cfg(test)]
pub(crate) fn sign_assertion(params: CallbackParams) -> CallbackParams {
    let mut fields: Vec<String> = params
        .iter()
        .filter_map(|(key, _)| key.strip_prefix("openid."))
        .filter(|field| !matches!(*field, "mode" | "signed" | "sig"))
        .map(str::to_string)
        .collect();
    fields.sort();
    let params = params.with("openid.signed", fields.join(","));
    let mac_key = STANDARD.decode(TEST_MAC_KEY).unwrap();
    let signature = assertion_signature(&mac_key, &params).unwrap();
    params.with("openid.sig", signature)
}
