//! Access Grant
//!
//! Normalized credential produced by a successful token exchange.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{ConfigurationError, SocialAuthError, SocialAuthResult};
use crate::types::Permission;

/// Attribute key for the token lifetime in seconds.
pub const EXPIRES: &str = "expires";
/// Attribute key for the refresh token.
pub const REFRESH_TOKEN: &str = "refresh_token";

const ATTRIBUTE_PREFIX: &str = "attribute.";

/// Provider-specific value carried by a grant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Integer(i64),
    Text(String),
}

impl AttributeValue {
    /// Integer view; numeric text is accepted.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            Self::Text(value) => value.trim().parse().ok(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            Self::Integer(_) => None,
        }
    }

    /// Parse flat text, preferring an integer reading.
    pub fn from_flat(value: &str) -> Self {
        value
            .parse::<i64>()
            .map(Self::Integer)
            .unwrap_or_else(|_| Self::Text(value.to_string()))
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(value) => write!(f, "{}", value),
            Self::Text(value) => f.write_str(value),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

/// Credential bound to exactly one provider.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessGrant {
    /// Access token (OAuth1 token or OAuth2 access token).
    pub key: String,
    /// Token secret (OAuth1 only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    /// Provider this grant belongs to.
    pub provider_id: String,
    /// Scope breadth the grant was requested with.
    #[serde(default)]
    pub permission: Permission,
    /// Token lifetime in seconds, as reported by the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    /// Refresh token, when issued.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Provider-specific extras.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl AccessGrant {
    /// Create a grant holding only a key.
    pub fn new(provider_id: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: None,
            provider_id: provider_id.into(),
            permission: Permission::Default,
            expires_in: None,
            refresh_token: None,
            attributes: BTreeMap::new(),
        }
    }

    /// Set token secret.
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// Set permission.
    pub fn with_permission(mut self, permission: Permission) -> Self {
        self.permission = permission;
        self
    }

    /// Set an attribute; documented keys land in their first-class field.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<AttributeValue>) {
        let name = name.into();
        let value = value.into();
        match name.as_str() {
            EXPIRES if value.as_i64().is_some() => self.expires_in = value.as_i64(),
            REFRESH_TOKEN => self.refresh_token = Some(value.to_string()),
            _ => {
                self.attributes.insert(name, value);
            }
        }
    }

    /// Read an attribute, including the documented first-class keys.
    pub fn attribute(&self, name: &str) -> Option<AttributeValue> {
        match name {
            EXPIRES => self.expires_in.map(AttributeValue::Integer),
            REFRESH_TOKEN => self.refresh_token.clone().map(AttributeValue::Text),
            _ => self.attributes.get(name).cloned(),
        }
    }

    /// Text attribute shortcut.
    pub fn text_attribute(&self, name: &str) -> Option<String> {
        self.attribute(name).map(|value| value.to_string())
    }

    /// True for identity-only grants that carry no API token.
    pub fn is_authenticate_only(&self) -> bool {
        self.key.is_empty()
    }

    /// Flat key-value export for callers persisting the grant.
    pub fn to_key_values(&self) -> BTreeMap<String, String> {
        let mut values = BTreeMap::new();
        values.insert("key".to_string(), self.key.clone());
        if let Some(secret) = &self.secret {
            values.insert("secret".to_string(), secret.clone());
        }
        values.insert("provider_id".to_string(), self.provider_id.clone());
        values.insert("permission".to_string(), self.permission.as_str().to_string());
        if let Some(expires_in) = self.expires_in {
            values.insert(format!("{}{}", ATTRIBUTE_PREFIX, EXPIRES), expires_in.to_string());
        }
        if let Some(refresh_token) = &self.refresh_token {
            values.insert(
                format!("{}{}", ATTRIBUTE_PREFIX, REFRESH_TOKEN),
                refresh_token.clone(),
            );
        }
        for (name, value) in &self.attributes {
            values.insert(format!("{}{}", ATTRIBUTE_PREFIX, name), value.to_string());
        }
        values
    }

    /// Rebuild a grant from `to_key_values` output.
    ///
    /// Numeric attribute text comes back as `AttributeValue::Integer`.
    pub fn from_key_values(values: &BTreeMap<String, String>) -> SocialAuthResult<Self> {
        let required = |field: &str| {
            values.get(field).cloned().ok_or_else(|| {
                SocialAuthError::Configuration(ConfigurationError::MissingField {
                    field: field.to_string(),
                })
            })
        };

        let mut grant = Self::new(required("provider_id")?, required("key")?);
        grant.secret = values.get("secret").cloned();
        if let Some(permission) = values.get("permission") {
            grant.permission = permission.parse()?;
        }

        for (name, value) in values {
            if let Some(attribute) = name.strip_prefix(ATTRIBUTE_PREFIX) {
                grant.set_attribute(attribute, AttributeValue::from_flat(value));
            }
        }

        Ok(grant)
    }
}

impl fmt::Debug for AccessGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessGrant")
            .field("key", &"[REDACTED]")
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .field("provider_id", &self.provider_id)
            .field("permission", &self.permission)
            .field("expires_in", &self.expires_in)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("attributes", &self.attributes)
            .finish()
    }
}
