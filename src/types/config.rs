//! Configuration Types
//!
//! Per-provider consumer configuration and the provider registry configuration.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::builders::OAuthConfigBuilder;
use crate::error::{ConfigurationError, SocialAuthError, SocialAuthResult};

/// Requested OAuth scope breadth.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Every scope the integration can use.
    All,
    /// The provider's default scope set.
    #[default]
    Default,
    /// Identify the user only, no API access.
    AuthenticateOnly,
    /// The scope string configured in `custom_permissions`.
    Custom,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Default => "default",
            Self::AuthenticateOnly => "authenticate_only",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = SocialAuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "default" => Ok(Self::Default),
            "authenticate_only" => Ok(Self::AuthenticateOnly),
            "custom" => Ok(Self::Custom),
            other => Err(SocialAuthError::Configuration(
                ConfigurationError::InvalidValue {
                    field: "permission".to_string(),
                    value: other.to_string(),
                },
            )),
        }
    }
}

/// Optional provider capability beyond profile and contacts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Feed,
    Album,
    Career,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Feed => "feed",
            Self::Album => "album",
            Self::Career => "career",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = SocialAuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Accept both `feed` and legacy class-style names such as `FeedPluginImpl`.
        let name = s.trim().rsplit('.').next().unwrap_or_default().to_ascii_lowercase();
        if name.starts_with("feed") {
            Ok(Self::Feed)
        } else if name.starts_with("album") {
            Ok(Self::Album)
        } else if name.starts_with("career") {
            Ok(Self::Career)
        } else {
            Err(SocialAuthError::Configuration(
                ConfigurationError::InvalidValue {
                    field: "plugin".to_string(),
                    value: s.trim().to_string(),
                },
            ))
        }
    }
}

/// Static configuration for one provider.
#[derive(Clone)]
pub struct OAuthConfig {
    /// Consumer key / client id.
    pub consumer_key: String,
    /// Consumer secret / client secret.
    pub consumer_secret: SecretString,
    /// Authorization endpoint override.
    pub authentication_url: Option<String>,
    /// Request token endpoint override (OAuth1).
    pub request_token_url: Option<String>,
    /// Access token endpoint override.
    pub access_token_url: Option<String>,
    /// Scope requested for `Permission::Custom`.
    pub custom_permissions: Option<String>,
    /// Name of the OAuth2 access token query parameter.
    pub access_token_parameter_name: Option<String>,
    /// Registered plugins; `None` enables everything the provider supports.
    pub plugins: Option<Vec<Capability>>,
}

impl OAuthConfig {
    /// Start a configuration builder.
    pub fn builder() -> OAuthConfigBuilder {
        OAuthConfigBuilder::new()
    }

    /// Check whether a plugin is registered.
    pub fn is_plugin_registered(&self, capability: Capability) -> bool {
        self.plugins
            .as_ref()
            .map(|plugins| plugins.contains(&capability))
            .unwrap_or(true)
    }
}

impl fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"[REDACTED]")
            .field("authentication_url", &self.authentication_url)
            .field("request_token_url", &self.request_token_url)
            .field("access_token_url", &self.access_token_url)
            .field("custom_permissions", &self.custom_permissions)
            .field("access_token_parameter_name", &self.access_token_parameter_name)
            .field("plugins", &self.plugins)
            .finish()
    }
}

/// Registry configuration: provider id to consumer configuration.
#[derive(Clone, Debug, Default)]
pub struct SocialAuthConfig {
    providers: HashMap<String, OAuthConfig>,
}

impl SocialAuthConfig {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a provider configuration.
    pub fn with_provider(mut self, provider_id: impl Into<String>, config: OAuthConfig) -> Self {
        self.add_provider(provider_id, config);
        self
    }

    /// Add or replace a provider configuration.
    pub fn add_provider(&mut self, provider_id: impl Into<String>, config: OAuthConfig) {
        self.providers.insert(provider_id.into(), config);
    }

    /// Look up a provider configuration by the key it was registered under.
    pub fn get(&self, provider_id: &str) -> Option<&OAuthConfig> {
        self.providers.get(provider_id)
    }

    /// Registered keys.
    pub fn provider_ids(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    /// Parse the `<provider>.<key> = <value>` properties format.
    ///
    /// The provider prefix may itself contain dots (`graph.facebook.com.consumer_key`).
    pub fn from_properties(text: &str) -> SocialAuthResult<Self> {
        let mut builders: Vec<(String, OAuthConfigBuilder)> = Vec::new();

        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }

            let (name, value) = line
                .split_once('=')
                .or_else(|| line.split_once(':'))
                .ok_or_else(|| {
                    SocialAuthError::Configuration(ConfigurationError::InvalidProperty {
                        line: index + 1,
                        message: "expected `name = value`".to_string(),
                    })
                })?;
            let (prefix, key) = name.trim().rsplit_once('.').ok_or_else(|| {
                SocialAuthError::Configuration(ConfigurationError::InvalidProperty {
                    line: index + 1,
                    message: format!("property `{}` has no provider prefix", name.trim()),
                })
            })?;
            let value = value.trim();

            let position = match builders.iter().position(|(p, _)| p == prefix) {
                Some(position) => position,
                None => {
                    builders.push((prefix.to_string(), OAuthConfigBuilder::new()));
                    builders.len() - 1
                }
            };
            let (_, builder) = builders.remove(position);

            let builder = match key {
                "consumer_key" => builder.consumer_key(value),
                "consumer_secret" => builder.consumer_secret(value),
                "custom_permissions" => builder.custom_permissions(value),
                "authentication_url" => builder.authentication_url(value),
                "request_token_url" => builder.request_token_url(value),
                "access_token_url" => builder.access_token_url(value),
                "access_token_parameter_name" => builder.access_token_parameter_name(value),
                "plugins" => {
                    let mut builder = builder.plugins(Vec::new());
                    for plugin in value.split(',').filter(|p| !p.trim().is_empty()) {
                        builder = builder.add_plugin(plugin.parse()?);
                    }
                    builder
                }
                other => {
                    tracing::warn!(line = index + 1, key = other, "ignoring unknown configuration key");
                    builder
                }
            };
            builders.insert(position, (prefix.to_string(), builder));
        }

        let mut config = Self::new();
        for (prefix, builder) in builders {
            config.add_provider(prefix, builder.build()?);
        }
        Ok(config)
    }
}
