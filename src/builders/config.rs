//! Configuration Builder
//!
//! Fluent builder for per-provider consumer configuration.

use secrecy::SecretString;
use url::Url;

use crate::error::{ConfigurationError, SocialAuthError};
use crate::types::{Capability, OAuthConfig};

/// Provider configuration builder.
#[derive(Default)]
pub struct OAuthConfigBuilder {
    consumer_key: Option<String>,
    consumer_secret: Option<SecretString>,
    authentication_url: Option<String>,
    request_token_url: Option<String>,
    access_token_url: Option<String>,
    custom_permissions: Option<String>,
    access_token_parameter_name: Option<String>,
    plugins: Option<Vec<Capability>>,
}

impl OAuthConfigBuilder {
    /// Create new configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set consumer key (OAuth2 client id).
    pub fn consumer_key(mut self, consumer_key: impl Into<String>) -> Self {
        self.consumer_key = Some(consumer_key.into());
        self
    }

    /// Set consumer secret (OAuth2 client secret).
    pub fn consumer_secret(mut self, consumer_secret: impl Into<String>) -> Self {
        self.consumer_secret = Some(SecretString::new(consumer_secret.into()));
        self
    }

    /// Override the authorization endpoint.
    pub fn authentication_url(mut self, url: impl Into<String>) -> Self {
        self.authentication_url = Some(url.into());
        self
    }

    /// Override the request token endpoint.
    pub fn request_token_url(mut self, url: impl Into<String>) -> Self {
        self.request_token_url = Some(url.into());
        self
    }

    /// Override the access token endpoint.
    pub fn access_token_url(mut self, url: impl Into<String>) -> Self {
        self.access_token_url = Some(url.into());
        self
    }

    /// Scope used with `Permission::Custom`.
    pub fn custom_permissions(mut self, scope: impl Into<String>) -> Self {
        self.custom_permissions = Some(scope.into());
        self
    }

    /// Query parameter carrying the OAuth2 access token.
    pub fn access_token_parameter_name(mut self, name: impl Into<String>) -> Self {
        self.access_token_parameter_name = Some(name.into());
        self
    }

    /// Replace the registered plugin list.
    pub fn plugins(mut self, plugins: Vec<Capability>) -> Self {
        self.plugins = Some(plugins);
        self
    }

    /// Register a single plugin.
    pub fn add_plugin(mut self, plugin: Capability) -> Self {
        let plugins = self.plugins.get_or_insert_with(Vec::new);
        if !plugins.contains(&plugin) {
            plugins.push(plugin);
        }
        self
    }

    /// Build the configuration.
    pub fn build(self) -> Result<OAuthConfig, SocialAuthError> {
        let consumer_key = self.consumer_key.filter(|k| !k.is_empty()).ok_or_else(|| {
            SocialAuthError::Configuration(ConfigurationError::MissingField {
                field: "consumer_key".to_string(),
            })
        })?;

        let consumer_secret = self.consumer_secret.ok_or_else(|| {
            SocialAuthError::Configuration(ConfigurationError::MissingField {
                field: "consumer_secret".to_string(),
            })
        })?;

        for endpoint in [
            &self.authentication_url,
            &self.request_token_url,
            &self.access_token_url,
        ]
        .into_iter()
        .flatten()
        {
            validate_endpoint(endpoint)?;
        }

        Ok(OAuthConfig {
            consumer_key,
            consumer_secret,
            authentication_url: self.authentication_url,
            request_token_url: self.request_token_url,
            access_token_url: self.access_token_url,
            custom_permissions: self.custom_permissions,
            access_token_parameter_name: self.access_token_parameter_name,
            plugins: self.plugins,
        })
    }
}

fn validate_endpoint(endpoint: &str) -> Result<(), SocialAuthError> {
    match Url::parse(endpoint) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => Ok(()),
        _ => Err(SocialAuthError::Configuration(
            ConfigurationError::InvalidEndpoint {
                url: endpoint.to_string(),
            },
        )),
    }
}

/// Create a new provider configuration builder.
pub fn oauth_config() -> OAuthConfigBuilder {
    OAuthConfigBuilder::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_success() {
        let config = OAuthConfigBuilder::new()
            .consumer_key("test-key")
            .consumer_secret("test-secret")
            .authentication_url("https://provider/auth")
            .custom_permissions("read")
            .add_plugin(Capability::Feed)
            .add_plugin(Capability::Feed)
            .build()
            .unwrap();

        assert_eq!(config.consumer_key, "test-key");
        assert_eq!(config.authentication_url.as_deref(), Some("https://provider/auth"));
        assert_eq!(config.custom_permissions.as_deref(), Some("read"));
        assert_eq!(config.plugins, Some(vec![Capability::Feed]));
    }

    #[test]
    fn test_builder_missing_consumer_key() {
        let result = OAuthConfigBuilder::new().consumer_secret("test-secret").build();

        assert!(matches!(
            result,
            Err(SocialAuthError::Configuration(ConfigurationError::MissingField { ref field }))
                if field == "consumer_key"
        ));
    }

    #[test]
    fn test_builder_missing_secret() {
        let result = OAuthConfigBuilder::new().consumer_key("test-key").build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_rejects_invalid_endpoint() {
        let result = oauth_config()
            .consumer_key("test-key")
            .consumer_secret("test-secret")
            .access_token_url("not a url")
            .build();

        assert!(matches!(
            result,
            Err(SocialAuthError::Configuration(ConfigurationError::InvalidEndpoint { .. }))
        ));
    }
}
