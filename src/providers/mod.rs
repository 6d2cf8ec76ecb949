//! Provider Adapters
//!
//! One adapter per external service. Each binds a [`Strategy`] to that
//! service's endpoints and turns its wire format into the common entities.
//! Optional capabilities (feeds, albums, career data) are plugins obtained
//! through capability queries on the [`AuthProvider`] contract.

mod facebook;
mod github;
mod google;
mod googleplus;
mod instagram;
mod linkedin;
mod twitter;

pub use facebook::FacebookProvider;
pub use github::GitHubProvider;
pub use google::GoogleProvider;
pub use googleplus::GooglePlusProvider;
pub use instagram::InstagramProvider;
pub use linkedin::LinkedInProvider;
pub use twitter::TwitterProvider;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::core::consumer::{ApiRequest, SharedTransport, TokenPlacement};
use crate::core::encoding::parse_json;
use crate::core::transport::{FilePart, HttpResponse};
use crate::core::xml::{parse_document, XmlElement};
use crate::error::{
    unsupported, ConfigurationError, SocialAuthError, SocialAuthResult, StateError,
    UnsupportedError,
};
use crate::strategy::Strategy;
use crate::types::{
    AccessGrant, Album, CallbackParams, Capability, Career, Contact, Feed, OAuthConfig,
    Permission, Profile,
};

/// Image handed to [`AuthProvider::upload_image`].
#[derive(Clone, Debug)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    fn into_part(self, field_name: &str) -> FilePart {
        FilePart {
            field_name: field_name.to_string(),
            file_name: self.file_name,
            content_type: self.content_type,
            bytes: self.bytes,
        }
    }
}

/// Status/feed retrieval.
#[async_trait]
pub trait FeedPlugin: Send + Sync {
    async fn feeds(&self) -> SocialAuthResult<Vec<Feed>>;
}

/// Photo album retrieval.
#[async_trait]
pub trait AlbumPlugin: Send + Sync {
    async fn albums(&self) -> SocialAuthResult<Vec<Album>>;
}

/// Career data retrieval.
#[async_trait]
pub trait CareerPlugin: Send + Sync {
    async fn career_details(&self) -> SocialAuthResult<Career>;
}

/// Scope strings a provider requests for each permission level.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Scopes {
    pub default: &'static str,
    pub all: &'static str,
    pub authenticate_only: Option<&'static str>,
}

/// State shared by every adapter: strategy, configuration and the cached profile.
#[derive(Debug)]
pub struct ProviderBase {
    strategy: Strategy,
    config: OAuthConfig,
    scopes: Scopes,
    supported: &'static [Capability],
    default_headers: Vec<(&'static str, &'static str)>,
    profile: Option<Profile>,
}

impl ProviderBase {
    pub(crate) fn new(
        strategy: Strategy,
        config: OAuthConfig,
        scopes: Scopes,
        supported: &'static [Capability],
    ) -> Self {
        Self {
            strategy: strategy.with_scope(scopes.default),
            config,
            scopes,
            supported,
            default_headers: Vec::new(),
            profile: None,
        }
    }

    /// Headers added to every API call.
    pub(crate) fn with_default_header(mut self, name: &'static str, value: &'static str) -> Self {
        self.default_headers.push((name, value));
        self
    }

    pub fn provider_id(&self) -> &str {
        self.strategy.provider_id()
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    pub(crate) fn scope_for(&self, permission: Permission) -> Option<String> {
        match permission {
            Permission::Default => Some(self.scopes.default.to_string()),
            Permission::All => Some(self.scopes.all.to_string()),
            Permission::AuthenticateOnly => self.scopes.authenticate_only.map(str::to_string),
            Permission::Custom => self
                .config
                .custom_permissions
                .clone()
                .or_else(|| Some(self.scopes.default.to_string())),
        }
    }

    pub(crate) fn plugin_enabled(&self, capability: Capability) -> bool {
        self.supported.contains(&capability) && self.config.is_plugin_registered(capability)
    }

    /// Error unless `capability` is supported and registered.
    pub(crate) fn require_plugin(&self, capability: Capability) -> SocialAuthResult<()> {
        if self.plugin_enabled(capability) {
            Ok(())
        } else {
            Err(capability_unavailable(self.provider_id(), capability))
        }
    }

    pub async fn execute(&self, mut request: ApiRequest) -> SocialAuthResult<HttpResponse> {
        for (name, value) in &self.default_headers {
            request
                .headers
                .entry(name.to_string())
                .or_insert_with(|| value.to_string());
        }
        self.strategy.execute(request).await
    }

    pub(crate) async fn get_json(&self, url: &str) -> SocialAuthResult<serde_json::Value> {
        let response = self.execute(ApiRequest::get(url)).await?;
        parse_json(url, &response.body)
    }

    pub(crate) async fn get_xml(&self, url: &str) -> SocialAuthResult<XmlElement> {
        let response = self.execute(ApiRequest::get(url)).await?;
        parse_document(&response.body)
    }

    pub(crate) async fn upload(
        &self,
        url: &str,
        fields: Vec<(String, String)>,
        file: FilePart,
    ) -> SocialAuthResult<HttpResponse> {
        self.execute(ApiRequest::post(url).params(fields).file(file))
            .await
    }
}

/// Common contract of every provider adapter.
#[async_trait]
pub trait AuthProvider: Send + Sync + fmt::Debug {
    fn base(&self) -> &ProviderBase;

    fn base_mut(&mut self) -> &mut ProviderBase;

    /// Fetch and parse the user's profile from the provider.
    async fn fetch_profile(&self) -> SocialAuthResult<Profile>;

    async fn contact_list(&self) -> SocialAuthResult<Vec<Contact>>;

    fn provider_id(&self) -> &str {
        self.base().provider_id()
    }

    fn strategy(&self) -> &Strategy {
        self.base().strategy()
    }

    fn permission(&self) -> Permission {
        self.base().strategy.permission()
    }

    /// Choose the scope breadth for the next login; only before the redirect.
    fn set_permission(&mut self, permission: Permission) -> SocialAuthResult<()> {
        let scope = self.base().scope_for(permission);
        self.base_mut().strategy.set_permission(permission, scope)
    }

    async fn login_redirect_url(&mut self, success_url: &str) -> SocialAuthResult<String> {
        self.base_mut().strategy.login_redirect_url(success_url).await
    }

    /// Verify the callback, then fetch and cache the profile.
    async fn verify_response(&mut self, params: &CallbackParams) -> SocialAuthResult<Profile> {
        self.base_mut().strategy.verify_response(params).await?;
        let profile = self.fetch_profile().await?;
        self.base_mut().profile = Some(profile.clone());
        Ok(profile)
    }

    /// Cached profile, fetched on first use.
    async fn user_profile(&mut self) -> SocialAuthResult<Profile> {
        if let Some(profile) = &self.base().profile {
            return Ok(profile.clone());
        }
        if self.access_grant().is_none() {
            return Err(StateError::NotVerified {
                provider_id: self.provider_id().to_string(),
            }
            .into());
        }
        let profile = self.fetch_profile().await?;
        self.base_mut().profile = Some(profile.clone());
        Ok(profile)
    }

    async fn update_status(&self, _message: &str) -> SocialAuthResult<()> {
        Err(unsupported(self.provider_id(), "update_status"))
    }

    async fn upload_image(&self, _message: &str, _image: ImageUpload) -> SocialAuthResult<()> {
        Err(unsupported(self.provider_id(), "upload_image"))
    }

    /// Raw authenticated call for endpoints the adapter does not wrap.
    async fn api(&self, request: ApiRequest) -> SocialAuthResult<HttpResponse> {
        self.base().execute(request).await
    }

    fn access_grant(&self) -> Option<&AccessGrant> {
        self.base().strategy.access_grant()
    }

    fn set_access_grant(&mut self, grant: AccessGrant) -> SocialAuthResult<()> {
        let base = self.base_mut();
        base.strategy.set_access_grant(grant)?;
        base.profile = None;
        Ok(())
    }

    fn logout(&mut self) {
        let base = self.base_mut();
        base.strategy.logout();
        base.profile = None;
    }

    fn is_supported_plugin(&self, capability: Capability) -> bool {
        self.base().plugin_enabled(capability)
    }

    fn feed_plugin(&self) -> SocialAuthResult<Box<dyn FeedPlugin + '_>> {
        Err(capability_unavailable(self.provider_id(), Capability::Feed))
    }

    fn album_plugin(&self) -> SocialAuthResult<Box<dyn AlbumPlugin + '_>> {
        Err(capability_unavailable(self.provider_id(), Capability::Album))
    }

    fn career_plugin(&self) -> SocialAuthResult<Box<dyn CareerPlugin + '_>> {
        Err(capability_unavailable(self.provider_id(), Capability::Career))
    }
}

fn capability_unavailable(provider_id: &str, capability: Capability) -> SocialAuthError {
    SocialAuthError::Unsupported(UnsupportedError::Capability {
        provider_id: provider_id.to_string(),
        capability: capability.to_string(),
    })
}

/// Supported providers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Facebook,
    Twitter,
    LinkedIn,
    Google,
    GooglePlus,
    Instagram,
    GitHub,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 7] = [
        Self::Facebook,
        Self::Twitter,
        Self::LinkedIn,
        Self::Google,
        Self::GooglePlus,
        Self::Instagram,
        Self::GitHub,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Self::Facebook => "facebook",
            Self::Twitter => "twitter",
            Self::LinkedIn => "linkedin",
            Self::Google => "google",
            Self::GooglePlus => "googleplus",
            Self::Instagram => "instagram",
            Self::GitHub => "github",
        }
    }

    /// Host-style alias accepted in configuration files.
    pub fn alias(&self) -> &'static str {
        match self {
            Self::Facebook => "graph.facebook.com",
            Self::Twitter => "api.twitter.com",
            Self::LinkedIn => "api.linkedin.com",
            Self::Google => "www.google.com",
            Self::GooglePlus => "googleapis.com",
            Self::Instagram => "api.instagram.com",
            Self::GitHub => "api.github.com",
        }
    }

    /// Plugins the adapter implements.
    pub fn supported_plugins(&self) -> &'static [Capability] {
        match self {
            Self::Facebook => &[Capability::Feed, Capability::Album],
            Self::Twitter => &[Capability::Feed],
            Self::LinkedIn => &[Capability::Feed, Capability::Career],
            Self::Google => &[Capability::Album],
            Self::Instagram => &[Capability::Feed, Capability::Album],
            Self::GooglePlus | Self::GitHub => &[],
        }
    }

    /// Build a fresh adapter; every session gets its own instance.
    pub fn create(self, config: OAuthConfig, transport: SharedTransport) -> Box<dyn AuthProvider> {
        match self {
            Self::Facebook => Box::new(FacebookProvider::new(config, transport)),
            Self::Twitter => Box::new(TwitterProvider::new(config, transport)),
            Self::LinkedIn => Box::new(LinkedInProvider::new(config, transport)),
            Self::Google => Box::new(GoogleProvider::new(config, transport)),
            Self::GooglePlus => Box::new(GooglePlusProvider::new(config, transport)),
            Self::Instagram => Box::new(InstagramProvider::new(config, transport)),
            Self::GitHub => Box::new(GitHubProvider::new(config, transport)),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ProviderKind {
    type Err = SocialAuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.id() == key || kind.alias() == key)
            .ok_or_else(|| {
                SocialAuthError::Configuration(ConfigurationError::UnknownProvider {
                    provider_id: s.trim().to_string(),
                })
            })
    }
}

/// Configured endpoint override or the provider default.
pub(crate) fn endpoint(configured: &Option<String>, default: &str) -> String {
    configured.clone().unwrap_or_else(|| default.to_string())
}

/// OAuth2 token placement: a configured parameter name always means query placement.
pub(crate) fn token_placement(config: &OAuthConfig, default: TokenPlacement) -> TokenPlacement {
    match &config.access_token_parameter_name {
        Some(name) => TokenPlacement::QueryParameter(name.clone()),
        None => default,
    }
}

// JSON field helpers. Missing or null fields read as `None`.

pub(crate) fn json_at<'a>(value: &'a serde_json::Value, path: &[&str]) -> Option<&'a serde_json::Value> {
    path.iter()
        .try_fold(value, |current, key| current.get(key))
        .filter(|v| !v.is_null())
}

/// String or number at `path`, as text.
pub(crate) fn json_str(value: &serde_json::Value, path: &[&str]) -> Option<String> {
    match json_at(value, path)? {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn json_u32(value: &serde_json::Value, path: &[&str]) -> Option<u32> {
    match json_at(value, path)? {
        serde_json::Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Elements of the array at `path`; empty when absent.
pub(crate) fn json_array<'a>(value: &'a serde_json::Value, path: &[&str]) -> &'a [serde_json::Value] {
    json_at(value, path)
        .and_then(|v| v.as_array())
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Parse a timestamp in one of the given `chrono` formats.
pub(crate) fn parse_timestamp(value: &str, format: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(value, format)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Unix seconds as text.
pub(crate) fn parse_unix_seconds(value: &str) -> Option<DateTime<Utc>> {
    value
        .parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

#[cfg(test)]
pub(crate) fn test_config() -> OAuthConfig {
    OAuthConfig {
        consumer_key: "consumer-key".to_string(),
        consumer_secret: secrecy::SecretString::new("consumer-secret".to_string()),
        authentication_url: None,
        request_token_url: None,
        access_token_url: None,
        custom_permissions: None,
        access_token_parameter_name: None,
        plugins: None,
    }
}
