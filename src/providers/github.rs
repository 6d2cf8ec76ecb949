//! GitHub adapter (OAuth 2.0, bearer header token).

use async_trait::async_trait;
use serde_json::Value;

use crate::core::consumer::{OAuthConsumer, SharedTransport, SigningMode, TokenPlacement};
use crate::error::SocialAuthResult;
use crate::providers::{endpoint, json_str, token_placement, AuthProvider, ProviderBase, Scopes};
use crate::strategy::{OAuth2Endpoints, OAuth2Strategy, Strategy};
use crate::types::{Contact, OAuthConfig, Profile};

const PROVIDER_ID: &str = "github";
const AUTHORIZATION_URL: &str = "https://github.com/login/oauth/authorize";
const ACCESS_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const API_URL: &str = "https://api.github.com";

const SCOPES: Scopes = Scopes {
    default: "user:email",
    all: "user repo",
    authenticate_only: None,
};

#[derive(Debug)]
pub struct GitHubProvider {
    base: ProviderBase,
}

impl GitHubProvider {
    pub fn new(config: OAuthConfig, transport: SharedTransport) -> Self {
        let bearer = TokenPlacement::Header {
            scheme: "Bearer".to_string(),
        };
        let consumer = OAuthConsumer::new(
            PROVIDER_ID,
            config.consumer_key.clone(),
            config.consumer_secret.clone(),
            SigningMode::OAuth2(token_placement(&config, bearer)),
            transport,
        );
        let endpoints = OAuth2Endpoints::new(
            endpoint(&config.authentication_url, AUTHORIZATION_URL),
            endpoint(&config.access_token_url, ACCESS_TOKEN_URL),
        );
        let strategy = Strategy::OAuth2(OAuth2Strategy::new(consumer, endpoints));

        // The API rejects requests without a User-Agent.
        let base = ProviderBase::new(strategy, config, SCOPES, &[])
            .with_default_header("User-Agent", concat!("social-auth/", env!("CARGO_PKG_VERSION")))
            .with_default_header("Accept", "application/vnd.github+json");
        Self { base }
    }
}

#[async_trait]
impl AuthProvider for GitHubProvider {
    fn base(&self) -> &ProviderBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ProviderBase {
        &mut self.base
    }

    async fn fetch_profile(&self) -> SocialAuthResult<Profile> {
        let json = self.base.get_json(&format!("{}/user", API_URL)).await?;
        Ok(parse_profile(&json))
    }

    async fn contact_list(&self) -> SocialAuthResult<Vec<Contact>> {
        let json = self
            .base
            .get_json(&format!("{}/user/following?per_page=100", API_URL))
            .await?;
        Ok(json
            .as_array()
            .map(|users| users.iter().map(parse_contact).collect())
            .unwrap_or_default())
    }
}

fn parse_profile(json: &Value) -> Profile {
    let mut profile = Profile {
        provider_id: Some(PROVIDER_ID.to_string()),
        validated_id: json_str(json, &["id"]),
        display_name: json_str(json, &["login"]),
        email: json_str(json, &["email"]),
        location: json_str(json, &["location"]),
        profile_image_url: json_str(json, &["avatar_url"]),
        ..Default::default()
    };
    if let Some(name) = json_str(json, &["name"]) {
        profile.set_full_name(&name);
    }
    if let Some(blog) = json_str(json, &["blog"]) {
        profile.contact_info.insert("blog".to_string(), blog);
    }
    profile
}

fn parse_contact(user: &Value) -> Contact {
    Contact {
        id: json_str(user, &["id"]),
        display_name: json_str(user, &["login"]),
        profile_url: json_str(user, &["html_url"]),
        profile_image_url: json_str(user, &["avatar_url"]),
        ..Default::default()
    }
}
