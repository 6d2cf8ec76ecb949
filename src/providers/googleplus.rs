//! Google+ adapter (OAuth 2.0 with JSON token bodies).

use async_trait::async_trait;
use serde_json::Value;

use crate::core::consumer::{OAuthConsumer, SharedTransport, SigningMode, TokenPlacement};
use crate::error::SocialAuthResult;
use crate::providers::google::{parse_contacts_feed, CONTACTS_URL};
use crate::providers::{endpoint, json_str, token_placement, AuthProvider, ProviderBase, Scopes};
use crate::strategy::{OAuth2Endpoints, OAuth2Strategy, Strategy};
use crate::types::{Contact, OAuthConfig, Profile};

const PROVIDER_ID: &str = "googleplus";
const AUTHORIZATION_URL: &str = "https://accounts.google.com/o/oauth2/auth";
const ACCESS_TOKEN_URL: &str = "https://accounts.google.com/o/oauth2/token";
const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v1/userinfo";

const SCOPES: Scopes = Scopes {
    default: "https://www.googleapis.com/auth/userinfo.profile https://www.googleapis.com/auth/userinfo.email https://www.google.com/m8/feeds/",
    all: "https://www.googleapis.com/auth/userinfo.profile https://www.googleapis.com/auth/userinfo.email https://www.googleapis.com/auth/plus.me https://www.google.com/m8/feeds/",
    authenticate_only: Some("https://www.googleapis.com/auth/userinfo.profile"),
};

#[derive(Debug)]
pub struct GooglePlusProvider {
    base: ProviderBase,
}

impl GooglePlusProvider {
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
        )
        .authorization_param("access_type", "offline");
        let strategy = Strategy::OAuth2(OAuth2Strategy::new(consumer, endpoints));

        Self {
            base: ProviderBase::new(strategy, config, SCOPES, &[]),
        }
    }
}

#[async_trait]
impl AuthProvider for GooglePlusProvider {
    fn base(&self) -> &ProviderBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ProviderBase {
        &mut self.base
    }

    async fn fetch_profile(&self) -> SocialAuthResult<Profile> {
        let json = self.base.get_json(USERINFO_URL).await?;
        Ok(parse_userinfo(&json))
    }

    async fn contact_list(&self) -> SocialAuthResult<Vec<Contact>> {
        let feed = self.base.get_xml(CONTACTS_URL).await?;
        Ok(parse_contacts_feed(&feed))
    }
}

fn parse_userinfo(json: &Value) -> Profile {
    Profile {
        provider_id: Some(PROVIDER_ID.to_string()),
        validated_id: json_str(json, &["id"]),
        first_name: json_str(json, &["given_name"]),
        last_name: json_str(json, &["family_name"]),
        full_name: json_str(json, &["name"]),
        email: json_str(json, &["email"]),
        gender: json_str(json, &["gender"]),
        language: json_str(json, &["locale"]),
        profile_image_url: json_str(json, &["picture"]),
        ..Default::default()
    }
}
