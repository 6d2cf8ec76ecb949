//! Twitter REST 1.1 adapter (OAuth 1.0a, JSON).

use async_trait::async_trait;
use serde_json::Value;

use crate::core::consumer::{ApiRequest, OAuthConsumer, SharedTransport, SigningMode};
use crate::error::SocialAuthResult;
use crate::providers::{
    endpoint, json_array, json_str, parse_timestamp, AuthProvider, FeedPlugin, ImageUpload,
    ProviderBase, Scopes,
};
use crate::strategy::{OAuth1Endpoints, OAuth1Strategy, Strategy};
use crate::types::{Capability, Contact, Feed, OAuthConfig, Profile};

const PROVIDER_ID: &str = "twitter";
const REQUEST_TOKEN_URL: &str = "https://api.twitter.com/oauth/request_token";
const AUTHORIZATION_URL: &str = "https://api.twitter.com/oauth/authenticate";
const ACCESS_TOKEN_URL: &str = "https://api.twitter.com/oauth/access_token";
const API_URL: &str = "https://api.twitter.com/1.1";

// Twitter has no scopes; access level is fixed per application.
const SCOPES: Scopes = Scopes {
    default: "",
    all: "",
    authenticate_only: None,
};

const CREATED_AT_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

#[derive(Debug)]
pub struct TwitterProvider {
    base: ProviderBase,
}

impl TwitterProvider {
    pub fn new(config: OAuthConfig, transport: SharedTransport) -> Self {
        let consumer = OAuthConsumer::new(
            PROVIDER_ID,
            config.consumer_key.clone(),
            config.consumer_secret.clone(),
            SigningMode::OAuth1,
            transport,
        );
        let endpoints = OAuth1Endpoints {
            request_token_url: endpoint(&config.request_token_url, REQUEST_TOKEN_URL),
            authorization_url: endpoint(&config.authentication_url, AUTHORIZATION_URL),
            access_token_url: endpoint(&config.access_token_url, ACCESS_TOKEN_URL),
        };
        let strategy = Strategy::OAuth1(OAuth1Strategy::new(consumer, endpoints));

        Self {
            base: ProviderBase::new(strategy, config, SCOPES, &[Capability::Feed]),
        }
    }
}

#[async_trait]
impl AuthProvider for TwitterProvider {
    fn base(&self) -> &ProviderBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ProviderBase {
        &mut self.base
    }

    async fn fetch_profile(&self) -> SocialAuthResult<Profile> {
        let json = self
            .base
            .get_json(&format!("{}/account/verify_credentials.json", API_URL))
            .await?;
        Ok(parse_profile(&json))
    }

    async fn contact_list(&self) -> SocialAuthResult<Vec<Contact>> {
        let json = self
            .base
            .get_json(&format!("{}/friends/list.json?count=200&skip_status=true", API_URL))
            .await?;
        Ok(parse_contacts(&json))
    }

    async fn update_status(&self, message: &str) -> SocialAuthResult<()> {
        tracing::info!(provider = PROVIDER_ID, "updating status");
        self.base
            .execute(
                ApiRequest::post(format!("{}/statuses/update.json", API_URL))
                    .param("status", message),
            )
            .await?;
        Ok(())
    }

    async fn upload_image(&self, message: &str, image: ImageUpload) -> SocialAuthResult<()> {
        tracing::info!(provider = PROVIDER_ID, file = %image.file_name, "uploading image");
        self.base
            .upload(
                &format!("{}/statuses/update_with_media.json", API_URL),
                vec![("status".to_string(), message.to_string())],
                image.into_part("media[]"),
            )
            .await?;
        Ok(())
    }

    fn feed_plugin(&self) -> SocialAuthResult<Box<dyn FeedPlugin + '_>> {
        self.base.require_plugin(Capability::Feed)?;
        Ok(Box::new(TwitterTimeline { base: &self.base }))
    }
}

struct TwitterTimeline<'a> {
    base: &'a ProviderBase,
}

#[async_trait]
impl FeedPlugin for TwitterTimeline<'_> {
    async fn feeds(&self) -> SocialAuthResult<Vec<Feed>> {
        let json = self
            .base
            .get_json(&format!("{}/statuses/user_timeline.json?count=50", API_URL))
            .await?;
        Ok(parse_timeline(&json))
    }
}

fn parse_profile(json: &Value) -> Profile {
    let mut profile = Profile {
        provider_id: Some(PROVIDER_ID.to_string()),
        validated_id: json_str(json, &["id_str"]).or_else(|| json_str(json, &["id"])),
        display_name: json_str(json, &["screen_name"]),
        location: json_str(json, &["location"]),
        language: json_str(json, &["lang"]),
        profile_image_url: json_str(json, &["profile_image_url_https"])
            .or_else(|| json_str(json, &["profile_image_url"])),
        ..Default::default()
    };
    if let Some(name) = json_str(json, &["name"]) {
        profile.set_full_name(&name);
    }
    profile
}

fn parse_contacts(json: &Value) -> Vec<Contact> {
    json_array(json, &["users"])
        .iter()
        .map(|user| {
            let screen_name = json_str(user, &["screen_name"]);
            let (first_name, last_name) = match json_str(user, &["name"]) {
                Some(name) => {
                    let (first, last) = crate::types::split_full_name(&name);
                    (Some(first), last)
                }
                None => (None, None),
            };
            Contact {
                id: json_str(user, &["id_str"]).or_else(|| json_str(user, &["id"])),
                first_name,
                last_name,
                profile_url: screen_name
                    .as_deref()
                    .map(|name| format!("https://twitter.com/{}", name)),
                display_name: screen_name,
                profile_image_url: json_str(user, &["profile_image_url_https"])
                    .or_else(|| json_str(user, &["profile_image_url"])),
                ..Default::default()
            }
        })
        .collect()
}

fn parse_timeline(json: &Value) -> Vec<Feed> {
    json.as_array()
        .map(Vec::as_slice)
        .unwrap_or(&[])
        .iter()
        .map(|tweet| Feed {
            id: json_str(tweet, &["id_str"]).or_else(|| json_str(tweet, &["id"])),
            from: json_str(tweet, &["user", "name"]),
            screen_name: json_str(tweet, &["user", "screen_name"]),
            message: json_str(tweet, &["text"]),
            created_at: json_str(tweet, &["created_at"])
                .and_then(|t| parse_timestamp(&t, CREATED_AT_FORMAT)),
        })
        .collect()
}
