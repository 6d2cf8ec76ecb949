//! Instagram adapter (OAuth 2.0 with JSON token bodies).

use async_trait::async_trait;
use serde_json::Value;

use crate::core::consumer::{OAuthConsumer, SharedTransport, SigningMode, TokenPlacement};
use crate::error::SocialAuthResult;
use crate::providers::{
    endpoint, json_array, json_str, parse_unix_seconds, token_placement, AlbumPlugin, AuthProvider,
    FeedPlugin, ProviderBase, Scopes,
};
use crate::strategy::{OAuth2Endpoints, OAuth2Strategy, Strategy};
use crate::types::{Album, Capability, Contact, Feed, OAuthConfig, Photo, Profile};

const PROVIDER_ID: &str = "instagram";
const AUTHORIZATION_URL: &str = "https://api.instagram.com/oauth/authorize/";
const ACCESS_TOKEN_URL: &str = "https://api.instagram.com/oauth/access_token";
const API_URL: &str = "https://api.instagram.com/v1";

const SCOPES: Scopes = Scopes {
    default: "basic",
    all: "basic comments relationships likes",
    authenticate_only: Some("basic"),
};

#[derive(Debug)]
pub struct InstagramProvider {
    base: ProviderBase,
}

impl InstagramProvider {
    pub fn new(config: OAuthConfig, transport: SharedTransport) -> Self {
        let consumer = OAuthConsumer::new(
            PROVIDER_ID,
            config.consumer_key.clone(),
            config.consumer_secret.clone(),
            SigningMode::OAuth2(token_placement(&config, TokenPlacement::default())),
            transport,
        );
        let endpoints = OAuth2Endpoints::new(
            endpoint(&config.authentication_url, AUTHORIZATION_URL),
            endpoint(&config.access_token_url, ACCESS_TOKEN_URL),
        );
        let strategy = Strategy::OAuth2(OAuth2Strategy::new(consumer, endpoints));

        Self {
            base: ProviderBase::new(
                strategy,
                config,
                SCOPES,
                &[Capability::Feed, Capability::Album],
            ),
        }
    }
}

#[async_trait]
impl AuthProvider for InstagramProvider {
    fn base(&self) -> &ProviderBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ProviderBase {
        &mut self.base
    }

    async fn fetch_profile(&self) -> SocialAuthResult<Profile> {
        let json = self
            .base
            .get_json(&format!("{}/users/self", API_URL))
            .await?;
        Ok(parse_profile(&json))
    }

    async fn contact_list(&self) -> SocialAuthResult<Vec<Contact>> {
        let json = self
            .base
            .get_json(&format!("{}/users/self/follows", API_URL))
            .await?;
        Ok(parse_follows(&json))
    }

    fn feed_plugin(&self) -> SocialAuthResult<Box<dyn FeedPlugin + '_>> {
        self.base.require_plugin(Capability::Feed)?;
        Ok(Box::new(InstagramFeed { base: &self.base }))
    }

    fn album_plugin(&self) -> SocialAuthResult<Box<dyn AlbumPlugin + '_>> {
        self.base.require_plugin(Capability::Album)?;
        Ok(Box::new(InstagramRecentMedia { base: &self.base }))
    }
}

struct InstagramFeed<'a> {
    base: &'a ProviderBase,
}

#[async_trait]
impl FeedPlugin for InstagramFeed<'_> {
    async fn feeds(&self) -> SocialAuthResult<Vec<Feed>> {
        let json = self
            .base
            .get_json(&format!("{}/users/self/feed", API_URL))
            .await?;
        Ok(parse_feed(&json))
    }
}

/// Instagram has no albums; recent media is exposed as a single album.
struct InstagramRecentMedia<'a> {
    base: &'a ProviderBase,
}

#[async_trait]
impl AlbumPlugin for InstagramRecentMedia<'_> {
    async fn albums(&self) -> SocialAuthResult<Vec<Album>> {
        let json = self
            .base
            .get_json(&format!("{}/users/self/media/recent", API_URL))
            .await?;
        let photos = parse_media(&json);
        Ok(vec![Album {
            id: Some("recent".to_string()),
            name: Some("Recent Media".to_string()),
            cover_photo: photos.first().and_then(|p| p.thumb_image.clone()),
            photos_count: u32::try_from(photos.len()).ok(),
            link: None,
            photos,
        }])
    }
}

fn parse_profile(json: &Value) -> Profile {
    let data = json.get("data").unwrap_or(json);
    let mut profile = Profile {
        provider_id: Some(PROVIDER_ID.to_string()),
        validated_id: json_str(data, &["id"]),
        display_name: json_str(data, &["username"]),
        profile_image_url: json_str(data, &["profile_picture"]),
        ..Default::default()
    };
    if let Some(name) = json_str(data, &["full_name"]) {
        profile.set_full_name(&name);
    }
    profile
}

fn parse_follows(json: &Value) -> Vec<Contact> {
    json_array(json, &["data"])
        .iter()
        .map(|user| {
            let username = json_str(user, &["username"]);
            let (first_name, last_name) = match json_str(user, &["full_name"]) {
                Some(name) => {
                    let (first, last) = crate::types::split_full_name(&name);
                    (Some(first), last)
                }
                None => (None, None),
            };
            Contact {
                id: json_str(user, &["id"]),
                first_name,
                last_name,
                profile_url: username
                    .as_deref()
                    .map(|name| format!("https://instagram.com/{}", name)),
                display_name: username,
                profile_image_url: json_str(user, &["profile_picture"]),
                ..Default::default()
            }
        })
        .collect()
}

fn parse_feed(json: &Value) -> Vec<Feed> {
    json_array(json, &["data"])
        .iter()
        .map(|item| Feed {
            id: json_str(item, &["id"]),
            from: json_str(item, &["user", "full_name"]),
            screen_name: json_str(item, &["user", "username"]),
            message: json_str(item, &["caption", "text"]),
            created_at: json_str(item, &["created_time"]).and_then(|t| parse_unix_seconds(&t)),
        })
        .collect()
}

fn parse_media(json: &Value) -> Vec<Photo> {
    json_array(json, &["data"])
        .iter()
        .filter(|item| json_str(item, &["type"]).as_deref() != Some("video"))
        .map(|item| Photo {
            id: json_str(item, &["id"]),
            title: json_str(item, &["caption", "text"]),
            link: json_str(item, &["link"]),
            thumb_image: json_str(item, &["images", "thumbnail", "url"]),
            small_image: json_str(item, &["images", "low_resolution", "url"]),
            medium_image: json_str(item, &["images", "standard_resolution", "url"]),
            large_image: json_str(item, &["images", "standard_resolution", "url"]),
        })
        .collect()
}
