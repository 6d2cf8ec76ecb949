//! Facebook Graph API adapter (OAuth 2.0, JSON).

use async_trait::async_trait;
use serde_json::Value;

use crate::core::consumer::{ApiRequest, OAuthConsumer, SharedTransport, SigningMode, TokenPlacement};
use crate::core::transport::HttpMethod;
use crate::error::SocialAuthResult;
use crate::providers::{
    endpoint, json_array, json_str, json_u32, parse_timestamp, token_placement, AlbumPlugin,
    AuthProvider, FeedPlugin, ImageUpload, ProviderBase, Scopes,
};
use crate::strategy::{OAuth2Endpoints, OAuth2Strategy, Strategy};
use crate::types::{
    Album, BirthDate, Capability, Contact, Feed, OAuthConfig, Photo, Profile,
};

const PROVIDER_ID: &str = "facebook";
const AUTHORIZATION_URL: &str = "https://graph.facebook.com/oauth/authorize";
const ACCESS_TOKEN_URL: &str = "https://graph.facebook.com/oauth/access_token";
const GRAPH_URL: &str = "https://graph.facebook.com";

const SCOPES: Scopes = Scopes {
    default: "email,user_birthday,user_location",
    all: "email,user_birthday,user_location,publish_stream,read_stream,user_photos,friends_photos,offline_access",
    authenticate_only: None,
};

const CREATED_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

#[derive(Debug)]
pub struct FacebookProvider {
    base: ProviderBase,
}

impl FacebookProvider {
    pub fn new(config: OAuthConfig, transport: SharedTransport) -> Self {
        let placement = token_placement(&config, TokenPlacement::default());
        let consumer = OAuthConsumer::new(
            PROVIDER_ID,
            config.consumer_key.clone(),
            config.consumer_secret.clone(),
            SigningMode::OAuth2(placement),
            transport,
        );
        // Graph API answers the code exchange with a form-encoded body.
        let endpoints = OAuth2Endpoints::new(
            endpoint(&config.authentication_url, AUTHORIZATION_URL),
            endpoint(&config.access_token_url, ACCESS_TOKEN_URL),
        )
        .token_method(HttpMethod::Get);
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
impl AuthProvider for FacebookProvider {
    fn base(&self) -> &ProviderBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ProviderBase {
        &mut self.base
    }

    async fn fetch_profile(&self) -> SocialAuthResult<Profile> {
        let json = self.base.get_json(&format!("{}/me", GRAPH_URL)).await?;
        Ok(parse_profile(&json))
    }

    async fn contact_list(&self) -> SocialAuthResult<Vec<Contact>> {
        let json = self
            .base
            .get_json(&format!("{}/me/friends", GRAPH_URL))
            .await?;
        Ok(parse_contacts(&json))
    }

    async fn update_status(&self, message: &str) -> SocialAuthResult<()> {
        tracing::info!(provider = PROVIDER_ID, "updating status");
        self.base
            .execute(ApiRequest::post(format!("{}/me/feed", GRAPH_URL)).param("message", message))
            .await?;
        Ok(())
    }

    async fn upload_image(&self, message: &str, image: ImageUpload) -> SocialAuthResult<()> {
        tracing::info!(provider = PROVIDER_ID, file = %image.file_name, "uploading image");
        self.base
            .upload(
                &format!("{}/me/photos", GRAPH_URL),
                vec![("message".to_string(), message.to_string())],
                image.into_part("source"),
            )
            .await?;
        Ok(())
    }

    fn feed_plugin(&self) -> SocialAuthResult<Box<dyn FeedPlugin + '_>> {
        self.base.require_plugin(Capability::Feed)?;
        Ok(Box::new(FacebookFeed { base: &self.base }))
    }

    fn album_plugin(&self) -> SocialAuthResult<Box<dyn AlbumPlugin + '_>> {
        self.base.require_plugin(Capability::Album)?;
        Ok(Box::new(FacebookAlbums { base: &self.base }))
    }
}

struct FacebookFeed<'a> {
    base: &'a ProviderBase,
}

#[async_trait]
impl FeedPlugin for FacebookFeed<'_> {
    async fn feeds(&self) -> SocialAuthResult<Vec<Feed>> {
        let json = self.base.get_json(&format!("{}/me/feed", GRAPH_URL)).await?;
        Ok(parse_feeds(&json))
    }
}

struct FacebookAlbums<'a> {
    base: &'a ProviderBase,
}

#[async_trait]
impl AlbumPlugin for FacebookAlbums<'_> {
    async fn albums(&self) -> SocialAuthResult<Vec<Album>> {
        let json = self
            .base
            .get_json(&format!("{}/me/albums", GRAPH_URL))
            .await?;
        let mut albums = parse_albums(&json);
        for album in &mut albums {
            if let Some(id) = &album.id {
                let photos = self
                    .base
                    .get_json(&format!("{}/{}/photos", GRAPH_URL, id))
                    .await?;
                album.photos = parse_photos(&photos);
            }
        }
        Ok(albums)
    }
}

fn picture_url(id: &str) -> String {
    format!("{}/{}/picture", GRAPH_URL, id)
}

fn parse_profile(json: &Value) -> Profile {
    let mut profile = Profile {
        provider_id: Some(PROVIDER_ID.to_string()),
        validated_id: json_str(json, &["id"]),
        first_name: json_str(json, &["first_name"]),
        last_name: json_str(json, &["last_name"]),
        full_name: json_str(json, &["name"]),
        display_name: json_str(json, &["username"]),
        email: json_str(json, &["email"]),
        gender: json_str(json, &["gender"]),
        location: json_str(json, &["location", "name"]),
        language: json_str(json, &["locale"]),
        dob: json_str(json, &["birthday"]).and_then(|b| BirthDate::from_us_format(&b)),
        ..Default::default()
    };
    profile.profile_image_url = profile.validated_id.as_deref().map(picture_url);
    profile
}

fn parse_contacts(json: &Value) -> Vec<Contact> {
    json_array(json, &["data"])
        .iter()
        .map(|friend| {
            let id = json_str(friend, &["id"]);
            let name = json_str(friend, &["name"]);
            let (first_name, last_name) = match name.as_deref() {
                Some(name) => {
                    let (first, last) = crate::types::split_full_name(name);
                    (Some(first), last)
                }
                None => (None, None),
            };
            Contact {
                profile_url: id
                    .as_deref()
                    .map(|id| format!("https://www.facebook.com/profile.php?id={}", id)),
                profile_image_url: id.as_deref().map(picture_url),
                id,
                first_name,
                last_name,
                display_name: name,
                ..Default::default()
            }
        })
        .collect()
}

fn parse_feeds(json: &Value) -> Vec<Feed> {
    json_array(json, &["data"])
        .iter()
        .map(|item| Feed {
            id: json_str(item, &["id"]),
            from: json_str(item, &["from", "name"]),
            screen_name: json_str(item, &["from", "id"]),
            message: json_str(item, &["message"]).or_else(|| json_str(item, &["story"])),
            created_at: json_str(item, &["created_time"])
                .and_then(|t| parse_timestamp(&t, CREATED_TIME_FORMAT)),
        })
        .collect()
}

fn parse_albums(json: &Value) -> Vec<Album> {
    json_array(json, &["data"])
        .iter()
        .map(|item| Album {
            id: json_str(item, &["id"]),
            name: json_str(item, &["name"]),
            link: json_str(item, &["link"]),
            cover_photo: json_str(item, &["cover_photo"]).map(|id| picture_url(&id)),
            photos_count: json_u32(item, &["count"]),
            photos: Vec::new(),
        })
        .collect()
}

fn parse_photos(json: &Value) -> Vec<Photo> {
    json_array(json, &["data"])
        .iter()
        .map(|item| Photo {
            id: json_str(item, &["id"]),
            title: json_str(item, &["name"]),
            link: json_str(item, &["link"]),
            thumb_image: json_str(item, &["picture"]),
            large_image: json_str(item, &["source"]),
            ..Default::default()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transport::{MockHttpTransport, RequestBody};
    use crate::providers::test_config;
    use crate::types::{AccessGrant, CallbackParams};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn connected(transport: Arc<MockHttpTransport>) -> FacebookProvider {
        let mut provider = FacebookProvider::new(test_config(), transport);
        provider
            .set_access_grant(AccessGrant::new(PROVIDER_ID, "fb-token"))
            .unwrap();
        provider
    }

    #[test]
    fn test_parse_profile() {
        let json = serde_json::json!({
            "id": "100001",
            "name": "John Smith",
            "first_name": "John",
            "last_name": "Smith",
            "username": "jsmith",
            "email": "john@example.com",
            "gender": "male",
            "birthday": "08/17/1980",
            "location": {"id": "1", "name": "Palo Alto, California"},
            "locale": "en_US"
        });

        let profile = parse_profile(&json);
        assert_eq!(profile.validated_id.as_deref(), Some("100001"));
        assert_eq!(profile.first_name.as_deref(), Some("John"));
        assert_eq!(profile.display_name.as_deref(), Some("jsmith"));
        assert_eq!(profile.location.as_deref(), Some("Palo Alto, California"));
        assert_eq!(profile.language.as_deref(), Some("en_US"));
        assert_eq!(profile.dob.and_then(|d| d.year), Some(1980));
        assert_eq!(
            profile.profile_image_url.as_deref(),
            Some("https://graph.facebook.com/100001/picture")
        );
        assert!(profile.country.is_none());
    }

    #[test]
    fn test_parse_contacts_splits_names() {
        let json = serde_json::json!({
            "data": [
                {"id": "1", "name": "Jane Doe"},
                {"id": "2", "name": "Cher"},
                {"id": "3"}
            ]
        });

        let contacts = parse_contacts(&json);
        assert_eq!(contacts.len(), 3);
        assert_eq!(contacts[0].first_name.as_deref(), Some("Jane"));
        assert_eq!(contacts[0].last_name.as_deref(), Some("Doe"));
        assert_eq!(contacts[1].first_name.as_deref(), Some("Cher"));
        assert!(contacts[1].last_name.is_none());
        assert!(contacts[2].display_name.is_none());
        assert_eq!(
            contacts[0].profile_url.as_deref(),
            Some("https://www.facebook.com/profile.php?id=1")
        );
    }

    #[tokio::test]
    async fn test_verify_fetches_profile_once() {
        let transport = Arc::new(MockHttpTransport::new());
        let mut provider = FacebookProvider::new(test_config(), transport.clone());

        let url = provider.login_redirect_url("https://app/cb").await.unwrap();
        assert!(url.starts_with(AUTHORIZATION_URL));
        assert!(url.contains("scope=email%2Cuser_birthday%2Cuser_location"));

        transport.queue_form_response(200, "access_token=fb-token&expires=5183999");
        transport.queue_json_response(200, &serde_json::json!({"id": "100001", "name": "John Smith"}));
        let profile = provider
            .verify_response(&CallbackParams::new().with("code", "abc"))
            .await
            .unwrap();
        assert_eq!(profile.full_name.as_deref(), Some("John Smith"));
        assert_eq!(provider.access_grant().unwrap().expires_in, Some(5183999));

        let cached = provider.user_profile().await.unwrap();
        assert_eq!(cached, profile);
        assert_eq!(transport.get_requests().len(), 2);
        assert!(transport.get_requests()[1]
            .url
            .starts_with("https://graph.facebook.com/me?access_token=fb-token"));
    }

    #[tokio::test]
    async fn test_update_status_posts_message() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_json_response(200, &serde_json::json!({"id": "100001_1"}));
        let provider = connected(transport.clone());

        provider.update_status("hello graph").await.unwrap();

        let request = transport.get_last_request().unwrap();
        assert_eq!(
            request.url,
            "https://graph.facebook.com/me/feed?access_token=fb-token"
        );
        assert_eq!(request.body_text(), Some("message=hello%20graph"));
    }

    #[tokio::test]
    async fn test_upload_image_is_multipart() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_json_response(200, &serde_json::json!({"id": "p1"}));
        let provider = connected(transport.clone());

        provider
            .upload_image("caption", ImageUpload::new("cat.png", "image/png", vec![1, 2, 3]))
            .await
            .unwrap();

        let request = transport.get_last_request().unwrap();
        assert!(matches!(
            request.body,
            RequestBody::Multipart(ref form) if form.file.as_ref().map(|f| f.field_name.as_str()) == Some("source")
        ));
    }

    #[tokio::test]
    async fn test_feed_plugin() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_json_response(
            200,
            &serde_json::json!({
                "data": [{
                    "id": "100001_42",
                    "from": {"name": "John Smith", "id": "100001"},
                    "message": "Hello",
                    "created_time": "2012-08-06T10:13:26+0000"
                }]
            }),
        );
        let provider = connected(transport);

        let feeds = provider.feed_plugin().unwrap().feeds().await.unwrap();
        assert_eq!(feeds.len(), 1);
        assert_eq!(feeds[0].from.as_deref(), Some("John Smith"));
        assert_eq!(feeds[0].message.as_deref(), Some("Hello"));
        assert_eq!(
            feeds[0].created_at.map(|t| t.to_rfc3339()),
            Some("2012-08-06T10:13:26+00:00".to_string())
        );
    }

    #[tokio::test]
    async fn test_album_plugin_fetches_photos() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_json_response(
            200,
            &serde_json::json!({
                "data": [{"id": "a1", "name": "Trip", "count": 1, "cover_photo": "p1",
                          "link": "https://www.facebook.com/album.php?fbid=a1"}]
            }),
        );
        transport.queue_json_response(
            200,
            &serde_json::json!({
                "data": [{"id": "p1", "picture": "https://fb/p1_s.jpg", "source": "https://fb/p1_n.jpg"}]
            }),
        );
        let provider = connected(transport.clone());

        let albums = provider.album_plugin().unwrap().albums().await.unwrap();
        assert_eq!(albums.len(), 1);
        assert_eq!(albums[0].photos_count, Some(1));
        assert_eq!(
            albums[0].cover_photo.as_deref(),
            Some("https://graph.facebook.com/p1/picture")
        );
        assert_eq!(albums[0].photos[0].thumb_image.as_deref(), Some("https://fb/p1_s.jpg"));
        assert_eq!(albums[0].photos[0].large_image.as_deref(), Some("https://fb/p1_n.jpg"));
        assert!(transport.get_requests()[1]
            .url
            .starts_with("https://graph.facebook.com/a1/photos"));
    }
}
