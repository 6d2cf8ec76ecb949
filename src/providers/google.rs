//! Google adapter: OpenID + OAuth hybrid login, GData Atom feeds.
//!
//! The profile comes from the OpenID Attribute Exchange values of the
//! assertion itself, so verification costs no extra API call. Contacts are
//! read from the Contacts Atom feed and albums from Picasa Web.

use async_trait::async_trait;

use crate::core::consumer::{OAuthConsumer, SharedTransport, SigningMode};
use crate::core::openid;
use crate::core::xml::{XmlElement, ATOM_NS, GDATA_NS, GPHOTO_NS, MEDIA_NS};
use crate::error::SocialAuthResult;
use crate::providers::{endpoint, AlbumPlugin, AuthProvider, ProviderBase, Scopes};
use crate::strategy::{HybridEndpoints, HybridStrategy, Strategy};
use crate::types::{
    AccessGrant, Album, CallbackParams, Capability, Contact, OAuthConfig, Photo, Profile,
};

const PROVIDER_ID: &str = "google";
const OPENID_ENDPOINT: &str = "https://www.google.com/accounts/o8/ud";
const ACCESS_TOKEN_URL: &str = "https://www.google.com/accounts/OAuthGetAccessToken";

pub(crate) const CONTACTS_URL: &str =
    "https://www.google.com/m8/feeds/contacts/default/full/?max-results=1000";
const ALBUMS_URL: &str = "https://picasaweb.google.com/data/feed/api/user/default?kind=album";
const PHOTO_SIZES: &str = "72c,144c,288c";

const PHOTO_REL: &str = "http://schemas.google.com/contacts/2008/rel#photo";

const SCOPES: Scopes = Scopes {
    default: "http://www.google.com/m8/feeds/",
    all: "http://www.google.com/m8/feeds/ http://picasaweb.google.com/data/",
    authenticate_only: None,
};

#[derive(Debug)]
pub struct GoogleProvider {
    base: ProviderBase,
}

impl GoogleProvider {
    pub fn new(config: OAuthConfig, transport: SharedTransport) -> Self {
        let consumer = OAuthConsumer::new(
            PROVIDER_ID,
            config.consumer_key.clone(),
            config.consumer_secret.clone(),
            SigningMode::OAuth1,
            transport,
        );
        let endpoints = HybridEndpoints {
            openid_endpoint: endpoint(&config.authentication_url, OPENID_ENDPOINT),
            access_token_url: endpoint(&config.access_token_url, ACCESS_TOKEN_URL),
        };
        let strategy = Strategy::Hybrid(HybridStrategy::new(consumer, endpoints));

        Self {
            base: ProviderBase::new(strategy, config, SCOPES, &[Capability::Album]),
        }
    }
}

#[async_trait]
impl AuthProvider for GoogleProvider {
    fn base(&self) -> &ProviderBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ProviderBase {
        &mut self.base
    }

    async fn verify_response(&mut self, params: &CallbackParams) -> SocialAuthResult<Profile> {
        let grant = self.base.strategy.verify_response(params).await?;
        let profile = assertion_profile(&openid::signed_params(params), &grant);
        self.base.profile = Some(profile.clone());
        Ok(profile)
    }

    /// Profile of a restored grant, read from the contacts feed author.
    async fn fetch_profile(&self) -> SocialAuthResult<Profile> {
        let feed = self.base.get_xml(CONTACTS_URL).await?;
        Ok(feed_author_profile(&feed))
    }

    async fn contact_list(&self) -> SocialAuthResult<Vec<Contact>> {
        let feed = self.base.get_xml(CONTACTS_URL).await?;
        Ok(parse_contacts_feed(&feed))
    }

    fn album_plugin(&self) -> SocialAuthResult<Box<dyn AlbumPlugin + '_>> {
        self.base.require_plugin(Capability::Album)?;
        Ok(Box::new(PicasaAlbums { base: &self.base }))
    }
}

struct PicasaAlbums<'a> {
    base: &'a ProviderBase,
}

#[async_trait]
impl AlbumPlugin for PicasaAlbums<'_> {
    async fn albums(&self) -> SocialAuthResult<Vec<Album>> {
        let feed = self.base.get_xml(ALBUMS_URL).await?;
        let mut albums = Vec::new();
        for entry in feed.children_ns(ATOM_NS, "entry") {
            let mut album = parse_album_entry(entry);
            if let Some(id) = &album.id {
                let url = format!(
                    "https://picasaweb.google.com/data/feed/api/user/default/albumid/{}?kind=photo&thumbsize={}",
                    id, PHOTO_SIZES
                );
                let photos = self.base.get_xml(&url).await?;
                album.photos = photos
                    .children_ns(ATOM_NS, "entry")
                    .map(parse_photo_entry)
                    .collect();
            }
            albums.push(album);
        }
        Ok(albums)
    }
}

fn assertion_profile(params: &CallbackParams, grant: &AccessGrant) -> Profile {
    let ax = openid::ax_attributes(params);
    let full_name = match (&ax.first_name, &ax.last_name) {
        (Some(first), Some(last)) => Some(format!("{} {}", first, last)),
        (first, last) => first.clone().or_else(|| last.clone()),
    };
    Profile {
        provider_id: Some(PROVIDER_ID.to_string()),
        validated_id: grant.text_attribute("openid_identity"),
        email: ax.email,
        first_name: ax.first_name,
        last_name: ax.last_name,
        full_name,
        country: ax.country,
        language: ax.language,
        ..Default::default()
    }
}

fn feed_author_profile(feed: &XmlElement) -> Profile {
    let mut profile = Profile {
        provider_id: Some(PROVIDER_ID.to_string()),
        validated_id: feed.child_ns(ATOM_NS, "id").and_then(XmlElement::text_value),
        email: feed.text_at(&["author", "email"]),
        ..Default::default()
    };
    if let Some(name) = feed.text_at(&["author", "name"]) {
        profile.set_full_name(&name);
    }
    profile
}

/// Contacts from a Google Contacts Atom feed.
pub(crate) fn parse_contacts_feed(feed: &XmlElement) -> Vec<Contact> {
    feed.children_ns(ATOM_NS, "entry")
        .map(|entry| {
            let mut emails: Vec<(bool, String)> = entry
                .children_ns(GDATA_NS, "email")
                .filter_map(|email| {
                    let address = email.attr("address")?.to_string();
                    Some((email.attr("primary") == Some("true"), address))
                })
                .collect();
            // Primary address first; the rest keep feed order.
            emails.sort_by_key(|(primary, _)| !primary);
            let mut emails = emails.into_iter().map(|(_, address)| address);
            let email = emails.next();

            let name = entry.child_ns(GDATA_NS, "name");
            let given = name.and_then(|n| n.child_ns(GDATA_NS, "givenName")?.text_value());
            let family = name.and_then(|n| n.child_ns(GDATA_NS, "familyName")?.text_value());
            let display_name = entry
                .child_ns(ATOM_NS, "title")
                .and_then(XmlElement::text_value)
                .or_else(|| name.and_then(|n| n.child_ns(GDATA_NS, "fullName")?.text_value()));

            Contact {
                id: entry.child_ns(ATOM_NS, "id").and_then(XmlElement::text_value),
                first_name: given,
                last_name: family,
                display_name,
                email,
                other_emails: emails.collect(),
                profile_url: None,
                profile_image_url: entry
                    .children_ns(ATOM_NS, "link")
                    .find(|link| link.attr("rel") == Some(PHOTO_REL))
                    .and_then(|link| link.attr("href"))
                    .map(str::to_string),
            }
        })
        .collect()
}

/// `rel="alternate"` link; when several are present the last one wins.
fn alternate_link(entry: &XmlElement) -> Option<String> {
    entry
        .children_ns(ATOM_NS, "link")
        .filter(|link| link.attr("rel") == Some("alternate"))
        .filter_map(|link| link.attr("href"))
        .last()
        .map(str::to_string)
}

fn parse_album_entry(entry: &XmlElement) -> Album {
    let group = entry.child_ns(MEDIA_NS, "group");
    Album {
        id: entry.child_ns(GPHOTO_NS, "id").and_then(XmlElement::text_value),
        name: entry.child_ns(ATOM_NS, "title").and_then(XmlElement::text_value),
        link: alternate_link(entry),
        cover_photo: group
            .and_then(|g| g.child_ns(MEDIA_NS, "thumbnail"))
            .and_then(|t| t.attr("url"))
            .map(str::to_string),
        photos_count: entry
            .child_ns(GPHOTO_NS, "numphotos")
            .and_then(XmlElement::text_value)
            .and_then(|n| n.parse().ok()),
        photos: Vec::new(),
    }
}

fn parse_photo_entry(entry: &XmlElement) -> Photo {
    let mut photo = Photo {
        id: entry.child_ns(GPHOTO_NS, "id").and_then(XmlElement::text_value),
        title: entry.child_ns(ATOM_NS, "title").and_then(XmlElement::text_value),
        link: alternate_link(entry),
        ..Default::default()
    };
    let Some(group) = entry.child_ns(MEDIA_NS, "group") else {
        return photo;
    };

    photo.large_image = group
        .child_ns(MEDIA_NS, "content")
        .and_then(|c| c.attr("url"))
        .map(str::to_string);
    for thumbnail in group.children_ns(MEDIA_NS, "thumbnail") {
        let url = thumbnail.attr("url").map(str::to_string);
        match thumbnail.attr("width") {
            Some("72") => photo.thumb_image = url,
            Some("144") => photo.small_image = url,
            Some("288") => photo.medium_image = url,
            _ => {}
        }
    }
    photo
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transport::MockHttpTransport;
    use crate::core::xml::parse_document;
    use crate::providers::test_config;
    use crate::types::Permission;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    const ASSOCIATION: &str =
        "ns:http://specs.openid.net/auth/2.0\nassoc_handle:AMlYA9Vn\nmac_key:c2VjcmV0LW1hYy1rZXk=\n";

    const CONTACTS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:gd="http://schemas.google.com/g/2005">
  <id>liz@gmail.com</id>
  <author><name>Elizabeth Bennet</name><email>liz@gmail.com</email></author>
  <title>Elizabeth Bennet's Contacts</title>
  <entry>
    <id>http://www.google.com/m8/feeds/contacts/liz%40gmail.com/base/c9012de</id>
    <title>Fitzwilliam Darcy</title>
    <gd:name>
      <gd:givenName>Fitzwilliam</gd:givenName>
      <gd:familyName>Darcy</gd:familyName>
    </gd:name>
    <gd:email rel="http://schemas.google.com/g/2005#work" address="darcy@pemberley.example"/>
    <gd:email rel="http://schemas.google.com/g/2005#home" primary="true" address="fd@gmail.com"/>
    <link rel="http://schemas.google.com/contacts/2008/rel#photo" type="image/*"
          href="https://www.google.com/m8/feeds/photos/media/liz%40gmail.com/c9012de"/>
  </entry>
  <entry>
    <id>http://www.google.com/m8/feeds/contacts/liz%40gmail.com/base/1</id>
    <gd:email address="jane@example.com"/>
  </entry>
</feed>"#;

    const PHOTOS: &str = r#"<feed xmlns="http://www.w3.org/2005/Atom"
      xmlns:gphoto="http://schemas.google.com/photos/2007"
      xmlns:media="http://search.yahoo.com/mrss/">
  <entry>
    <id>https://picasaweb.google.com/data/entry/api/user/default/albumid/1/photoid/9</id>
    <gphoto:id>9</gphoto:id>
    <title>IMG_0001.jpg</title>
    <link rel="alternate" type="text/html" href="https://picasaweb.google.com/first"/>
    <link rel="alternate" type="text/html" href="https://picasaweb.google.com/second"/>
    <media:group>
      <media:content url="https://lh3.example/s0/IMG_0001.jpg" type="image/jpeg"/>
      <media:thumbnail url="https://lh3.example/s72-c/IMG_0001.jpg" width="72" height="72"/>
      <media:thumbnail url="https://lh3.example/s144-c/IMG_0001.jpg" width="144" height="144"/>
      <media:thumbnail url="https://lh3.example/s288-c/IMG_0001.jpg" width="288" height="288"/>
      <media:thumbnail url="https://lh3.example/s200/IMG_0001.jpg" width="200" height="150"/>
    </media:group>
  </entry>
</feed>"#;

    fn assertion() -> CallbackParams {
        openid::sign_assertion(
            CallbackParams::new()
                .with("openid.mode", "id_res")
                .with("openid.return_to", "https://app/cb")
                .with("openid.assoc_handle", "AMlYA9Vn")
                .with("openid.claimed_id", "https://www.google.com/accounts/o8/id?id=AItOaw")
                .with("openid.ext1.value.email", "liz@gmail.com")
                .with("openid.ext1.value.firstname", "Elizabeth")
                .with("openid.ext1.value.lastname", "Bennet")
                .with("openid.ext1.value.country", "GB")
                .with("openid.ext1.value.language", "en")
                .with("openid.ext2.request_token", "4/preapproved"),
        )
    }

    #[test]
    fn test_parse_contacts_feed() {
        let contacts = parse_contacts_feed(&parse_document(CONTACTS).unwrap());

        assert_eq!(contacts.len(), 2);
        assert_eq!(contacts[0].display_name.as_deref(), Some("Fitzwilliam Darcy"));
        assert_eq!(contacts[0].first_name.as_deref(), Some("Fitzwilliam"));
        assert_eq!(contacts[0].email.as_deref(), Some("fd@gmail.com"));
        assert_eq!(contacts[0].other_emails, vec!["darcy@pemberley.example".to_string()]);
        assert!(contacts[0]
            .profile_image_url
            .as_deref()
            .unwrap()
            .contains("/m8/feeds/photos/media/"));
        assert_eq!(contacts[1].email.as_deref(), Some("jane@example.com"));
        assert!(contacts[1].display_name.is_none());
    }

    #[test]
    fn test_feed_author_profile() {
        let profile = feed_author_profile(&parse_document(CONTACTS).unwrap());
        assert_eq!(profile.validated_id.as_deref(), Some("liz@gmail.com"));
        assert_eq!(profile.first_name.as_deref(), Some("Elizabeth"));
        assert_eq!(profile.last_name.as_deref(), Some("Bennet"));
    }

    #[test]
    fn test_photo_sizes_match_exact_widths() {
        let feed = parse_document(PHOTOS).unwrap();
        let photo = parse_photo_entry(feed.child_ns(ATOM_NS, "entry").unwrap());

        assert_eq!(photo.id.as_deref(), Some("9"));
        assert_eq!(photo.link.as_deref(), Some("https://picasaweb.google.com/second"));
        assert_eq!(photo.thumb_image.as_deref(), Some("https://lh3.example/s72-c/IMG_0001.jpg"));
        assert_eq!(photo.small_image.as_deref(), Some("https://lh3.example/s144-c/IMG_0001.jpg"));
        assert_eq!(photo.medium_image.as_deref(), Some("https://lh3.example/s288-c/IMG_0001.jpg"));
        assert_eq!(photo.large_image.as_deref(), Some("https://lh3.example/s0/IMG_0001.jpg"));
    }

    #[tokio::test]
    async fn test_verify_builds_profile_from_assertion() {
        let transport = Arc::new(MockHttpTransport::new());
        let mut provider = GoogleProvider::new(test_config(), transport.clone());

        transport.queue_text_response(200, "text/plain", ASSOCIATION);
        let url = provider.login_redirect_url("https://app/cb").await.unwrap();
        assert!(url.contains("openid.oauth.scope=http%3A%2F%2Fwww.google.com%2Fm8%2Ffeeds%2F"));

        transport.queue_form_response(200, "oauth_token=acc&oauth_token_secret=sec");
        let profile = provider.verify_response(&assertion()).await.unwrap();

        assert_eq!(
            profile.validated_id.as_deref(),
            Some("https://www.google.com/accounts/o8/id?id=AItOaw")
        );
        assert_eq!(profile.email.as_deref(), Some("liz@gmail.com"));
        assert_eq!(profile.full_name.as_deref(), Some("Elizabeth Bennet"));
        assert_eq!(profile.country.as_deref(), Some("GB"));
        // Association and token exchange only.
        assert_eq!(transport.get_requests().len(), 2);
        assert_eq!(provider.user_profile().await.unwrap(), profile);
    }

    #[tokio::test]
    async fn test_authenticate_only_has_profile_but_no_api() {
        let transport = Arc::new(MockHttpTransport::new());
        let mut provider = GoogleProvider::new(test_config(), transport.clone());
        provider.set_permission(Permission::AuthenticateOnly).unwrap();

        transport.queue_text_response(200, "text/plain", ASSOCIATION);
        let url = provider.login_redirect_url("https://app/cb").await.unwrap();
        assert!(!url.contains("openid.oauth.consumer"));

        let profile = provider.verify_response(&assertion()).await.unwrap();
        assert_eq!(profile.email.as_deref(), Some("liz@gmail.com"));
        assert!(provider.contact_list().await.is_err());
        assert_eq!(transport.get_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_forged_assertion_yields_no_profile() {
        let transport = Arc::new(MockHttpTransport::new());
        let mut provider = GoogleProvider::new(test_config(), transport.clone());
        provider.set_permission(Permission::AuthenticateOnly).unwrap();

        transport.queue_text_response(200, "text/plain", ASSOCIATION);
        provider.login_redirect_url("https://app/cb").await.unwrap();

        let forged = CallbackParams::new()
            .with("openid.mode", "id_res")
            .with("openid.assoc_handle", "ATTACKER")
            .with("openid.return_to", "https://evil/cb")
            .with("openid.claimed_id", "https://evil/id")
            .with("openid.ext1.value.email", "victim@gmail.com");
        assert!(provider.verify_response(&forged).await.is_err());
        assert!(provider.access_grant().is_none());
        assert!(provider.user_profile().await.is_err());
    }

    #[tokio::test]
    async fn test_unsigned_ax_values_are_ignored() {
        let transport = Arc::new(MockHttpTransport::new());
        let mut provider = GoogleProvider::new(test_config(), transport.clone());
        provider.set_permission(Permission::AuthenticateOnly).unwrap();

        transport.queue_text_response(200, "text/plain", ASSOCIATION);
        provider.login_redirect_url("https://app/cb").await.unwrap();

        let params = assertion().with("openid.ext3.value.email", "victim@gmail.com");
        let profile = provider.verify_response(&params).await.unwrap();
        assert_eq!(profile.email.as_deref(), Some("liz@gmail.com"));
    }

    #[tokio::test]
    async fn test_album_plugin_fetches_each_album() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_text_response(
            200,
            "application/atom+xml",
            r#"<feed xmlns="http://www.w3.org/2005/Atom"
                    xmlns:gphoto="http://schemas.google.com/photos/2007"
                    xmlns:media="http://search.yahoo.com/mrss/">
                 <entry>
                   <gphoto:id>1</gphoto:id>
                   <title>Holiday</title>
                   <gphoto:numphotos>1</gphoto:numphotos>
                   <link rel="alternate" href="https://picasaweb.google.com/liz/Holiday"/>
                   <media:group><media:thumbnail url="https://lh3.example/cover.jpg"/></media:group>
                 </entry>
               </feed>"#,
        );
        transport.queue_text_response(200, "application/atom+xml", PHOTOS);
        let mut provider = GoogleProvider::new(test_config(), transport.clone());
        provider
            .set_access_grant(AccessGrant::new(PROVIDER_ID, "acc").with_secret("sec"))
            .unwrap();

        let albums = provider.album_plugin().unwrap().albums().await.unwrap();
        assert_eq!(albums.len(), 1);
        assert_eq!(albums[0].name.as_deref(), Some("Holiday"));
        assert_eq!(albums[0].photos_count, Some(1));
        assert_eq!(albums[0].cover_photo.as_deref(), Some("https://lh3.example/cover.jpg"));
        assert_eq!(albums[0].photos.len(), 1);

        let photo_request = transport.get_last_request().unwrap();
        assert!(photo_request.url.contains("/albumid/1?kind=photo&thumbsize=72c,144c,288c"));
    }
}
