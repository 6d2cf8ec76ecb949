//! OpenID + OAuth hybrid flow against a stub Google.

use super::*;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use pretty_assertions::assert_eq;
use social_auth::core::openid::assertion_signature;
use social_auth::{CallbackParams, Permission, StateError};
use wiremock::matchers::{header_exists, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

const CONTACTS_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:gd="http://schemas.google.com/g/2005">
  <id>liz@gmail.com</id>
  <author><name>Elizabeth Bennet</name><email>liz@gmail.com</email></author>
  <entry>
    <id>http://www.google.com/m8/feeds/contacts/liz%40gmail.com/base/c1</id>
    <title>Jane Bennet</title>
    <gd:email primary="true" address="jane@example.com"/>
  </entry>
</feed>"#;

async fn mount_association(mock_server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/www.google.com/accounts/o8/ud"))
        .and(query_param("openid.mode", "associate"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "ns:http://specs.openid.net/auth/2.0\nsession_type:no-encryption\nassoc_type:HMAC-SHA1\nassoc_handle:AOQobUe\nexpires_in:46800\nmac_key:c2VjcmV0LW1hYy1rZXk=\n",
        ))
        .mount(mock_server)
        .await;
}

const SIGNED: &str = "op_endpoint,claimed_id,identity,return_to,response_nonce,assoc_handle,\
ns.ext1,ext1.value.email,ext1.value.firstname,ext1.value.lastname,ns.ext2,ext2.request_token";

fn assertion() -> CallbackParams {
    let params = CallbackParams::new()
        .with("openid.ns", "http://specs.openid.net/auth/2.0")
        .with("openid.mode", "id_res")
        .with("openid.op_endpoint", "https://www.google.com/accounts/o8/ud")
        .with("openid.claimed_id", "https://www.google.com/accounts/o8/id?id=AItOaw")
        .with("openid.identity", "https://www.google.com/accounts/o8/id?id=AItOaw")
        .with("openid.return_to", "https://myapp.com/callback")
        .with("openid.response_nonce", "2012-08-06T10:13:26ZvRs4Q")
        .with("openid.assoc_handle", "AOQobUe")
        .with("openid.ns.ext1", "http://openid.net/srv/ax/1.0")
        .with("openid.ext1.value.email", "liz@gmail.com")
        .with("openid.ext1.value.firstname", "Elizabeth")
        .with("openid.ext1.value.lastname", "Bennet")
        .with("openid.ns.ext2", "http://specs.openid.net/extensions/oauth/1.0")
        .with("openid.ext2.request_token", "4/preapproved")
        .with("openid.signed", SIGNED);
    let mac_key = STANDARD.decode("c2VjcmV0LW1hYy1rZXk=").unwrap();
    let signature = assertion_signature(&mac_key, &params).unwrap();
    params.with("openid.sig", signature)
}

#[tokio::test]
async fn test_google_hybrid_login_and_contacts() {
    let mock_server = setup_mock_server().await;
    mount_association(&mock_server).await;

    Mock::given(method("POST"))
        .and(path("/www.google.com/accounts/OAuthGetAccessToken"))
        .and(header_exists("Authorization"))
        .respond_with(ResponseTemplate::new(200).set_body_string("oauth_token=acc&oauth_token_secret=sec"))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/www.google.com/m8/feeds/contacts/default/full/"))
        .and(header_exists("Authorization"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(CONTACTS_FEED, "application/atom+xml"),
        )
        .mount(&mock_server)
        .await;

    let mut manager = manager_for(&mock_server, &["google"]);
    let url = manager
        .login_redirect_url("google", "https://myapp.com/callback")
        .await
        .unwrap();
    assert!(url.starts_with("https://www.google.com/accounts/o8/ud?"));
    assert!(url.contains("openid.assoc_handle=AOQobUe"));
    assert!(url.contains("openid.oauth.consumer=google-key"));

    let provider = manager.connect(&assertion()).await.unwrap();
    let profile = provider.user_profile().await.unwrap();
    assert_eq!(profile.email.as_deref(), Some("liz@gmail.com"));
    assert_eq!(profile.full_name.as_deref(), Some("Elizabeth Bennet"));

    let contacts = provider.contact_list().await.unwrap();
    assert_eq!(contacts.len(), 1);
    assert_eq!(contacts[0].email.as_deref(), Some("jane@example.com"));
}

#[tokio::test]
async fn test_google_authenticate_only_skips_token_exchange() {
    let mock_server = setup_mock_server().await;
    mount_association(&mock_server).await;

    Mock::given(method("POST"))
        .and(path("/www.google.com/accounts/OAuthGetAccessToken"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&mock_server)
        .await;

    let mut manager = manager_for(&mock_server, &["google"]);
    let url = manager
        .login_redirect_url_with_permission(
            "google",
            "https://myapp.com/callback",
            Permission::AuthenticateOnly,
        )
        .await
        .unwrap();
    assert!(!url.contains("openid.oauth.consumer"));

    let provider = manager.connect(&assertion()).await.unwrap();
    assert!(provider.access_grant().unwrap().is_authenticate_only());
    assert_eq!(
        provider.user_profile().await.unwrap().validated_id.as_deref(),
        Some("https://www.google.com/accounts/o8/id?id=AItOaw")
    );
}

#[tokio::test]
async fn test_google_rejects_assertion_from_another_session() {
    let mock_server = setup_mock_server().await;
    mount_association(&mock_server).await;

    let mut manager = manager_for(&mock_server, &["google"]);
    manager
        .login_redirect_url_with_permission(
            "google",
            "https://myapp.com/other-callback",
            Permission::AuthenticateOnly,
        )
        .await
        .unwrap();

    let error = manager.connect(&assertion()).await.err().unwrap();
    assert!(matches!(
        error,
        SocialAuthError::State(StateError::AssertionMismatch { ref field, .. })
            if field == "openid.return_to"
    ));
    assert!(manager.connected_provider_ids().is_empty());
}
