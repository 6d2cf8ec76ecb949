//! OAuth 1.0a flow against a stub Twitter.

use super::*;
use pretty_assertions::assert_eq;
use serde_json::json;
use social_auth::{CallbackParams, StateError};
use wiremock::matchers::{body_string, header, header_exists, method, path};
use wiremock::{Mock, ResponseTemplate};

async fn mount_token_endpoints(mock_server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api.twitter.com/oauth/request_token"))
        .and(header_exists("Authorization"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "oauth_token=req-token&oauth_token_secret=req-secret&oauth_callback_confirmed=true",
        ))
        .mount(mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api.twitter.com/oauth/access_token"))
        .and(header_exists("Authorization"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "oauth_token=acc-token&oauth_token_secret=acc-secret&user_id=6253282&screen_name=twitterapi",
        ))
        .mount(mock_server)
        .await;
}

#[tokio::test]
async fn test_twitter_login_and_status_update() {
    let mock_server = setup_mock_server().await;
    mount_token_endpoints(&mock_server).await;

    Mock::given(method("GET"))
        .and(path("/api.twitter.com/1.1/account/verify_credentials.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id_str": "6253282",
            "name": "Twitter API",
            "screen_name": "twitterapi"
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api.twitter.com/1.1/statuses/update.json"))
        .and(header("Content-Type", "application/x-www-form-urlencoded"))
        .and(body_string("status=hello%20world"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id_str": "1"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut manager = manager_for(&mock_server, &["twitter"]);
    let url = manager
        .login_redirect_url("twitter", "https://myapp.com/callback")
        .await
        .unwrap();
    assert_eq!(url, "https://api.twitter.com/oauth/authenticate?oauth_token=req-token");

    let provider = manager
        .connect(&CallbackParams::from_query(
            "oauth_token=req-token&oauth_verifier=verifier",
        ))
        .await
        .unwrap();

    let grant = provider.access_grant().unwrap();
    assert_eq!(grant.key, "acc-token");
    assert_eq!(grant.text_attribute("screen_name").as_deref(), Some("twitterapi"));
    assert_eq!(
        provider.user_profile().await.unwrap().display_name.as_deref(),
        Some("twitterapi")
    );

    provider.update_status("hello world").await.unwrap();
}

#[tokio::test]
async fn test_mismatched_callback_token_keeps_redirect_pending() {
    let mock_server = setup_mock_server().await;
    mount_token_endpoints(&mock_server).await;

    let mut manager = manager_for(&mock_server, &["twitter"]);
    manager
        .login_redirect_url("twitter", "https://myapp.com/callback")
        .await
        .unwrap();

    // The token does not belong to any pending redirect, so routing falls
    // back to the current provider, which rejects it.
    let error = manager
        .connect(&CallbackParams::from_query("oauth_token=forged&oauth_verifier=v"))
        .await
        .err()
        .unwrap();
    assert!(matches!(
        error,
        SocialAuthError::State(StateError::TokenMismatch { .. })
    ));

    let provider = manager.provider("twitter").unwrap();
    assert_eq!(provider.strategy().pending_request_token(), Some("req-token"));
    assert!(manager.connected_provider_ids().is_empty());
}
