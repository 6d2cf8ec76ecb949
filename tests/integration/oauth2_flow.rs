//! OAuth 2.0 flows: Facebook (form token body, query token) and GitHub
//! (form token body, bearer header).

use super::*;
use pretty_assertions::assert_eq;
use serde_json::json;
use social_auth::{CallbackParams, Capability, ProviderError};
use wiremock::matchers::{body_string_contains, header, header_exists, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn test_facebook_login_profile_and_feed() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/graph.facebook.com/oauth/access_token"))
        .and(query_param("client_id", "facebook-key"))
        .and(query_param("client_secret", "facebook-secret"))
        .and(query_param("code", "fb-code"))
        .respond_with(ResponseTemplate::new(200).set_body_string("access_token=fb-token&expires=5183999"))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/graph.facebook.com/me"))
        .and(query_param("access_token", "fb-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "100001",
            "name": "John Smith",
            "first_name": "John",
            "last_name": "Smith",
            "email": "john@example.com",
            "birthday": "08/17/1980"
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/graph.facebook.com/me/feed"))
        .and(query_param("access_token", "fb-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{
                "id": "100001_1",
                "from": {"id": "100001", "name": "John Smith"},
                "message": "Hello from the integration test",
                "created_time": "2012-08-06T10:13:26+0000"
            }]
        })))
        .mount(&mock_server)
        .await;

    let mut manager = manager_for(&mock_server, &["facebook"]);

    let url = manager
        .login_redirect_url("facebook", "https://myapp.com/callback")
        .await
        .unwrap();
    assert!(url.starts_with("https://graph.facebook.com/oauth/authorize?client_id=facebook-key"));

    let provider = manager
        .connect(&CallbackParams::from_query("code=fb-code"))
        .await
        .unwrap();
    let profile = provider.user_profile().await.unwrap();
    assert_eq!(profile.email.as_deref(), Some("john@example.com"));
    assert_eq!(profile.dob.and_then(|d| d.year), Some(1980));
    assert_eq!(provider.access_grant().unwrap().expires_in, Some(5183999));

    assert!(provider.is_supported_plugin(Capability::Feed));
    let feeds = provider.feed_plugin().unwrap().feeds().await.unwrap();
    assert_eq!(feeds.len(), 1);
    assert_eq!(feeds[0].message.as_deref(), Some("Hello from the integration test"));
}

#[tokio::test]
async fn test_github_bearer_header_and_error_status() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path("/github.com/login/oauth/access_token"))
        .and(header("Accept", "application/json"))
        .and(body_string_contains("code=gh-code"))
        .and(body_string_contains("grant_type=authorization_code"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "gho_abc", "token_type": "bearer", "scope": "user:email"})),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api.github.com/user"))
        .and(header("Authorization", "Bearer gho_abc"))
        .and(header_exists("User-Agent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "login": "octocat",
            "id": 583231,
            "name": "The Octocat"
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api.github.com/user/following"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "Bad credentials"})))
        .mount(&mock_server)
        .await;

    let mut manager = manager_for(&mock_server, &["github"]);
    manager
        .login_redirect_url("github", "https://myapp.com/callback")
        .await
        .unwrap();

    let provider = manager
        .connect(&CallbackParams::new().with("code", "gh-code"))
        .await
        .unwrap();
    assert_eq!(
        provider.user_profile().await.unwrap().display_name.as_deref(),
        Some("octocat")
    );

    let error = provider.contact_list().await.unwrap_err();
    match error {
        SocialAuthError::Provider(ProviderError::UnexpectedStatus { status, url, body, .. }) => {
            assert_eq!(status, 401);
            assert_eq!(url, "https://api.github.com/user/following");
            assert!(body.contains("Bad credentials"));
        }
        other => panic!("expected provider error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_restored_grant_calls_api_without_login() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/api.github.com/user/following"))
        .and(header("Authorization", "Bearer stored-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"login": "defunkt", "id": 2, "html_url": "https://github.com/defunkt"}
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut manager = manager_for(&mock_server, &["github"]);
    let exported = social_auth::AccessGrant::new("github", "stored-token").to_key_values();
    let grant = social_auth::AccessGrant::from_key_values(&exported).unwrap();

    let provider = manager.connect_with_grant(grant).unwrap();
    let contacts = provider.contact_list().await.unwrap();
    assert_eq!(contacts[0].display_name.as_deref(), Some("defunkt"));
}
