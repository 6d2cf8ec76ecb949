//! Authentication Strategies
//!
//! The three token-exchange protocols behind one state machine:
//!
//! ```text
//! Unstarted --login_redirect_url--> RedirectIssued --verify_response--> Verified
//!     ^                                                                    |
//!     +---------------------------------logout-----------------------------+
//! ```
//!
//! Every transition takes `&mut self`, so one strategy instance serves exactly
//! one authentication session at a time.

mod hybrid;
mod oauth1;
mod oauth2;

pub use hybrid::{HybridEndpoints, HybridStrategy, PendingAssociation};
pub use oauth1::{OAuth1Endpoints, OAuth1Strategy, PendingRequestToken};
pub use oauth2::{OAuth2Endpoints, OAuth2Strategy, PendingAuthorization};

use crate::core::consumer::{ApiRequest, OAuthConsumer};
use crate::core::transport::HttpResponse;
use crate::error::{SocialAuthResult, StateError};
use crate::types::{AccessGrant, CallbackParams, CallbackShape, Permission};

/// Session state of one strategy.
#[derive(Clone, Debug, Default)]
pub enum StrategyState<P> {
    #[default]
    Unstarted,
    /// Redirect handed out; transient data needed to verify the callback.
    RedirectIssued(P),
    Verified(AccessGrant),
}

impl<P> StrategyState<P> {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unstarted => "unstarted",
            Self::RedirectIssued(_) => "redirect_issued",
            Self::Verified(_) => "verified",
        }
    }

    pub fn grant(&self) -> Option<&AccessGrant> {
        match self {
            Self::Verified(grant) => Some(grant),
            _ => None,
        }
    }

    pub fn pending(&self) -> Option<&P> {
        match self {
            Self::RedirectIssued(pending) => Some(pending),
            _ => None,
        }
    }

    /// Redirects may only be issued from `Unstarted`.
    fn ensure_unstarted(&self, provider_id: &str) -> SocialAuthResult<()> {
        match self {
            Self::Unstarted => Ok(()),
            _ => Err(StateError::RedirectAlreadyIssued {
                provider_id: provider_id.to_string(),
            }
            .into()),
        }
    }

    fn require_pending(&self, provider_id: &str) -> SocialAuthResult<&P> {
        self.pending().ok_or_else(|| {
            StateError::RedirectNotIssued {
                provider_id: provider_id.to_string(),
            }
            .into()
        })
    }
}

/// Grant usable for API calls, or the matching state error.
fn api_grant<'a>(
    grant: Option<&'a AccessGrant>,
    provider_id: &str,
) -> SocialAuthResult<&'a AccessGrant> {
    let grant = grant.ok_or_else(|| StateError::NotVerified {
        provider_id: provider_id.to_string(),
    })?;
    if grant.is_authenticate_only() {
        return Err(StateError::AuthenticateOnly {
            provider_id: provider_id.to_string(),
        }
        .into());
    }
    Ok(grant)
}

/// Accept an externally supplied grant for `provider_id`.
fn check_grant_owner(grant: &AccessGrant, provider_id: &str) -> SocialAuthResult<()> {
    if grant.provider_id != provider_id {
        return Err(StateError::ForeignGrant {
            provider_id: provider_id.to_string(),
            grant_provider_id: grant.provider_id.clone(),
        }
        .into());
    }
    Ok(())
}

/// One of the supported token-exchange protocols.
#[derive(Debug)]
pub enum Strategy {
    OAuth1(OAuth1Strategy),
    OAuth2(OAuth2Strategy),
    Hybrid(HybridStrategy),
}

impl Strategy {
    pub fn provider_id(&self) -> &str {
        self.consumer().provider_id()
    }

    pub fn consumer(&self) -> &OAuthConsumer {
        match self {
            Self::OAuth1(s) => s.consumer(),
            Self::OAuth2(s) => s.consumer(),
            Self::Hybrid(s) => s.consumer(),
        }
    }

    pub fn permission(&self) -> Permission {
        match self {
            Self::OAuth1(s) => s.permission(),
            Self::OAuth2(s) => s.permission(),
            Self::Hybrid(s) => s.permission(),
        }
    }

    pub(crate) fn with_scope(self, scope: impl Into<String>) -> Self {
        match self {
            Self::OAuth1(s) => Self::OAuth1(s.with_scope(scope)),
            Self::OAuth2(s) => Self::OAuth2(s.with_scope(scope)),
            Self::Hybrid(s) => Self::Hybrid(s.with_scope(scope)),
        }
    }

    /// Set the permission and the scope string it maps to; only before the redirect.
    pub fn set_permission(
        &mut self,
        permission: Permission,
        scope: Option<String>,
    ) -> SocialAuthResult<()> {
        match self {
            Self::OAuth1(s) => s.set_permission(permission, scope),
            Self::OAuth2(s) => s.set_permission(permission, scope),
            Self::Hybrid(s) => s.set_permission(permission, scope),
        }
    }

    /// Current state name, for logging and routing.
    pub fn state_name(&self) -> &'static str {
        match self {
            Self::OAuth1(s) => s.state().name(),
            Self::OAuth2(s) => s.state().name(),
            Self::Hybrid(s) => s.state().name(),
        }
    }

    pub fn is_awaiting_callback(&self) -> bool {
        match self {
            Self::OAuth1(s) => s.state().pending().is_some(),
            Self::OAuth2(s) => s.state().pending().is_some(),
            Self::Hybrid(s) => s.state().pending().is_some(),
        }
    }

    /// Callback shape this strategy's provider redirects back with.
    pub fn callback_shape(&self) -> CallbackShape {
        match self {
            Self::OAuth1(_) => CallbackShape::OAuth1,
            Self::OAuth2(_) => CallbackShape::OAuth2,
            Self::Hybrid(_) => CallbackShape::OpenId,
        }
    }

    /// Request token held while an OAuth1 redirect is outstanding.
    pub fn pending_request_token(&self) -> Option<&str> {
        match self {
            Self::OAuth1(s) => s.state().pending().map(|p| p.token.key.as_str()),
            _ => None,
        }
    }

    /// Build the provider authorization URL and enter `RedirectIssued`.
    pub async fn login_redirect_url(&mut self, success_url: &str) -> SocialAuthResult<String> {
        match self {
            Self::OAuth1(s) => s.login_redirect_url(success_url).await,
            Self::OAuth2(s) => s.login_redirect_url(success_url),
            Self::Hybrid(s) => s.login_redirect_url(success_url).await,
        }
    }

    /// Verify callback parameters and enter `Verified`.
    ///
    /// On failure the state is left as it was.
    pub async fn verify_response(
        &mut self,
        params: &CallbackParams,
    ) -> SocialAuthResult<AccessGrant> {
        match self {
            Self::OAuth1(s) => s.verify_response(params).await,
            Self::OAuth2(s) => s.verify_response(params).await,
            Self::Hybrid(s) => s.verify_response(params).await,
        }
    }

    /// Execute an authenticated API call.
    pub async fn execute(&self, request: ApiRequest) -> SocialAuthResult<HttpResponse> {
        let grant = api_grant(self.access_grant(), self.provider_id())?;
        self.consumer().execute(request, grant).await
    }

    pub fn access_grant(&self) -> Option<&AccessGrant> {
        match self {
            Self::OAuth1(s) => s.state().grant(),
            Self::OAuth2(s) => s.state().grant(),
            Self::Hybrid(s) => s.state().grant(),
        }
    }

    /// Enter `Verified` directly with a previously exported grant.
    pub fn set_access_grant(&mut self, grant: AccessGrant) -> SocialAuthResult<()> {
        check_grant_owner(&grant, self.provider_id())?;
        tracing::debug!(provider = %grant.provider_id, "access grant restored");
        match self {
            Self::OAuth1(s) => s.set_state(StrategyState::Verified(grant)),
            Self::OAuth2(s) => s.set_state(StrategyState::Verified(grant)),
            Self::Hybrid(s) => s.set_state(StrategyState::Verified(grant)),
        }
        Ok(())
    }

    /// Drop any grant or pending redirect; idempotent.
    pub fn logout(&mut self) {
        match self {
            Self::OAuth1(s) => s.set_state(StrategyState::Unstarted),
            Self::OAuth2(s) => s.set_state(StrategyState::Unstarted),
            Self::Hybrid(s) => s.set_state(StrategyState::Unstarted),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::consumer::{SigningMode, TokenPlacement};
    use crate::core::transport::MockHttpTransport;
    use crate::error::{AuthorizationError, SocialAuthError};
    use pretty_assertions::assert_eq;
    use secrecy::SecretString;
    use std::sync::Arc;

    fn oauth2_strategy(transport: Arc<MockHttpTransport>) -> Strategy {
        let consumer = OAuthConsumer::new(
            "example",
            "client-id",
            SecretString::new("client-secret".to_string()),
            SigningMode::OAuth2(TokenPlacement::default()),
            transport,
        );
        Strategy::OAuth2(OAuth2Strategy::new(
            consumer,
            OAuth2Endpoints::new("https://provider/auth", "https://provider/token"),
        ))
    }

    fn oauth1_strategy(transport: Arc<MockHttpTransport>) -> Strategy {
        let consumer = OAuthConsumer::new(
            "example",
            "consumer-key",
            SecretString::new("consumer-secret".to_string()),
            SigningMode::OAuth1,
            transport,
        );
        Strategy::OAuth1(OAuth1Strategy::new(
            consumer,
            OAuth1Endpoints {
                request_token_url: "https://provider/request_token".to_string(),
                authorization_url: "https://provider/authorize".to_string(),
                access_token_url: "https://provider/access_token".to_string(),
            },
        ))
    }

    #[tokio::test]
    async fn test_oauth2_end_to_end() {
        let transport = Arc::new(MockHttpTransport::new());
        let mut strategy = oauth2_strategy(transport.clone());
        strategy
            .set_permission(Permission::Custom, Some("read".to_string()))
            .unwrap();

        let url = strategy.login_redirect_url("https://app/cb").await.unwrap();
        assert!(url.starts_with("https://provider/auth?"));
        assert!(url.contains("client_id=client-id"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("redirect_uri=https%3A%2F%2Fapp%2Fcb"));
        assert!(url.contains("scope=read"));
        assert!(transport.get_requests().is_empty());
        assert_eq!(strategy.state_name(), "redirect_issued");

        transport.queue_json_response(200, &serde_json::json!({"access_token": "xyz"}));
        let grant = strategy
            .verify_response(&CallbackParams::new().with("code", "abc"))
            .await
            .unwrap();

        assert_eq!(grant.key, "xyz");
        assert_eq!(grant.provider_id, "example");
        assert_eq!(grant.permission, Permission::Custom);
        assert_eq!(strategy.state_name(), "verified");

        let exchange = transport.get_last_request().unwrap();
        assert!(exchange.url.starts_with("https://provider/token"));
        let body = exchange.body_text().unwrap_or_default().to_string();
        let sent = format!("{}&{}", exchange.url, body);
        assert!(sent.contains("code=abc"));
        assert!(sent.contains("client_secret=client-secret"));
    }

    #[tokio::test]
    async fn test_verify_before_redirect_is_state_error() {
        let transport = Arc::new(MockHttpTransport::new());
        for mut strategy in [
            oauth1_strategy(transport.clone()),
            oauth2_strategy(transport.clone()),
        ] {
            let params = CallbackParams::new()
                .with("code", "abc")
                .with("oauth_token", "t")
                .with("oauth_verifier", "v");
            let first = strategy.verify_response(&params).await;
            let second = strategy.verify_response(&params).await;

            assert!(matches!(
                first,
                Err(SocialAuthError::State(StateError::RedirectNotIssued { .. }))
            ));
            assert!(matches!(
                second,
                Err(SocialAuthError::State(StateError::RedirectNotIssued { .. }))
            ));
            assert_eq!(strategy.state_name(), "unstarted");
        }
        assert!(transport.get_requests().is_empty());
    }

    #[tokio::test]
    async fn test_access_denied_is_distinct() {
        let transport = Arc::new(MockHttpTransport::new());
        let mut strategy = oauth2_strategy(transport);
        strategy.login_redirect_url("https://app/cb").await.unwrap();

        let error = strategy
            .verify_response(&CallbackParams::new().with("error", "access_denied"))
            .await
            .unwrap_err();

        assert!(error.is_user_denied());
        assert!(matches!(
            error,
            SocialAuthError::Authorization(AuthorizationError::AccessDenied { .. })
        ));
        assert_eq!(strategy.state_name(), "redirect_issued");
    }

    #[tokio::test]
    async fn test_execute_before_verify() {
        let transport = Arc::new(MockHttpTransport::new());
        for strategy in [
            oauth1_strategy(transport.clone()),
            oauth2_strategy(transport.clone()),
        ] {
            let result = strategy.execute(ApiRequest::get("https://provider/me")).await;
            let error = result.unwrap_err();
            assert!(error.to_string().contains("call verify_response first"));
        }
    }

    #[tokio::test]
    async fn test_restored_grant_produces_same_request() {
        let transport = Arc::new(MockHttpTransport::new());
        let mut verified = oauth2_strategy(transport.clone());
        verified.login_redirect_url("https://app/cb").await.unwrap();
        transport.queue_form_response(200, "access_token=T&expires=3600");
        let grant = verified
            .verify_response(&CallbackParams::new().with("code", "abc"))
            .await
            .unwrap();
        assert_eq!(grant.expires_in, Some(3600));

        let exported = grant.to_key_values();
        let mut restored = oauth2_strategy(transport.clone());
        restored
            .set_access_grant(AccessGrant::from_key_values(&exported).unwrap())
            .unwrap();

        transport.clear_history();
        transport.queue_json_response(200, &serde_json::json!({}));
        transport.queue_json_response(200, &serde_json::json!({}));
        verified
            .execute(ApiRequest::get("https://provider/me").param("fields", "id"))
            .await
            .unwrap();
        restored
            .execute(ApiRequest::get("https://provider/me").param("fields", "id"))
            .await
            .unwrap();

        let requests = transport.get_requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].url, requests[1].url);
        assert_eq!(requests[0].headers, requests[1].headers);
    }

    #[tokio::test]
    async fn test_foreign_grant_rejected() {
        let transport = Arc::new(MockHttpTransport::new());
        let mut strategy = oauth2_strategy(transport);
        let result = strategy.set_access_grant(AccessGrant::new("twitter", "T"));
        assert!(matches!(
            result,
            Err(SocialAuthError::State(StateError::ForeignGrant { .. }))
        ));
        assert!(strategy.access_grant().is_none());
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let transport = Arc::new(MockHttpTransport::new());
        let mut strategy = oauth2_strategy(transport);
        strategy
            .set_access_grant(AccessGrant::new("example", "T"))
            .unwrap();

        strategy.logout();
        strategy.logout();
        assert_eq!(strategy.state_name(), "unstarted");
        assert!(strategy.access_grant().is_none());
        assert!(strategy.login_redirect_url("https://app/cb").await.is_ok());
    }

    #[tokio::test]
    async fn test_second_redirect_requires_logout() {
        let transport = Arc::new(MockHttpTransport::new());
        let mut strategy = oauth2_strategy(transport);
        strategy.login_redirect_url("https://app/cb").await.unwrap();

        let result = strategy.login_redirect_url("https://app/cb").await;
        assert!(matches!(
            result,
            Err(SocialAuthError::State(StateError::RedirectAlreadyIssued { .. }))
        ));
        assert!(strategy.set_permission(Permission::All, None).is_err());
    }
}
