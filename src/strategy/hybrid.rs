//! OpenID 2.0 + OAuth hybrid strategy.
//!
//! The OpenID assertion identifies the user and, unless only authentication
//! was requested, carries a pre-approved OAuth request token that is then
//! exchanged for an access token with a signed OAuth 1.0a call.

use crate::core::consumer::OAuthConsumer;
use crate::core::openid::{self, Association, CheckIdSetup};
use crate::core::signature::TokenPair;
use crate::error::{AuthorizationError, ProtocolError, SocialAuthResult};
use crate::strategy::StrategyState;
use crate::types::{AccessGrant, AttributeValue, CallbackParams, Permission};

/// OpenID endpoint plus the OAuth access token endpoint.
#[derive(Clone, Debug)]
pub struct HybridEndpoints {
    pub openid_endpoint: String,
    pub access_token_url: String,
}

/// Association held between redirect and callback.
#[derive(Clone, Debug)]
pub struct PendingAssociation {
    pub association: Association,
    pub return_to: String,
}

/// Hybrid OpenID/OAuth strategy.
#[derive(Debug)]
pub struct HybridStrategy {
    consumer: OAuthConsumer,
    endpoints: HybridEndpoints,
    permission: Permission,
    scope: Option<String>,
    state: StrategyState<PendingAssociation>,
}

impl HybridStrategy {
    pub fn new(consumer: OAuthConsumer, endpoints: HybridEndpoints) -> Self {
        Self {
            consumer,
            endpoints,
            permission: Permission::Default,
            scope: None,
            state: StrategyState::Unstarted,
        }
    }

    pub fn consumer(&self) -> &OAuthConsumer {
        &self.consumer
    }

    pub fn permission(&self) -> Permission {
        self.permission
    }

    pub fn state(&self) -> &StrategyState<PendingAssociation> {
        &self.state
    }

    pub(crate) fn set_state(&mut self, state: StrategyState<PendingAssociation>) {
        self.state = state;
    }

    /// Scope requested by a fresh strategy under the default permission.
    pub(crate) fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn set_permission(
        &mut self,
        permission: Permission,
        scope: Option<String>,
    ) -> SocialAuthResult<()> {
        self.state.ensure_unstarted(self.consumer.provider_id())?;
        self.permission = permission;
        self.scope = scope;
        Ok(())
    }

    pub async fn login_redirect_url(&mut self, success_url: &str) -> SocialAuthResult<String> {
        let provider_id = self.consumer.provider_id();
        self.state.ensure_unstarted(provider_id)?;

        let association = openid::associate(
            self.consumer.transport().as_ref(),
            provider_id,
            &self.endpoints.openid_endpoint,
        )
        .await?;

        let authenticate_only = self.permission == Permission::AuthenticateOnly;
        let url = openid::checkid_setup_url(&CheckIdSetup {
            endpoint: &self.endpoints.openid_endpoint,
            return_to: success_url,
            assoc_handle: &association.handle,
            oauth_consumer: (!authenticate_only).then(|| self.consumer.consumer_key()),
            oauth_scope: self.scope.as_deref(),
        })?;
        tracing::info!(
            provider = provider_id,
            permission = %self.permission,
            "issued OpenID hybrid login redirect"
        );

        self.state = StrategyState::RedirectIssued(PendingAssociation {
            association,
            return_to: success_url.to_string(),
        });
        Ok(url)
    }

    pub async fn verify_response(&mut self, params: &CallbackParams) -> SocialAuthResult<AccessGrant> {
        let provider_id = self.consumer.provider_id().to_string();
        let pending = self.state.require_pending(&provider_id)?.clone();

        match params.get("openid.mode") {
            Some("cancel") => {
                tracing::warn!(provider = %provider_id, "user cancelled OpenID authentication");
                return Err(AuthorizationError::AccessDenied {
                    provider_id,
                    error_description: None,
                }
                .into());
            }
            Some("id_res") => {}
            Some(mode) => {
                return Err(AuthorizationError::Rejected {
                    provider_id,
                    error: mode.to_string(),
                    error_description: params.get("openid.error").map(str::to_string),
                }
                .into());
            }
            None => {
                return Err(ProtocolError::MissingField {
                    field: "openid.mode".to_string(),
                }
                .into());
            }
        }

        let signed = openid::verify_assertion(
            &provider_id,
            params,
            &pending.association,
            &pending.return_to,
        )
        .map_err(|error| {
            tracing::warn!(provider = %provider_id, error = %error, "rejected OpenID assertion");
            error
        })?;

        let mut grant = if self.permission == Permission::AuthenticateOnly {
            AccessGrant::new(&provider_id, "").with_permission(Permission::AuthenticateOnly)
        } else {
            let request_token = openid::request_token(&signed).ok_or_else(|| {
                ProtocolError::MissingField {
                    field: "openid.oauth.request_token".to_string(),
                }
            })?;
            let response = self
                .consumer
                .access_token(
                    &self.endpoints.access_token_url,
                    &TokenPair::new(request_token, ""),
                    None,
                )
                .await?;
            let mut grant = AccessGrant::new(&provider_id, response.token.key)
                .with_secret(response.token.secret)
                .with_permission(self.permission);
            for (name, value) in response.extra {
                grant.set_attribute(name, AttributeValue::from_flat(&value));
            }
            grant
        };

        if let Some(identity) = signed
            .get("openid.claimed_id")
            .or_else(|| signed.get("openid.identity"))
        {
            grant.set_attribute("openid_identity", identity);
        }

        tracing::info!(provider = %provider_id, "OpenID assertion verified");
        self.state = StrategyState::Verified(grant.clone());
        Ok(grant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::consumer::{ApiRequest, SigningMode};
    use crate::core::openid::sign_assertion;
    use crate::core::transport::MockHttpTransport;
    use crate::error::{SocialAuthError, StateError};
    use crate::strategy::Strategy;
    use pretty_assertions::assert_eq;
    use secrecy::SecretString;
    use std::sync::Arc;

    const ASSOCIATION: &str =
        "ns:http://specs.openid.net/auth/2.0\nassoc_handle:AMlYA9Vn\nmac_key:c2VjcmV0LW1hYy1rZXk=\n";

    fn strategy(transport: Arc<MockHttpTransport>) -> HybridStrategy {
        let consumer = OAuthConsumer::new(
            "google",
            "app.example.com",
            SecretString::new("secret".to_string()),
            SigningMode::OAuth1,
            transport,
        );
        HybridStrategy::new(
            consumer,
            HybridEndpoints {
                openid_endpoint: "https://www.google.com/accounts/o8/ud".to_string(),
                access_token_url: "https://www.google.com/accounts/OAuthGetAccessToken"
                    .to_string(),
            },
        )
    }

    fn assertion() -> CallbackParams {
        sign_assertion(
            CallbackParams::new()
                .with("openid.mode", "id_res")
                .with("openid.return_to", "https://app/cb")
                .with("openid.assoc_handle", "AMlYA9Vn")
                .with("openid.claimed_id", "https://www.google.com/accounts/o8/id?id=AItOaw")
                .with("openid.ext2.request_token", "4/preapproved"),
        )
    }

    #[tokio::test]
    async fn test_hybrid_flow() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_text_response(200, "text/plain", ASSOCIATION);
        let mut strategy = strategy(transport.clone());
        strategy
            .set_permission(Permission::Default, Some("https://www.google.com/m8/feeds/".to_string()))
            .unwrap();

        let url = strategy.login_redirect_url("https://app/cb").await.unwrap();
        assert!(url.contains("openid.assoc_handle=AMlYA9Vn"));
        assert!(url.contains("openid.oauth.consumer=app.example.com"));

        transport.queue_form_response(200, "oauth_token=acc&oauth_token_secret=sec");
        let grant = strategy.verify_response(&assertion()).await.unwrap();

        assert_eq!(grant.key, "acc");
        assert_eq!(grant.secret.as_deref(), Some("sec"));
        assert_eq!(
            grant.text_attribute("openid_identity").as_deref(),
            Some("https://www.google.com/accounts/o8/id?id=AItOaw")
        );
        let exchange = transport.get_last_request().unwrap();
        assert!(exchange
            .header("Authorization")
            .unwrap()
            .contains("oauth_token=\"4%2Fpreapproved\""));
    }

    #[tokio::test]
    async fn test_authenticate_only_skips_exchange() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_text_response(200, "text/plain", ASSOCIATION);
        let mut hybrid = strategy(transport.clone());
        hybrid.set_permission(Permission::AuthenticateOnly, None).unwrap();

        let url = hybrid.login_redirect_url("https://app/cb").await.unwrap();
        assert!(!url.contains("openid.ns.oauth"));

        let grant = hybrid.verify_response(&assertion()).await.unwrap();
        assert!(grant.is_authenticate_only());
        assert_eq!(grant.permission, Permission::AuthenticateOnly);
        assert_eq!(transport.get_requests().len(), 1);

        let strategy = Strategy::Hybrid(hybrid);
        let result = strategy.execute(ApiRequest::get("https://www.google.com/m8/feeds")).await;
        assert!(matches!(
            result,
            Err(SocialAuthError::State(StateError::AuthenticateOnly { .. }))
        ));
    }

    #[tokio::test]
    async fn test_cancel_is_denial() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_text_response(200, "text/plain", ASSOCIATION);
        let mut strategy = strategy(transport);
        strategy.login_redirect_url("https://app/cb").await.unwrap();

        let error = strategy
            .verify_response(&CallbackParams::new().with("openid.mode", "cancel"))
            .await
            .unwrap_err();
        assert!(error.is_user_denied());
        assert_eq!(strategy.state().name(), "redirect_issued");
    }

    #[tokio::test]
    async fn test_verify_without_redirect() {
        let transport = Arc::new(MockHttpTransport::new());
        let mut strategy = strategy(transport);
        let result = strategy.verify_response(&assertion()).await;
        assert!(matches!(
            result,
            Err(SocialAuthError::State(StateError::RedirectNotIssued { .. }))
        ));
    }

    #[tokio::test]
    async fn test_assertion_for_another_redirect_is_rejected() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_text_response(200, "text/plain", ASSOCIATION);
        let mut hybrid = strategy(transport.clone());
        hybrid.set_permission(Permission::AuthenticateOnly, None).unwrap();
        hybrid.login_redirect_url("https://app/cb").await.unwrap();

        let forged = CallbackParams::new()
            .with("openid.mode", "id_res")
            .with("openid.assoc_handle", "ATTACKER")
            .with("openid.return_to", "https://evil/cb")
            .with("openid.claimed_id", "https://evil/id")
            .with("openid.ext1.value.email", "victim@gmail.com");
        let error = hybrid.verify_response(&forged).await.unwrap_err();
        assert!(matches!(
            error,
            SocialAuthError::State(StateError::AssertionMismatch { .. })
        ));

        let redirected_elsewhere = sign_assertion(
            CallbackParams::new()
                .with("openid.mode", "id_res")
                .with("openid.assoc_handle", "AMlYA9Vn")
                .with("openid.return_to", "https://evil/cb"),
        );
        assert!(hybrid.verify_response(&redirected_elsewhere).await.is_err());

        let unsigned = CallbackParams::new()
            .with("openid.mode", "id_res")
            .with("openid.assoc_handle", "AMlYA9Vn")
            .with("openid.return_to", "https://app/cb")
            .with("openid.signed", "return_to,assoc_handle")
            .with("openid.sig", "AAAAAAAAAAAAAAAAAAAAAAAAAAA=");
        let error = hybrid.verify_response(&unsigned).await.unwrap_err();
        assert!(matches!(
            error,
            SocialAuthError::Protocol(ProtocolError::InvalidSignature { .. })
        ));

        // Rejections leave the redirect pending for the genuine callback.
        assert_eq!(hybrid.state().name(), "redirect_issued");
        let grant = hybrid.verify_response(&assertion()).await.unwrap();
        assert!(grant.is_authenticate_only());
        assert_eq!(transport.get_requests().len(), 1);
    }
}
