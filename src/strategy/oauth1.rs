//! OAuth 1.0a three-legged strategy.

use crate::core::consumer::OAuthConsumer;
use crate::core::encoding::append_query;
use crate::core::signature::TokenPair;
use crate::error::{AuthorizationError, SocialAuthResult, StateError};
use crate::strategy::StrategyState;
use crate::types::{AccessGrant, AttributeValue, CallbackParams, Permission, EXPIRES};

/// OAuth 1.0a endpoints.
#[derive(Clone, Debug)]
pub struct OAuth1Endpoints {
    pub request_token_url: String,
    pub authorization_url: String,
    pub access_token_url: String,
}

/// Request token held between redirect and callback.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingRequestToken {
    pub token: TokenPair,
    pub callback_url: String,
}

/// OAuth 1.0a strategy.
#[derive(Debug)]
pub struct OAuth1Strategy {
    consumer: OAuthConsumer,
    endpoints: OAuth1Endpoints,
    permission: Permission,
    scope: Option<String>,
    state: StrategyState<PendingRequestToken>,
}

impl OAuth1Strategy {
    pub fn new(consumer: OAuthConsumer, endpoints: OAuth1Endpoints) -> Self {
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

    pub fn state(&self) -> &StrategyState<PendingRequestToken> {
        &self.state
    }

    pub(crate) fn set_state(&mut self, state: StrategyState<PendingRequestToken>) {
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

    /// Obtain a request token and build the authorization URL for it.
    pub async fn login_redirect_url(&mut self, success_url: &str) -> SocialAuthResult<String> {
        self.state.ensure_unstarted(self.consumer.provider_id())?;

        // Scoped request tokens (LinkedIn) carry the scope on the token request.
        let request_token_url = match self.scope.as_ref().filter(|s| !s.is_empty()) {
            Some(scope) => append_query(
                &self.endpoints.request_token_url,
                &[("scope".to_string(), scope.clone())],
            ),
            None => self.endpoints.request_token_url.clone(),
        };
        let response = self
            .consumer
            .request_token(&request_token_url, success_url)
            .await?;

        let url = append_query(
            &self.endpoints.authorization_url,
            &[("oauth_token".to_string(), response.token.key.clone())],
        );
        tracing::info!(
            provider = self.consumer.provider_id(),
            permission = %self.permission,
            "issued OAuth1 login redirect"
        );

        self.state = StrategyState::RedirectIssued(PendingRequestToken {
            token: response.token,
            callback_url: success_url.to_string(),
        });
        Ok(url)
    }

    pub async fn verify_response(&mut self, params: &CallbackParams) -> SocialAuthResult<AccessGrant> {
        let provider_id = self.consumer.provider_id().to_string();
        let pending = self.state.require_pending(&provider_id)?.clone();

        if params.contains("denied") || params.get("oauth_problem") == Some("user_refused") {
            tracing::warn!(provider = %provider_id, "user denied OAuth1 authorization");
            return Err(AuthorizationError::AccessDenied {
                provider_id,
                error_description: params.get("oauth_problem").map(str::to_string),
            }
            .into());
        }
        if let Some(problem) = params.get("oauth_problem") {
            return Err(AuthorizationError::Rejected {
                provider_id,
                error: problem.to_string(),
                error_description: params.get("oauth_problem_advice").map(str::to_string),
            }
            .into());
        }
        if let Some(token) = params.get("oauth_token") {
            if token != pending.token.key {
                tracing::warn!(provider = %provider_id, "callback token does not match request token");
                return Err(StateError::TokenMismatch { provider_id }.into());
            }
        }

        let response = self
            .consumer
            .access_token(
                &self.endpoints.access_token_url,
                &pending.token,
                params.get("oauth_verifier"),
            )
            .await?;

        let mut grant = AccessGrant::new(&provider_id, response.token.key)
            .with_secret(response.token.secret)
            .with_permission(self.permission);
        for (name, value) in response.extra {
            match name.as_str() {
                "oauth_expires_in" => grant.set_attribute(EXPIRES, AttributeValue::from_flat(&value)),
                _ => grant.set_attribute(name, AttributeValue::from_flat(&value)),
            }
        }

        tracing::info!(provider = %provider_id, "OAuth1 callback verified");
        self.state = StrategyState::Verified(grant.clone());
        Ok(grant)
    }
}
