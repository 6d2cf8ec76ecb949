//! OAuth 2.0 authorization code strategy.

use crate::core::consumer::{ApiRequest, OAuthConsumer};
use crate::core::encoding::{append_query, parse_token_response};
use crate::core::transport::HttpMethod;
use crate::error::{AuthorizationError, ConfigurationError, ProtocolError, SocialAuthResult};
use crate::strategy::StrategyState;
use crate::types::{AccessGrant, AttributeValue, CallbackParams, Permission, EXPIRES};

/// Endpoints and request conventions of an OAuth 2.0 provider.
#[derive(Clone, Debug)]
pub struct OAuth2Endpoints {
    pub authorization_url: String,
    pub access_token_url: String,
    /// Method used for the code exchange.
    pub token_method: HttpMethod,
    /// Extra static parameters on the authorization URL.
    pub authorization_params: Vec<(String, String)>,
}

impl OAuth2Endpoints {
    pub fn new(authorization_url: impl Into<String>, access_token_url: impl Into<String>) -> Self {
        Self {
            authorization_url: authorization_url.into(),
            access_token_url: access_token_url.into(),
            token_method: HttpMethod::Post,
            authorization_params: Vec::new(),
        }
    }

    pub fn token_method(mut self, method: HttpMethod) -> Self {
        self.token_method = method;
        self
    }

    pub fn authorization_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.authorization_params.push((name.into(), value.into()));
        self
    }
}

/// Data held between redirect and callback.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingAuthorization {
    pub redirect_uri: String,
}

/// OAuth 2.0 strategy.
#[derive(Debug)]
pub struct OAuth2Strategy {
    consumer: OAuthConsumer,
    endpoints: OAuth2Endpoints,
    permission: Permission,
    scope: Option<String>,
    state: StrategyState<PendingAuthorization>,
}

impl OAuth2Strategy {
    pub fn new(consumer: OAuthConsumer, endpoints: OAuth2Endpoints) -> Self {
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

    pub fn state(&self) -> &StrategyState<PendingAuthorization> {
        &self.state
    }

    pub(crate) fn set_state(&mut self, state: StrategyState<PendingAuthorization>) {
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

    /// Authorization URL; no network call is made.
    pub fn login_redirect_url(&mut self, success_url: &str) -> SocialAuthResult<String> {
        let provider_id = self.consumer.provider_id();
        self.state.ensure_unstarted(provider_id)?;

        let mut params = vec![
            ("client_id".to_string(), self.consumer.consumer_key().to_string()),
            ("response_type".to_string(), "code".to_string()),
            ("redirect_uri".to_string(), success_url.to_string()),
        ];
        if let Some(scope) = self.scope.as_ref().filter(|s| !s.is_empty()) {
            params.push(("scope".to_string(), scope.clone()));
        }
        params.extend(self.endpoints.authorization_params.iter().cloned());

        let url = append_query(&self.endpoints.authorization_url, &params);
        tracing::info!(provider = provider_id, permission = %self.permission, "issued OAuth2 login redirect");

        self.state = StrategyState::RedirectIssued(PendingAuthorization {
            redirect_uri: success_url.to_string(),
        });
        Ok(url)
    }

    pub async fn verify_response(&mut self, params: &CallbackParams) -> SocialAuthResult<AccessGrant> {
        let provider_id = self.consumer.provider_id().to_string();
        let pending = self.state.require_pending(&provider_id)?.clone();

        if let Some(error) = params.get("error") {
            let description = params
                .get("error_description")
                .or_else(|| params.get("error_message"))
                .map(str::to_string);
            tracing::warn!(provider = %provider_id, error, "authorization callback reported an error");
            if error == "access_denied" || params.get("error_reason") == Some("user_denied") {
                return Err(AuthorizationError::AccessDenied {
                    provider_id,
                    error_description: description,
                }
                .into());
            }
            return Err(AuthorizationError::Rejected {
                provider_id,
                error: error.to_string(),
                error_description: description,
            }
            .into());
        }

        let grant = if let Some(token) = params.get("access_token").filter(|t| !t.is_empty()) {
            let mut grant = AccessGrant::new(&provider_id, token).with_permission(self.permission);
            if let Some(expires) = params.get("expires_in").or_else(|| params.get("expires")) {
                grant.set_attribute(EXPIRES, AttributeValue::from_flat(expires));
            }
            grant
        } else {
            let code = params
                .get("code")
                .or_else(|| params.get("wrap_verification_code"))
                .filter(|c| !c.is_empty())
                .ok_or_else(|| ProtocolError::MissingField {
                    field: "code".to_string(),
                })?;
            self.exchange_code(code, &pending.redirect_uri).await?
        };

        tracing::info!(provider = %provider_id, "OAuth2 callback verified");
        self.state = StrategyState::Verified(grant.clone());
        Ok(grant)
    }

    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> SocialAuthResult<AccessGrant> {
        let provider_id = self.consumer.provider_id();
        let url = &self.endpoints.access_token_url;
        let request = ApiRequest::new(self.endpoints.token_method, url.as_str())
            .param("client_id", self.consumer.consumer_key())
            .param("client_secret", self.consumer.consumer_secret())
            .param("redirect_uri", redirect_uri)
            .param("code", code)
            .param("grant_type", "authorization_code")
            .header("Accept", "application/json");

        tracing::debug!(provider = provider_id, url = %url, "exchanging authorization code");
        let response = self.consumer.execute_unauthenticated(request).await?;
        let token = parse_token_response(url, &response.body)?;

        let Some(access_token) = token.access_token.filter(|t| !t.is_empty()) else {
            if let Some(error) = token.error {
                return Err(AuthorizationError::Rejected {
                    provider_id: provider_id.to_string(),
                    error,
                    error_description: token.error_description,
                }
                .into());
            }
            return Err(ConfigurationError::MissingAccessToken {
                provider_id: provider_id.to_string(),
                url: url.clone(),
            }
            .into());
        };

        let mut grant = AccessGrant::new(provider_id, access_token).with_permission(self.permission);
        grant.expires_in = token.expires_in;
        grant.refresh_token = token.refresh_token;
        grant.attributes = token.extra;
        Ok(grant)
    }
}
