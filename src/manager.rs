//! Social Auth Manager
//!
//! Session-scoped registry: builds a fresh provider adapter for each login,
//! remembers which provider started the flow and routes the generic callback
//! back to it.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use crate::core::consumer::SharedTransport;
use crate::core::transport::ReqwestHttpTransport;
use crate::error::{ConfigurationError, SocialAuthError, SocialAuthResult, StateError};
use crate::providers::{AuthProvider, ProviderKind};
use crate::telemetry::{AuthLogContext, Logger, TracingLogger};
use crate::types::{
    AccessGrant, CallbackParams, CallbackShape, OAuthConfig, Permission, SocialAuthConfig,
};

/// Entry point for applications: one instance per user session.
pub struct SocialAuthManager {
    config: SocialAuthConfig,
    transport: SharedTransport,
    logger: Arc<dyn Logger>,
    providers: HashMap<ProviderKind, Box<dyn AuthProvider>>,
    current: Option<ProviderKind>,
}

impl SocialAuthManager {
    /// Create a manager with the default reqwest transport.
    pub fn new(config: SocialAuthConfig) -> SocialAuthResult<Self> {
        let transport = Arc::new(ReqwestHttpTransport::new()?);
        Ok(Self::with_transport(config, transport))
    }

    /// Create a manager with a custom transport.
    pub fn with_transport(config: SocialAuthConfig, transport: SharedTransport) -> Self {
        Self {
            config,
            transport,
            logger: Arc::new(TracingLogger::new()),
            providers: HashMap::new(),
            current: None,
        }
    }

    /// Replace the milestone logger.
    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn config(&self) -> &SocialAuthConfig {
        &self.config
    }

    /// Start a login with the default permission.
    pub async fn login_redirect_url(
        &mut self,
        provider_id: &str,
        success_url: &str,
    ) -> SocialAuthResult<String> {
        self.login_redirect_url_with_permission(provider_id, success_url, Permission::Default)
            .await
    }

    /// Start a login and make the provider current.
    ///
    /// Any earlier session with the same provider is replaced by a fresh adapter.
    pub async fn login_redirect_url_with_permission(
        &mut self,
        provider_id: &str,
        success_url: &str,
        permission: Permission,
    ) -> SocialAuthResult<String> {
        let kind: ProviderKind = provider_id.parse()?;
        let context = AuthLogContext::new()
            .provider(kind.id())
            .operation("login_redirect_url")
            .extra("permission", permission.to_string());

        let mut provider = kind.create(self.provider_config(kind)?.clone(), self.transport.clone());
        provider.set_permission(permission)?;
        let url = match provider.login_redirect_url(success_url).await {
            Ok(url) => url,
            Err(e) => {
                self.logger.error(
                    "failed to build login redirect",
                    &context.error_code(e.error_code()),
                );
                return Err(e);
            }
        };

        self.providers.insert(kind, provider);
        self.current = Some(kind);
        self.logger.info("login redirect issued", &context);
        Ok(url)
    }

    /// Verify a callback with the provider that is waiting for it.
    pub async fn connect(
        &mut self,
        params: &CallbackParams,
    ) -> SocialAuthResult<&mut dyn AuthProvider> {
        let kind = self.route(params)?;
        let context = AuthLogContext::new()
            .provider(kind.id())
            .operation("connect")
            .extra("shape", format!("{:?}", params.shape()));

        let provider = self
            .providers
            .get_mut(&kind)
            .ok_or(StateError::NoPendingProvider)?;
        if let Err(e) = provider.verify_response(params).await {
            if e.is_user_denied() {
                self.logger.warn("user denied authorization", &context.error_code(e.error_code()));
            } else {
                self.logger.error("callback verification failed", &context.error_code(e.error_code()));
            }
            return Err(e);
        }

        self.current = Some(kind);
        self.logger.info("provider connected", &context);
        Ok(provider.as_mut())
    }

    /// Connect with a previously exported grant, skipping the redirect.
    pub fn connect_with_grant(
        &mut self,
        grant: AccessGrant,
    ) -> SocialAuthResult<&mut dyn AuthProvider> {
        let kind: ProviderKind = grant.provider_id.parse()?;
        let mut provider = kind.create(self.provider_config(kind)?.clone(), self.transport.clone());
        provider.set_access_grant(grant)?;

        self.logger.info(
            "provider connected with stored grant",
            &AuthLogContext::new()
                .provider(kind.id())
                .operation("connect_with_grant"),
        );
        self.current = Some(kind);
        let slot = match self.providers.entry(kind) {
            Entry::Occupied(mut entry) => {
                entry.insert(provider);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(provider),
        };
        Ok(slot.as_mut())
    }

    /// Provider with a session in this manager, connected or not.
    pub fn provider(&self, provider_id: &str) -> Option<&dyn AuthProvider> {
        let kind: ProviderKind = provider_id.parse().ok()?;
        self.providers.get(&kind).map(|p| p.as_ref())
    }

    pub fn provider_mut(&mut self, provider_id: &str) -> Option<&mut dyn AuthProvider> {
        let kind: ProviderKind = provider_id.parse().ok()?;
        match self.providers.get_mut(&kind) {
            Some(provider) => Some(provider.as_mut()),
            None => None,
        }
    }

    /// Provider that most recently issued a redirect or connected.
    pub fn current_provider(&self) -> Option<&dyn AuthProvider> {
        self.current
            .and_then(|kind| self.providers.get(&kind))
            .map(|p| p.as_ref())
    }

    pub fn current_provider_mut(&mut self) -> Option<&mut dyn AuthProvider> {
        let kind = self.current?;
        match self.providers.get_mut(&kind) {
            Some(provider) => Some(provider.as_mut()),
            None => None,
        }
    }

    /// Ids of providers holding an access grant.
    pub fn connected_provider_ids(&self) -> Vec<&'static str> {
        ProviderKind::ALL
            .into_iter()
            .filter(|kind| {
                self.providers
                    .get(kind)
                    .is_some_and(|p| p.access_grant().is_some())
            })
            .map(|kind| kind.id())
            .collect()
    }

    /// Log out of one provider and forget its session.
    pub fn disconnect(&mut self, provider_id: &str) -> SocialAuthResult<bool> {
        let kind: ProviderKind = provider_id.parse()?;
        let Some(mut provider) = self.providers.remove(&kind) else {
            return Ok(false);
        };
        provider.logout();
        if self.current == Some(kind) {
            self.current = None;
        }
        self.logger.info(
            "provider disconnected",
            &AuthLogContext::new().provider(kind.id()).operation("disconnect"),
        );
        Ok(true)
    }

    pub fn disconnect_all(&mut self) {
        for (kind, mut provider) in self.providers.drain() {
            provider.logout();
            self.logger.debug(
                "provider disconnected",
                &AuthLogContext::new().provider(kind.id()).operation("disconnect_all"),
            );
        }
        self.current = None;
    }

    /// Configuration registered under the provider id or its alias.
    fn provider_config(&self, kind: ProviderKind) -> SocialAuthResult<&OAuthConfig> {
        self.config
            .get(kind.id())
            .or_else(|| self.config.get(kind.alias()))
            .ok_or_else(|| {
                SocialAuthError::Configuration(ConfigurationError::ProviderNotConfigured {
                    provider_id: kind.id().to_string(),
                })
            })
    }

    /// Pick the provider a callback belongs to.
    fn route(&self, params: &CallbackParams) -> SocialAuthResult<ProviderKind> {
        let shape = params.shape();
        let awaiting = |kind: &ProviderKind| {
            self.providers.get(kind).is_some_and(|p| {
                let strategy = p.strategy();
                strategy.is_awaiting_callback()
                    && (shape == CallbackShape::Unknown || strategy.callback_shape() == shape)
            })
        };

        if shape == CallbackShape::OAuth1 {
            if let Some(token) = params.get("oauth_token") {
                let holder = ProviderKind::ALL.into_iter().find(|kind| {
                    self.providers
                        .get(kind)
                        .is_some_and(|p| p.strategy().pending_request_token() == Some(token))
                });
                if let Some(kind) = holder {
                    return Ok(kind);
                }
            }
        }

        if let Some(current) = self.current.filter(|kind| awaiting(kind)) {
            return Ok(current);
        }
        if shape == CallbackShape::Unknown {
            return Err(StateError::NoPendingProvider.into());
        }
        ProviderKind::ALL
            .into_iter()
            .find(|kind| awaiting(kind))
            .ok_or_else(|| StateError::NoPendingProvider.into())
    }
}

impl std::fmt::Debug for SocialAuthManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocialAuthManager")
            .field("config", &self.config)
            .field("providers", &self.providers)
            .field("current", &self.current)
            .finish()
    }
}

/// Create a manager with the default transport.
pub fn social_auth_manager(config: SocialAuthConfig) -> SocialAuthResult<SocialAuthManager> {
    SocialAuthManager::new(config)
}
