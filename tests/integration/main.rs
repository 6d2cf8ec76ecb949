//! Integration tests using WireMock
//!
//! Full login flows through `ReqwestHttpTransport` against stub provider
//! endpoints. Provider hosts are rewritten onto the mock server, so
//! `https://api.github.com/user` is served from `{mock}/api.github.com/user`.

mod hybrid_flow;
mod oauth1_flow;
mod oauth2_flow;

use std::sync::Arc;

use async_trait::async_trait;
use social_auth::{
    oauth_config, HttpRequest, HttpResponse, HttpTransport, ReqwestHttpTransport,
    SocialAuthConfig, SocialAuthError, SocialAuthManager,
};
use wiremock::MockServer;

/// Transport that sends every `https://<host>/<path>` request to `<base>/<host>/<path>`.
pub struct HostRewriteTransport {
    inner: ReqwestHttpTransport,
    base: String,
}

impl HostRewriteTransport {
    pub fn new(server: &MockServer) -> Self {
        Self {
            inner: ReqwestHttpTransport::new().expect("Failed to build transport"),
            base: server.uri(),
        }
    }
}

#[async_trait]
impl HttpTransport for HostRewriteTransport {
    async fn send(&self, mut request: HttpRequest) -> Result<HttpResponse, SocialAuthError> {
        if let Some(rest) = request.url.strip_prefix("https://") {
            request.url = format!("{}/{}", self.base, rest);
        }
        self.inner.send(request).await
    }
}

/// Helper to create a mock server
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

/// Manager with every listed provider configured and requests routed to `server`.
pub fn manager_for(server: &MockServer, provider_ids: &[&str]) -> SocialAuthManager {
    let mut config = SocialAuthConfig::new();
    for id in provider_ids {
        config.add_provider(
            *id,
            oauth_config()
                .consumer_key(format!("{}-key", id))
                .consumer_secret(format!("{}-secret", id))
                .build()
                .expect("Failed to build config"),
        );
    }
    SocialAuthManager::with_transport(config, Arc::new(HostRewriteTransport::new(server)))
}
