//! Social Auth
//!
//! Multi-provider social identity integration: log users in through OAuth 1.0a,
//! OAuth 2.0 or OpenID/OAuth hybrid flows, then read their profile, contacts,
//! feeds, albums and career data in one provider-agnostic model.
//!
//! # Features
//!
//! - OAuth 1.0a three-legged flow with HMAC-SHA1 request signing (RFC 5849)
//! - OAuth 2.0 authorization code flow (RFC 6749 Section 4.1)
//! - OpenID 2.0 + OAuth hybrid flow with Attribute Exchange
//! - Adapters for Facebook, Twitter, LinkedIn, Google, Google+, Instagram and GitHub
//! - Feed, album and career plugins behind capability queries
//! - Exportable access grants for resuming sessions
//!
//! # Example
//!
//! ```rust,ignore
//! use social_auth::{oauth_config, CallbackParams, SocialAuthConfig, SocialAuthManager};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SocialAuthConfig::new().with_provider(
//!         "facebook",
//!         oauth_config()
//!             .consumer_key("my-app-id")
//!             .consumer_secret("my-app-secret")
//!             .build()?,
//!     );
//!     let mut manager = SocialAuthManager::new(config)?;
//!
//!     // Send the user here.
//!     let url = manager
//!         .login_redirect_url("facebook", "https://myapp.com/callback")
//!         .await?;
//!     println!("Login at: {}", url);
//!
//!     // Later, with the query string the provider redirected back with:
//!     let params = CallbackParams::from_query("code=...");
//!     let provider = manager.connect(&params).await?;
//!     let profile = provider.user_profile().await?;
//!     println!("Hello {:?}", profile.full_name);
//!
//!     // Persist the grant to skip the redirect next time.
//!     let stored = provider.access_grant().map(|g| g.to_key_values());
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - `types`: configuration, access grant, callback parameters and normalized entities
//! - `error`: error hierarchy
//! - `core`: HTTP transport, OAuth 1.0a signing, encodings, XML, OpenID and the signed request consumer
//! - `strategy`: OAuth1, OAuth2 and hybrid strategies behind one state machine
//! - `providers`: provider adapters, plugins and the provider factory
//! - `manager`: session-scoped provider registry and callback routing
//! - `builders`: fluent configuration builder
//! - `telemetry`: logging

pub mod builders;
pub mod core;
pub mod error;
pub mod manager;
pub mod providers;
pub mod strategy;
pub mod telemetry;
pub mod types;

// Re-export manager
pub use manager::{social_auth_manager, SocialAuthManager};

// Re-export builders
pub use builders::{oauth_config, OAuthConfigBuilder};

// Re-export errors
pub use error::{
    get_user_message, AuthorizationError, ConfigurationError, NetworkError, ProtocolError,
    ProviderError, SocialAuthError, SocialAuthResult, StateError, UnsupportedError,
};

// Re-export types
pub use types::{
    // Config
    Capability, OAuthConfig, Permission, SocialAuthConfig,
    // Grant
    AccessGrant, AttributeValue, EXPIRES, REFRESH_TOKEN,
    // Callback
    CallbackParams, CallbackShape,
    // Entities
    Album, BirthDate, Career, Contact, Education, Feed, Photo, Position, Profile,
    Recommendation,
};

// Re-export core components
pub use crate::core::{
    // Transport
    FilePart, HttpMethod, HttpRequest, HttpResponse, HttpTransport, MockHttpTransport,
    ReqwestHttpTransport,
    // Consumer
    ApiRequest, OAuthConsumer, SharedTransport, SigningMode, TokenPlacement,
    // Signing
    OAuthSigner, TokenPair,
};

// Re-export strategies
pub use strategy::{
    HybridStrategy, OAuth1Strategy, OAuth2Strategy, Strategy, StrategyState,
};

// Re-export providers
pub use providers::{
    AlbumPlugin, AuthProvider, CareerPlugin, FacebookProvider, FeedPlugin, GitHubProvider,
    GoogleProvider, GooglePlusProvider, ImageUpload, InstagramProvider, LinkedInProvider,
    ProviderKind, TwitterProvider,
};

// Re-export telemetry
pub use telemetry::{
    create_in_memory_logger, create_tracing_logger, AuthLogContext, InMemoryLogger, LogEntry,
    LogLevel, Logger, TracingLogger,
};
