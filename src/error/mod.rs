//! Social Auth Error Types
//!
//! Error hierarchy shared by strategies, providers and the manager.

use thiserror::Error;

/// Root error type for social authentication.
#[derive(Error, Debug)]
pub enum SocialAuthError {
    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Authorization error: {0}")]
    Authorization(#[from] AuthorizationError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Unsupported: {0}")]
    Unsupported(#[from] UnsupportedError),
}

impl SocialAuthError {
    /// Get error code for telemetry.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::State(_) => "SOCIALAUTH_STATE",
            Self::Authorization(AuthorizationError::AccessDenied { .. }) => {
                "SOCIALAUTH_ACCESS_DENIED"
            }
            Self::Authorization(_) => "SOCIALAUTH_AUTH",
            Self::Configuration(_) => "SOCIALAUTH_CONFIG",
            Self::Network(_) => "SOCIALAUTH_NETWORK",
            Self::Protocol(_) => "SOCIALAUTH_PROTOCOL",
            Self::Provider(_) => "SOCIALAUTH_PROVIDER",
            Self::Unsupported(_) => "SOCIALAUTH_UNSUPPORTED",
        }
    }

    /// True when the end user declined the requested permissions.
    pub fn is_user_denied(&self) -> bool {
        matches!(
            self,
            Self::Authorization(AuthorizationError::AccessDenied { .. })
        )
    }

    /// True when the current flow cannot continue and must restart from the redirect.
    ///
    /// Transport and parse failures only fail the call that triggered them.
    pub fn requires_restart(&self) -> bool {
        matches!(
            self,
            Self::State(_) | Self::Configuration(_) | Self::Authorization(_)
        )
    }
}

/// Operation invoked out of sequence.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("No login redirect was issued for {provider_id}; call login_redirect_url first")]
    RedirectNotIssued { provider_id: String },

    #[error("Login redirect already issued for {provider_id}; call logout to restart")]
    RedirectAlreadyIssued { provider_id: String },

    #[error("No access grant for {provider_id}; call verify_response first")]
    NotVerified { provider_id: String },

    #[error("Callback token does not match the pending request token for {provider_id}")]
    TokenMismatch { provider_id: String },

    #[error("OpenID assertion for {provider_id} does not match the issued redirect: {field}")]
    AssertionMismatch { provider_id: String, field: String },

    #[error("Access grant for {provider_id} only authenticates the user and cannot call APIs")]
    AuthenticateOnly { provider_id: String },

    #[error("Access grant belongs to {grant_provider_id}, not {provider_id}")]
    ForeignGrant {
        provider_id: String,
        grant_provider_id: String,
    },

    #[error("No provider is awaiting this callback")]
    NoPendingProvider,
}

/// Authorization flow error reported through the callback.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationError {
    #[error("Access denied by user at {provider_id}")]
    AccessDenied {
        provider_id: String,
        error_description: Option<String>,
    },

    #[error("Authorization rejected by {provider_id}: {error}")]
    Rejected {
        provider_id: String,
        error: String,
        error_description: Option<String>,
    },
}

/// Configuration error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Invalid endpoint URL: {url}")]
    InvalidEndpoint { url: String },

    #[error("Unknown provider: {provider_id}")]
    UnknownProvider { provider_id: String },

    #[error("Provider {provider_id} is not configured")]
    ProviderNotConfigured { provider_id: String },

    #[error("Invalid configuration line {line}: {message}")]
    InvalidProperty { line: usize, message: String },

    #[error("Token endpoint {url} did not return an access token for {provider_id}; check the application keys")]
    MissingAccessToken { provider_id: String, url: String },
}

/// Network/transport error.
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Connection to {url} failed: {message}")]
    ConnectionFailed { url: String, message: String },

    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("Invalid request for {url}: {message}")]
    InvalidRequest { url: String, message: String },

    #[error("HTTP client could not be created: {message}")]
    ClientInit { message: String },
}

/// Protocol/response parsing error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Invalid response from {url}: {message}")]
    InvalidResponse { url: String, message: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Unexpected redirect to: {location}")]
    UnexpectedRedirect { location: String },

    #[error("Response too large: {size} bytes")]
    ResponseTooLarge { size: usize },

    #[error("Invalid JSON from {url}: {message}")]
    InvalidJson { url: String, message: String },

    #[error("Invalid XML: {message}")]
    InvalidXml { message: String },

    #[error("Invalid OpenID signature: {message}")]
    InvalidSignature { message: String },
}

/// Error reported by the remote provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("{provider_id} returned HTTP {status} for {url}")]
    UnexpectedStatus {
        provider_id: String,
        url: String,
        status: u16,
        body: String,
    },

    #[error("{provider_id} API error: {message}")]
    Api {
        provider_id: String,
        message: String,
    },
}

/// Explicitly unsupported operation or capability.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnsupportedError {
    #[error("{operation} is not implemented for provider {provider_id}")]
    Operation {
        provider_id: String,
        operation: String,
    },

    #[error("Plugin {capability} is not available for provider {provider_id}")]
    Capability {
        provider_id: String,
        capability: String,
    },
}

/// Result type for social auth operations.
pub type SocialAuthResult<T> = Result<T, SocialAuthError>;

/// Build an unsupported-operation error.
pub fn unsupported(provider_id: &str, operation: &str) -> SocialAuthError {
    SocialAuthError::Unsupported(UnsupportedError::Operation {
        provider_id: provider_id.to_string(),
        operation: operation.to_string(),
    })
}

/// Get user-friendly error message.
pub fn get_user_message(error: &SocialAuthError) -> String {
    match error {
        SocialAuthError::Authorization(AuthorizationError::AccessDenied { .. }) => {
            "Access was denied. Please try signing in again and grant the requested permissions."
                .to_string()
        }
        SocialAuthError::State(_) => {
            "Your sign-in session is no longer valid. Please restart the sign-in process."
                .to_string()
        }
        SocialAuthError::Configuration(_) => {
            "Sign-in is not configured correctly for this service.".to_string()
        }
        SocialAuthError::Network(NetworkError::Timeout { .. }) => {
            "The request timed out. Please check your connection and try again.".to_string()
        }
        SocialAuthError::Unsupported(_) => {
            "This action is not available for the selected service.".to_string()
        }
        _ => "An authentication error occurred. Please try again.".to_string(),
    }
}
