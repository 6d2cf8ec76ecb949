//! Builders
//!
//! Fluent builder patterns for provider configuration.

pub mod config;

pub use config::{oauth_config, OAuthConfigBuilder};
