//! Core Components
//!
//! Transport, OAuth 1.0a signing, wire encodings, XML, OpenID association
//! and the signed request consumer.

pub mod consumer;
pub mod encoding;
pub mod openid;
pub mod signature;
pub mod transport;
pub mod xml;

pub use consumer::*;
pub use signature::{OAuthSigner, TokenPair};
pub use transport::*;
