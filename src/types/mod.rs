//! Social Auth Types
//!
//! Configuration, access grant, callback and normalized entity types.

pub mod callback;
pub mod config;
pub mod entities;
pub mod grant;

pub use callback::*;
pub use config::*;
pub use entities::*;
pub use grant::*;
