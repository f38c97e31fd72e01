//! Auth-domain models: scope sets, redacted secrets, access tokens, and token request contexts.

pub mod context;
pub mod scope;
pub mod secret;
pub mod token;

pub use context::*;
pub use scope::*;
pub use secret::*;
pub use token::*;
