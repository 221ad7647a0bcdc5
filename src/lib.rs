//! Bearer token core for Starberry: issue opaque tokens with validated scopes on the
//! authorization server side, and validate presented tokens on the resource server side.

pub mod oauth_core;

pub use oauth_core::config::{IdentifierAlphabet, TokenConfig};
pub use oauth_core::error::{InvalidTokenReason, OAuthError, StorageError};
pub use oauth_core::memory::{InMemoryClientStore, InMemoryScopeRegistry, InMemoryTokenStorage};
pub use oauth_core::oauth_provider::{ClientStore, ScopeRegistry, TokenStorage};
pub use oauth_core::request::{BearerRequest, RequestParts};
pub use oauth_core::resource_server::ResourceServer;
pub use oauth_core::scope_service::ScopeService;
pub use oauth_core::token_service::TokenService;
pub use oauth_core::types::{Client, Scope, Token, TokenKind, TokenOwner, TokenRequest};
