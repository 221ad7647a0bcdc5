pub mod types; 
pub mod error; 
pub mod config; 
pub mod crypto; 
pub mod request; 
pub mod oauth_provider; 
pub mod memory; 
pub mod scope_service; 
pub mod token_service; 
pub mod resource_server; 

pub use self::error::{OAuthError, InvalidTokenReason, StorageError}; 
pub use self::types::{Scope, Client, Token, TokenKind, TokenOwner, TokenRequest}; 
