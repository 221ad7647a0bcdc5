//! Collaborator traits the token core is written against.
//!
//! Storage backends implement these; `memory` ships in-process defaults.

use async_trait::async_trait;

use super::error::StorageError;
use super::types::{Client, Scope, Token};

/// Persistence for one token family (access tokens, refresh tokens or codes).
#[async_trait]
pub trait TokenStorage: Send + Sync + 'static {
    /// Look a token up by its identifier.
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<Token>, StorageError>;

    /// Persist a finalized token.
    ///
    /// Implementations must treat the identifier as a unique key and answer
    /// `StorageError::DuplicateIdentifier` when it is already taken.
    async fn save(&self, token: &Token) -> Result<(), StorageError>;

    /// Remove a token. Returns whether something was removed.
    async fn delete(&self, identifier: &str) -> Result<bool, StorageError>;
}

/// Source of the registered scopes.
#[async_trait]
pub trait ScopeRegistry: Send + Sync + 'static {
    /// All registered scopes, in registration order.
    async fn find_all(&self) -> Result<Vec<Scope>, StorageError>;
}

/// Trait for retrieving OAuth2 clients.
#[async_trait]
pub trait ClientStore: Send + Sync + 'static {
    async fn find_client(&self, id: &str) -> Result<Option<Client>, StorageError>;
}
