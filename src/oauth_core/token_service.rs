//! Finalizing, persisting and reading tokens of one family.

use std::sync::Arc;

use chrono::{Duration, Utc};
use ring::rand::SystemRandom;
use tracing::{debug, info, instrument};

use super::config::TokenConfig;
use super::crypto::random_identifier;
use super::error::{OAuthError, StorageError};
use super::oauth_provider::TokenStorage;
use super::scope_service::ScopeService;
use super::types::{Token, TokenKind, TokenRequest};

/// Creates and reads tokens of a single kind.
///
/// Access tokens, refresh tokens and authorization codes each get their own service,
/// usually over their own storage.
#[derive(Clone)]
pub struct TokenService {
    kind: TokenKind,
    storage: Arc<dyn TokenStorage>,
    scope_service: ScopeService,
    config: TokenConfig,
    rng: SystemRandom,
}

impl TokenService {
    /// A service for `kind` with that kind's default configuration.
    pub fn new(kind: TokenKind, storage: Arc<dyn TokenStorage>, scope_service: ScopeService) -> Self {
        let config = TokenConfig::for_kind(&kind);
        Self { kind, storage, scope_service, config, rng: SystemRandom::new() }
    }

    pub fn access_tokens(storage: Arc<dyn TokenStorage>, scope_service: ScopeService) -> Self {
        Self::new(TokenKind::Access, storage, scope_service)
    }

    pub fn refresh_tokens(storage: Arc<dyn TokenStorage>, scope_service: ScopeService) -> Self {
        Self::new(TokenKind::Refresh, storage, scope_service)
    }

    pub fn authorization_codes(storage: Arc<dyn TokenStorage>, scope_service: ScopeService) -> Self {
        Self::new(TokenKind::AuthorizationCode { redirect_uri: None }, storage, scope_service)
    }

    /// Overrides the configuration.
    pub fn with_config(mut self, config: TokenConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    pub fn kind(&self) -> &TokenKind {
        &self.kind
    }

    /// Finalizes a bare token and persists it.
    ///
    /// The requested scope is checked against the registered scopes (or replaced by the
    /// defaults when empty), a fresh identifier is assigned and the expiry is filled in
    /// from the configured lifetime if the caller left it unset. Exactly one successful
    /// `save` happens; nothing is persisted when the scope is rejected.
    #[instrument(skip(self, request), level = "debug")]
    pub async fn create_token(&self, request: TokenRequest) -> Result<Token, OAuthError> {
        if !request.kind().same_family(&self.kind) {
            return Err(OAuthError::KindMismatch {
                expected: self.kind.as_str(),
                found: request.kind().as_str(),
            });
        }
        let scopes = if request.scopes().is_empty() {
            self.scope_service.get_default_scopes().await?
        } else {
            let names: Vec<&str> = request.scopes().iter().map(|s| s.name.as_str()).collect();
            self.scope_service.resolve_names(&names).await?
        };
        let expires_at = request
            .expires_at()
            .unwrap_or_else(|| Utc::now() + Duration::seconds(self.config.ttl()));

        let attempts = self.config.attempts();
        for attempt in 1..=attempts {
            let identifier = self.generate_identifier()?;
            // Cheap pre-check; the unique key in storage is what actually guarantees uniqueness.
            if self.storage.find_by_identifier(&identifier).await?.is_some() {
                debug!(attempt, "Generated identifier already exists, retrying");
                continue;
            }

            let token = Token::finalize(&request, identifier, scopes.clone(), expires_at);
            match self.storage.save(&token).await {
                Ok(()) => {
                    info!(
                        kind = self.kind.as_str(),
                        client = %token.client().id,
                        scope = %token.scope(),
                        expires_at = %expires_at,
                        "Token created"
                    );
                    return Ok(token);
                }
                Err(StorageError::DuplicateIdentifier(_)) => {
                    debug!(attempt, "Identifier taken concurrently, retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(StorageError::IdentifierExhausted(attempts).into())
    }

    /// Loads a token of this service's kind.
    ///
    /// Lookups are case sensitive: a backend that matches identifiers loosely does not
    /// get to return a token with a different identifier.
    #[instrument(skip(self, identifier), level = "debug")]
    pub async fn get_token(&self, identifier: &str) -> Result<Option<Token>, OAuthError> {
        let token = match self.storage.find_by_identifier(identifier).await? {
            Some(token) => token,
            None => return Ok(None),
        };
        if token.identifier() != identifier {
            debug!("Stored identifier differs from the requested one");
            return Ok(None);
        }
        if !token.kind().same_family(&self.kind) {
            debug!(found = token.kind().as_str(), "Token is of another kind");
            return Ok(None);
        }
        Ok(Some(token))
    }

    /// Revokes a token. Returns whether a token was removed.
    #[instrument(skip(self, identifier), level = "debug")]
    pub async fn delete_token(&self, identifier: &str) -> Result<bool, OAuthError> {
        let removed = self.storage.delete(identifier).await?;
        if removed {
            info!(kind = self.kind.as_str(), "Token deleted");
        }
        Ok(removed)
    }

    fn generate_identifier(&self) -> Result<String, OAuthError> {
        random_identifier(&self.rng, self.config.length(), self.config.identifier_alphabet())
            .map_err(|_| OAuthError::ServerError("system random source unavailable".into()))
    }
}
