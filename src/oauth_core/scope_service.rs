//! Registered scopes: lookup, defaults and resolution of scope strings.

use std::sync::Arc;

use tracing::debug;

use super::error::OAuthError;
use super::oauth_provider::ScopeRegistry;
use super::types::Scope;

/// Single source of truth for registered scopes.
#[derive(Clone)]
pub struct ScopeService {
    registry: Arc<dyn ScopeRegistry>,
}

impl ScopeService {
    pub fn new(registry: Arc<dyn ScopeRegistry>) -> Self {
        Self { registry }
    }

    /// All registered scopes, in registry order.
    pub async fn get_all(&self) -> Result<Vec<Scope>, OAuthError> {
        Ok(self.registry.find_all().await?)
    }

    /// Scopes granted when a token request names none. May be empty.
    pub async fn get_default_scopes(&self) -> Result<Vec<Scope>, OAuthError> {
        let scopes = self.get_all().await?;
        Ok(scopes.into_iter().filter(|s| s.is_default).collect())
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Option<Scope>, OAuthError> {
        let scopes = self.get_all().await?;
        Ok(scopes.into_iter().find(|s| s.name == name))
    }

    /// Resolves a space separated scope string against the registry.
    ///
    /// The result keeps the requested order; a name repeated in the request is only
    /// returned once. Unknown names fail with `InvalidScope` carrying all of them.
    pub async fn resolve_from_string(&self, scope: &str) -> Result<Vec<Scope>, OAuthError> {
        let names: Vec<&str> = scope.split_whitespace().collect();
        self.resolve_names(&names).await
    }

    pub(crate) async fn resolve_names(&self, names: &[&str]) -> Result<Vec<Scope>, OAuthError> {
        let registered = self.get_all().await?;
        let mut resolved: Vec<Scope> = Vec::with_capacity(names.len());
        let mut unknown: Vec<&str> = Vec::new();

        for &name in names {
            match registered.iter().find(|s| s.name == name) {
                Some(scope) => {
                    if !resolved.contains(scope) {
                        resolved.push(scope.clone());
                    }
                }
                None => unknown.push(name),
            }
        }

        if !unknown.is_empty() {
            debug!(unknown = ?unknown, "Requested scope is not registered");
            return Err(OAuthError::InvalidScope(unknown.join(" ")));
        }
        Ok(resolved)
    }
}
