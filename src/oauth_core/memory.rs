//! In-memory default implementations for the storage traits.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::RwLock;

use super::error::StorageError;
use super::oauth_provider::{ClientStore, ScopeRegistry, TokenStorage};
use super::types::{Client, Scope, Token};

/// Token storage backed by a concurrent map keyed by identifier.
#[derive(Clone, Default)]
pub struct InMemoryTokenStorage {
    tokens: Arc<DashMap<String, Token>>,
}

impl InMemoryTokenStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Drops every expired token. Returns how many were removed.
    ///
    /// Safe to run while other tasks save tokens; only the removals made by this sweep are
    /// counted.
    pub fn purge_expired(&self) -> usize {
        let mut removed = 0;
        self.tokens.retain(|_, token| {
            let keep = !token.is_expired();
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }
}

#[async_trait]
impl TokenStorage for InMemoryTokenStorage {
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<Token>, StorageError> {
        Ok(self.tokens.get(identifier).map(|entry| entry.value().clone()))
    }

    async fn save(&self, token: &Token) -> Result<(), StorageError> {
        let identifier = token.identifier();
        match self.tokens.entry(identifier.to_string()) {
            Entry::Occupied(_) => Err(StorageError::DuplicateIdentifier(identifier.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(token.clone());
                Ok(())
            }
        }
    }

    async fn delete(&self, identifier: &str) -> Result<bool, StorageError> {
        Ok(self.tokens.remove(identifier).is_some())
    }
}

/// Scope registry holding a fixed, updatable list of scopes.
#[derive(Clone, Default)]
pub struct InMemoryScopeRegistry {
    scopes: Arc<RwLock<Vec<Scope>>>,
}

impl InMemoryScopeRegistry {
    /// Creates a registry with an initial set of scopes. Later duplicates by name are ignored.
    pub fn new(initial_scopes: Vec<Scope>) -> Self {
        let mut scopes: Vec<Scope> = Vec::with_capacity(initial_scopes.len());
        for scope in initial_scopes {
            if !scopes.contains(&scope) {
                scopes.push(scope);
            }
        }
        Self { scopes: Arc::new(RwLock::new(scopes)) }
    }

    /// Registers a scope, replacing any scope of the same name.
    pub async fn register(&self, scope: Scope) {
        let mut guard = self.scopes.write().await;
        match guard.iter_mut().find(|s| **s == scope) {
            Some(existing) => *existing = scope,
            None => guard.push(scope),
        }
    }
}

#[async_trait]
impl ScopeRegistry for InMemoryScopeRegistry {
    async fn find_all(&self) -> Result<Vec<Scope>, StorageError> {
        Ok(self.scopes.read().await.clone())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryClientStore {
    clients: Arc<DashMap<String, Client>>,
}

impl InMemoryClientStore {
    /// Creates a new in-memory client store with an initial set of clients.
    pub fn new(initial_clients: Vec<Client>) -> Self {
        let map = DashMap::new();
        for client in initial_clients {
            map.insert(client.id.clone(), client);
        }
        Self { clients: Arc::new(map) }
    }

    pub fn insert(&self, client: Client) {
        self.clients.insert(client.id.clone(), client);
    }
}

#[async_trait]
impl ClientStore for InMemoryClientStore {
    async fn find_client(&self, id: &str) -> Result<Option<Client>, StorageError> {
        Ok(self.clients.get(id).map(|entry| entry.value().clone()))
    }
}
