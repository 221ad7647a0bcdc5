use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use starberry_token::{
    Client, IdentifierAlphabet, InMemoryScopeRegistry, InMemoryTokenStorage, OAuthError, Scope, ScopeService,
    StorageError, Token, TokenConfig, TokenService, TokenStorage,
};

fn scope_service(registered: &[&str], defaults: &[&str]) -> ScopeService {
    let scopes = registered
        .iter()
        .map(|name| {
            let scope = Scope::new(*name);
            if defaults.contains(name) { scope.default_scope() } else { scope }
        })
        .collect();
    ScopeService::new(Arc::new(InMemoryScopeRegistry::new(scopes)))
}

fn client() -> Client {
    Client::new("client1", "Test app").with_secret("secret")
}

/// Storage double: answers the first `taken_on_find` lookups with an existing token and
/// the first `taken_on_save` saves with a duplicate error, counting every call.
#[derive(Default)]
struct ScriptedStorage {
    inner: InMemoryTokenStorage,
    taken_on_find: usize,
    taken_on_save: usize,
    fail_save: bool,
    finds: AtomicUsize,
    saves: AtomicUsize,
}

#[async_trait]
impl TokenStorage for ScriptedStorage {
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<Token>, StorageError> {
        let n = self.finds.fetch_add(1, Ordering::SeqCst);
        if n < self.taken_on_find {
            return Ok(Some(Token::restore(identifier, Token::access(client()))));
        }
        self.inner.find_by_identifier(identifier).await
    }

    async fn save(&self, token: &Token) -> Result<(), StorageError> {
        let n = self.saves.fetch_add(1, Ordering::SeqCst);
        if self.fail_save {
            return Err(StorageError::Backend("connection reset".into()));
        }
        if n < self.taken_on_save {
            return Err(StorageError::DuplicateIdentifier(token.identifier().to_string()));
        }
        self.inner.save(token).await
    }

    async fn delete(&self, identifier: &str) -> Result<bool, StorageError> {
        self.inner.delete(identifier).await
    }
}

#[tokio::test]
async fn test_create_token_scope_cases() {
    // (requested scope, should fail)
    let cases = vec![
        ("", false),
        ("read", false),
        ("read write", false),
        ("read write delete", true),
    ];

    for (requested, should_fail) in cases {
        let storage = Arc::new(InMemoryTokenStorage::new());
        let service = TokenService::access_tokens(storage.clone(), scope_service(&["read", "write"], &["read"]));
        let result = service.create_token(Token::access(client()).with_scope(requested)).await;

        if should_fail {
            assert_eq!(result.unwrap_err(), OAuthError::InvalidScope("delete".into()), "scope {:?}", requested);
            assert!(storage.is_empty(), "nothing may be persisted for {:?}", requested);
            continue;
        }

        let token = result.unwrap();
        assert_eq!(token.identifier().len(), 40);
        if requested.is_empty() {
            assert_eq!(token.scope(), "read");
        } else {
            assert_eq!(token.scope(), requested);
        }
        assert_eq!(storage.len(), 1);
    }
}

#[tokio::test]
async fn test_default_scope_fallback() {
    let storage = Arc::new(InMemoryTokenStorage::new());
    let service = TokenService::access_tokens(storage, scope_service(&["read", "write"], &["read"]));
    let token = service.create_token(Token::access(client())).await.unwrap();
    assert_eq!(token.scopes(), &[Scope::new("read")]);
}

#[tokio::test]
async fn test_no_defaults_gives_empty_scope() {
    let storage = Arc::new(InMemoryTokenStorage::new());
    let service = TokenService::access_tokens(storage, scope_service(&["read"], &[]));
    let token = service.create_token(Token::access(client())).await.unwrap();
    assert!(token.scopes().is_empty());
    assert_eq!(token.scope(), "");
}

#[tokio::test]
async fn test_scenario_a_fresh_token() {
    let storage = Arc::new(InMemoryTokenStorage::new());
    let service = TokenService::access_tokens(storage.clone(), scope_service(&["read", "write"], &["read"]));
    let token = service.create_token(Token::access(Client::new("C", "client C"))).await.unwrap();

    let id = token.identifier();
    assert_eq!(id.len(), 40);
    assert!(id.chars().all(|c| IdentifierAlphabet::Hex.contains(c)));
    assert_eq!(token.scope(), "read");
    assert!(!token.is_expired());
    assert!(token.owner().is_none());

    let stored = storage.find_by_identifier(id).await.unwrap().unwrap();
    assert_eq!(stored.identifier(), id);
    assert_eq!(stored.scope(), "read");
}

#[tokio::test]
async fn test_lifetime_applied_only_when_unset() {
    let storage = Arc::new(InMemoryTokenStorage::new());
    let service = TokenService::access_tokens(storage, scope_service(&["read"], &["read"]))
        .with_config(TokenConfig::default().ttl_seconds(60));

    let token = service.create_token(Token::access(client())).await.unwrap();
    let remaining = token.expires_in().unwrap();
    assert!((58..=60).contains(&remaining), "expires_in was {}", remaining);

    let at = Utc::now() + Duration::seconds(7200);
    let token = service.create_token(Token::access(client()).with_expires_at(at)).await.unwrap();
    assert_eq!(token.expires_at(), Some(at));
}

#[tokio::test]
async fn test_retries_until_identifier_is_free() {
    let storage = Arc::new(ScriptedStorage { taken_on_find: 1, ..Default::default() });
    let service = TokenService::access_tokens(storage.clone(), scope_service(&["read"], &["read"]));

    let token = service.create_token(Token::access(client())).await.unwrap();
    assert_eq!(token.identifier().len(), 40);
    assert_eq!(storage.finds.load(Ordering::SeqCst), 2);
    assert_eq!(storage.saves.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_retries_on_duplicate_from_save() {
    let storage = Arc::new(ScriptedStorage { taken_on_save: 2, ..Default::default() });
    let service = TokenService::access_tokens(storage.clone(), scope_service(&["read"], &["read"]));

    let token = service.create_token(Token::access(client())).await.unwrap();
    assert_eq!(storage.saves.load(Ordering::SeqCst), 3);
    assert!(storage.inner.find_by_identifier(token.identifier()).await.unwrap().is_some());
}

#[tokio::test]
async fn test_gives_up_after_configured_attempts() {
    let storage = Arc::new(ScriptedStorage { taken_on_find: usize::MAX, ..Default::default() });
    let service = TokenService::access_tokens(storage.clone(), scope_service(&["read"], &["read"]))
        .with_config(TokenConfig::default().max_identifier_attempts(3));

    let err = service.create_token(Token::access(client())).await.unwrap_err();
    assert_eq!(err, OAuthError::Storage(StorageError::IdentifierExhausted(3)));
    assert_eq!(storage.saves.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_storage_failure_is_propagated() {
    let storage = Arc::new(ScriptedStorage { fail_save: true, ..Default::default() });
    let service = TokenService::access_tokens(storage.clone(), scope_service(&["read"], &["read"]));

    let err = service.create_token(Token::access(client())).await.unwrap_err();
    assert!(matches!(err, OAuthError::Storage(StorageError::Backend(_))));
    assert_eq!(storage.saves.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_identifiers_are_unique() {
    let storage = Arc::new(InMemoryTokenStorage::new());
    let service = TokenService::access_tokens(storage.clone(), scope_service(&["read"], &["read"]));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            let mut ids = Vec::new();
            for _ in 0..25 {
                let token = service.create_token(Token::access(client())).await.unwrap();
                ids.push(token.identifier().to_string());
            }
            ids
        }));
    }

    let mut seen = HashSet::new();
    for handle in handles {
        for id in handle.await.unwrap() {
            assert!(seen.insert(id), "identifier issued twice");
        }
    }
    assert_eq!(seen.len(), 200);
    assert_eq!(storage.len(), 200);
}

#[tokio::test]
async fn test_configured_identifier_shape() {
    let storage = Arc::new(InMemoryTokenStorage::new());
    let service = TokenService::refresh_tokens(storage, scope_service(&["read"], &["read"])).with_config(
        TokenConfig::for_kind(&starberry_token::TokenKind::Refresh)
            .identifier_length(64)
            .alphabet(IdentifierAlphabet::Base62),
    );

    let token = service.create_token(Token::refresh(client())).await.unwrap();
    let id = token.identifier();
    assert_eq!(id.len(), 64);
    assert!(id.chars().all(|c| IdentifierAlphabet::Base62.contains(c)));
    // Refresh tokens live a week by default
    assert!(token.expires_in().unwrap() > 3600 * 24 * 6);
}

#[tokio::test]
async fn test_get_token_and_case_sensitivity() {
    let storage = Arc::new(InMemoryTokenStorage::new());
    let service = TokenService::access_tokens(storage.clone(), scope_service(&["read"], &["read"]));
    let created = service.create_token(Token::access(client())).await.unwrap();
    let id = created.identifier();

    let fetched = service.get_token(id).await.unwrap().unwrap();
    assert_eq!(fetched.identifier(), id);
    assert!(service.get_token("missing").await.unwrap().is_none());

    // A backend matching case-insensitively must not leak "Token" for "token"
    struct LooseStorage(Token);

    #[async_trait]
    impl TokenStorage for LooseStorage {
        async fn find_by_identifier(&self, _identifier: &str) -> Result<Option<Token>, StorageError> {
            Ok(Some(self.0.clone()))
        }
        async fn save(&self, _token: &Token) -> Result<(), StorageError> {
            Ok(())
        }
        async fn delete(&self, _identifier: &str) -> Result<bool, StorageError> {
            Ok(false)
        }
    }

    let stored = Token::restore("Token", Token::access(client()).with_expires_in(60));
    let loose = TokenService::access_tokens(Arc::new(LooseStorage(stored)), scope_service(&["read"], &[]));
    assert!(loose.get_token("token").await.unwrap().is_none());
    assert!(loose.get_token("Token").await.unwrap().is_some());
}

#[tokio::test]
async fn test_services_do_not_mix_kinds() {
    let storage = Arc::new(InMemoryTokenStorage::new());
    let scopes = scope_service(&["read"], &["read"]);
    let access = TokenService::access_tokens(storage.clone(), scopes.clone());
    let refresh = TokenService::refresh_tokens(storage.clone(), scopes);

    let token = refresh.create_token(Token::refresh(client())).await.unwrap();
    let id = token.identifier();
    assert!(refresh.get_token(id).await.unwrap().is_some());
    assert!(access.get_token(id).await.unwrap().is_none());

    let err = access.create_token(Token::refresh(client())).await.unwrap_err();
    assert_eq!(err, OAuthError::KindMismatch { expected: "access_token", found: "refresh_token" });
    assert_eq!(storage.len(), 1);
}

#[tokio::test]
async fn test_delete_token() {
    let storage = Arc::new(InMemoryTokenStorage::new());
    let service = TokenService::authorization_codes(storage.clone(), scope_service(&["read"], &["read"]));
    let code = service
        .create_token(Token::authorization_code(client(), Some("https://app.local/cb".into())))
        .await
        .unwrap();
    let id = code.identifier();

    assert!(service.delete_token(id).await.unwrap());
    assert!(!service.delete_token(id).await.unwrap());
    assert!(service.get_token(id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_purge_expired() {
    let storage = Arc::new(InMemoryTokenStorage::new());
    let service = TokenService::access_tokens(storage.clone(), scope_service(&["read"], &["read"]));
    service.create_token(Token::access(client()).with_expires_in(-10)).await.unwrap();
    service.create_token(Token::access(client())).await.unwrap();

    assert_eq!(storage.purge_expired(), 1);
    assert_eq!(storage.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_purge_expired_during_concurrent_creation() {
    let storage = Arc::new(InMemoryTokenStorage::new());
    let service = TokenService::access_tokens(storage.clone(), scope_service(&["read"], &["read"]));
    let done = Arc::new(AtomicBool::new(false));

    let sweeper = {
        let storage = storage.clone();
        let done = done.clone();
        tokio::task::spawn_blocking(move || {
            let mut purged = 0;
            while !done.load(Ordering::SeqCst) {
                purged += storage.purge_expired();
                std::thread::yield_now();
            }
            purged
        })
    };

    let mut creators = Vec::new();
    for _ in 0..3 {
        let service = service.clone();
        creators.push(tokio::spawn(async move {
            for i in 0..100 {
                let request = if i % 2 == 0 {
                    Token::access(client()).with_expires_in(-10)
                } else {
                    Token::access(client())
                };
                service.create_token(request).await.unwrap();
            }
        }));
    }
    for creator in creators {
        creator.await.unwrap();
    }
    done.store(true, Ordering::SeqCst);

    let purged = sweeper.await.unwrap() + storage.purge_expired();
    assert_eq!(purged, 150);
    assert_eq!(storage.len(), 150);
}

#[tokio::test]
async fn test_finalized_token_keeps_scope_and_expiry() {
    let storage = Arc::new(InMemoryTokenStorage::new());
    let service = TokenService::access_tokens(storage.clone(), scope_service(&["read", "write"], &["read"]));
    let token = service.create_token(Token::access(client())).await.unwrap();
    let id = token.identifier().to_string();

    // Reissuing under the same identifier with a wider scope and a longer life is refused
    let widened = Token::restore(
        id.clone(),
        Token::access(client()).with_scope("read write").with_expires_in(10_000_000),
    );
    assert_eq!(
        storage.save(&widened).await.unwrap_err(),
        StorageError::DuplicateIdentifier(id.clone())
    );

    // Unregistered scopes never make it into a token
    let err = service.create_token(Token::access(client()).with_scope("admin")).await.unwrap_err();
    assert_eq!(err, OAuthError::InvalidScope("admin".into()));

    let stored = service.get_token(&id).await.unwrap().unwrap();
    assert_eq!(stored.scope(), "read");
    assert_eq!(stored.expires_at(), token.expires_at());
    assert!(!stored.has_scope("write"));
}
