use std::sync::Arc;

use starberry_token::{InMemoryScopeRegistry, OAuthError, Scope, ScopeService};

fn registry() -> InMemoryScopeRegistry {
    InMemoryScopeRegistry::new(vec![
        Scope::new("read").describe("Read your data").default_scope(),
        Scope::new("write").describe("Modify your data"),
        Scope::new("profile").default_scope(),
    ])
}

#[tokio::test]
async fn test_get_all_keeps_registration_order() {
    let service = ScopeService::new(Arc::new(registry()));
    let names: Vec<String> = service.get_all().await.unwrap().into_iter().map(|s| s.name).collect();
    assert_eq!(names, ["read", "write", "profile"]);
}

#[tokio::test]
async fn test_default_scopes() {
    let service = ScopeService::new(Arc::new(registry()));
    let defaults = service.get_default_scopes().await.unwrap();
    assert_eq!(defaults, vec![Scope::new("read"), Scope::new("profile")]);

    let empty = ScopeService::new(Arc::new(InMemoryScopeRegistry::new(vec![Scope::new("read")])));
    assert!(empty.get_default_scopes().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_resolve_from_string() {
    let service = ScopeService::new(Arc::new(registry()));

    let scopes = service.resolve_from_string("write read").await.unwrap();
    assert_eq!(scopes, vec![Scope::new("write"), Scope::new("read")]);
    // Registered metadata comes along with the resolved scope
    assert_eq!(scopes[0].description.as_deref(), Some("Modify your data"));

    let scopes = service.resolve_from_string("read  read ").await.unwrap();
    assert_eq!(scopes, vec![Scope::new("read")]);

    assert!(service.resolve_from_string("").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_resolve_unknown_scope() {
    let service = ScopeService::new(Arc::new(registry()));
    let err = service.resolve_from_string("read delete admin").await.unwrap_err();
    assert_eq!(err, OAuthError::InvalidScope("delete admin".into()));
    assert_eq!(err.error_code(), "invalid_scope");
}

#[tokio::test]
async fn test_get_by_name_and_register() {
    let registry = registry();
    let service = ScopeService::new(Arc::new(registry.clone()));
    assert!(service.get_by_name("admin").await.unwrap().is_none());

    registry.register(Scope::new("admin").describe("Everything")).await;
    let admin = service.get_by_name("admin").await.unwrap().unwrap();
    assert_eq!(admin.description.as_deref(), Some("Everything"));

    // Re-registering by name replaces the entry instead of duplicating it
    registry.register(Scope::new("read")).await;
    assert_eq!(service.get_all().await.unwrap().len(), 4);
    assert!(!service.get_by_name("read").await.unwrap().unwrap().is_default);
}
