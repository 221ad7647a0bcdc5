//! OAuth2 token primitives: Scope, Client, Token and the owner capability.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

lazy_static! {
    // scheme "://" rest, RFC 3986 scheme characters
    static ref ABSOLUTE_URI_RE: Regex = Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://\S+$").unwrap();
}

/// A named permission unit.
///
/// Two scopes are the same scope when their names match; the description and the
/// default flag are registry metadata and take no part in equality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scope {
    /// Unique scope name, e.g. `read`.
    pub name: String,
    /// Optional human readable description.
    pub description: Option<String>,
    /// Whether this scope is granted when a request carries no explicit scope.
    #[serde(default)]
    pub is_default: bool,
}

impl Scope {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), description: None, is_default: false }
    }

    /// Attaches a description to the scope.
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Marks the scope as one of the registry defaults.
    pub fn default_scope(mut self) -> Self {
        self.is_default = true;
        self
    }
}

impl PartialEq for Scope {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Scope {}

impl Hash for Scope {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Represents an OAuth 2.0 client application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    /// Client identifier.
    pub id: String,
    /// Optional client secret. Absent or empty means a public client.
    pub secret: Option<String>,
    /// Display name of the client.
    pub name: String,
    /// Allowed redirect URIs, de-duplicated, in registration order.
    #[serde(default, deserialize_with = "deserialize_redirect_uris")]
    redirect_uris: Vec<String>,
}

impl Client {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: id.into(), secret: None, name: name.into(), redirect_uris: Vec::new() }
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// Replaces the redirect URIs with an explicit list.
    ///
    /// Entries are trimmed; blank entries, repeats and anything that is not an absolute
    /// URI (`scheme://...`) are dropped.
    pub fn with_redirect_uris<I, S>(mut self, uris: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.redirect_uris = normalize_redirect_uris(uris);
        self
    }

    /// Replaces the redirect URIs from a comma separated list, e.g.
    /// `"https://a.example/cb, https://b.example/cb"`.
    pub fn with_redirect_uris_str(self, uris: &str) -> Self {
        self.with_redirect_uris(uris.split(','))
    }

    pub fn redirect_uris(&self) -> &[String] {
        &self.redirect_uris
    }

    /// Exact membership test against the registered redirect URIs.
    pub fn has_redirect_uri(&self, uri: &str) -> bool {
        self.redirect_uris.iter().any(|u| u == uri)
    }

    /// A client without a secret cannot authenticate itself.
    pub fn is_public(&self) -> bool {
        self.secret.as_deref().is_none_or(str::is_empty)
    }
}

fn normalize_redirect_uris<I, S>(uris: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut normalized: Vec<String> = Vec::new();
    for uri in uris {
        let uri: String = uri.into();
        let uri = uri.trim();
        if uri.is_empty() || normalized.iter().any(|u| u == uri) {
            continue;
        }
        if !ABSOLUTE_URI_RE.is_match(uri) {
            warn!(uri, "Ignoring redirect URI that is not absolute");
            continue;
        }
        normalized.push(uri.to_string());
    }
    normalized
}

fn deserialize_redirect_uris<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let uris = Vec::<String>::deserialize(deserializer)?;
    Ok(normalize_redirect_uris(uris))
}

/// Anything that can own a token (a user, a service account...).
///
/// The core only ever needs the owner's identity; resolving it into a richer
/// principal is left to the caller.
pub trait TokenOwner: fmt::Debug + Send + Sync {
    fn owner_id(&self) -> &str;
}

impl TokenOwner for String {
    fn owner_id(&self) -> &str {
        self
    }
}

/// The token families sharing one data model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenKind {
    /// Short-lived bearer credential presented to resource servers.
    Access,
    /// Longer-lived credential exchanged for new access tokens.
    Refresh,
    /// One-shot code issued by the authorize endpoint.
    AuthorizationCode {
        /// Redirect URI the code was issued for.
        redirect_uri: Option<String>,
    },
}

impl TokenKind {
    /// Default lifetime in seconds for this kind of token.
    pub fn default_ttl(&self) -> i64 {
        match self {
            TokenKind::Access => 3600,
            TokenKind::Refresh => 604_800,
            TokenKind::AuthorizationCode { .. } => 120,
        }
    }

    /// Whether two kinds belong to the same family, ignoring per-token payload.
    pub fn same_family(&self, other: &TokenKind) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access_token",
            TokenKind::Refresh => "refresh_token",
            TokenKind::AuthorizationCode { .. } => "authorization_code",
        }
    }
}

/// A bare token as built by a grant handler: client, owner, requested scope and an
/// optional expiry, but no identifier yet.
///
/// Hand it to `TokenService::create_token`, which consumes it and returns the finalized
/// [`Token`].
#[derive(Debug, Clone)]
pub struct TokenRequest {
    kind: TokenKind,
    client: Client,
    owner: Option<Arc<dyn TokenOwner>>,
    expires_at: Option<DateTime<Utc>>,
    scopes: Vec<Scope>,
}

impl TokenRequest {
    pub fn new(kind: TokenKind, client: Client) -> Self {
        Self { kind, client, owner: None, expires_at: None, scopes: Vec::new() }
    }

    pub fn with_owner(mut self, owner: Arc<dyn TokenOwner>) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Requests a space separated scope, e.g. `"read write"`.
    ///
    /// The names are only checked against the registry when the token is created.
    pub fn with_scope(mut self, scope: &str) -> Self {
        self.scopes = scope.split_whitespace().map(Scope::new).collect();
        self
    }

    pub fn with_scopes(mut self, scopes: Vec<Scope>) -> Self {
        self.scopes = scopes;
        self
    }

    pub fn with_expires_at(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at);
        self
    }

    /// Sets the expiry relative to now. Negative values produce an expired token.
    pub fn with_expires_in(mut self, seconds: i64) -> Self {
        self.expires_at = Some(Utc::now() + Duration::seconds(seconds));
        self
    }

    pub fn kind(&self) -> &TokenKind {
        &self.kind
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn owner(&self) -> Option<&dyn TokenOwner> {
        self.owner.as_deref()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Requested scopes, unresolved.
    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }
}

/// An opaque credential bound to a client, an optional owner, an expiry and scopes.
///
/// Only `TokenService::create_token` (from a [`TokenRequest`]) and [`Token::restore`]
/// produce one, and it has no mutators:
///
/// ```compile_fail
/// # use starberry_token::{Client, Token};
/// let token = Token::restore("abc", Token::access(Client::new("cid", "app")));
/// let widened = token.with_scope("admin");
/// ```
#[derive(Debug, Clone)]
pub struct Token {
    identifier: String,
    kind: TokenKind,
    client: Client,
    owner: Option<Arc<dyn TokenOwner>>,
    expires_at: Option<DateTime<Utc>>,
    scopes: Vec<Scope>,
}

impl Token {
    /// Starts a bare access token issued to `client`.
    pub fn access(client: Client) -> TokenRequest {
        TokenRequest::new(TokenKind::Access, client)
    }

    pub fn refresh(client: Client) -> TokenRequest {
        TokenRequest::new(TokenKind::Refresh, client)
    }

    pub fn authorization_code(client: Client, redirect_uri: Option<String>) -> TokenRequest {
        TokenRequest::new(TokenKind::AuthorizationCode { redirect_uri }, client)
    }

    /// Rehydrates a token that was already persisted under `identifier`.
    ///
    /// Meant for storage backends turning a stored row back into a `Token`; the request's
    /// scopes and expiry are taken as stored, without validation.
    pub fn restore(identifier: impl Into<String>, stored: TokenRequest) -> Self {
        Self {
            identifier: identifier.into(),
            kind: stored.kind,
            client: stored.client,
            owner: stored.owner,
            expires_at: stored.expires_at,
            scopes: stored.scopes,
        }
    }

    pub(crate) fn finalize(
        request: &TokenRequest,
        identifier: String,
        scopes: Vec<Scope>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            identifier,
            kind: request.kind.clone(),
            client: request.client.clone(),
            owner: request.owner.clone(),
            expires_at: Some(expires_at),
            scopes,
        }
    }

    /// The opaque identifier.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn kind(&self) -> &TokenKind {
        &self.kind
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn owner(&self) -> Option<&dyn TokenOwner> {
        self.owner.as_deref()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Seconds until expiry, negative once expired. `None` when no expiry is set.
    pub fn expires_in(&self) -> Option<i64> {
        self.expires_at.map(|at| (at - Utc::now()).num_seconds())
    }

    /// A token without an expiry is never treated as long-lived: it counts as expired.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(at) => Utc::now() > at,
            None => true,
        }
    }

    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }

    /// Scope names joined by a single space, in insertion order.
    pub fn scope(&self) -> String {
        self.scopes.iter().map(|s| s.name.as_str()).collect::<Vec<_>>().join(" ")
    }

    /// Whether every name in the space separated `required` scope is carried by this token.
    pub fn has_scope(&self, required: &str) -> bool {
        required
            .split_whitespace()
            .all(|name| self.scopes.iter().any(|s| s.name == name))
    }

    /// Not expired and, when `required` is given, carrying all of it.
    pub fn is_valid(&self, required: Option<&str>) -> bool {
        !self.is_expired() && required.is_none_or(|scope| self.has_scope(scope))
    }
}
