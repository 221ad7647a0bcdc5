//! Resource server side: pull the bearer token out of a request and validate it.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, instrument};

use super::error::{InvalidTokenReason, OAuthError};
use super::request::BearerRequest;
use super::token_service::TokenService;
use super::types::Token;

/// Header carrying the bearer credential.
pub const AUTHORIZATION_HEADER: &str = "Authorization";
/// Query parameter fallback when no `Authorization` header is sent.
pub const ACCESS_TOKEN_PARAM: &str = "access_token";

lazy_static! {
    static ref BEARER_RE: Regex = Regex::new(r"^Bearer (\S+)$").unwrap();
}

/// Parses an `Authorization` header value of the form `Bearer <token>`.
///
/// The scheme is matched case-sensitively with exactly one space before the token.
pub fn parse_bearer(header_value: &str) -> Option<&str> {
    BEARER_RE
        .captures(header_value)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Validates bearer access tokens against required scopes.
#[derive(Clone)]
pub struct ResourceServer {
    access_tokens: TokenService,
}

impl ResourceServer {
    /// `access_tokens` is the service reading the access token storage.
    pub fn new(access_tokens: TokenService) -> Self {
        Self { access_tokens }
    }

    /// The token string presented with the request, if any.
    ///
    /// A present `Authorization` header always wins, even when it is empty or not a
    /// bearer header; only a request without that header falls back to the
    /// `access_token` query parameter.
    pub fn extract_token<'r, R: BearerRequest + ?Sized>(&self, request: &'r R) -> Option<&'r str> {
        let presented = match request.header(AUTHORIZATION_HEADER) {
            Some(value) => parse_bearer(value),
            None => request.query_param(ACCESS_TOKEN_PARAM),
        };
        presented.filter(|t| !t.is_empty())
    }

    /// Resolves the access token presented with `request`.
    ///
    /// `Ok(None)` means no credential was presented at all, which the caller may or may
    /// not treat as an error. A presented token that does not exist, is expired or lacks
    /// one of the space separated `required_scope` names is an `InvalidAccessToken` error.
    #[instrument(skip(self, request), level = "debug")]
    pub async fn get_access_token<R: BearerRequest + ?Sized + Sync>(
        &self,
        request: &R,
        required_scope: Option<&str>,
    ) -> Result<Option<Token>, OAuthError> {
        let presented = match self.extract_token(request) {
            Some(token) => token,
            None => {
                debug!("No access token presented");
                return Ok(None);
            }
        };

        let token = self
            .access_tokens
            .get_token(presented)
            .await?
            .ok_or(InvalidTokenReason::NotFound)?;

        if token.is_expired() {
            return Err(InvalidTokenReason::Expired.into());
        }
        if let Some(scope) = required_scope {
            if !token.has_scope(scope) {
                debug!(granted = %token.scope(), required = scope, "Token lacks required scope");
                return Err(InvalidTokenReason::InsufficientScope.into());
            }
        }
        Ok(Some(token))
    }

    /// Like [`ResourceServer::get_access_token`] but a missing credential is an error too.
    pub async fn require_access_token<R: BearerRequest + ?Sized + Sync>(
        &self,
        request: &R,
        required_scope: Option<&str>,
    ) -> Result<Token, OAuthError> {
        self.get_access_token(request, required_scope)
            .await?
            .ok_or(OAuthError::InvalidAccessToken(InvalidTokenReason::Missing))
    }
}
