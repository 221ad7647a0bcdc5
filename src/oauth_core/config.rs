//! Configuration for token creation.

use super::types::TokenKind;

/// Characters a generated token identifier is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierAlphabet {
    /// `0-9a-f`
    Hex,
    /// `0-9A-Za-z`
    Base62,
}

impl IdentifierAlphabet {
    pub fn chars(&self) -> &'static [u8] {
        match self {
            IdentifierAlphabet::Hex => b"0123456789abcdef",
            IdentifierAlphabet::Base62 => b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz",
        }
    }

    pub fn contains(&self, c: char) -> bool {
        c.is_ascii() && self.chars().contains(&(c as u8))
    }
}

/// Settings used by `TokenService` when finalizing tokens.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    ttl_seconds: i64,
    identifier_length: usize,
    alphabet: IdentifierAlphabet,
    max_identifier_attempts: usize,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: TokenKind::Access.default_ttl(),
            identifier_length: 40,
            alphabet: IdentifierAlphabet::Hex,
            max_identifier_attempts: 10,
        }
    }
}

impl TokenConfig {
    /// Creates a configuration with the default lifetime of `kind`.
    pub fn for_kind(kind: &TokenKind) -> Self {
        Self { ttl_seconds: kind.default_ttl(), ..Self::default() }
    }

    /// Lifetime applied to tokens created without an explicit expiry.
    pub fn ttl_seconds(mut self, seconds: i64) -> Self {
        self.ttl_seconds = seconds;
        self
    }

    /// Length of generated identifiers. Zero is bumped to one.
    pub fn identifier_length(mut self, length: usize) -> Self {
        self.identifier_length = length.max(1);
        self
    }

    pub fn alphabet(mut self, alphabet: IdentifierAlphabet) -> Self {
        self.alphabet = alphabet;
        self
    }

    /// Upper bound on generate/check/save rounds before giving up. Zero is bumped to one.
    pub fn max_identifier_attempts(mut self, attempts: usize) -> Self {
        self.max_identifier_attempts = attempts.max(1);
        self
    }

    pub fn ttl(&self) -> i64 {
        self.ttl_seconds
    }

    pub fn length(&self) -> usize {
        self.identifier_length
    }

    pub fn identifier_alphabet(&self) -> IdentifierAlphabet {
        self.alphabet
    }

    pub fn attempts(&self) -> usize {
        self.max_identifier_attempts
    }
}
