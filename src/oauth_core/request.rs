//! Read-only view of an inbound request, as far as bearer extraction needs it.

use std::collections::HashMap;

use percent_encoding::percent_decode;

/// What the resource server reads from an inbound request.
///
/// Implement this for the request type of your HTTP layer.
pub trait BearerRequest {
    /// Value of the header `name` (case-insensitive). `Some("")` when the header is
    /// present but empty.
    fn header(&self, name: &str) -> Option<&str>;

    /// Decoded value of the query parameter `name`.
    fn query_param(&self, name: &str) -> Option<&str>;
}

/// A plain owned request: header pairs and query parameters.
#[derive(Debug, Clone, Default)]
pub struct RequestParts {
    headers: HashMap<String, String>,
    query: HashMap<String, String>,
}

impl RequestParts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a header. Names are stored lowercase; a repeated name keeps the last value.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    /// Parses a raw query string (`a=1&b=two%20words`), with or without the leading `?`.
    /// The first occurrence of a key wins.
    pub fn with_query_string(mut self, raw: &str) -> Self {
        let raw = raw.strip_prefix('?').unwrap_or(raw);
        for pair in raw.split('&').filter(|p| !p.is_empty()) {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            self.query.entry(decode_component(k)).or_insert_with(|| decode_component(v));
        }
        self
    }

    /// Builds the request from a request target such as `/photos?access_token=abc`.
    pub fn from_target(target: &str) -> Self {
        match target.split_once('?') {
            Some((_, q)) => Self::new().with_query_string(q),
            None => Self::new(),
        }
    }
}

fn decode_component(input: &str) -> String {
    let plus_as_space = input.replace('+', " ");
    percent_decode(plus_as_space.as_bytes())
        .decode_utf8_lossy()
        .into_owned()
}

impl BearerRequest for RequestParts {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }
}
