//! Cache key derivation
//!
//! Keys are plain concatenations, no hashing:
//! `route:<operation>:<path>:<query>:<caller>` for response caching and
//! `cache:<name>:<part>...` for function-level caching. Empty components are
//! skipped before joining.

use crate::auth::AuthContext;
use std::fmt;

/// Component delimiter
pub const KEY_DELIMITER: &str = ":";

/// Caller token shared by every unauthenticated request
pub const ANONYMOUS: &str = "anonymous";

/// Key namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Route-level response cache
    Route,
    /// Generic function-result cache
    Function,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Route => "route",
            Namespace::Function => "cache",
        }
    }

    /// Glob pattern matching every key of this namespace
    pub fn pattern(&self) -> String {
        format!("{}{}*", self.as_str(), KEY_DELIMITER)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of the caller a cached response belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Caller {
    User(String),
    Anonymous,
}

impl Caller {
    pub fn token(&self) -> &str {
        match self {
            Caller::User(id) => id,
            Caller::Anonymous => ANONYMOUS,
        }
    }
}

impl From<&AuthContext> for Caller {
    fn from(ctx: &AuthContext) -> Self {
        match &ctx.user_id {
            Some(id) => Caller::User(id.clone()),
            None => Caller::Anonymous,
        }
    }
}

impl From<Option<&AuthContext>> for Caller {
    fn from(ctx: Option<&AuthContext>) -> Self {
        ctx.map(Caller::from).unwrap_or(Caller::Anonymous)
    }
}

/// A derived cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key for a route response.
    ///
    /// Both the operation name and the path take part in the key, so two
    /// differently named wrappers mounted on the same path never share entries.
    pub fn route(operation: &str, path: &str, query: &str, caller: &Caller) -> Self {
        let path = normalize_path(path);
        Self::join(
            Namespace::Route,
            [operation, path, query, caller.token()].into_iter(),
        )
    }

    /// Key for a function result, one component per argument
    pub fn function<'a, I>(name: &'a str, parts: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        Self::join(
            Namespace::Function,
            std::iter::once(name).chain(parts),
        )
    }

    fn join<'a>(namespace: Namespace, parts: impl Iterator<Item = &'a str>) -> Self {
        let mut key = String::from(namespace.as_str());
        for part in parts.filter(|p| !p.is_empty()) {
            key.push_str(KEY_DELIMITER);
            key.push_str(part);
        }
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Strip a trailing slash; the root path stays `/`
fn normalize_path(path: &str) -> &str {
    if path.len() > 1 {
        path.strip_suffix('/').unwrap_or(path)
    } else {
        path
    }
}
