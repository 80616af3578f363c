//! Transaction context: the (user, company, language) scope bound to one
//! request's database work.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

/// The identity under which a transaction executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(pub i64);

/// The privileged bootstrap identity used for registry loading and the
/// per-request tenant probe. Not intended for handler execution.
pub const SUPERUSER_UID: UserId = UserId(1);

impl UserId {
    /// Get the raw id.
    pub fn as_i64(&self) -> i64 {
        self.0
    }

    /// Check whether this is the privileged bootstrap identity.
    pub fn is_superuser(&self) -> bool {
        *self == SUPERUSER_UID
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Context merged into a transaction at `begin`.
///
/// Each transaction receives its own copy; mutating a context after `begin`
/// never affects a live transaction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionContext {
    /// Business-scoping company id.
    pub company: Option<i64>,
    /// Active language code (e.g. "en_US").
    pub language: Option<String>,
    /// Free-form extension values.
    extra: BTreeMap<String, Value>,
}

impl TransactionContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the company.
    pub fn with_company(mut self, company: i64) -> Self {
        self.company = Some(company);
        self
    }

    /// Set the language code.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Set an extension value.
    pub fn with_value(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Get an extension value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }
}
