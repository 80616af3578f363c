//! Router error types.

use portico_store::StoreError;
use thiserror::Error;

/// Result type for router operations.
pub type RouterResult<T> = Result<T, RouterError>;

/// Errors raised while resolving tenants or matching URLs.
#[derive(Error, Debug)]
pub enum RouterError {
    /// The Host header matched no registered website and more than one
    /// website is registered. Distinct from a plain routing miss.
    #[error("no website is registered for host '{host}'")]
    WebsiteNotFound {
        /// The normalized host that failed to resolve.
        host: String,
    },

    /// No rule matched the request path.
    #[error("no route matches '{path}'")]
    NotFound {
        /// The request path.
        path: String,
    },

    /// A rule matched the path but not the method.
    #[error("method {method} not allowed for '{path}'")]
    MethodNotAllowed {
        /// The request path.
        path: String,
        /// The rejected method.
        method: String,
        /// Methods that would have been accepted.
        allowed: Vec<String>,
    },

    /// The URL carried a locale segment the tenant does not support.
    #[error("website does not support locale '{locale}'")]
    UnknownLocale {
        /// The rejected locale code.
        locale: String,
    },

    /// A route rule failed to parse.
    #[error("invalid rule '{rule}': {reason}")]
    InvalidRule {
        /// The offending rule text.
        rule: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Two tenants share a routing key.
    #[error("duplicate website name '{name}'")]
    DuplicateTenant {
        /// The duplicated name.
        name: String,
    },

    /// Reverse building was asked for an endpoint no rule exposes.
    #[error("no rule builds endpoint '{endpoint}'")]
    UnknownEndpoint {
        /// The endpoint name.
        endpoint: String,
    },

    /// URL building was asked for an argument the caller did not supply.
    #[error("cannot build '{rule}': missing argument '{name}'")]
    MissingBuildArg {
        /// The rule being built.
        rule: String,
        /// The absent placeholder name.
        name: String,
    },

    /// A store failure during registry loading.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RouterError {
    pub(crate) fn invalid_rule(rule: &str, reason: impl Into<String>) -> Self {
        Self::InvalidRule {
            rule: rule.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether this error is a routing miss (404-shaped).
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::WebsiteNotFound { .. } | Self::NotFound { .. } | Self::UnknownLocale { .. }
        )
    }
}
