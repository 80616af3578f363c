//! Dispatch error types.

use portico_router::RouterError;
use portico_store::StoreError;
use thiserror::Error;

/// Result type for dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Errors raised while carrying a request through its transaction.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// The request itself was malformed before routing started.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Routing failed before a transaction was opened.
    #[error(transparent)]
    Router(#[from] RouterError),

    /// The store failed while the request's transaction was live.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A matched endpoint has no registered handler.
    #[error("no handler registered for endpoint '{endpoint}'")]
    UnknownEndpoint {
        /// The endpoint name from the matched rule.
        endpoint: String,
    },

    /// A record-bound endpoint matched without a usable `active_id`.
    #[error("endpoint '{endpoint}' is record-bound but the match carries no active_id")]
    MissingActiveId {
        /// The endpoint name from the matched rule.
        endpoint: String,
    },

    /// The handler itself failed.
    #[error("handler '{endpoint}' failed: {message}")]
    Handler {
        /// The endpoint name.
        endpoint: String,
        /// The handler's own failure message.
        message: String,
    },

    /// A lazy response failed to render.
    #[error("response rendering failed: {0}")]
    Render(String),
}

impl DispatchError {
    /// The HTTP status this error maps to.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidRequest(_) => 400,
            Self::Router(err) if err.is_not_found() => 404,
            Self::Router(RouterError::MethodNotAllowed { .. }) => 405,
            Self::Router(_) => 500,
            Self::Store(err) if err.code == portico_store::ErrorCode::RecordNotFound => 404,
            Self::Store(_) | Self::UnknownEndpoint { .. } | Self::MissingActiveId { .. } => 500,
            Self::Handler { .. } | Self::Render(_) => 500,
        }
    }

    /// Whether a fresh attempt in a new transaction could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Store(err) => err.is_transient(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portico_store::ErrorCode;

    #[test]
    fn test_status_codes() {
        let malformed = DispatchError::InvalidRequest("no host".into());
        assert_eq!(malformed.status_code(), 400);

        let not_found = DispatchError::Router(RouterError::NotFound { path: "/x".into() });
        assert_eq!(not_found.status_code(), 404);

        let bad_method = DispatchError::Router(RouterError::MethodNotAllowed {
            path: "/x".into(),
            method: "PUT".into(),
            allowed: vec!["GET".into()],
        });
        assert_eq!(bad_method.status_code(), 405);

        let missing = DispatchError::Store(StoreError::not_found("sale.order", 9));
        assert_eq!(missing.status_code(), 404);

        let broken = DispatchError::Handler {
            endpoint: "order.cancel_order".into(),
            message: "boom".into(),
        };
        assert_eq!(broken.status_code(), 500);
    }

    #[test]
    fn test_transience_follows_the_store() {
        let deadlock = DispatchError::Store(StoreError::deadlock());
        assert!(deadlock.is_transient());

        let missing = DispatchError::Store(StoreError::not_found("sale.order", 9));
        assert!(!missing.is_transient());

        let handler = DispatchError::Handler {
            endpoint: "e".into(),
            message: "m".into(),
        };
        assert!(!handler.is_transient());
    }

    #[test]
    fn test_store_error_passthrough() {
        let err: DispatchError = StoreError::new(ErrorCode::Deadlock, "deadlock").into();
        assert!(matches!(err, DispatchError::Store(_)));
    }
}
