//! # Portico
//!
//! A multi-tenant request-to-transaction dispatch engine.
//!
//! Portico provides:
//! - Host-based tenant (website) resolution with compiled per-tenant URL maps
//! - Locale-aware routing with automatic locale submounts and redirects
//! - Exactly one commit-or-rollback transaction per request, bound to the
//!   tenant's user, company and language
//! - Typed endpoint handlers, including record-bound handlers selected by an
//!   `active_id` path argument
//! - Bounded replay of requests that fail with transient store errors
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use portico::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), portico::DispatchError> {
//!     let backend = MemoryBackend::new();
//!     backend.create_database("erp");
//!
//!     let registry = TenantRegistry::from_tenants([
//!         Tenant::new(1, "shop.example", UserId(2)).with_locale(Locale::simple("en_US")),
//!     ])?;
//!
//!     let handlers = HandlerRegistry::new();
//!     handlers.register_function("home", |_env| async {
//!         Ok(HandlerOutcome::Text("welcome".to_string()))
//!     });
//!
//!     let dispatcher = Dispatcher::new(
//!         Arc::new(backend),
//!         Arc::new(registry),
//!         Arc::new(handlers),
//!         vec![Route::new("/", "home")],
//!         DispatchConfig::new("erp"),
//!     );
//!
//!     let response = dispatcher
//!         .dispatch(Request::new(Method::Get, "shop.example", "/en_US/"))
//!         .await?;
//!     assert_eq!(response.status, 200);
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// Transaction manager and record-store boundary.
pub mod store {
    pub use portico_store::*;
}

/// Tenant resolution, URL maps and locale handling.
pub mod router {
    pub use portico_router::*;
}

/// The request dispatcher and handler registry.
pub mod dispatch {
    pub use portico_dispatch::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::dispatch::{
        DispatchConfig, DispatchError, Dispatcher, HandlerOutcome, HandlerRegistry, Request,
        RequestEnv, Response, RetryConfig,
    };
    pub use crate::router::{
        Locale, Method, Route, Tenant, TenantRegistry, UrlMap, UrlMatch,
    };
    pub use crate::store::{
        AccessMode, Criteria, MemoryBackend, StorageBackend, Transaction, TransactionContext,
        UserId,
    };
}

// Re-export key types at the crate root
pub use dispatch::{DispatchConfig, DispatchError, Dispatcher};
pub use router::{RouterError, TenantRegistry};
pub use store::{StorageBackend, StoreError};
