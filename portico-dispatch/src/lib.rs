//! # portico-dispatch
//!
//! Request-to-transaction dispatch for the Portico engine.
//!
//! A [`Dispatcher`] carries each request through tenant resolution, URL
//! matching, locale resolution, exactly one read-write transaction bound to
//! the tenant's user and company, handler execution, and a single commit or
//! rollback. Transient store failures replay the request in a fresh
//! transaction, bounded by a [`RetryConfig`].
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use portico_dispatch::{
//!     DispatchConfig, Dispatcher, HandlerOutcome, HandlerRegistry, Request, Response,
//! };
//! use portico_router::{Method, Route, Tenant, TenantRegistry};
//! use portico_store::{MemoryBackend, UserId};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), portico_dispatch::DispatchError> {
//! let backend = MemoryBackend::new();
//! backend.create_database("erp");
//!
//! let registry = TenantRegistry::from_tenants([Tenant::new(1, "shop.example", UserId(2))])?;
//! let handlers = HandlerRegistry::new();
//! handlers.register_function("home", |_env| async {
//!     Ok(HandlerOutcome::Text("welcome".to_string()))
//! });
//!
//! let dispatcher = Dispatcher::new(
//!     Arc::new(backend),
//!     Arc::new(registry),
//!     Arc::new(handlers),
//!     vec![Route::new("/", "home")],
//!     DispatchConfig::new("erp"),
//! );
//!
//! let response = dispatcher
//!     .dispatch(Request::new(Method::Get, "shop.example", "/"))
//!     .await?;
//! assert_eq!(response.status, 200);
//! assert_eq!(response.body, "welcome");
//! # Ok(())
//! # }
//! ```

#![deny(rustdoc::broken_intra_doc_links)]

pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod logging;
pub mod request;
pub mod retry;

pub use dispatcher::{DispatchConfig, Dispatcher};
pub use error::{DispatchError, DispatchResult};
pub use handler::{
    Endpoint, HandlerFn, HandlerOutcome, HandlerRegistry, LazyRender, RecordHandlerFn, Renderer,
    RequestEnv,
};
pub use request::{Request, Response};
pub use retry::{AttemptObserver, AttemptOutcome, RetryConfig, DEFAULT_MAX_ATTEMPTS};
