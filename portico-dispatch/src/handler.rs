//! Handler registry and execution environment.
//!
//! Endpoints are plain names ("order.cancel_order") bound at startup to
//! either a free function or a record-bound method. Record-bound handlers
//! additionally receive the record selected by the matched rule's
//! `active_id` argument, already loaded inside the request's transaction.
//!
//! Handlers run entirely inside that transaction: anything they load or
//! write shares its fate, and a lazy body is forced before commit so a
//! rendering failure still rolls the whole request back.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::RwLock;
use portico_router::{PathArgs, ResolvedLocale, TenantSnapshot};
use portico_store::{Record, Transaction};
use smol_str::SmolStr;
use tracing::debug;

use crate::error::{DispatchError, DispatchResult};
use crate::request::Response;

/// Everything a handler sees for one request.
#[derive(Debug, Clone)]
pub struct RequestEnv {
    /// The request's read-write transaction.
    pub txn: Transaction,
    /// Plain values of the tenant the request resolved to.
    pub tenant: TenantSnapshot,
    /// The locale the request runs under.
    pub locale: ResolvedLocale,
    /// Path arguments, with `locale` and `active_id` already consumed.
    pub args: PathArgs,
}

/// A deferred response body.
///
/// Forcing consumes the renderer; it runs inside the request transaction so
/// a failure here still rolls everything back.
pub trait LazyRender: Send {
    /// Produce the final body.
    fn force(self: Box<Self>) -> Result<String, String>;
}

impl<F> LazyRender for F
where
    F: FnOnce() -> Result<String, String> + Send,
{
    fn force(self: Box<Self>) -> Result<String, String> {
        (*self)()
    }
}

/// A template renderer.
///
/// The engine never interprets templates; it only needs the result to be
/// forceable inside the transaction window. Handlers that defer rendering
/// wrap a renderer call with [`HandlerOutcome::render_with`].
pub trait Renderer: Send + Sync {
    /// Render `template` against a JSON context.
    fn render(&self, template: &str, context: &serde_json::Value) -> Result<String, String>;
}

/// What a handler returns.
pub enum HandlerOutcome {
    /// A fully-formed response.
    Response(Response),
    /// A plain 200 body.
    Text(String),
    /// A body rendered later, but still inside the transaction.
    Lazy(Box<dyn LazyRender>),
}

impl HandlerOutcome {
    /// Wrap a deferred renderer.
    pub fn lazy<F>(render: F) -> Self
    where
        F: FnOnce() -> Result<String, String> + Send + 'static,
    {
        Self::Lazy(Box::new(render))
    }

    /// Defer a renderer call; it is forced inside the transaction window.
    pub fn render_with(
        renderer: Arc<dyn Renderer>,
        template: impl Into<String>,
        context: serde_json::Value,
    ) -> Self {
        let template = template.into();
        Self::lazy(move || renderer.render(&template, &context))
    }

    /// Force any deferred work and produce the response.
    pub fn finalize(self) -> DispatchResult<Response> {
        match self {
            Self::Response(response) => Ok(response),
            Self::Text(body) => Ok(Response::ok(body)),
            Self::Lazy(render) => match render.force() {
                Ok(body) => Ok(Response::ok(body)),
                Err(message) => Err(DispatchError::Render(message)),
            },
        }
    }
}

impl std::fmt::Debug for HandlerOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Response(r) => f.debug_tuple("Response").field(r).finish(),
            Self::Text(t) => f.debug_tuple("Text").field(t).finish(),
            Self::Lazy(_) => f.write_str("Lazy(..)"),
        }
    }
}

/// A free endpoint handler.
pub type HandlerFn =
    Arc<dyn Fn(RequestEnv) -> BoxFuture<'static, DispatchResult<HandlerOutcome>> + Send + Sync>;

/// A record-bound endpoint handler.
pub type RecordHandlerFn = Arc<
    dyn Fn(RequestEnv, Record) -> BoxFuture<'static, DispatchResult<HandlerOutcome>> + Send + Sync,
>;

/// One registered endpoint.
#[derive(Clone)]
pub enum Endpoint {
    /// A free function.
    Function(HandlerFn),
    /// A method bound to one record of `model`, selected by `active_id`.
    BoundMethod {
        /// The model whose record the handler receives.
        model: SmolStr,
        /// The handler.
        handler: RecordHandlerFn,
    },
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Function(_) => f.write_str("Function(..)"),
            Self::BoundMethod { model, .. } => {
                f.debug_struct("BoundMethod").field("model", model).finish()
            }
        }
    }
}

/// Maps endpoint names to handlers.
#[derive(Debug, Default)]
pub struct HandlerRegistry {
    endpoints: RwLock<HashMap<SmolStr, Endpoint>>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a free function handler. A later registration under the
    /// same name replaces the earlier one.
    pub fn register_function<F, Fut>(&self, endpoint: impl Into<SmolStr>, handler: F)
    where
        F: Fn(RequestEnv) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DispatchResult<HandlerOutcome>> + Send + 'static,
    {
        let endpoint = endpoint.into();
        debug!(endpoint = %endpoint, "registered function handler");
        let handler: HandlerFn = Arc::new(move |env| {
            let fut: BoxFuture<'static, DispatchResult<HandlerOutcome>> = Box::pin(handler(env));
            fut
        });
        self.endpoints
            .write()
            .insert(endpoint, Endpoint::Function(handler));
    }

    /// Register a record-bound handler for `model`.
    pub fn register_record_method<F, Fut>(
        &self,
        endpoint: impl Into<SmolStr>,
        model: impl Into<SmolStr>,
        handler: F,
    ) where
        F: Fn(RequestEnv, Record) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DispatchResult<HandlerOutcome>> + Send + 'static,
    {
        let endpoint = endpoint.into();
        let model = model.into();
        debug!(endpoint = %endpoint, model = %model, "registered record handler");
        let handler: RecordHandlerFn = Arc::new(move |env, record| {
            let fut: BoxFuture<'static, DispatchResult<HandlerOutcome>> =
                Box::pin(handler(env, record));
            fut
        });
        self.endpoints
            .write()
            .insert(endpoint, Endpoint::BoundMethod { model, handler });
    }

    /// Look an endpoint up.
    pub fn get(&self, endpoint: &str) -> Option<Endpoint> {
        self.endpoints.read().get(endpoint).cloned()
    }

    /// Whether `endpoint` is registered.
    pub fn contains(&self, endpoint: &str) -> bool {
        self.endpoints.read().contains_key(endpoint)
    }

    /// Number of registered endpoints.
    pub fn len(&self) -> usize {
        self.endpoints.read().len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.endpoints.read().is_empty()
    }
}
