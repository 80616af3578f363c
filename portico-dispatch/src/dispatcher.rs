//! The request-to-transaction dispatcher.
//!
//! One call to [`Dispatcher::dispatch`] carries a request through its whole
//! life: tenant resolution, URL matching, locale resolution, one read-write
//! transaction bound to the tenant's user and company, handler execution,
//! and a single commit or rollback. A transient store failure replays the
//! request from scratch in a fresh transaction, bounded by the configured
//! retry policy.

use std::sync::Arc;

use parking_lot::RwLock;
use portico_router::{
    AdapterCache, Method, PathArgs, PathValue, ResolvedLocale, RouterError, Route, Tenant,
    TenantRegistry, TenantSnapshot, UrlMatch, resolve_locale, STATIC_ENDPOINT,
};
use portico_store::{
    AccessMode, Criteria, StorageBackend, Transaction, TransactionContext, UserId, SUPERUSER_UID,
};
use serde_json::json;
use tracing::{debug, warn};

use crate::error::{DispatchError, DispatchResult};
use crate::handler::{Endpoint, HandlerRegistry, RequestEnv};
use crate::request::{Request, Response};
use crate::retry::{AttemptObserver, AttemptOutcome, RetryConfig};

/// Dispatcher configuration.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// The database every request transaction is opened against.
    pub database: String,
    /// The retry policy for transient store failures.
    pub retry: RetryConfig,
}

impl DispatchConfig {
    /// Configuration with the default retry policy.
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            retry: RetryConfig::default(),
        }
    }

    /// Replace the retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

/// Carries requests from the wire to a committed transaction.
pub struct Dispatcher {
    backend: Arc<dyn StorageBackend>,
    registry: Arc<TenantRegistry>,
    handlers: Arc<HandlerRegistry>,
    routes: RwLock<Vec<Route>>,
    adapters: AdapterCache,
    config: DispatchConfig,
    observer: Option<AttemptObserver>,
}

impl Dispatcher {
    /// Assemble a dispatcher from its injected parts.
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        registry: Arc<TenantRegistry>,
        handlers: Arc<HandlerRegistry>,
        routes: Vec<Route>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            backend,
            registry,
            handlers,
            routes: RwLock::new(routes),
            adapters: AdapterCache::new(),
            config,
            observer: None,
        }
    }

    /// Install an attempt observer, called with the 1-based attempt number
    /// before each attempt.
    pub fn with_observer(mut self, observer: AttemptObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// The URL map cache.
    ///
    /// Route changes do not invalidate it; callers decide when compiled
    /// maps are stale.
    pub fn adapters(&self) -> &AdapterCache {
        &self.adapters
    }

    /// The handler registry.
    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    /// The tenant registry.
    pub fn registry(&self) -> &TenantRegistry {
        &self.registry
    }

    /// Append a shared application route.
    ///
    /// Already-compiled maps keep serving the old route set until they are
    /// invalidated through [`adapters`](Self::adapters).
    pub fn add_route(&self, route: Route) {
        debug!(rule = %route.rule, endpoint = %route.endpoint, "application route added");
        self.routes.write().push(route);
    }

    /// Dispatch one request to a committed transaction and a response.
    pub async fn dispatch(&self, request: Request) -> DispatchResult<Response> {
        // The field is public, so re-clamp here: zero would skip the loop
        // and answer with a synthetic internal error.
        let max_attempts = self.config.retry.max_attempts.max(1);
        let mut last_transient: Option<DispatchError> = None;

        for attempt in 1..=max_attempts {
            if let Some(observer) = &self.observer {
                observer(attempt);
            }
            match AttemptOutcome::from_result(self.run_attempt(&request).await) {
                AttemptOutcome::Success(response) => {
                    debug!(
                        host = %request.host,
                        path = %request.path,
                        status = response.status,
                        attempt,
                        "request dispatched"
                    );
                    return Ok(response);
                }
                AttemptOutcome::Fatal(err) => {
                    debug!(host = %request.host, path = %request.path, error = %err, "request failed");
                    return Err(err);
                }
                AttemptOutcome::Retry(err) => {
                    warn!(
                        host = %request.host,
                        path = %request.path,
                        error = %err,
                        attempt,
                        max_attempts,
                        "transient failure, replaying request"
                    );
                    last_transient = Some(err);
                }
            }
        }

        match last_transient {
            Some(err) => Err(err),
            None => Err(DispatchError::Store(portico_store::StoreError::internal(
                "retry loop ran zero attempts",
            ))),
        }
    }

    /// One full attempt: route, resolve, open, execute, commit.
    async fn run_attempt(&self, request: &Request) -> DispatchResult<Response> {
        // Routing. No transaction exists yet, so misses are cheap.
        let tenant = self.registry.lookup(&request.host)?;
        let app_routes = self.routes.read().clone();
        let map = self.adapters.get_or_build(&tenant, &app_routes)?;

        let (route, mut args) = match map.match_path(&request.path, request.method)? {
            UrlMatch::AutomaticOptions { allowed } => return Ok(Response::options(&allowed)),
            UrlMatch::Route { route, args } => (route, args),
        };

        // Redirect rules answer without a transaction or handler.
        if let Some(target) = &route.redirect_to {
            return Ok(Response::redirect(target.clone()));
        }

        // Locale resolution consumes the placeholder before handlers see it.
        let url_locale = args.shift_remove("locale");
        let url_locale = url_locale.as_ref().and_then(PathValue::as_str);
        let locale = resolve_locale(&tenant, url_locale)?;

        let endpoint = match self.handlers.get(&route.endpoint) {
            Some(endpoint) => endpoint,
            None if route.endpoint == STATIC_ENDPOINT => {
                // No static handler installed: the file space is empty.
                return Err(RouterError::NotFound {
                    path: request.path.clone(),
                }
                .into());
            }
            None => {
                return Err(DispatchError::UnknownEndpoint {
                    endpoint: route.endpoint.to_string(),
                });
            }
        };

        let snapshot = self.probe_tenant(&tenant).await?;
        let context = TransactionContext::new()
            .with_company(snapshot.company)
            .with_language(locale.language.as_str());
        let txn = self
            .backend
            .begin(
                &self.config.database,
                snapshot.application_user,
                context,
                AccessMode::ReadWrite,
            )
            .await?;

        let result = self
            .execute(&txn, endpoint, &route.endpoint, snapshot, locale, &mut args)
            .await;

        match result {
            Ok(response) => {
                // A failed commit closes the transaction itself; transient
                // codes surface here and drive the retry loop.
                txn.commit().await?;
                Ok(response)
            }
            Err(err) => {
                if txn.is_open() {
                    if let Err(rb) = txn.rollback().await {
                        warn!(error = %rb, "rollback after failed attempt also failed");
                    }
                }
                Err(err)
            }
        }
    }

    /// Run the endpoint's handler inside `txn` and force any lazy body.
    async fn execute(
        &self,
        txn: &Transaction,
        endpoint: Endpoint,
        endpoint_name: &str,
        tenant: TenantSnapshot,
        locale: ResolvedLocale,
        args: &mut PathArgs,
    ) -> DispatchResult<Response> {
        let outcome = match endpoint {
            Endpoint::Function(handler) => {
                let env = RequestEnv {
                    txn: txn.clone(),
                    tenant,
                    locale,
                    args: std::mem::take(args),
                };
                handler(env).await?
            }
            Endpoint::BoundMethod { model, handler } => {
                let active_id = take_active_id(args).ok_or_else(|| {
                    DispatchError::MissingActiveId {
                        endpoint: endpoint_name.to_string(),
                    }
                })?;
                let record = txn.load(&model, active_id).await?;
                let env = RequestEnv {
                    txn: txn.clone(),
                    tenant,
                    locale,
                    args: std::mem::take(args),
                };
                handler(env, record).await?
            }
        };

        // Deferred bodies render before commit so their failures roll back.
        outcome.finalize()
    }

    /// Snapshot the tenant's dispatch-relevant values from the store.
    ///
    /// Runs a short read-only superuser transaction against the `website`
    /// record and always rolls it back; registry values stand in when the
    /// record is absent (code-configured tenants).
    async fn probe_tenant(&self, tenant: &Tenant) -> DispatchResult<TenantSnapshot> {
        let probe = self
            .backend
            .begin(
                &self.config.database,
                SUPERUSER_UID,
                TransactionContext::new(),
                AccessMode::ReadOnly,
            )
            .await?;

        let looked_up = async {
            let ids = probe
                .search("website", &Criteria::new().eq("name", json!(tenant.name)))
                .await?;
            match ids.first() {
                Some(&id) => probe.load("website", id).await.map(Some),
                None => Ok(None),
            }
        }
        .await;

        if let Err(err) = probe.rollback().await {
            warn!(error = %err, "tenant probe rollback failed");
        }

        let mut snapshot = tenant.snapshot();
        if let Some(record) = looked_up? {
            if let Some(user) = record.get_i64("user_id") {
                snapshot.application_user = UserId(user);
            }
            if let Some(guest) = record.get_i64("guest_user_id") {
                snapshot.guest_user = UserId(guest);
            }
            if let Some(company) = record.get_i64("company_id") {
                snapshot.company = company;
            }
            snapshot.id = record.id;
        }
        Ok(snapshot)
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("database", &self.config.database)
            .field("tenants", &self.registry.tenants().len())
            .field("handlers", &self.handlers.len())
            .field("cached_maps", &self.adapters.len())
            .finish()
    }
}

/// Pull the record id out of the matched arguments.
///
/// Integer placeholders arrive typed; a string placeholder or rule default
/// that parses as an integer also qualifies.
fn take_active_id(args: &mut PathArgs) -> Option<i64> {
    match args.shift_remove("active_id")? {
        PathValue::Int(id) => Some(id),
        PathValue::Str(s) => s.parse().ok(),
    }
}
