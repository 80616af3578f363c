//! End-to-end dispatch tests: request in, committed transaction and
//! response out, against the in-memory backend.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use portico::dispatch::{AttemptObserver, DispatchError, HandlerOutcome};
use portico::prelude::*;
use portico::router::RouterError;
use portico::store::{ErrorCode, FieldMap, StoreError, SUPERUSER_UID};
use pretty_assertions::assert_eq;
use serde_json::json;

fn fields(pairs: &[(&str, serde_json::Value)]) -> FieldMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn backend() -> MemoryBackend {
    let backend = MemoryBackend::new();
    backend.create_database("erp");
    backend
}

async fn seed_order(backend: &MemoryBackend) -> i64 {
    let txn = backend
        .begin(
            "erp",
            SUPERUSER_UID,
            TransactionContext::new(),
            AccessMode::ReadWrite,
        )
        .await
        .unwrap();
    let id = txn
        .create("sale.order", fields(&[("state", json!("draft"))]))
        .await
        .unwrap();
    txn.commit().await.unwrap();
    id
}

async fn order_state(backend: &MemoryBackend, id: i64) -> String {
    let txn = backend
        .begin(
            "erp",
            SUPERUSER_UID,
            TransactionContext::new(),
            AccessMode::ReadOnly,
        )
        .await
        .unwrap();
    let state = txn
        .load("sale.order", id)
        .await
        .unwrap()
        .get_str("state")
        .unwrap()
        .to_string();
    txn.rollback().await.unwrap();
    state
}

fn base_handlers() -> HandlerRegistry {
    let handlers = HandlerRegistry::new();
    handlers.register_function("home", |_env| async {
        Ok(HandlerOutcome::Text("welcome".to_string()))
    });
    handlers.register_function("whoami", |env| async move {
        let ctx = env.txn.context();
        Ok(HandlerOutcome::Text(format!(
            "user={} company={} language={}",
            env.txn.user(),
            ctx.company.unwrap_or(0),
            ctx.language.clone().unwrap_or_default()
        )))
    });
    handlers.register_record_method("order.cancel_order", "sale.order", |env, record| {
        async move {
            env.txn
                .write(
                    "sale.order",
                    record.id,
                    fields(&[("state", json!("cancelled"))]),
                )
                .await?;
            Ok(HandlerOutcome::Text(format!("order {} cancelled", record.id)))
        }
    });
    handlers
}

fn app_routes() -> Vec<Route> {
    vec![
        Route::new("/", "home"),
        Route::new("/whoami", "whoami"),
        Route::new("/orders/<int:active_id>/cancel", "order.cancel_order").method(Method::Post),
    ]
}

fn dispatcher_for(backend: &MemoryBackend, tenants: Vec<Tenant>) -> Dispatcher {
    Dispatcher::new(
        Arc::new(backend.clone()),
        Arc::new(TenantRegistry::from_tenants(tenants).unwrap()),
        Arc::new(base_handlers()),
        app_routes(),
        DispatchConfig::new("erp"),
    )
}

fn shop() -> Tenant {
    Tenant::new(1, "shop.example", UserId(2))
}

#[tokio::test]
async fn test_commit_on_success_persists_handler_writes() {
    let backend = backend();
    let id = seed_order(&backend).await;
    let dispatcher = dispatcher_for(&backend, vec![shop()]);

    let response = dispatcher
        .dispatch(Request::new(
            Method::Post,
            "shop.example",
            format!("/orders/{id}/cancel"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.body, format!("order {id} cancelled"));
    assert_eq!(order_state(&backend, id).await, "cancelled");
}

#[tokio::test]
async fn test_handler_failure_rolls_everything_back() {
    let backend = backend();
    let id = seed_order(&backend).await;

    let handlers = base_handlers();
    handlers.register_record_method("order.explode", "sale.order", |env, record| async move {
        env.txn
            .write(
                "sale.order",
                record.id,
                fields(&[("state", json!("half-done"))]),
            )
            .await?;
        Err(DispatchError::Handler {
            endpoint: "order.explode".to_string(),
            message: "validation failed".to_string(),
        })
    });

    let mut routes = app_routes();
    routes.push(Route::new("/orders/<int:active_id>/explode", "order.explode").method(Method::Post));
    let dispatcher = Dispatcher::new(
        Arc::new(backend.clone()),
        Arc::new(TenantRegistry::from_tenants(vec![shop()]).unwrap()),
        Arc::new(handlers),
        routes,
        DispatchConfig::new("erp"),
    );

    let err = dispatcher
        .dispatch(Request::new(
            Method::Post,
            "shop.example",
            format!("/orders/{id}/explode"),
        ))
        .await
        .unwrap_err();

    assert_eq!(err.status_code(), 500);
    assert_eq!(order_state(&backend, id).await, "draft");
}

#[tokio::test]
async fn test_lazy_render_failure_rolls_back() {
    let backend = backend();
    let id = seed_order(&backend).await;

    let handlers = base_handlers();
    handlers.register_record_method("order.confirm", "sale.order", |env, record| async move {
        env.txn
            .write(
                "sale.order",
                record.id,
                fields(&[("state", json!("confirmed"))]),
            )
            .await?;
        Ok(HandlerOutcome::lazy(|| {
            Err("template failed to render".to_string())
        }))
    });

    let mut routes = app_routes();
    routes.push(Route::new("/orders/<int:active_id>/confirm", "order.confirm").method(Method::Post));
    let dispatcher = Dispatcher::new(
        Arc::new(backend.clone()),
        Arc::new(TenantRegistry::from_tenants(vec![shop()]).unwrap()),
        Arc::new(handlers),
        routes,
        DispatchConfig::new("erp"),
    );

    let err = dispatcher
        .dispatch(Request::new(
            Method::Post,
            "shop.example",
            format!("/orders/{id}/confirm"),
        ))
        .await
        .unwrap_err();

    assert!(matches!(err, DispatchError::Render(_)));
    assert_eq!(order_state(&backend, id).await, "draft");
}

#[tokio::test]
async fn test_transactions_bind_tenant_user_and_company() {
    let backend = backend();
    let dispatcher = dispatcher_for(
        &backend,
        vec![
            Tenant::new(1, "shop.example", UserId(2)).with_company(3),
            Tenant::new(2, "blog.example", UserId(8)).with_company(5),
        ],
    );

    let shop_resp = dispatcher
        .dispatch(Request::new(Method::Get, "shop.example", "/whoami"))
        .await
        .unwrap();
    assert!(shop_resp.body.starts_with("user=2 company=3"));

    let blog_resp = dispatcher
        .dispatch(Request::new(Method::Get, "blog.example", "/whoami"))
        .await
        .unwrap();
    assert!(blog_resp.body.starts_with("user=8 company=5"));
}

#[tokio::test]
async fn test_website_record_overrides_registry_values() {
    let backend = backend();
    let txn = backend
        .begin(
            "erp",
            SUPERUSER_UID,
            TransactionContext::new(),
            AccessMode::ReadWrite,
        )
        .await
        .unwrap();
    txn.create(
        "website",
        fields(&[
            ("name", json!("shop.example")),
            ("user_id", json!(7)),
            ("company_id", json!(9)),
        ]),
    )
    .await
    .unwrap();
    txn.commit().await.unwrap();

    let dispatcher = dispatcher_for(&backend, vec![shop()]);
    let response = dispatcher
        .dispatch(Request::new(Method::Get, "shop.example", "/whoami"))
        .await
        .unwrap();
    assert!(response.body.starts_with("user=7 company=9"));
}

#[tokio::test]
async fn test_single_tenant_serves_any_host() {
    let backend = backend();
    let dispatcher = dispatcher_for(&backend, vec![shop()]);

    let response = dispatcher
        .dispatch(Request::new(Method::Get, "anything.example:8080", "/"))
        .await
        .unwrap();
    assert_eq!(response.body, "welcome");
}

#[tokio::test]
async fn test_unknown_host_with_multiple_tenants_is_404() {
    let backend = backend();
    let dispatcher = dispatcher_for(
        &backend,
        vec![shop(), Tenant::new(2, "blog.example", UserId(2))],
    );

    let err = dispatcher
        .dispatch(Request::new(Method::Get, "other.example", "/"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DispatchError::Router(RouterError::WebsiteNotFound { .. })
    ));
    assert_eq!(err.status_code(), 404);
}

#[tokio::test]
async fn test_locale_redirect_and_resolution() {
    let backend = backend();
    let dispatcher = dispatcher_for(
        &backend,
        vec![
            shop()
                .with_locale(Locale::new("en_US", "en", "USD"))
                .with_locale(Locale::new("es_ES", "es", "EUR")),
        ],
    );

    // The bare root redirects to the default locale.
    let redirect = dispatcher
        .dispatch(Request::new(Method::Get, "shop.example", "/"))
        .await
        .unwrap();
    assert_eq!(redirect.status, 302);
    assert_eq!(redirect.header("location"), Some("/en_US/"));

    // Following the redirect lands on the home handler.
    let home = dispatcher
        .dispatch(Request::new(Method::Get, "shop.example", "/en_US/"))
        .await
        .unwrap();
    assert_eq!(home.status, 200);
    assert_eq!(home.body, "welcome");

    // The locale's language reaches the transaction context.
    let whoami = dispatcher
        .dispatch(Request::new(Method::Get, "shop.example", "/es_ES/whoami"))
        .await
        .unwrap();
    assert!(whoami.body.ends_with("language=es"));

    // An unsupported locale is a miss, not a fallback.
    let err = dispatcher
        .dispatch(Request::new(Method::Get, "shop.example", "/fr_FR/"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DispatchError::Router(RouterError::UnknownLocale { .. })
    ));
    assert_eq!(err.status_code(), 404);
}

fn collecting_observer() -> (AttemptObserver, Arc<Mutex<Vec<u32>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let observer: AttemptObserver = Arc::new(move |attempt| {
        sink.lock().unwrap().push(attempt);
    });
    (observer, seen)
}

#[tokio::test]
async fn test_transient_commit_failure_is_retried() {
    let backend = backend();
    let id = seed_order(&backend).await;
    backend.inject_fault(ErrorCode::SerializationFailure, 2);

    let (observer, seen) = collecting_observer();
    let dispatcher = dispatcher_for(&backend, vec![shop()]).with_observer(observer);

    let response = dispatcher
        .dispatch(Request::new(
            Method::Post,
            "shop.example",
            format!("/orders/{id}/cancel"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    assert_eq!(order_state(&backend, id).await, "cancelled");
}

#[tokio::test]
async fn test_retry_bound_is_respected() {
    let backend = backend();
    let id = seed_order(&backend).await;
    backend.inject_fault(ErrorCode::Deadlock, 5);

    let (observer, seen) = collecting_observer();
    let dispatcher = Dispatcher::new(
        Arc::new(backend.clone()),
        Arc::new(TenantRegistry::from_tenants(vec![shop()]).unwrap()),
        Arc::new(base_handlers()),
        app_routes(),
        DispatchConfig::new("erp").with_retry(RetryConfig::new().with_max_attempts(3)),
    )
    .with_observer(observer);

    let err = dispatcher
        .dispatch(Request::new(
            Method::Post,
            "shop.example",
            format!("/orders/{id}/cancel"),
        ))
        .await
        .unwrap_err();

    assert!(err.is_transient());
    assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    assert_eq!(backend.pending_faults(), 2);
    assert_eq!(order_state(&backend, id).await, "draft");
}

#[tokio::test]
async fn test_zero_attempt_bound_still_runs_once() {
    let backend = backend();

    // Writing the field directly sidesteps the builder clamp; the loop
    // must still make one real attempt.
    let mut config = DispatchConfig::new("erp");
    config.retry.max_attempts = 0;

    let (observer, seen) = collecting_observer();
    let dispatcher = Dispatcher::new(
        Arc::new(backend.clone()),
        Arc::new(TenantRegistry::from_tenants(vec![shop()]).unwrap()),
        Arc::new(base_handlers()),
        app_routes(),
        config,
    )
    .with_observer(observer);

    let response = dispatcher
        .dispatch(Request::new(Method::Get, "shop.example", "/"))
        .await
        .unwrap();
    assert_eq!(response.body, "welcome");
    assert_eq!(*seen.lock().unwrap(), vec![1]);
}

#[tokio::test]
async fn test_handler_returned_transient_is_retried() {
    let backend = backend();

    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);
    let handlers = base_handlers();
    handlers.register_function("flaky", move |_env| {
        let counter = Arc::clone(&counter);
        async move {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(DispatchError::Store(StoreError::serialization_failure()))
            } else {
                Ok(HandlerOutcome::Text("finally".to_string()))
            }
        }
    });

    let mut routes = app_routes();
    routes.push(Route::new("/flaky", "flaky"));
    let dispatcher = Dispatcher::new(
        Arc::new(backend.clone()),
        Arc::new(TenantRegistry::from_tenants(vec![shop()]).unwrap()),
        Arc::new(handlers),
        routes,
        DispatchConfig::new("erp"),
    );

    let response = dispatcher
        .dispatch(Request::new(Method::Get, "shop.example", "/flaky"))
        .await
        .unwrap();
    assert_eq!(response.body, "finally");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_nontransient_failure_is_not_retried() {
    let backend = backend();
    let id = seed_order(&backend).await;

    let (observer, seen) = collecting_observer();
    let dispatcher = dispatcher_for(&backend, vec![shop()]).with_observer(observer);

    // Unknown record: a plain not-found, final on the first attempt.
    let err = dispatcher
        .dispatch(Request::new(
            Method::Post,
            "shop.example",
            format!("/orders/{}/cancel", id + 100),
        ))
        .await
        .unwrap_err();

    assert_eq!(err.status_code(), 404);
    assert_eq!(*seen.lock().unwrap(), vec![1]);
}

#[tokio::test]
async fn test_cached_map_is_stale_until_invalidated() {
    let backend = backend();
    let dispatcher = dispatcher_for(&backend, vec![shop()]);
    dispatcher.handlers().register_function("fresh", |_env| async {
        Ok(HandlerOutcome::Text("fresh".to_string()))
    });

    // Compile and cache the map without the new route.
    dispatcher
        .dispatch(Request::new(Method::Get, "shop.example", "/"))
        .await
        .unwrap();

    dispatcher.add_route(Route::new("/fresh", "fresh"));

    // Still served from the stale compiled map.
    let err = dispatcher
        .dispatch(Request::new(Method::Get, "shop.example", "/fresh"))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 404);

    dispatcher.adapters().invalidate(1);
    let response = dispatcher
        .dispatch(Request::new(Method::Get, "shop.example", "/fresh"))
        .await
        .unwrap();
    assert_eq!(response.body, "fresh");

    let metrics = dispatcher.adapters().metrics();
    assert_eq!(metrics.invalidations, 1);
    assert!(metrics.misses >= 2);
}

#[tokio::test]
async fn test_automatic_options() {
    let backend = backend();
    let dispatcher = dispatcher_for(&backend, vec![shop()]);

    let response = dispatcher
        .dispatch(Request::new(
            Method::Options,
            "shop.example",
            "/orders/5/cancel",
        ))
        .await
        .unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.header("allow"), Some("POST, OPTIONS"));
}

#[tokio::test]
async fn test_method_not_allowed() {
    let backend = backend();
    let dispatcher = dispatcher_for(&backend, vec![shop()]);

    let err = dispatcher
        .dispatch(Request::new(Method::Get, "shop.example", "/orders/5/cancel"))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 405);
}

#[tokio::test]
async fn test_record_bound_endpoint_without_active_id() {
    let backend = backend();
    let dispatcher = dispatcher_for(
        &backend,
        vec![shop().with_route(
            Route::new("/cancel-nothing", "order.cancel_order").method(Method::Post),
        )],
    );

    let err = dispatcher
        .dispatch(Request::new(Method::Post, "shop.example", "/cancel-nothing"))
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::MissingActiveId { .. }));
    assert_eq!(err.status_code(), 500);
}

#[tokio::test]
async fn test_unregistered_endpoint_is_an_error() {
    let backend = backend();
    let dispatcher = dispatcher_for(
        &backend,
        vec![shop().with_route(Route::new("/ghost", "no.such.handler"))],
    );

    let err = dispatcher
        .dispatch(Request::new(Method::Get, "shop.example", "/ghost"))
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::UnknownEndpoint { .. }));
}

#[tokio::test]
async fn test_static_space_is_empty_without_a_handler() {
    let backend = backend();
    let dispatcher = dispatcher_for(&backend, vec![shop()]);

    let err = dispatcher
        .dispatch(Request::new(
            Method::Get,
            "shop.example",
            "/static/css/site.css",
        ))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 404);
}

#[tokio::test]
async fn test_static_handler_receives_the_filename() {
    let backend = backend();
    let dispatcher = dispatcher_for(&backend, vec![shop()]);
    dispatcher.handlers().register_function("static", |env| async move {
        let filename = env.args["filename"].as_str().unwrap_or("").to_string();
        Ok(HandlerOutcome::Text(format!("serving {filename}")))
    });

    let response = dispatcher
        .dispatch(Request::new(
            Method::Get,
            "shop.example",
            "/static/css/site.css",
        ))
        .await
        .unwrap();
    assert_eq!(response.body, "serving css/site.css");
}
