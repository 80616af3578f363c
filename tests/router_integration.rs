//! Router-level integration: registry loading, map compilation and reverse
//! URL building through the facade crate.

use portico::prelude::*;
use portico::router::{AdapterCache, PathArgs, PathValue, RouterError};
use portico::store::{FieldMap, SUPERUSER_UID};
use pretty_assertions::assert_eq;
use serde_json::json;

fn fields(pairs: &[(&str, serde_json::Value)]) -> FieldMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[tokio::test]
async fn test_registry_loads_websites_and_routes_requests() {
    let backend = MemoryBackend::new();
    backend.create_database("erp");

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
            ("user_id", json!(2)),
            ("company_id", json!(3)),
            ("locales", json!(["en_US", "es_ES"])),
        ]),
    )
    .await
    .unwrap();
    txn.create(
        "website",
        fields(&[("name", json!("blog.example")), ("user_id", json!(4))]),
    )
    .await
    .unwrap();
    txn.commit().await.unwrap();

    let registry = TenantRegistry::load(&backend, "erp").await.unwrap();
    assert_eq!(registry.tenants().len(), 2);

    let tenant = registry.lookup("Shop.Example:443").unwrap();
    assert_eq!(tenant.company, 3);
    assert!(tenant.has_locales());

    // The loaded tenant compiles into a locale-submounted map.
    let map = UrlMap::build(&tenant, &[Route::new("/orders", "order.list")]).unwrap();
    assert!(map.match_path("/orders", Method::Get).is_err());
    assert!(map.match_path("/es_ES/orders", Method::Get).is_ok());

    let UrlMatch::Route { route, .. } = map.match_path("/", Method::Get).unwrap() else {
        panic!("expected the locale redirect rule");
    };
    assert_eq!(route.redirect_to.as_deref(), Some("/en_US/"));
}

#[test]
fn test_reverse_url_building_through_the_map() {
    let tenant = Tenant::new(1, "shop.example", UserId(2))
        .with_route(Route::new("/orders/<int:active_id>", "order.view"))
        .with_route(Route::new("/legacy/orders/<int:active_id>", "order.view").build_only());
    let map = UrlMap::build(&tenant, &[]).unwrap();

    let mut args = PathArgs::new();
    args.insert("active_id".to_string(), PathValue::Int(42));
    assert_eq!(map.build_url("order.view", &args).unwrap(), "/orders/42");

    assert!(matches!(
        map.build_url("order.view", &PathArgs::new()),
        Err(RouterError::MissingBuildArg { .. })
    ));
}

#[test]
fn test_adapter_cache_keys_by_tenant() {
    let cache = AdapterCache::new();
    let a = Tenant::new(1, "a.example", UserId(2));
    let b = Tenant::new(2, "b.example", UserId(2));

    cache.get_or_build(&a, &[]).unwrap();
    cache.get_or_build(&b, &[]).unwrap();
    cache.get_or_build(&a, &[]).unwrap();

    let metrics = cache.metrics();
    assert_eq!(cache.len(), 2);
    assert_eq!((metrics.hits, metrics.misses), (1, 2));
}
