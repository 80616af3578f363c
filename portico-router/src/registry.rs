//! The tenant registry: host header to tenant resolution.
//!
//! The registry is built once (from code or from `website` records) and
//! injected into the dispatcher; resolution itself never touches the store.

use std::collections::HashMap;
use std::sync::Arc;

use portico_store::{AccessMode, Criteria, Record, StorageBackend, TransactionContext, SUPERUSER_UID};
use smol_str::SmolStr;
use tracing::{debug, warn};

use crate::error::{RouterError, RouterResult};
use crate::route::{Method, Route};
use crate::tenant::{Locale, Tenant};

/// An immutable set of tenants, keyed by routing name.
#[derive(Debug)]
pub struct TenantRegistry {
    tenants: Vec<Arc<Tenant>>,
    by_name: HashMap<String, Arc<Tenant>>,
}

impl TenantRegistry {
    /// Build a registry from in-memory tenants.
    ///
    /// Names are compared case-insensitively; two tenants sharing a name is
    /// a configuration error.
    pub fn from_tenants(tenants: impl IntoIterator<Item = Tenant>) -> RouterResult<Self> {
        let tenants: Vec<Arc<Tenant>> = tenants.into_iter().map(Arc::new).collect();
        let mut by_name = HashMap::with_capacity(tenants.len());
        for tenant in &tenants {
            let key = tenant.name.to_ascii_lowercase();
            if by_name.insert(key, Arc::clone(tenant)).is_some() {
                return Err(RouterError::DuplicateTenant {
                    name: tenant.name.clone(),
                });
            }
        }
        Ok(Self { tenants, by_name })
    }

    /// Load the registry from `website` records in `database`.
    ///
    /// Runs a short read-only transaction as the superuser and rolls it back
    /// once the plain values are extracted.
    pub async fn load(backend: &dyn StorageBackend, database: &str) -> RouterResult<Self> {
        let txn = backend
            .begin(
                database,
                SUPERUSER_UID,
                TransactionContext::new(),
                AccessMode::ReadOnly,
            )
            .await?;

        let result = async {
            let ids = txn.search("website", &Criteria::new()).await?;
            let mut tenants = Vec::with_capacity(ids.len());
            for id in ids {
                let record = txn.load("website", id).await?;
                tenants.push(tenant_from_record(&record));
            }
            Ok::<_, RouterError>(tenants)
        }
        .await;

        // The probe never holds work worth committing.
        if let Err(err) = txn.rollback().await {
            warn!(database = %database, error = %err, "registry probe rollback failed");
        }

        let tenants = result?;
        debug!(database = %database, count = tenants.len(), "loaded tenant registry");
        Self::from_tenants(tenants)
    }

    /// Resolve the tenant for a request Host header.
    ///
    /// The port is stripped and the name compared case-insensitively. When
    /// exactly one tenant is registered it answers for every host; with more
    /// than one, an unknown host is a hard miss.
    pub fn lookup(&self, host: &str) -> RouterResult<Arc<Tenant>> {
        let normalized = normalize_host(host);
        if let Some(tenant) = self.by_name.get(&normalized) {
            return Ok(Arc::clone(tenant));
        }
        if self.tenants.len() == 1 {
            debug!(host = %host, "unknown host served by the only registered website");
            return Ok(Arc::clone(&self.tenants[0]));
        }
        Err(RouterError::WebsiteNotFound { host: normalized })
    }

    /// All registered tenants.
    pub fn tenants(&self) -> &[Arc<Tenant>] {
        &self.tenants
    }

    /// Look a tenant up by id.
    pub fn by_id(&self, id: i64) -> Option<Arc<Tenant>> {
        self.tenants.iter().find(|t| t.id == id).map(Arc::clone)
    }
}

fn normalize_host(host: &str) -> String {
    // "[::1]:8080" keeps its brackets; everything after the last ':' outside
    // them is the port.
    let stripped = if let Some(end) = host.rfind(']') {
        &host[..=end]
    } else {
        host.rsplit_once(':').map(|(h, _)| h).unwrap_or(host)
    };
    stripped.to_ascii_lowercase()
}

fn tenant_from_record(record: &Record) -> Tenant {
    let name = record.get_str("name").unwrap_or("").to_string();
    let application_user = record
        .get_i64("user_id")
        .map(portico_store::UserId)
        .unwrap_or(SUPERUSER_UID);
    let mut tenant = Tenant::new(record.id, name, application_user);

    if let Some(guest) = record.get_i64("guest_user_id") {
        tenant = tenant.with_guest_user(portico_store::UserId(guest));
    }
    if let Some(company) = record.get_i64("company_id") {
        tenant = tenant.with_company(company);
    }
    if let Some(locales) = record.get("locales").and_then(|v| v.as_array()) {
        for value in locales {
            match value {
                serde_json::Value::String(code) => {
                    tenant = tenant.with_locale(Locale::simple(code.as_str()));
                }
                serde_json::Value::Object(map) => {
                    let Some(code) = map.get("code").and_then(|v| v.as_str()) else {
                        continue;
                    };
                    let language = map
                        .get("language")
                        .and_then(|v| v.as_str())
                        .unwrap_or(code);
                    let currency = map
                        .get("currency")
                        .and_then(|v| v.as_str())
                        .unwrap_or("EUR");
                    tenant = tenant.with_locale(Locale::new(code, language, currency));
                }
                _ => {}
            }
        }
    }
    if let Some(default_locale) = record.get_str("default_locale") {
        tenant = tenant.with_default_locale(SmolStr::new(default_locale));
    }
    if let Some(routes) = record.get("routes").and_then(|v| v.as_array()) {
        for value in routes {
            match route_from_value(value) {
                Some(route) => tenant = tenant.with_route(route),
                None => {
                    warn!(website = %tenant.name, route = %value, "skipping malformed route entry");
                }
            }
        }
    }
    tenant
}

/// Parse one entry of a website record's `routes` array.
///
/// Requires `rule` and `endpoint`; everything else falls back to the
/// [`Route::new`] defaults. Unknown method names invalidate the entry
/// rather than silently widening or narrowing it.
fn route_from_value(value: &serde_json::Value) -> Option<Route> {
    let map = value.as_object()?;
    let rule = map.get("rule")?.as_str()?;
    let endpoint = map.get("endpoint")?.as_str()?;
    let mut route = Route::new(rule, endpoint);

    if let Some(methods) = map.get("methods").and_then(|v| v.as_array()) {
        let mut parsed = Vec::with_capacity(methods.len());
        for name in methods {
            parsed.push(Method::parse(name.as_str()?)?);
        }
        route = route.methods(parsed);
    }
    if let Some(defaults) = map.get("defaults").and_then(|v| v.as_object()) {
        for (key, default) in defaults {
            route = route.default_value(key, default.as_str()?);
        }
    }
    if let Some(target) = map.get("redirect_to").and_then(|v| v.as_str()) {
        route = route.redirect_to(target);
    }
    if let Some(sequence) = map.get("sequence").and_then(|v| v.as_i64()) {
        route = route.sequence(sequence as i32);
    }
    if map.get("build_only").and_then(|v| v.as_bool()) == Some(true) {
        route = route.build_only();
    }
    Some(route)
}
