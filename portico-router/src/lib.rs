//! Tenant resolution and URL routing for the Portico dispatch engine.
//!
//! This crate answers two questions for every incoming request: which
//! website (tenant) the Host header belongs to, and which endpoint its path
//! and method select. Tenants come from a [`TenantRegistry`]; each tenant
//! gets a compiled [`UrlMap`] cached in an [`AdapterCache`] and rebuilt only
//! on explicit invalidation.
//!
//! ```rust
//! use portico_router::{Method, Route, Tenant, UrlMap, UrlMatch};
//! use portico_store::UserId;
//!
//! let tenant = Tenant::new(1, "shop.example", UserId(2));
//! let routes = vec![Route::new("/orders/<int:active_id>", "order.view")];
//! let map = UrlMap::build(&tenant, &routes).unwrap();
//!
//! let m = map.match_path("/orders/42", Method::Get).unwrap();
//! let UrlMatch::Route { route, args } = m else { unreachable!() };
//! assert_eq!(route.endpoint, "order.view");
//! assert_eq!(args["active_id"].as_int(), Some(42));
//! ```

#![deny(rustdoc::broken_intra_doc_links)]

pub mod cache;
pub mod error;
pub mod locale;
pub mod map;
pub mod registry;
pub mod route;
pub mod rule;
pub mod tenant;

pub use cache::{AdapterCache, CacheMetrics};
pub use error::{RouterError, RouterResult};
pub use locale::{ResolvedLocale, resolve_locale};
pub use map::{CompiledRule, UrlMap, UrlMatch, LOCALE_REDIRECT_ENDPOINT, STATIC_ENDPOINT, STATIC_RULE};
pub use registry::TenantRegistry;
pub use route::{Method, Route};
pub use rule::{Converter, PathArgs, PathValue, RulePattern};
pub use tenant::{Locale, Tenant, TenantSnapshot};
