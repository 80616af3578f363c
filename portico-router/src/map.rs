//! Compiled per-tenant URL maps.
//!
//! A [`UrlMap`] is built from the application's routes plus one tenant's own
//! declarative routes. For tenants with locales, every rule is remounted
//! under a `/<locale>` prefix and the bare root becomes a redirect to the
//! default locale, so `/shop` turns into `/en_US/shop` and `/` answers with
//! a redirect to `/en_US/`. Static file rules stay unprefixed.
//!
//! Building is deterministic: rules are ordered by their `sequence`, ties
//! broken by insertion order, and a later duplicate of the same
//! `(rule, endpoint)` pair is dropped.

use smol_str::SmolStr;
use tracing::debug;

use crate::error::{RouterError, RouterResult};
use crate::route::{Method, Route};
use crate::rule::{PathArgs, PathValue, RulePattern};
use crate::tenant::Tenant;

/// The endpoint of the built-in static file rule.
pub const STATIC_ENDPOINT: &str = "static";

/// The rule of the built-in static file rule.
pub const STATIC_RULE: &str = "/static/<path:filename>";

/// Endpoint used for the locale root redirect rule.
pub const LOCALE_REDIRECT_ENDPOINT: &str = "portico.locale_redirect";

/// One rule of a compiled map.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    /// The route, with its rule rewritten to the mounted form.
    pub route: Route,
    pattern: RulePattern,
}

impl CompiledRule {
    /// The compiled pattern.
    pub fn pattern(&self) -> &RulePattern {
        &self.pattern
    }
}

/// Outcome of matching a request path against a map.
#[derive(Debug, Clone)]
pub enum UrlMatch {
    /// A rule matched; dispatch `route.endpoint` with `args`.
    Route {
        /// The matched route. A `redirect_to` route answers without a
        /// handler.
        route: Route,
        /// Extracted placeholder arguments plus the rule's defaults.
        args: PathArgs,
    },
    /// No rule handled OPTIONS explicitly; answer it from the method union.
    AutomaticOptions {
        /// Every method some matching rule accepts.
        allowed: Vec<Method>,
    },
}

/// An immutable, compiled routing table for one tenant.
#[derive(Debug)]
pub struct UrlMap {
    tenant_id: i64,
    rules: Vec<CompiledRule>,
}

impl UrlMap {
    /// Compile the map for `tenant` from the shared application routes.
    pub fn build(tenant: &Tenant, app_routes: &[Route]) -> RouterResult<Self> {
        let mut routes: Vec<Route> = Vec::with_capacity(app_routes.len() + tenant.routes.len() + 2);
        routes.extend(app_routes.iter().cloned());
        routes.extend(tenant.routes.iter().cloned());

        if tenant.has_locales() {
            for route in &mut routes {
                route.rule = mount_under_locale(&route.rule);
            }
            if let Some(default) = tenant.default_locale() {
                routes.push(
                    Route::new("/", LOCALE_REDIRECT_ENDPOINT)
                        .redirect_to(format!("/{}/", default.code)),
                );
            }
        }

        // Served outside the locale submount.
        routes.push(Route::new(STATIC_RULE, SmolStr::new(STATIC_ENDPOINT)));

        routes.sort_by_key(|r| r.sequence);

        let mut rules: Vec<CompiledRule> = Vec::with_capacity(routes.len());
        for route in routes {
            if rules
                .iter()
                .any(|r| r.route.rule == route.rule && r.route.endpoint == route.endpoint)
            {
                continue;
            }
            let pattern = RulePattern::parse(&route.rule)?;
            rules.push(CompiledRule { route, pattern });
        }

        debug!(tenant = tenant.id, rules = rules.len(), "url map compiled");
        Ok(Self {
            tenant_id: tenant.id,
            rules,
        })
    }

    /// The tenant this map was built for.
    pub fn tenant_id(&self) -> i64 {
        self.tenant_id
    }

    /// The compiled rules, in match order.
    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    /// Match a request path and method.
    ///
    /// Build-only rules never match. A path that matches some rule but none
    /// accepting `method` is answered with the union of accepted methods:
    /// automatically for OPTIONS, as a 405-shaped error otherwise.
    pub fn match_path(&self, path: &str, method: Method) -> RouterResult<UrlMatch> {
        let mut allowed: Vec<Method> = Vec::new();
        let mut automatic_options = false;

        for rule in &self.rules {
            if rule.route.build_only {
                continue;
            }
            let Some(mut args) = rule.pattern.match_path(path) else {
                continue;
            };
            if rule.route.allows(method) {
                for (key, value) in &rule.route.defaults {
                    if !args.contains_key(key) {
                        args.insert(key.clone(), PathValue::Str(value.clone()));
                    }
                }
                return Ok(UrlMatch::Route {
                    route: rule.route.clone(),
                    args,
                });
            }
            for m in rule.route.allowed_methods() {
                if !allowed.contains(&m) {
                    allowed.push(m);
                }
            }
            automatic_options |= rule.route.provide_automatic_options;
        }

        if allowed.is_empty() {
            return Err(RouterError::NotFound {
                path: path.to_string(),
            });
        }

        allowed.sort();
        if method == Method::Options && automatic_options {
            if !allowed.contains(&Method::Options) {
                allowed.push(Method::Options);
            }
            return Ok(UrlMatch::AutomaticOptions { allowed });
        }

        Err(RouterError::MethodNotAllowed {
            path: path.to_string(),
            method: method.to_string(),
            allowed: allowed.iter().map(|m| m.to_string()).collect(),
        })
    }

    /// Build a URL for `endpoint` from `args` (reverse routing).
    ///
    /// Build-only rules participate here; the first rule for the endpoint
    /// whose placeholders are all satisfied wins.
    pub fn build_url(&self, endpoint: &str, args: &PathArgs) -> RouterResult<String> {
        let mut found = false;
        for rule in &self.rules {
            if rule.route.endpoint != endpoint {
                continue;
            }
            found = true;
            if rule.pattern.param_names().all(|name| args.contains_key(name)) {
                return rule.pattern.build(args);
            }
        }
        if found {
            // Every candidate was short an argument; report the first one's.
            for rule in &self.rules {
                if rule.route.endpoint == endpoint {
                    return rule.pattern.build(args);
                }
            }
        }
        Err(RouterError::UnknownEndpoint {
            endpoint: endpoint.to_string(),
        })
    }
}

fn mount_under_locale(rule: &str) -> String {
    if rule.starts_with("/static/") || rule.starts_with("/<locale>") {
        return rule.to_string();
    }
    if rule == "/" {
        "/<locale>/".to_string()
    } else {
        format!("/<locale>{}", rule)
    }
}
