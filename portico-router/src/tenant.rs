//! Tenants ("websites") and their plain-value snapshots.

use portico_store::UserId;
use smol_str::SmolStr;

use crate::route::Route;

/// One supported locale of a tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locale {
    /// Locale code as it appears in URLs (e.g. "en_US").
    pub code: SmolStr,
    /// Language code forwarded into the transaction context.
    pub language: SmolStr,
    /// Display currency for this locale.
    pub currency: SmolStr,
}

impl Locale {
    /// Create a locale with an explicit language and currency.
    pub fn new(
        code: impl Into<SmolStr>,
        language: impl Into<SmolStr>,
        currency: impl Into<SmolStr>,
    ) -> Self {
        Self {
            code: code.into(),
            language: language.into(),
            currency: currency.into(),
        }
    }

    /// Create a locale whose language equals its code, priced in EUR.
    pub fn simple(code: impl Into<SmolStr>) -> Self {
        let code = code.into();
        Self {
            language: code.clone(),
            currency: SmolStr::new("EUR"),
            code,
        }
    }
}

/// One independently-routable website served by this process.
///
/// `name` is the routing key matched against the request Host header; it
/// uniquely determines the tenant's routing table.
#[derive(Debug, Clone)]
pub struct Tenant {
    /// Tenant id, also the URL-map cache key.
    pub id: i64,
    /// Routing key, matched case-insensitively against the Host header.
    pub name: String,
    /// The identity under which requests for this tenant execute.
    pub application_user: UserId,
    /// The identity used when no authenticated session exists.
    pub guest_user: UserId,
    /// Business-scoping company id, forwarded into the transaction context.
    pub company: i64,
    /// Default locale code; must be a member of `locales` when set.
    pub default_locale: Option<SmolStr>,
    /// Supported locales. Empty means the tenant routes at the bare root.
    pub locales: Vec<Locale>,
    /// Tenant-declared routes merged into the compiled map.
    pub routes: Vec<Route>,
}

impl Tenant {
    /// Create a tenant with defaults: guest user mirrors the application
    /// user, company 1, no locales, no declarative routes.
    pub fn new(id: i64, name: impl Into<String>, application_user: UserId) -> Self {
        Self {
            id,
            name: name.into(),
            application_user,
            guest_user: application_user,
            company: 1,
            default_locale: None,
            locales: Vec::new(),
            routes: Vec::new(),
        }
    }

    /// Set the guest user.
    pub fn with_guest_user(mut self, user: UserId) -> Self {
        self.guest_user = user;
        self
    }

    /// Set the company.
    pub fn with_company(mut self, company: i64) -> Self {
        self.company = company;
        self
    }

    /// Add a supported locale; the first one added becomes the default.
    pub fn with_locale(mut self, locale: Locale) -> Self {
        if self.default_locale.is_none() {
            self.default_locale = Some(locale.code.clone());
        }
        self.locales.push(locale);
        self
    }

    /// Override the default locale code.
    pub fn with_default_locale(mut self, code: impl Into<SmolStr>) -> Self {
        self.default_locale = Some(code.into());
        self
    }

    /// Add a tenant-declared route.
    pub fn with_route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    /// Whether this tenant serves locale-prefixed URLs.
    pub fn has_locales(&self) -> bool {
        !self.locales.is_empty()
    }

    /// Find a supported locale by code.
    pub fn locale(&self, code: &str) -> Option<&Locale> {
        self.locales.iter().find(|l| l.code == code)
    }

    /// The default locale, when one is configured and supported.
    pub fn default_locale(&self) -> Option<&Locale> {
        self.default_locale
            .as_deref()
            .and_then(|code| self.locale(code))
    }

    /// Plain-value snapshot, valid outside any transaction.
    pub fn snapshot(&self) -> TenantSnapshot {
        TenantSnapshot {
            id: self.id,
            name: self.name.clone(),
            application_user: self.application_user,
            guest_user: self.guest_user,
            company: self.company,
        }
    }
}

/// The plain values of a tenant needed to open its request transaction.
///
/// Records are only valid inside their originating transaction; this snapshot
/// is what crosses the boundary between the read-only tenant probe and the
/// request's read-write transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantSnapshot {
    /// Tenant id.
    pub id: i64,
    /// Routing key.
    pub name: String,
    /// Acting identity for request transactions.
    pub application_user: UserId,
    /// Identity for unauthenticated sessions.
    pub guest_user: UserId,
    /// Business-scoping company id.
    pub company: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_locale_becomes_default() {
        let tenant = Tenant::new(1, "shop.example", UserId(2))
            .with_locale(Locale::simple("en_US"))
            .with_locale(Locale::simple("es_ES"));

        assert_eq!(tenant.default_locale.as_deref(), Some("en_US"));
        assert!(tenant.locale("es_ES").is_some());
        assert!(tenant.locale("fr_FR").is_none());
    }

    #[test]
    fn test_default_locale_override() {
        let tenant = Tenant::new(1, "shop.example", UserId(2))
            .with_locale(Locale::simple("en_US"))
            .with_locale(Locale::simple("es_ES"))
            .with_default_locale("es_ES");

        assert_eq!(tenant.default_locale().unwrap().code, "es_ES");
    }

    #[test]
    fn test_snapshot_carries_plain_values() {
        let tenant = Tenant::new(4, "shop.example", UserId(2))
            .with_guest_user(UserId(9))
            .with_company(3);
        let snap = tenant.snapshot();
        assert_eq!(snap.id, 4);
        assert_eq!(snap.application_user, UserId(2));
        assert_eq!(snap.guest_user, UserId(9));
        assert_eq!(snap.company, 3);
    }
}
