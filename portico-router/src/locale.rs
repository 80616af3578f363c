//! Locale resolution for matched requests.

use smol_str::SmolStr;

use crate::error::{RouterError, RouterResult};
use crate::tenant::Tenant;

/// The locale a request runs under, bound into its transaction context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLocale {
    /// Locale code as it appeared in (or was defaulted into) the URL.
    pub code: SmolStr,
    /// Language forwarded to the store as the context language.
    pub language: SmolStr,
}

impl ResolvedLocale {
    /// The locale-less fallback for tenants without locales.
    pub fn neutral() -> Self {
        Self {
            code: SmolStr::new("en_US"),
            language: SmolStr::new("en_US"),
        }
    }
}

/// Resolve the request locale against the tenant's supported set.
///
/// `url_locale` is the value of the `locale` placeholder when the matched
/// rule carried one. An explicit locale the tenant does not support is a
/// hard miss, not a fallback; an absent one resolves to the tenant default,
/// or to the neutral locale when the tenant has none.
pub fn resolve_locale(tenant: &Tenant, url_locale: Option<&str>) -> RouterResult<ResolvedLocale> {
    match url_locale {
        Some(code) => match tenant.locale(code) {
            Some(locale) => Ok(ResolvedLocale {
                code: locale.code.clone(),
                language: locale.language.clone(),
            }),
            None => Err(RouterError::UnknownLocale {
                locale: code.to_string(),
            }),
        },
        None => match tenant.default_locale() {
            Some(locale) => Ok(ResolvedLocale {
                code: locale.code.clone(),
                language: locale.language.clone(),
            }),
            None => Ok(ResolvedLocale::neutral()),
        },
    }
}
