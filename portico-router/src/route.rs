//! Route descriptors.

use std::collections::BTreeMap;
use std::fmt;

use smol_str::SmolStr;

/// HTTP methods the router understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Method {
    /// GET
    Get,
    /// HEAD
    Head,
    /// POST
    Post,
    /// PUT
    Put,
    /// PATCH
    Patch,
    /// DELETE
    Delete,
    /// OPTIONS
    Options,
}

impl Method {
    /// Canonical uppercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Options => "OPTIONS",
        }
    }

    /// Parse a method name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Some(Self::Get),
            "HEAD" => Some(Self::Head),
            "POST" => Some(Self::Post),
            "PUT" => Some(Self::Put),
            "PATCH" => Some(Self::Patch),
            "DELETE" => Some(Self::Delete),
            "OPTIONS" => Some(Self::Options),
            _ => None,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A declarative route: a path pattern plus dispatch metadata.
///
/// ```rust
/// use portico_router::{Method, Route};
///
/// let route = Route::new("/orders/<int:active_id>/cancel", "order.cancel_order")
///     .method(Method::Post)
///     .sequence(10);
/// assert!(route.allows(Method::Post));
/// assert!(!route.allows(Method::Get));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    /// Path pattern with optional `<converter:name>` placeholders.
    pub rule: String,
    /// Handler identifier, resolved through the handler registry.
    pub endpoint: SmolStr,
    /// Accepted methods. Empty means GET (plus HEAD).
    pub methods: Vec<Method>,
    /// Fixed values injected into every match.
    pub defaults: BTreeMap<String, String>,
    /// Usable for reverse URL generation only, never dispatched.
    pub build_only: bool,
    /// Redirect target; a matched redirect rule answers without a handler.
    pub redirect_to: Option<String>,
    /// Ordering tie-break: lower sequence wins.
    pub sequence: i32,
    /// Answer OPTIONS automatically when no rule handles it explicitly.
    pub provide_automatic_options: bool,
}

impl Route {
    /// Create a GET route.
    pub fn new(rule: impl Into<String>, endpoint: impl Into<SmolStr>) -> Self {
        Self {
            rule: rule.into(),
            endpoint: endpoint.into(),
            methods: Vec::new(),
            defaults: BTreeMap::new(),
            build_only: false,
            redirect_to: None,
            sequence: 0,
            provide_automatic_options: true,
        }
    }

    /// Add an accepted method.
    pub fn method(mut self, method: Method) -> Self {
        if !self.methods.contains(&method) {
            self.methods.push(method);
        }
        self
    }

    /// Replace the accepted methods.
    pub fn methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.methods = methods.into_iter().collect();
        self
    }

    /// Inject a fixed value into every match of this rule.
    pub fn default_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.defaults.insert(key.into(), value.into());
        self
    }

    /// Mark as build-only.
    pub fn build_only(mut self) -> Self {
        self.build_only = true;
        self
    }

    /// Turn the rule into a redirect.
    pub fn redirect_to(mut self, target: impl Into<String>) -> Self {
        self.redirect_to = Some(target.into());
        self
    }

    /// Set the ordering sequence.
    pub fn sequence(mut self, sequence: i32) -> Self {
        self.sequence = sequence;
        self
    }

    /// Disable the automatic OPTIONS response for this rule.
    pub fn no_automatic_options(mut self) -> Self {
        self.provide_automatic_options = false;
        self
    }

    /// The methods this route accepts, with the GET/HEAD default applied.
    pub fn allowed_methods(&self) -> Vec<Method> {
        if self.methods.is_empty() {
            vec![Method::Get, Method::Head]
        } else {
            self.methods.clone()
        }
    }

    /// Whether the route accepts `method`.
    pub fn allows(&self, method: Method) -> bool {
        self.allowed_methods().contains(&method)
    }
}
