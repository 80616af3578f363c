//! Rule pattern parsing, matching and reverse building.
//!
//! A rule is a path pattern with typed placeholders:
//!
//! - `/orders`: static segments only
//! - `/orders/<int:active_id>`: an integer placeholder
//! - `/page/<name>`: a string placeholder (the default converter)
//! - `/static/<path:filename>`: a path placeholder consuming the rest of
//!   the URL, slashes included
//!
//! Patterns are compiled once at map-build time; matching a request is a
//! segment walk with no allocation beyond the extracted arguments.

use std::fmt;

use indexmap::IndexMap;

use crate::error::{RouterError, RouterResult};

/// Placeholder converters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Converter {
    /// Any single segment (default).
    Str,
    /// A signed integer segment.
    Int,
    /// The remaining path, slashes included. Only valid as the last segment.
    Path,
}

impl Converter {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "str" | "string" => Some(Self::Str),
            "int" => Some(Self::Int),
            "path" => Some(Self::Path),
            _ => None,
        }
    }
}

/// A matched placeholder value.
#[derive(Debug, Clone, PartialEq)]
pub enum PathValue {
    /// A string segment.
    Str(String),
    /// An integer segment.
    Int(i64),
}

impl PathValue {
    /// The value as a string slice, when it is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            Self::Int(_) => None,
        }
    }

    /// The value as an integer, when it is one.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Str(_) => None,
        }
    }
}

impl fmt::Display for PathValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{}", s),
            Self::Int(i) => write!(f, "{}", i),
        }
    }
}

impl From<&str> for PathValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for PathValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for PathValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

/// Arguments extracted from a matched path, in placeholder order.
pub type PathArgs = IndexMap<String, PathValue>;

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Static(String),
    Param { name: String, converter: Converter },
}

/// A compiled rule pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct RulePattern {
    raw: String,
    segments: Vec<Segment>,
    trailing_slash: bool,
}

impl RulePattern {
    /// Parse a rule string.
    pub fn parse(rule: &str) -> RouterResult<Self> {
        if !rule.starts_with('/') {
            return Err(RouterError::invalid_rule(rule, "rule must start with '/'"));
        }

        let trailing_slash = rule.len() > 1 && rule.ends_with('/');
        let trimmed = rule.trim_matches('/');
        let mut segments = Vec::new();

        if !trimmed.is_empty() {
            for part in trimmed.split('/') {
                if part.is_empty() {
                    return Err(RouterError::invalid_rule(rule, "empty segment"));
                }
                segments.push(Self::parse_segment(rule, part)?);
            }
        }

        for (i, segment) in segments.iter().enumerate() {
            if let Segment::Param {
                converter: Converter::Path,
                ..
            } = segment
            {
                if i + 1 != segments.len() {
                    return Err(RouterError::invalid_rule(
                        rule,
                        "path converter must be the last segment",
                    ));
                }
            }
        }

        Ok(Self {
            raw: rule.to_string(),
            segments,
            trailing_slash,
        })
    }

    fn parse_segment(rule: &str, part: &str) -> RouterResult<Segment> {
        if !part.starts_with('<') {
            if part.contains('<') || part.contains('>') {
                return Err(RouterError::invalid_rule(rule, "malformed placeholder"));
            }
            return Ok(Segment::Static(part.to_string()));
        }
        let Some(inner) = part.strip_prefix('<').and_then(|p| p.strip_suffix('>')) else {
            return Err(RouterError::invalid_rule(rule, "unterminated placeholder"));
        };
        let (converter, name) = match inner.split_once(':') {
            Some((conv, name)) => {
                let converter = Converter::parse(conv).ok_or_else(|| {
                    RouterError::invalid_rule(rule, format!("unknown converter '{}'", conv))
                })?;
                (converter, name)
            }
            None => (Converter::Str, inner),
        };
        if name.is_empty() {
            return Err(RouterError::invalid_rule(rule, "placeholder without a name"));
        }
        Ok(Segment::Param {
            name: name.to_string(),
            converter,
        })
    }

    /// The rule text this pattern was parsed from.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Placeholder names in rule order.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param { name, .. } => Some(name.as_str()),
            Segment::Static(_) => None,
        })
    }

    /// Match a request path, extracting placeholder arguments.
    ///
    /// Trailing-slash handling is strict: a rule ending in `/` only matches
    /// paths ending in `/`, so canonicalization stays a redirect concern.
    pub fn match_path(&self, path: &str) -> Option<PathArgs> {
        if !path.starts_with('/') {
            return None;
        }
        if self.trailing_slash != (path.len() > 1 && path.ends_with('/')) {
            return None;
        }

        let trimmed = path.trim_matches('/');
        let mut parts = if trimmed.is_empty() {
            Vec::new()
        } else {
            trimmed.split('/').collect::<Vec<_>>()
        };

        let mut args = PathArgs::new();
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Static(expected) => {
                    if parts.get(i) != Some(&expected.as_str()) {
                        return None;
                    }
                }
                Segment::Param { name, converter } => match converter {
                    Converter::Str => {
                        let part = parts.get(i)?;
                        args.insert(name.clone(), PathValue::Str((*part).to_string()));
                    }
                    Converter::Int => {
                        let part = parts.get(i)?;
                        let value: i64 = part.parse().ok()?;
                        args.insert(name.clone(), PathValue::Int(value));
                    }
                    Converter::Path => {
                        if parts.len() < i + 1 {
                            return None;
                        }
                        let rest = parts.split_off(i).join("/");
                        if rest.is_empty() {
                            return None;
                        }
                        args.insert(name.clone(), PathValue::Str(rest));
                        return Some(args);
                    }
                },
            }
        }

        if parts.len() != self.segments.len() {
            return None;
        }
        Some(args)
    }

    /// Build a concrete path from arguments (reverse of `match_path`).
    pub fn build(&self, args: &PathArgs) -> RouterResult<String> {
        let mut out = String::new();
        for segment in &self.segments {
            out.push('/');
            match segment {
                Segment::Static(s) => out.push_str(s),
                Segment::Param { name, .. } => {
                    let value = args.get(name).ok_or_else(|| RouterError::MissingBuildArg {
                        rule: self.raw.clone(),
                        name: name.clone(),
                    })?;
                    out.push_str(&value.to_string());
                }
            }
        }
        if out.is_empty() {
            out.push('/');
        } else if self.trailing_slash {
            out.push('/');
        }
        Ok(out)
    }
}
