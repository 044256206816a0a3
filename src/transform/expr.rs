//! Per-request parameter expressions.
//!
//! Effect parameters in the configuration are either literals or templates
//! that reference the current request, e.g. `"{{arg.darken}}"`. Templates are
//! compiled once at configuration load into a resolver closure and evaluated
//! immediately before the effect step runs, so one configured step can take a
//! different value on every request.
//!
//! # Supported Variables
//!
//! - `{{arg.<name>}}` - Query string argument
//! - `{{header.<Name>}}` - Request header (case-insensitive)
//! - `{{var.<name>}}` - Host-provided request variable
//! - `{{path}}`, `{{method}}`, `{{request_id}}` - Request context
//! - `{{timestamp}}` - Request time in Unix epoch seconds
//!
//! # Example
//!
//! ```
//! use jpeg_body_filter::pipeline::RequestContext;
//! use jpeg_body_filter::transform::Expr;
//!
//! let expr = Expr::parse("{{arg.level}}").unwrap();
//! let mut ctx = RequestContext::new("GET".to_string(), "/img.jpg".to_string());
//! ctx.set_query_param("level", "30");
//! assert_eq!(expr.resolve_int(&ctx), Some(30));
//! ```

use regex::Regex;
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::pipeline::RequestContext;

/// Regex pattern for matching template variables: {{variable}}
static TEMPLATE_PATTERN: OnceLock<Regex> = OnceLock::new();

fn template_pattern() -> &'static Regex {
    TEMPLATE_PATTERN.get_or_init(|| {
        // SAFETY: compile-time constant pattern, covered by test_template_regex_is_valid.
        Regex::new(r"\{\{\s*([^}]+?)\s*\}\}").expect("Invalid template regex - this is a compile-time bug")
    })
}

type Resolver = dyn Fn(&RequestContext) -> Option<String> + Send + Sync;

/// A value source evaluated against the current request.
#[derive(Clone)]
pub enum Expr {
    /// Fixed value from the configuration
    Literal(String),
    /// Value computed from the request context; `None` means unresolvable
    Resolved(Arc<Resolver>),
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Expr::Resolved(_) => f.write_str("Resolved(..)"),
        }
    }
}

/// A single variable reference inside a template.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Variable {
    Arg(String),
    Header(String),
    Var(String),
    Path,
    Method,
    RequestId,
    Timestamp,
}

impl Variable {
    fn parse(name: &str) -> Result<Self, String> {
        let non_empty = |key: &str, kind: &str| {
            if key.is_empty() {
                Err(format!("empty {} name in template variable '{}'", kind, name))
            } else {
                Ok(key.to_string())
            }
        };

        if let Some(key) = name.strip_prefix("arg.") {
            return non_empty(key, "argument").map(Variable::Arg);
        }
        if let Some(key) = name.strip_prefix("header.") {
            return non_empty(key, "header").map(Variable::Header);
        }
        if let Some(key) = name.strip_prefix("var.") {
            return non_empty(key, "variable").map(Variable::Var);
        }

        match name {
            "path" => Ok(Variable::Path),
            "method" => Ok(Variable::Method),
            "request_id" => Ok(Variable::RequestId),
            "timestamp" => Ok(Variable::Timestamp),
            other => Err(format!("unknown template variable '{}'", other)),
        }
    }

    fn lookup(&self, ctx: &RequestContext) -> Option<String> {
        match self {
            Variable::Arg(key) => ctx.query_param(key).map(str::to_string),
            Variable::Header(key) => ctx.header(key).map(str::to_string),
            Variable::Var(key) => ctx.variable(key).map(str::to_string),
            Variable::Path => Some(ctx.path().to_string()),
            Variable::Method => Some(ctx.method().to_string()),
            Variable::RequestId => Some(ctx.request_id().to_string()),
            Variable::Timestamp => Some(ctx.timestamp().to_string()),
        }
    }
}

impl Expr {
    /// Compile a configuration string.
    ///
    /// Strings without `{{...}}` placeholders become literals. Unknown
    /// variables are rejected here, at load time; missing values are only
    /// discovered per request and resolve to `None`.
    pub fn parse(source: &str) -> Result<Self, String> {
        let pattern = template_pattern();
        if !pattern.is_match(source) {
            if source.contains("{{") {
                return Err(format!("unterminated template in '{}'", source));
            }
            return Ok(Expr::Literal(source.to_string()));
        }

        let variables = pattern
            .captures_iter(source)
            .map(|caps| Variable::parse(&caps[1]))
            .collect::<Result<Vec<_>, _>>()?;

        let template = source.to_string();
        Ok(Expr::Resolved(Arc::new(move |ctx: &RequestContext| {
            let values = variables
                .iter()
                .map(|var| var.lookup(ctx))
                .collect::<Option<Vec<_>>>()?;
            let mut values = values.into_iter();
            let resolved = template_pattern()
                .replace_all(&template, |_: &regex::Captures| values.next().unwrap_or_default());
            Some(resolved.into_owned())
        })))
    }

    /// Shorthand for a literal value.
    pub fn literal(value: impl Into<String>) -> Self {
        Expr::Literal(value.into())
    }

    /// Evaluate against the request; `None` when a referenced value is missing.
    pub fn resolve(&self, ctx: &RequestContext) -> Option<String> {
        match self {
            Expr::Literal(value) => Some(value.clone()),
            Expr::Resolved(resolver) => resolver(ctx),
        }
    }

    /// Evaluate and parse as a signed integer.
    pub fn resolve_int(&self, ctx: &RequestContext) -> Option<i64> {
        self.resolve(ctx)?.trim().parse().ok()
    }

    /// Evaluate as an integer, substituting `default` when unresolvable.
    pub fn resolve_int_or(&self, ctx: &RequestContext, default: i64) -> i64 {
        self.resolve_int(ctx).unwrap_or_else(|| {
            tracing::debug!(
                request_id = %ctx.request_id(),
                expr = ?self,
                default = default,
                "Parameter did not resolve to an integer, using default"
            );
            default
        })
    }
}
