//! `${VAR}` / `${VAR:default}` templates inside file layers.
//!
//! Every string leaf of a loaded file is checked against the template
//! pattern. A match is replaced by the value of `VAR` from the environment,
//! or by the inline default when `VAR` is unset or empty, and then coerced
//! to the type the schema expects at that key path. A template with neither
//! a value nor a default removes its key.
//!
//! ```yaml
//! database:
//!   host: ${DB_HOST:localhost}
//!   port: ${DB_PORT:"5432"}
//!   password: ${DB_PASSWORD}   # removed when DB_PASSWORD is unset
//! ```
//!
//! The pattern must close the (trimmed) string; text before `${` is
//! discarded. Defaults are trimmed and a matching pair of single or double
//! quotes is stripped.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::coerce::{Coerced, coerce};
use crate::env::Environment;
use crate::error::LayerconfError;
use crate::lookup::resolve_type;
use crate::schema::Schema;
use crate::types::ArrayCoercion;
use crate::value::{Table, Value};

static TEMPLATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([^:}]+):?(.*)\}$").expect("template pattern is a valid regex")
});

/// A parsed `${NAME:default}` template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template<'a> {
    pub name: &'a str,
    pub default: Option<&'a str>,
}

impl<'a> Template<'a> {
    /// Parse `raw` as a template. Returns `None` for ordinary strings.
    pub fn parse(raw: &'a str) -> Option<Self> {
        let caps = TEMPLATE.captures(raw.trim())?;
        let name = caps.get(1)?.as_str();
        let default = caps
            .get(2)
            .map(|m| m.as_str())
            .filter(|d| !d.is_empty());
        Some(Template { name, default })
    }

    /// The environment value if set and non-empty, else the unquoted
    /// default. `None` when neither yields a non-empty string.
    pub fn resolve(&self, env: &Environment) -> Option<String> {
        if let Some(value) = env.get_non_empty(self.name) {
            return Some(value.to_string());
        }
        self.default
            .map(|d| unquote(d.trim()))
            .filter(|d| !d.is_empty())
            .map(str::to_string)
    }
}

fn unquote(s: &str) -> &str {
    for quote in ['"', '\''] {
        if s.len() >= 2 && s.starts_with(quote) && s.ends_with(quote) {
            return &s[1..s.len() - 1];
        }
    }
    s
}

/// Resolve every template in `table`.
///
/// `schema` is the schema of the whole configuration; each template's key
/// path is looked up in it to pick the coercion target.
pub fn interpolate(
    table: Table,
    schema: Option<&Schema>,
    env: &Environment,
    arrays: ArrayCoercion,
) -> Result<Table, LayerconfError> {
    let mut path = Vec::new();
    interpolate_table(table, schema, &mut path, env, arrays)
}

fn interpolate_table(
    table: Table,
    schema: Option<&Schema>,
    path: &mut Vec<String>,
    env: &Environment,
    arrays: ArrayCoercion,
) -> Result<Table, LayerconfError> {
    let mut out = Table::new();
    for (key, value) in table {
        path.push(key.clone());
        let resolved = interpolate_value(&key, value, schema, path, env, arrays);
        path.pop();
        if let Some(value) = resolved? {
            out.insert(key, value);
        }
    }
    Ok(out)
}

/// `Ok(None)` removes the entry.
fn interpolate_value(
    key: &str,
    value: Value,
    schema: Option<&Schema>,
    path: &mut Vec<String>,
    env: &Environment,
    arrays: ArrayCoercion,
) -> Result<Option<Value>, LayerconfError> {
    match value {
        Value::String(s) => {
            let Some(template) = Template::parse(&s) else {
                return Ok(Some(Value::String(s)));
            };
            let Some(resolved) = template.resolve(env) else {
                debug!(key = %path.join("."), var = template.name, "no value for template, removing key");
                return Ok(None);
            };
            let target = resolve_type(path.as_slice(), schema);
            match coerce(key, &resolved, target, arrays)? {
                Coerced::Value(v) => Ok(Some(v)),
                Coerced::Uncoercible => {
                    debug!(key = %path.join("."), "template value not coercible, keeping string");
                    Ok(Some(Value::String(resolved)))
                }
            }
        }
        Value::Table(inner) => Ok(Some(Value::Table(interpolate_table(
            inner, schema, path, env, arrays,
        )?))),
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.into_iter().enumerate() {
                let segment = i.to_string();
                path.push(segment.clone());
                let resolved = interpolate_value(&segment, item, schema, path, env, arrays);
                path.pop();
                if let Some(v) = resolved? {
                    out.push(v);
                }
            }
            Ok(Some(Value::Array(out)))
        }
        other => Ok(Some(other)),
    }
}
