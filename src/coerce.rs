//! Schema-directed coercion of raw strings.
//!
//! Environment variables and template values are always strings. Before
//! they can be merged with file layers they are converted to the type the
//! schema expects at their key path:
//!
//! | Schema | Raw `"…"` becomes |
//! |--------|-------------------|
//! | none / `Any` / object | the string, unchanged |
//! | `String` | the string |
//! | `Number` | integer, else float (hard error if neither) |
//! | `Integer` | integer (hard error otherwise) |
//! | `Boolean` | `true` / `false`, any case (hard error otherwise) |
//! | `Date` | RFC 3339, `YYYY-MM-DD[T ]HH:MM:SS[.f]` (UTC), `YYYY-MM-DD`, `YYYY/MM/DD`, `YYYY-MM`, `Dec 11 2021` |
//! | `Literal` | the literal, on exact match |
//! | `Enum` | the string, if it is a member |
//! | `Union` | the first alternative that coerces and validates |
//! | `Array` | comma-split, trimmed, each element coerced |
//! | `regex()` / `url()` | a compiled regex / parsed URL |
//!
//! A miss is [`Coerced::Uncoercible`]: the caller drops the entry. Hard
//! errors are reserved for the strict numeric and boolean parses.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use regex::Regex;
use tracing::debug;
use url::Url;

use crate::error::LayerconfError;
use crate::schema::{Brand, Literal, Schema};
use crate::types::ArrayCoercion;
use crate::value::Value;

/// Outcome of coercing one raw string.
#[derive(Debug, Clone, PartialEq)]
pub enum Coerced {
    Value(Value),
    /// The string cannot be expressed as the expected type; skip it.
    Uncoercible,
}

impl Coerced {
    pub fn into_option(self) -> Option<Value> {
        match self {
            Coerced::Value(v) => Some(v),
            Coerced::Uncoercible => None,
        }
    }
}

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

const NAIVE_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%b %d %Y", "%B %d %Y"];

/// Coerce `raw` into the type described by `schema`.
///
/// `name` identifies the source (env var or config key) in log lines and
/// error messages.
pub fn coerce(
    name: &str,
    raw: &str,
    schema: Option<&Schema>,
    arrays: ArrayCoercion,
) -> Result<Coerced, LayerconfError> {
    let Some(schema) = schema else {
        debug!(key = name, "no type information, keeping string value");
        return Ok(Coerced::Value(Value::String(raw.to_string())));
    };

    let mut target = schema.unwrapped();
    if let Schema::Effect(base, _) = target {
        target = base.as_ref();
    }

    let coerced = match target {
        Schema::InstanceOf(brand) => coerce_brand(name, raw, *brand),
        Schema::Literal(literal) => coerce_literal(name, raw, literal),
        Schema::Union(alternatives) => coerce_union(name, raw, alternatives, arrays),
        Schema::Enum(values) => {
            if values.iter().any(|v| v == raw) {
                Coerced::Value(Value::String(raw.to_string()))
            } else {
                debug!(key = name, value = raw, allowed = ?values, "value not in enum");
                Coerced::Uncoercible
            }
        }
        Schema::Array(element) => return coerce_array(name, raw, element, arrays),
        Schema::String => Coerced::Value(Value::String(raw.to_string())),
        Schema::Number => match parse_number(raw) {
            Some(v) => Coerced::Value(v),
            None => return Err(coercion_error(name, raw, "number")),
        },
        Schema::Integer => match raw.trim().parse::<i64>() {
            Ok(i) => Coerced::Value(Value::Integer(i)),
            Err(_) => return Err(coercion_error(name, raw, "integer")),
        },
        Schema::Boolean => match parse_bool(raw) {
            Some(b) => Coerced::Value(Value::Bool(b)),
            None => return Err(coercion_error(name, raw, "boolean")),
        },
        Schema::Date => match parse_datetime(raw) {
            Some(d) => Coerced::Value(Value::DateTime(d)),
            None => {
                debug!(key = name, value = raw, "unable to coerce value to date");
                Coerced::Uncoercible
            }
        },
        other => {
            debug!(
                key = name,
                kind = %other.kind_name(),
                "no coercion for schema kind, keeping string value"
            );
            Coerced::Value(Value::String(raw.to_string()))
        }
    };
    Ok(coerced)
}

fn coerce_brand(name: &str, raw: &str, brand: Brand) -> Coerced {
    match brand {
        Brand::Regex => match Regex::new(raw) {
            Ok(re) => Coerced::Value(Value::Regex(re)),
            Err(e) => {
                debug!(key = name, value = raw, error = %e, "unable to coerce value to regex");
                Coerced::Uncoercible
            }
        },
        Brand::Url => match Url::parse(raw) {
            Ok(url) => Coerced::Value(Value::Url(url)),
            Err(e) => {
                debug!(key = name, value = raw, error = %e, "unable to coerce value to url");
                Coerced::Uncoercible
            }
        },
    }
}

fn coerce_literal(name: &str, raw: &str, literal: &Literal) -> Coerced {
    let matches = match literal {
        Literal::String(s) => raw == s,
        Literal::Integer(i) => raw.trim().parse::<i64>().ok() == Some(*i),
        Literal::Bool(b) => parse_bool(raw) == Some(*b),
    };
    if matches {
        Coerced::Value(literal.to_value())
    } else {
        debug!(key = name, value = raw, literal = %literal, "value does not match literal");
        Coerced::Uncoercible
    }
}

/// Alternatives are tried strictly in declaration order. The first one
/// whose coerced value also passes that alternative's validation wins.
fn coerce_union(
    name: &str,
    raw: &str,
    alternatives: &[Schema],
    arrays: ArrayCoercion,
) -> Coerced {
    for alternative in alternatives {
        match coerce(name, raw, Some(alternative), arrays) {
            Ok(Coerced::Value(v)) => match alternative.validate(&v) {
                Ok(_) => return Coerced::Value(v),
                Err(e) => debug!(key = name, error = %e, "union alternative rejected value"),
            },
            Ok(Coerced::Uncoercible) => {}
            Err(e) => debug!(key = name, error = %e, "union alternative failed"),
        }
    }
    debug!(key = name, value = raw, "unable to coerce value to any union variant");
    Coerced::Uncoercible
}

fn coerce_array(
    name: &str,
    raw: &str,
    element: &Schema,
    arrays: ArrayCoercion,
) -> Result<Coerced, LayerconfError> {
    let mut items = Vec::new();
    for token in raw.split(',').map(str::trim) {
        let outcome = match coerce(name, token, Some(element), arrays) {
            Err(e) if arrays == ArrayCoercion::Lenient => {
                debug!(key = name, error = %e, "dropping array element");
                Coerced::Uncoercible
            }
            other => other?,
        };
        match outcome {
            Coerced::Value(v) => items.push(v),
            Coerced::Uncoercible if arrays == ArrayCoercion::Strict => {
                debug!(key = name, element = token, "array element not coercible");
                return Ok(Coerced::Uncoercible);
            }
            Coerced::Uncoercible => {
                debug!(key = name, element = token, "dropping array element");
            }
        }
    }
    Ok(Coerced::Value(Value::Array(items)))
}

fn coercion_error(name: &str, raw: &str, expected: &str) -> LayerconfError {
    LayerconfError::Coercion {
        key: name.to_string(),
        value: raw.to_string(),
        expected: expected.to_string(),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("true") {
        Some(true)
    } else if raw.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Integer first, then finite float. `"inf"` and `"NaN"` are rejected.
fn parse_number(raw: &str) -> Option<Value> {
    let raw = raw.trim();
    if let Ok(i) = raw.parse::<i64>() {
        return Some(Value::Integer(i));
    }
    match raw.parse::<f64>() {
        Ok(f) if f.is_finite() => Some(Value::Float(f)),
        _ => None,
    }
}

/// Parse a date-time. Values without an offset are taken as UTC; a bare
/// date is midnight UTC.
pub(crate) fn parse_datetime(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if let Ok(d) = DateTime::parse_from_rfc3339(raw) {
        return Some(d);
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc().fixed_offset());
        }
    }
    NAIVE_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
        // year and month alone mean the first of the month
        .or_else(|| NaiveDate::parse_from_str(&format!("{raw}-01"), "%Y-%m-%d").ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().fixed_offset())
}
