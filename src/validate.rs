//! Validation of the merged configuration.
//!
//! [`Schema::validate`] is the terminal step of every load. It checks types,
//! fills in [`with_default`](Schema::with_default) values for absent fields,
//! and runs refinements and transforms. Object keys the schema does not
//! declare are accepted and left out of the result. Every mismatch is
//! collected, so one error reports all problems at once, each with its
//! dotted path.
//!
//! Strict mode ([`unknown_keys`]) runs before validation and rejects keys
//! in the merged configuration that the schema does not declare.

use std::fmt;

use crate::coerce::parse_datetime;
use crate::lookup::resolve_type;
use crate::schema::{Brand, Effect, Schema};
use crate::value::{Table, Value};

/// A single validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    /// Dotted path of the offending value; empty for the root.
    pub path: String,
    pub message: String,
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub issues: Vec<Issue>,
}

impl ValidationError {
    /// The issue reported for `path`, if any.
    pub fn issue_at(&self, path: &str) -> Option<&Issue> {
        self.issues.iter().find(|i| i.path == path)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, issue) in self.issues.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

impl Schema {
    /// Check `value` and return the validated output.
    pub fn validate(&self, value: &Value) -> Result<Value, ValidationError> {
        let mut cx = Context::default();
        let output = cx.check(self, value);
        match output {
            Some(v) if cx.issues.is_empty() => Ok(v),
            _ => Err(ValidationError { issues: cx.issues }),
        }
    }
}

#[derive(Default)]
struct Context {
    path: Vec<String>,
    issues: Vec<Issue>,
}

impl Context {
    fn report(&mut self, message: impl Into<String>) {
        self.issues.push(Issue {
            path: self.path.join("."),
            message: message.into(),
        });
    }

    fn mismatch(&mut self, expected: &str, value: &Value) -> Option<Value> {
        self.report(format!("expected {expected}, received {}", value.type_name()));
        None
    }

    fn nested<T>(&mut self, segment: impl Into<String>, f: impl FnOnce(&mut Self) -> T) -> T {
        self.path.push(segment.into());
        let out = f(self);
        self.path.pop();
        out
    }

    /// Run `f` on a scratch context; keep its issues only on failure.
    fn attempt(&self, f: impl FnOnce(&mut Self) -> Option<Value>) -> Result<Value, Vec<Issue>> {
        let mut scratch = Context {
            path: self.path.clone(),
            issues: Vec::new(),
        };
        match f(&mut scratch) {
            Some(v) if scratch.issues.is_empty() => Ok(v),
            _ => Err(scratch.issues),
        }
    }

    fn check(&mut self, schema: &Schema, value: &Value) -> Option<Value> {
        match schema {
            Schema::Any => Some(value.clone()),
            Schema::String => match value {
                Value::String(_) => Some(value.clone()),
                other => self.mismatch("string", other),
            },
            Schema::Number => match value {
                Value::Integer(_) | Value::Float(_) => Some(value.clone()),
                other => self.mismatch("number", other),
            },
            Schema::Integer => match value {
                Value::Integer(_) => Some(value.clone()),
                Value::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                    Some(Value::Integer(*f as i64))
                }
                other => self.mismatch("integer", other),
            },
            Schema::Boolean => match value {
                Value::Bool(_) => Some(value.clone()),
                other => self.mismatch("boolean", other),
            },
            // YAML and JSON have no date type; date-shaped strings are accepted.
            Schema::Date => match value {
                Value::DateTime(_) => Some(value.clone()),
                Value::String(s) => match parse_datetime(s) {
                    Some(d) => Some(Value::DateTime(d)),
                    None => {
                        self.report(format!("invalid date {s:?}"));
                        None
                    }
                },
                other => self.mismatch("date", other),
            },
            Schema::Literal(literal) => {
                let expected = literal.to_value();
                if *value == expected {
                    Some(expected)
                } else {
                    self.report(format!("expected literal {literal}, received {value}"));
                    None
                }
            }
            Schema::Enum(allowed) => match value {
                Value::String(s) if allowed.contains(s) => Some(value.clone()),
                other => {
                    self.report(format!(
                        "expected one of [{}], received {other}",
                        allowed.join(", ")
                    ));
                    None
                }
            },
            Schema::Array(element) => match value {
                Value::Array(items) => {
                    let mut out = Vec::with_capacity(items.len());
                    for (i, item) in items.iter().enumerate() {
                        if let Some(v) = self.nested(i.to_string(), |cx| cx.check(element, item)) {
                            out.push(v);
                        }
                    }
                    Some(Value::Array(out))
                }
                other => self.mismatch("array", other),
            },
            Schema::Object { fields, partial } => match value {
                Value::Table(table) => Some(Value::Table(self.check_fields(fields, *partial, table))),
                other => self.mismatch("object", other),
            },
            Schema::Union(alternatives) => {
                let mut rejected = Vec::new();
                for alternative in alternatives {
                    match self.attempt(|cx| cx.check(alternative, value)) {
                        Ok(v) => return Some(v),
                        Err(issues) => rejected.extend(issues),
                    }
                }
                let detail: Vec<String> = rejected.iter().map(|i| i.message.clone()).collect();
                self.report(format!("no union alternative matched ({})", detail.join(" | ")));
                None
            }
            Schema::Intersection(left, right) => {
                let l = self.check(left, value);
                let r = self.check(right, value);
                match (l, r) {
                    (Some(l), Some(r)) => match merge_outputs(l, r) {
                        Some(v) => Some(v),
                        None => {
                            self.report("intersection results could not be merged");
                            None
                        }
                    },
                    _ => None,
                }
            }
            Schema::Optional(inner) => self.check(inner, value),
            Schema::Nullable(inner) => match value {
                Value::Null => Some(Value::Null),
                other => self.check(inner, other),
            },
            Schema::Default(inner, _) => self.check(inner, value),
            Schema::Effect(base, effect) => {
                let out = self.check(base, value)?;
                self.apply(effect, out)
            }
            Schema::InstanceOf(brand) => match (brand, value) {
                (Brand::Regex, Value::Regex(_)) | (Brand::Url, Value::Url(_)) => Some(value.clone()),
                (brand, other) => self.mismatch(&format!("{brand} object"), other),
            },
        }
    }

    fn check_fields(
        &mut self,
        fields: &std::collections::BTreeMap<String, Schema>,
        partial: bool,
        table: &Table,
    ) -> Table {
        let mut out = Table::new();
        for (name, field) in fields {
            let checked = self.nested(name.as_str(), |cx| match table.get(name) {
                Some(v) => cx.check(field, v),
                None if partial => None,
                None => cx.check_missing(field),
            });
            if let Some(v) = checked {
                out.insert(name.clone(), v);
            }
        }
        out
    }

    /// An absent field: `None` means it stays absent (or an issue was
    /// reported).
    fn check_missing(&mut self, schema: &Schema) -> Option<Value> {
        match schema {
            Schema::Any | Schema::Optional(_) => None,
            Schema::Default(inner, default) => self.check(inner, default),
            Schema::Effect(base, effect) => {
                let out = self.check_missing(base)?;
                self.apply(effect, out)
            }
            Schema::Intersection(left, right) => {
                let l = self.check_missing(left);
                let r = self.check_missing(right);
                match (l, r) {
                    (Some(l), Some(r)) => merge_outputs(l, r),
                    (l, r) => l.or(r),
                }
            }
            _ => {
                self.report("required");
                None
            }
        }
    }

    fn apply(&mut self, effect: &Effect, value: Value) -> Option<Value> {
        match effect {
            Effect::Refine { check, message } => {
                if check(&value) {
                    Some(value)
                } else {
                    self.report(message.clone());
                    None
                }
            }
            Effect::Transform(map) => match map(value) {
                Ok(v) => Some(v),
                Err(message) => {
                    self.report(message);
                    None
                }
            },
        }
    }
}

/// Combine the outputs of both sides of an intersection.
fn merge_outputs(left: Value, right: Value) -> Option<Value> {
    match (left, right) {
        (Value::Table(mut l), Value::Table(r)) => {
            for (key, rv) in r {
                let merged = match l.remove(&key) {
                    Some(lv) => merge_outputs(lv, rv)?,
                    None => rv,
                };
                l.insert(key, merged);
            }
            Some(Value::Table(l))
        }
        (l, r) if l == r => Some(l),
        _ => None,
    }
}

/// Dotted paths of keys in `table` that `schema` does not declare.
///
/// Descends only where the schema expects an object; values under `any`,
/// arrays and scalars are not inspected.
pub fn unknown_keys(table: &Table, schema: &Schema) -> Vec<String> {
    let mut found = Vec::new();
    let mut path = Vec::new();
    let shape = object_shape(schema).unwrap_or(schema);
    collect_unknown(table, shape, &mut path, &mut found);
    found
}

/// Keys are resolved one segment at a time against the schema of the
/// enclosing table, so refined or transformed objects are walked through
/// their base.
fn collect_unknown<'a>(
    table: &'a Table,
    schema: &Schema,
    path: &mut Vec<&'a str>,
    found: &mut Vec<String>,
) {
    for (key, value) in table {
        path.push(key.as_str());
        match resolve_type(&[key.as_str()], Some(schema)) {
            None => found.push(path.join(".")),
            Some(child) => {
                if let Value::Table(inner) = value
                    && let Some(shape) = object_shape(child)
                {
                    collect_unknown(inner, shape, path, found);
                }
            }
        }
        path.pop();
    }
}

fn object_shape(schema: &Schema) -> Option<&Schema> {
    match schema.unwrapped() {
        shape @ (Schema::Object { .. } | Schema::Intersection(..)) => Some(shape),
        Schema::Effect(base, _) => object_shape(base),
        _ => None,
    }
}
