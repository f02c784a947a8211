//! Declarative schemas.
//!
//! A [`Schema`] describes the expected shape of the merged configuration. It
//! serves two purposes:
//!
//! - **Guiding coercion**: environment variables and template values arrive
//!   as strings. The schema tells the coercer which type a given key path
//!   expects (see [`resolve_type`](crate::lookup::resolve_type)).
//! - **Validation**: the merged configuration is checked against the full
//!   schema as the last step of every load (see [`Schema::validate`]).
//!
//! Schemas are immutable and cheap to clone. They are built from the
//! constructors on [`Schema`] and composed with the combinators:
//!
//! ```ignore
//! let schema = Schema::object([
//!     ("port", Schema::integer().with_default(8080)),
//!     ("database", Schema::object([
//!         ("host", Schema::string()),
//!         ("replicas", Schema::array(Schema::url()).optional()),
//!     ])),
//! ])
//! .and(Schema::partial([("debug", Schema::boolean())]));
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::value::Value;

/// A fixed value accepted by a [`Schema::Literal`].
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Integer(i64),
    Bool(bool),
}

impl Literal {
    pub fn to_value(&self) -> Value {
        match self {
            Literal::String(s) => Value::String(s.clone()),
            Literal::Integer(i) => Value::Integer(*i),
            Literal::Bool(b) => Value::Bool(*b),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::String(s) => write!(f, "{s:?}"),
            Literal::Integer(i) => write!(f, "{i}"),
            Literal::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Literal::String(s.to_string())
    }
}

impl From<String> for Literal {
    fn from(s: String) -> Self {
        Literal::String(s)
    }
}

impl From<i64> for Literal {
    fn from(i: i64) -> Self {
        Literal::Integer(i)
    }
}

impl From<i32> for Literal {
    fn from(i: i32) -> Self {
        Literal::Integer(i.into())
    }
}

impl From<bool> for Literal {
    fn from(b: bool) -> Self {
        Literal::Bool(b)
    }
}

/// Foreign object types a schema can declare itself as validating.
///
/// These values cannot be written literally in a config file; they only
/// come out of coercion (an env var or template value parsed into the
/// object) or out of typed defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Brand {
    /// A compiled regular expression.
    Regex,
    /// A parsed URL.
    Url,
}

impl fmt::Display for Brand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Brand::Regex => write!(f, "regex"),
            Brand::Url => write!(f, "url"),
        }
    }
}

type Predicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;
type Mapper = Arc<dyn Fn(Value) -> Result<Value, String> + Send + Sync>;

/// Post-processing attached to a base schema.
#[derive(Clone)]
pub enum Effect {
    /// Accept the value only if the predicate holds.
    Refine { check: Predicate, message: String },
    /// Replace the validated value with the mapper's output.
    Transform(Mapper),
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::Refine { message, .. } => {
                f.debug_struct("Refine").field("message", message).finish()
            }
            Effect::Transform(_) => f.write_str("Transform"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Schema {
    Any,
    String,
    /// Integer or float.
    Number,
    Integer,
    Boolean,
    Date,
    Literal(Literal),
    Enum(Vec<String>),
    Array(Box<Schema>),
    /// Named fields. With `partial`, every field may be absent.
    Object {
        fields: BTreeMap<String, Schema>,
        partial: bool,
    },
    Union(Vec<Schema>),
    Intersection(Box<Schema>, Box<Schema>),
    Optional(Box<Schema>),
    Nullable(Box<Schema>),
    Default(Box<Schema>, Value),
    Effect(Box<Schema>, Effect),
    InstanceOf(Brand),
}

impl Schema {
    pub fn any() -> Self {
        Schema::Any
    }

    pub fn string() -> Self {
        Schema::String
    }

    pub fn number() -> Self {
        Schema::Number
    }

    pub fn integer() -> Self {
        Schema::Integer
    }

    pub fn boolean() -> Self {
        Schema::Boolean
    }

    pub fn date() -> Self {
        Schema::Date
    }

    /// A compiled regular expression object (not a pattern string).
    pub fn regex() -> Self {
        Schema::InstanceOf(Brand::Regex)
    }

    /// A parsed URL object (not a URL string).
    pub fn url() -> Self {
        Schema::InstanceOf(Brand::Url)
    }

    pub fn literal(value: impl Into<Literal>) -> Self {
        Schema::Literal(value.into())
    }

    pub fn enumeration<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Schema::Enum(values.into_iter().map(Into::into).collect())
    }

    pub fn array(element: Schema) -> Self {
        Schema::Array(Box::new(element))
    }

    pub fn object<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Schema)>,
        K: Into<String>,
    {
        Schema::Object {
            fields: fields.into_iter().map(|(k, s)| (k.into(), s)).collect(),
            partial: false,
        }
    }

    /// Like [`object`](Self::object), but every field may be absent.
    pub fn partial<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Schema)>,
        K: Into<String>,
    {
        Schema::Object {
            fields: fields.into_iter().map(|(k, s)| (k.into(), s)).collect(),
            partial: true,
        }
    }

    pub fn union(alternatives: impl IntoIterator<Item = Schema>) -> Self {
        Schema::Union(alternatives.into_iter().collect())
    }

    /// An object with one required field per key, all sharing `value`.
    ///
    /// ```ignore
    /// // sites: { US: { url: .. }, CA: { url: .. } }
    /// Schema::enum_record(["US", "CA"], Schema::object([("url", Schema::string())]))
    /// ```
    pub fn enum_record<I, K>(keys: I, value: Schema) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Schema::object(keys.into_iter().map(|k| (k, value.clone())))
    }

    pub fn optional(self) -> Self {
        Schema::Optional(Box::new(self))
    }

    pub fn nullable(self) -> Self {
        Schema::Nullable(Box::new(self))
    }

    /// Use `value` when the field is absent from every layer.
    pub fn with_default(self, value: impl Into<Value>) -> Self {
        Schema::Default(Box::new(self), value.into())
    }

    /// Both schemas must accept the value.
    pub fn and(self, other: Schema) -> Self {
        Schema::Intersection(Box::new(self), Box::new(other))
    }

    /// Extend a union, or start one.
    pub fn or(self, other: Schema) -> Self {
        match self {
            Schema::Union(mut alts) => {
                alts.push(other);
                Schema::Union(alts)
            }
            first => Schema::Union(vec![first, other]),
        }
    }

    pub fn refine<F>(self, check: F, message: impl Into<String>) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Schema::Effect(
            Box::new(self),
            Effect::Refine {
                check: Arc::new(check),
                message: message.into(),
            },
        )
    }

    pub fn transform<F>(self, map: F) -> Self
    where
        F: Fn(Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        Schema::Effect(Box::new(self), Effect::Transform(Arc::new(map)))
    }

    /// Strip optional, nullable and default wrappers.
    pub fn unwrapped(&self) -> &Schema {
        let mut current = self;
        while let Schema::Optional(inner) | Schema::Nullable(inner) | Schema::Default(inner, _) =
            current
        {
            current = inner.as_ref();
        }
        current
    }

    /// Short description used in logs and error messages.
    pub fn kind_name(&self) -> String {
        match self {
            Schema::Any => "any".into(),
            Schema::String => "string".into(),
            Schema::Number => "number".into(),
            Schema::Integer => "integer".into(),
            Schema::Boolean => "boolean".into(),
            Schema::Date => "date".into(),
            Schema::Literal(l) => format!("literal {l}"),
            Schema::Enum(values) => format!("one of [{}]", values.join(", ")),
            Schema::Array(_) => "array".into(),
            Schema::Object { .. } => "object".into(),
            Schema::Union(_) => "union".into(),
            Schema::Intersection(..) => "intersection".into(),
            Schema::Optional(inner) => format!("optional {}", inner.kind_name()),
            Schema::Nullable(inner) => format!("nullable {}", inner.kind_name()),
            Schema::Default(inner, _) => inner.kind_name(),
            Schema::Effect(base, _) => base.kind_name(),
            Schema::InstanceOf(brand) => format!("{brand} object"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwrapped_strips_nested_wrappers() {
        let s = Schema::integer().with_default(5).nullable().optional();
        assert!(matches!(s.unwrapped(), Schema::Integer));
    }

    #[test]
    fn unwrapped_keeps_effects() {
        let s = Schema::string().refine(|_| true, "always").optional();
        assert!(matches!(s.unwrapped(), Schema::Effect(..)));
    }

    #[test]
    fn or_flattens_into_one_union() {
        let s = Schema::number().or(Schema::string()).or(Schema::boolean());
        match s {
            Schema::Union(alts) => assert_eq!(alts.len(), 3),
            other => panic!("Expected Union, got: {other:?}"),
        }
    }

    #[test]
    fn enum_record_requires_every_key() {
        let s = Schema::enum_record(["US", "CA"], Schema::string());
        match s {
            Schema::Object { fields, partial } => {
                assert!(!partial);
                assert_eq!(fields.keys().collect::<Vec<_>>(), vec!["CA", "US"]);
            }
            other => panic!("Expected Object, got: {other:?}"),
        }
    }

    #[test]
    fn kind_name_describes_wrappers() {
        assert_eq!(Schema::regex().optional().kind_name(), "optional regex object");
        assert_eq!(Schema::enumeration(["a", "b"]).kind_name(), "one of [a, b]");
    }
}
