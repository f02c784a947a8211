//! Environment variables as a configuration layer.
//!
//! With prefix `CONFIG_` and separator `__`, variables map onto key paths:
//!
//! | Env var | Key path |
//! |---------|----------|
//! | `CONFIG_port` | `port` |
//! | `CONFIG_database__host` | `database.host` |
//!
//! Segments are case-sensitive. When a schema is present, each variable is
//! looked up against it and coerced to the expected type; variables whose
//! path is unknown to the schema, or whose value cannot be coerced, are
//! dropped with a debug log instead of failing the load. Without a schema
//! values stay strings.

use std::collections::BTreeMap;

use tracing::debug;

use crate::coerce::{Coerced, coerce};
use crate::error::LayerconfError;
use crate::lookup::resolve_type;
use crate::merge::merge_tables;
use crate::schema::Schema;
use crate::types::{ArrayCoercion, MergeOpts};
use crate::value::{Table, Value};

pub const DEFAULT_PREFIX: &str = "CONFIG_";
pub const DEFAULT_SEPARATOR: &str = "__";

/// A snapshot of environment variables.
///
/// The loader reads variables only through this type, so tests (and callers
/// that want a fixed environment) can pass synthetic data instead of the
/// process environment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Environment {
    vars: BTreeMap<String, String>,
}

impl Environment {
    /// Snapshot the current process environment. Variables whose name or
    /// value is not valid unicode are left out.
    pub fn from_process() -> Self {
        std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Like [`get`](Self::get), but empty values count as unset.
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.is_empty())
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Environment {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Naming convention for configuration variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvOptions {
    pub prefix: String,
    pub separator: String,
}

impl Default for EnvOptions {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            separator: DEFAULT_SEPARATOR.to_string(),
        }
    }
}

/// Build a table from every variable in `env` that starts with the prefix.
///
/// Each surviving variable becomes a singleton nested table which is merged
/// into the result with `merge`, in iteration order.
pub fn harvest(
    env: &Environment,
    opts: &EnvOptions,
    schema: Option<&Schema>,
    merge: MergeOpts,
    arrays: ArrayCoercion,
) -> Result<Table, LayerconfError> {
    debug!(prefix = %opts.prefix, "inspecting environment variables");
    let mut accum = Table::new();

    for (key, raw) in env.iter() {
        let Some(rest) = key.strip_prefix(opts.prefix.as_str()) else {
            continue;
        };
        if raw.is_empty() {
            debug!(var = key, "environment variable has no value");
            continue;
        }
        if rest.is_empty() {
            continue;
        }

        debug!(var = key, "processing environment variable");
        let segments = split_path(rest, &opts.separator);

        let value = match schema {
            Some(schema) => {
                let Some(target) = resolve_type(&segments, Some(schema)) else {
                    debug!(var = key, path = %segments.join("."), "no schema entry, skipping");
                    continue;
                };
                match coerce(key, raw, Some(target), arrays)? {
                    Coerced::Value(v) => v,
                    Coerced::Uncoercible => {
                        debug!(var = key, "value not coercible, skipping");
                        continue;
                    }
                }
            }
            None => Value::String(raw.to_string()),
        };

        accum = merge_tables(accum, nested(&segments, value), merge);
    }

    Ok(accum)
}

fn split_path<'a>(rest: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        vec![rest]
    } else {
        rest.split(separator).collect()
    }
}

/// `["a", "b"]`, `v` → `{a = {b = v}}`
fn nested(segments: &[&str], value: Value) -> Table {
    let mut table = Table::new();
    let Some((leaf, parents)) = segments.split_last() else {
        return table;
    };
    table.insert(leaf.to_string(), value);
    for segment in parents.iter().rev() {
        let mut outer = Table::new();
        outer.insert(segment.to_string(), Value::Table(table));
        table = outer;
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::{intersection_schema, service_schema};
    use serial_test::serial;

    fn env(pairs: &[(&str, &str)]) -> Environment {
        pairs.iter().copied().collect()
    }

    fn harvest_with(vars: &[(&str, &str)], schema: Option<&Schema>) -> Table {
        harvest(
            &env(vars),
            &EnvOptions::default(),
            schema,
            MergeOpts::default(),
            ArrayCoercion::Lenient,
        )
        .unwrap()
    }

    #[test]
    fn schemaless_values_stay_strings() {
        let table = harvest_with(&[("CONFIG_port", "1000")], None);
        assert_eq!(table["port"].as_str(), Some("1000"));
    }

    #[test]
    fn nested_key_with_schema() {
        let schema = service_schema();
        let table = harvest_with(&[("CONFIG_database__host", "foo")], Some(&schema));
        assert_eq!(table["database"]["host"].as_str(), Some("foo"));
    }

    #[test]
    fn values_coerced_to_schema_type() {
        let schema = service_schema();
        let table = harvest_with(
            &[
                ("CONFIG_port", "1000"),
                ("CONFIG_database__debug", "TRUE"),
                ("CONFIG_database__options__max_pool_size", "25"),
            ],
            Some(&schema),
        );
        assert_eq!(table["port"].as_integer(), Some(1000));
        assert_eq!(table["database"]["debug"].as_bool(), Some(true));
        assert_eq!(
            table["database"]["options"]["max_pool_size"].as_integer(),
            Some(25)
        );
    }

    #[test]
    fn unknown_path_dropped_without_error() {
        let schema = service_schema();
        let table = harvest_with(&[("CONFIG_unknownField", "x")], Some(&schema));
        assert!(table.is_empty());
    }

    #[test]
    fn uncoercible_value_dropped() {
        let schema = Schema::object([
            ("foo", Schema::union([Schema::literal("foo"), Schema::literal("baz")])),
            ("bar", Schema::literal("bar")),
        ]);
        let table = harvest_with(
            &[("CONFIG_foo", "foo"), ("CONFIG_bar", "env-bar")],
            Some(&schema),
        );
        assert_eq!(table["foo"].as_str(), Some("foo"));
        assert!(!table.contains_key("bar"));
    }

    #[test]
    fn hard_coercion_failure_propagates() {
        let schema = service_schema();
        let result = harvest(
            &env(&[("CONFIG_port", "eighty")]),
            &EnvOptions::default(),
            Some(&schema),
            MergeOpts::default(),
            ArrayCoercion::Lenient,
        );
        assert!(matches!(result, Err(LayerconfError::Coercion { .. })));
    }

    #[test]
    fn empty_values_skipped() {
        let table = harvest_with(&[("CONFIG_port", "")], None);
        assert!(table.is_empty());
    }

    #[test]
    fn other_prefixes_ignored() {
        let table = harvest_with(&[("OTHER_port", "1"), ("CONFIG", "x"), ("CONFIG_", "y")], None);
        assert!(table.is_empty());
    }

    #[test]
    fn intersection_schema_fields() {
        let schema = intersection_schema();
        let table = harvest_with(&[("CONFIG_foo", "foo"), ("CONFIG_bar", "bar")], Some(&schema));
        assert_eq!(table["foo"].as_str(), Some("foo"));
        assert_eq!(table["bar"].as_str(), Some("bar"));
    }

    #[test]
    fn enum_record_keys() {
        let schema = Schema::enum_record(
            ["US", "CA"],
            Schema::object([("foo", Schema::string())]),
        );
        let table = harvest_with(
            &[("CONFIG_US__foo", "us"), ("CONFIG_CA__foo", "ca")],
            Some(&schema),
        );
        assert_eq!(table["US"]["foo"].as_str(), Some("us"));
        assert_eq!(table["CA"]["foo"].as_str(), Some("ca"));
    }

    #[test]
    fn custom_prefix_and_separator() {
        let opts = EnvOptions {
            prefix: "APP.".into(),
            separator: ".".into(),
        };
        let table = harvest(
            &env(&[("APP.database.host", "db")]),
            &opts,
            None,
            MergeOpts::default(),
            ArrayCoercion::Lenient,
        )
        .unwrap();
        assert_eq!(table["database"]["host"].as_str(), Some("db"));
    }

    #[test]
    fn sibling_variables_merge_into_one_table() {
        let table = harvest_with(
            &[("CONFIG_db__host", "h"), ("CONFIG_db__name", "n")],
            None,
        );
        let db = table["db"].as_table().unwrap();
        assert_eq!(db.len(), 2);
    }

    #[test]
    fn array_values_split() {
        let schema = Schema::object([("tags", Schema::array(Schema::string()))]);
        let table = harvest_with(&[("CONFIG_tags", "a, b ,c")], Some(&schema));
        assert_eq!(
            table["tags"],
            Value::Array(vec!["a".into(), "b".into(), "c".into()])
        );
    }

    #[test]
    #[serial]
    fn from_process_reads_real_environment() {
        temp_env::with_vars([("CONFIG_from_process_test", Some("yes"))], || {
            let env = Environment::from_process();
            assert_eq!(env.get("CONFIG_from_process_test"), Some("yes"));
        });
    }
}
