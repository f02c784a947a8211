//! Core resolution pipeline: merge all config layers and produce the final value.
//!
//! Operates on pre-loaded data (`ResolveInput`) with no I/O, making the full
//! pipeline testable with synthetic inputs. Steps:
//!
//! 1. Interpolate `${VAR}` templates in the defaults and in each file layer
//! 2. Harvest environment variables for the `ENV` layer
//! 3. Deep-merge everything, defaults first (later overrides earlier)
//! 4. Reject undeclared keys (if strict)
//! 5. Validate the merged value against the schema

use std::path::PathBuf;

use tracing::{debug, trace};

use crate::env::{self, EnvOptions, Environment};
use crate::error::LayerconfError;
use crate::interpolate::interpolate;
use crate::merge::deep_merge;
use crate::schema::Schema;
use crate::types::{ArrayCoercion, MergeOpts};
use crate::validate;
use crate::value::{Table, Value};

/// One entry of the ordered layer list.
#[derive(Debug, Clone, PartialEq)]
pub enum Layer {
    /// A parsed config file.
    File { path: PathBuf, table: Table },
    /// The position of the harvested environment variables.
    Env,
}

/// All pre-loaded data needed to resolve a config. No I/O happens here.
pub struct ResolveInput<'a> {
    /// Lowest-priority layer, also interpolated.
    pub defaults: Table,
    /// Layers in precedence order: first = lowest priority, last = highest.
    pub layers: Vec<Layer>,
    /// Variables for templates and the `ENV` layer.
    pub env: Environment,
    /// Naming of config variables. `None` means the `ENV` layer is skipped.
    pub env_options: Option<EnvOptions>,
    pub schema: Option<&'a Schema>,
    pub merge: MergeOpts,
    pub arrays: ArrayCoercion,
    /// Whether to reject keys the schema does not declare.
    pub strict: bool,
}

/// Interpolate, harvest and merge, without validating.
pub fn merge_layers(input: &ResolveInput<'_>) -> Result<Table, LayerconfError> {
    let mut tables = Vec::with_capacity(input.layers.len() + 1);
    tables.push(interpolate(
        input.defaults.clone(),
        input.schema,
        &input.env,
        input.arrays,
    )?);

    for layer in &input.layers {
        match layer {
            Layer::File { path, table } => {
                trace!(path = %path.display(), "interpolating file layer");
                tables.push(interpolate(table.clone(), input.schema, &input.env, input.arrays)?);
            }
            Layer::Env => match &input.env_options {
                Some(opts) => tables.push(env::harvest(
                    &input.env,
                    opts,
                    input.schema,
                    input.merge,
                    input.arrays,
                )?),
                None => debug!("environment layer disabled"),
            },
        }
    }

    Ok(deep_merge(tables, input.merge))
}

/// Resolve configuration from pre-loaded inputs.
///
/// Without a schema the merged table is returned as is.
pub fn resolve(input: ResolveInput<'_>) -> Result<Value, LayerconfError> {
    let merged = merge_layers(&input)?;

    let Some(schema) = input.schema else {
        return Ok(Value::Table(merged));
    };

    if input.strict {
        let unknown = validate::unknown_keys(&merged, schema);
        if !unknown.is_empty() {
            return Err(LayerconfError::UnknownKeys(unknown));
        }
    }

    Ok(schema.validate(&Value::Table(merged))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::service_schema;

    fn table(json: &str) -> Table {
        serde_json::from_str::<Value>(json)
            .unwrap()
            .into_table()
            .unwrap()
    }

    fn file(name: &str, json: &str) -> Layer {
        Layer::File {
            path: name.into(),
            table: table(json),
        }
    }

    fn input(schema: Option<&Schema>) -> ResolveInput<'_> {
        ResolveInput {
            defaults: Table::new(),
            layers: vec![],
            env: Environment::default(),
            env_options: Some(EnvOptions::default()),
            schema,
            merge: MergeOpts::default(),
            arrays: ArrayCoercion::Lenient,
            strict: false,
        }
    }

    #[test]
    fn defaults_only() {
        let schema = service_schema();
        let mut inp = input(Some(&schema));
        inp.defaults = table(r#"{"database": {"host": "localhost"}}"#);
        let config = resolve(inp).unwrap();
        assert_eq!(config["port"].as_integer(), Some(8080));
        assert_eq!(config["database"]["host"].as_str(), Some("localhost"));
    }

    #[test]
    fn file_overrides_default() {
        let schema = service_schema();
        let mut inp = input(Some(&schema));
        inp.defaults = table(r#"{"port": 1, "database": {"host": "localhost"}}"#);
        inp.layers = vec![file("default.yaml", r#"{"port": 3000}"#)];
        let config = resolve(inp).unwrap();
        assert_eq!(config["port"].as_integer(), Some(3000));
    }

    #[test]
    fn layer_order_decides_priority() {
        let schema = service_schema();
        let mut inp = input(Some(&schema));
        inp.env = [("CONFIG_database__host", "from-env")].into_iter().collect();
        inp.layers = vec![
            file("default.yaml", r#"{"database": {"host": "default"}}"#),
            Layer::Env,
            file("local.yaml", r#"{"port": 1}"#),
        ];
        let config = resolve(inp).unwrap();
        assert_eq!(config["database"]["host"].as_str(), Some("from-env"));
        assert_eq!(config["port"].as_integer(), Some(1));

        let mut inp = input(Some(&schema));
        inp.env = [("CONFIG_database__host", "from-env")].into_iter().collect();
        inp.layers = vec![
            Layer::Env,
            file("local.yaml", r#"{"database": {"host": "local"}}"#),
        ];
        let config = resolve(inp).unwrap();
        assert_eq!(config["database"]["host"].as_str(), Some("local"));
    }

    #[test]
    fn disabled_env_layer_skipped() {
        let mut inp = input(None);
        inp.env = [("CONFIG_port", "1")].into_iter().collect();
        inp.env_options = None;
        inp.layers = vec![Layer::Env];
        let config = resolve(inp).unwrap();
        assert!(config.as_table().unwrap().is_empty());
    }

    #[test]
    fn templates_resolved_per_layer() {
        let schema = service_schema();
        let mut inp = input(Some(&schema));
        inp.env = [("DB_HOST", "db.internal")].into_iter().collect();
        inp.defaults = table(r#"{"port": "${PORT:9000}"}"#);
        inp.layers = vec![file("default.yaml", r#"{"database": {"host": "${DB_HOST}"}}"#)];
        let config = resolve(inp).unwrap();
        assert_eq!(config["port"].as_integer(), Some(9000));
        assert_eq!(config["database"]["host"].as_str(), Some("db.internal"));
    }

    #[test]
    fn validation_failure_surfaces() {
        let schema = service_schema();
        let inp = input(Some(&schema));
        let err = resolve(inp).unwrap_err();
        match err {
            LayerconfError::Validation(e) => assert!(e.issue_at("database").is_some()),
            other => panic!("Expected Validation, got: {other:?}"),
        }
    }

    #[test]
    fn strict_rejects_undeclared_keys() {
        let schema = service_schema();
        let mut inp = input(Some(&schema));
        inp.strict = true;
        inp.layers = vec![file(
            "default.yaml",
            r#"{"typo": 1, "database": {"host": "h", "typo": 2}}"#,
        )];
        match resolve(inp).unwrap_err() {
            LayerconfError::UnknownKeys(keys) => {
                assert_eq!(keys, vec!["database.typo", "typo"]);
            }
            other => panic!("Expected UnknownKeys, got: {other:?}"),
        }
    }

    #[test]
    fn lenient_mode_drops_undeclared_keys() {
        let schema = service_schema();
        let mut inp = input(Some(&schema));
        inp.layers = vec![file(
            "default.yaml",
            r#"{"typo": 1, "database": {"host": "h"}}"#,
        )];
        let config = resolve(inp).unwrap();
        assert!(config.get("typo").is_none());
    }

    #[test]
    fn combine_policy_applies_to_file_layers() {
        let mut inp = input(None);
        inp.merge = MergeOpts::combine();
        inp.layers = vec![
            file("default.yaml", r#"{"nums": [1, 2]}"#),
            file("local.yaml", r#"{"nums": [3]}"#),
        ];
        let config = resolve(inp).unwrap();
        assert_eq!(
            config["nums"],
            Value::Array(vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)])
        );
    }

    #[test]
    fn unresolved_template_in_later_layer_keeps_earlier_value() {
        let mut inp = input(None);
        inp.layers = vec![
            file("default.yaml", r#"{"host": "base"}"#),
            file("local.yaml", r#"{"host": "${UNSET_HOST}"}"#),
        ];
        let config = resolve(inp).unwrap();
        assert_eq!(config["host"].as_str(), Some("base"));
    }

    #[test]
    fn strict_accepts_keys_under_refined_object() {
        let schema = Schema::object([(
            "db",
            Schema::object([("host", Schema::string())]).refine(|_| true, "ok"),
        )]);
        let mut inp = input(Some(&schema));
        inp.strict = true;
        inp.layers = vec![file("default.yaml", r#"{"db": {"host": "h"}}"#)];
        let config = resolve(inp).unwrap();
        assert_eq!(config["db"]["host"].as_str(), Some("h"));
    }
}
