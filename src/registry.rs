//! Modular configuration: each component registers the schema of its own
//! namespace, and every registration reloads and re-validates everything.
//!
//! ```ignore
//! let mut registry = Registry::new(Layerconf::builder().path("config"))?;
//! let crypto = registry.register("crypto", Schema::object([("key", Schema::string())]))?;
//! ```

use std::collections::BTreeSet;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::builder::{LayerconfBuilder, deserialize};
use crate::error::LayerconfError;
use crate::schema::Schema;
use crate::value::Value;

pub struct Registry {
    builder: LayerconfBuilder,
    schema: Schema,
    names: BTreeSet<String>,
    config: Value,
}

impl Registry {
    /// Load once with the builder's schema. Without one, the combined schema
    /// starts as an empty object, so [`get`](Self::get) only shows
    /// registered namespaces after the first registration.
    pub fn new(builder: LayerconfBuilder) -> Result<Self, LayerconfError> {
        let config = builder.load()?;
        let schema = match builder.schema_ref() {
            Some(schema) => schema.clone(),
            None => Schema::object(Vec::<(String, Schema)>::new()),
        };
        Ok(Self {
            builder,
            schema,
            names: BTreeSet::new(),
            config,
        })
    }

    /// Add `{name: schema}` to the combined schema, reload, and return the
    /// validated `name` slice. On error the registry is left unchanged.
    pub fn register(&mut self, name: &str, schema: Schema) -> Result<Value, LayerconfError> {
        if self.names.contains(name) {
            return Err(LayerconfError::AlreadyRegistered(name.to_string()));
        }

        let combined = self
            .schema
            .clone()
            .and(Schema::object([(name.to_string(), schema)]));
        debug!(name, "registering configuration, reloading");
        let config = self.builder.clone().schema(combined.clone()).load()?;

        self.schema = combined;
        self.names.insert(name.to_string());
        self.config = config;
        Ok(self.config[name].clone())
    }

    /// [`register`](Self::register), then deserialize the slice into `T`.
    pub fn register_as<T: DeserializeOwned>(
        &mut self,
        name: &str,
        schema: Schema,
    ) -> Result<T, LayerconfError> {
        let slice = self.register(name, schema)?;
        deserialize(&slice)
    }

    /// The whole configuration as of the last (re)load.
    pub fn get(&self) -> &Value {
        &self.config
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.names.contains(name)
    }
}
