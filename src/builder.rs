use std::path::PathBuf;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::env::{DEFAULT_PREFIX, DEFAULT_SEPARATOR, EnvOptions, Environment};
use crate::error::LayerconfError;
use crate::file;
use crate::resolve::{self, Layer, ResolveInput};
use crate::schema::Schema;
use crate::types::{ArrayCoercion, ArrayMergeMethod, Format, MergeOpts, SearchPath, Source};
use crate::value::{self, Table, Value};

/// The variable naming the runtime environment for the `NODE_ENV` source.
pub const RUNTIME_ENV_VAR: &str = "NODE_ENV";

/// Entry point for building a layerconf configuration.
pub struct Layerconf;

impl Layerconf {
    pub fn builder() -> LayerconfBuilder {
        LayerconfBuilder::new()
    }
}

/// Builder for configuring and loading layered configuration.
///
/// At least one directory is required ([`path()`](Self::path)). Everything
/// else has a default:
///
/// | Setting | Default |
/// |---------|---------|
/// | format | YAML |
/// | sources | `default`, `NODE_ENV`, `ENV`, `local` |
/// | env prefix / separator | `CONFIG_` / `__` |
/// | array merge | overwrite |
/// | array coercion | lenient |
/// | strict | off |
///
/// A builder can be loaded any number of times; each load re-reads the
/// files and the environment.
#[derive(Debug, Clone)]
pub struct LayerconfBuilder {
    search_paths: Vec<SearchPath>,
    format: Format,
    schema: Option<Schema>,
    defaults: Table,
    env_prefix: String,
    env_separator: String,
    env_enabled: bool,
    sources: Option<Vec<Source>>,
    array_merge: ArrayMergeMethod,
    array_coercion: ArrayCoercion,
    env_vars: Option<Environment>,
    strict: bool,
}

impl Default for LayerconfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LayerconfBuilder {
    fn new() -> Self {
        Self {
            search_paths: Vec::new(),
            format: Format::default(),
            schema: None,
            defaults: Table::new(),
            env_prefix: DEFAULT_PREFIX.to_string(),
            env_separator: DEFAULT_SEPARATOR.to_string(),
            env_enabled: true,
            sources: None,
            array_merge: ArrayMergeMethod::default(),
            array_coercion: ArrayCoercion::default(),
            env_vars: None,
            strict: false,
        }
    }

    /// Add a config directory. Later directories override earlier ones.
    pub fn path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_paths.push(SearchPath::Path(dir.into()));
        self
    }

    /// Add several config directories, in priority-ascending order.
    pub fn paths<I, P>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.search_paths
            .extend(dirs.into_iter().map(|d| SearchPath::Path(d.into())));
        self
    }

    /// Replace the config directories entirely. See [`SearchPath`] for the
    /// available variants.
    pub fn search_paths(mut self, paths: Vec<SearchPath>) -> Self {
        self.search_paths = paths;
        self
    }

    /// Set the file format (default: YAML). Decides the file extension.
    pub fn format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    /// Schema for coercion and final validation. Without one, env values and
    /// templates stay strings and nothing is validated.
    pub fn schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// In-code defaults, the lowest-priority layer.
    pub fn defaults(mut self, defaults: Table) -> Self {
        self.defaults = defaults;
        self
    }

    /// Defaults from any serializable value, typically a struct.
    pub fn defaults_from<S: Serialize>(self, source: &S) -> Result<Self, LayerconfError> {
        let value = value::to_value(source)
            .map_err(|e| LayerconfError::InvalidDefaults(e.to_string()))?;
        match value {
            Value::Table(table) => Ok(self.defaults(table)),
            other => Err(LayerconfError::InvalidDefaults(format!(
                "expected a table, got {}",
                other.type_name()
            ))),
        }
    }

    /// Override the environment variable prefix (default: `CONFIG_`).
    pub fn env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = prefix.to_string();
        self
    }

    /// Override the key path separator in variable names (default: `__`).
    pub fn env_separator(mut self, separator: &str) -> Self {
        self.env_separator = separator.to_string();
        self
    }

    /// Skip the `ENV` layer. Templates are still resolved.
    pub fn no_env(mut self) -> Self {
        self.env_enabled = false;
        self
    }

    /// Replace the source list. Tokens: `ENV`, `NODE_ENV`, or a file name
    /// without extension.
    pub fn sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Source>,
    {
        self.sources = Some(sources.into_iter().map(Into::into).collect());
        self
    }

    pub fn array_merge(mut self, method: ArrayMergeMethod) -> Self {
        self.array_merge = method;
        self
    }

    pub fn array_coercion(mut self, coercion: ArrayCoercion) -> Self {
        self.array_coercion = coercion;
        self
    }

    /// Use these variables instead of the process environment, for both
    /// templates and the `ENV` layer.
    pub fn env_vars<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env_vars = Some(vars.into_iter().collect());
        self
    }

    /// Enable or disable strict mode (default: `false`).
    /// In strict mode, keys the schema does not declare produce errors.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub(crate) fn schema_ref(&self) -> Option<&Schema> {
        self.schema.as_ref()
    }

    fn effective_sources(&self) -> Vec<Source> {
        match &self.sources {
            Some(sources) => sources.clone(),
            None => Source::default_order(),
        }
    }

    pub(crate) fn effective_environment(&self) -> Environment {
        match &self.env_vars {
            Some(env) => env.clone(),
            None => Environment::from_process(),
        }
    }

    /// Resolve the env naming (None if env disabled).
    fn effective_env_options(&self) -> Option<EnvOptions> {
        self.env_enabled.then(|| EnvOptions {
            prefix: self.env_prefix.clone(),
            separator: self.env_separator.clone(),
        })
    }

    /// Read every file the sources name, in order.
    pub(crate) fn read_layers(&self, env: &Environment) -> Result<Vec<Layer>, LayerconfError> {
        if self.search_paths.is_empty() {
            return Err(LayerconfError::NoSearchPaths);
        }
        let dirs = file::expand_search_paths(&self.search_paths);

        let mut layers = Vec::new();
        for source in self.effective_sources() {
            let name = match source {
                Source::Env => {
                    layers.push(Layer::Env);
                    continue;
                }
                Source::File(name) => name,
                Source::RuntimeEnv => match env.get_non_empty(RUNTIME_ENV_VAR) {
                    Some(name) => name.to_string(),
                    None => {
                        debug!("{RUNTIME_ENV_VAR} not set, skipping source");
                        continue;
                    }
                },
            };
            debug!(source = %name, "processing config source");
            for (path, table) in file::read_source(&dirs, &name, self.format)? {
                layers.push(Layer::File { path, table });
            }
        }
        Ok(layers)
    }

    /// Build the `ResolveInput` from current builder state.
    fn build_input(&self) -> Result<ResolveInput<'_>, LayerconfError> {
        let env = self.effective_environment();
        let layers = self.read_layers(&env)?;
        Ok(self.input_with_layers(layers, env))
    }

    /// Like `build_input`, with file layers that were read earlier.
    pub(crate) fn input_with_layers(&self, layers: Vec<Layer>, env: Environment) -> ResolveInput<'_> {
        ResolveInput {
            defaults: self.defaults.clone(),
            layers,
            env,
            env_options: self.effective_env_options(),
            schema: self.schema.as_ref(),
            merge: MergeOpts {
                array_merge: self.array_merge,
            },
            arrays: self.array_coercion,
            strict: self.strict,
        }
    }

    /// Load and resolve the configuration through all layers.
    pub fn load(&self) -> Result<Value, LayerconfError> {
        let input = self.build_input()?;
        resolve::resolve(input)
    }

    /// Load, then deserialize into `T`.
    pub fn load_as<T: DeserializeOwned>(&self) -> Result<T, LayerconfError> {
        let value = self.load()?;
        deserialize(&value)
    }
}

/// Deserialize a loaded value into `T`.
pub(crate) fn deserialize<T: DeserializeOwned>(value: &Value) -> Result<T, LayerconfError> {
    let json = serde_json::to_value(value)?;
    Ok(serde_json::from_value(json)?)
}
