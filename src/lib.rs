//! Layered configuration guided by a schema. Describe the shape of your
//! configuration, point at a directory, and load.
//!
//! Layerconf merges configuration files, environment variables and in-code
//! defaults into a single validated value. The schema does double duty: it
//! validates the merged result, and it tells the loader what type each
//! environment variable and `${VAR}` template should become before merging.
//!
//! ```ignore
//! let schema = Schema::object([
//!     ("port", Schema::integer().with_default(8080)),
//!     ("database", Schema::object([("host", Schema::string())])),
//! ]);
//!
//! let config = Layerconf::builder()
//!     .path("config")
//!     .schema(schema)
//!     .load()?;
//! ```
//!
//! That call reads `config/default.yaml`, `config/{NODE_ENV}.yaml` and
//! `config/local.yaml`, applies `CONFIG_*` environment variables, fills in
//! defaults, and validates the result.
//!
//! # Layer precedence
//!
//! ```text
//! Defaults              .defaults() / .defaults_from()
//!        ↑ overridden by
//! default.yaml          every directory, in order
//!        ↑ overridden by
//! {NODE_ENV}.yaml       skipped when NODE_ENV is unset
//!        ↑ overridden by
//! Environment vars      CONFIG_database__host
//!        ↑ overridden by
//! local.yaml
//! ```
//!
//! The order is the source list, configurable with
//! [`sources()`](LayerconfBuilder::sources). Every layer is sparse: unset
//! keys fall through to the layer below. Tables merge key by key; arrays
//! either replace each other or combine element-wise (see
//! [`ArrayMergeMethod`]).
//!
//! # Environment variables
//!
//! With prefix `CONFIG_` and separator `__`:
//!
//! | Env var | Config key |
//! |---------|------------|
//! | `CONFIG_port` | `port` |
//! | `CONFIG_database__host` | `database.host` |
//!
//! Segments are case-sensitive and must match the schema's field names. The
//! schema decides how each value is parsed: `"8080"` becomes an integer for
//! an integer field and stays a string for a string field; `"a, b"` becomes
//! a two-element array for an array field. Variables that name no field in
//! the schema, or whose value does not fit the field's type, are dropped
//! with a debug log so unrelated variables sharing the prefix never block
//! startup. Malformed numbers and booleans are the exception: they fail the
//! load.
//!
//! # Templates
//!
//! String values in files (and in defaults) can refer to the environment:
//!
//! ```yaml
//! database:
//!   host: ${DB_HOST:localhost}
//!   password: ${DB_PASSWORD}
//! ```
//!
//! The value is coerced like an environment variable for its key. A
//! template with neither a value nor a default removes its key.
//!
//! # Formats
//!
//! YAML (default), JSON, JSON5 and TOML, chosen with
//! [`format()`](LayerconfBuilder::format). Missing files are empty layers.
//!
//! # Validation
//!
//! The merged value is validated with [`Schema::validate`]: types are
//! checked, defaults filled and transforms applied. Undeclared keys are
//! dropped from the result, or rejected with
//! [`.strict(true)`](LayerconfBuilder::strict). Use
//! [`load_as()`](LayerconfBuilder::load_as) to deserialize into your own
//! struct.
//!
//! # Modules
//!
//! Components that own a slice of the configuration can register their
//! schema with a [`Registry`], which reloads on each registration, or read
//! it through a `layerconf.toml` settings file with [`load_module`], which
//! reads the files once per process.
//!
//! # Error handling
//!
//! All fallible operations return [`LayerconfError`]. Parse errors name the
//! file; validation errors list every issue with its dotted key path.

pub mod error;
pub mod schema;
pub mod types;
pub mod value;

mod builder;
pub mod coerce;
pub mod env;
mod file;
pub mod interpolate;
pub mod lookup;
pub mod merge;
mod registry;
mod resolve;
pub mod settings;
pub mod validate;

#[cfg(test)]
mod fixtures;

pub use builder::{Layerconf, LayerconfBuilder, RUNTIME_ENV_VAR};
pub use env::Environment;
pub use error::LayerconfError;
pub use registry::Registry;
pub use schema::{Brand, Literal, Schema};
pub use settings::{Settings, discover_settings, load_module, load_module_as};
pub use types::{ArrayCoercion, ArrayMergeMethod, Format, MergeOpts, SearchPath, Source};
pub use validate::{Issue, ValidationError};
pub use value::{Table, Value};
