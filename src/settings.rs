//! Settings-file driven loading for modular applications.
//!
//! A `layerconf.toml` file, found by walking up from a starting directory,
//! tells every module where the configuration lives:
//!
//! ```toml
//! # relative to this file; default "./config"
//! path = ["./config"]
//! env_prefix = "CONFIG_"
//! sources = ["default", "NODE_ENV", "ENV", "local"]
//! array_merge = "combine"
//! ```
//!
//! Each module then calls [`load_module`] with its namespace and schema. The
//! files are read once per settings file and kept for the life of the
//! process; interpolation, the environment layer and validation run on every
//! call, against `{namespace: schema}`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::builder::{Layerconf, LayerconfBuilder, deserialize};
use crate::env::{DEFAULT_PREFIX, DEFAULT_SEPARATOR, Environment};
use crate::error::LayerconfError;
use crate::file;
use crate::resolve::{self, Layer};
use crate::schema::Schema;
use crate::types::{ArrayMergeMethod, Format, Source};
use crate::value::Value;

pub const SETTINGS_FILE: &str = "layerconf.toml";

const DEFAULT_CONFIG_DIR: &str = "./config";

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PathSetting {
    One(String),
    Many(Vec<String>),
}

/// The settings file as written.
#[derive(Debug, Deserialize)]
struct RawSettings {
    path: Option<PathSetting>,
    env_prefix: Option<String>,
    env_separator: Option<String>,
    sources: Option<Vec<String>>,
    array_merge: Option<ArrayMergeMethod>,
    format: Option<Format>,
}

/// Parsed settings with defaults applied and directories made absolute.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// The settings file itself; also the cache key.
    pub file: PathBuf,
    pub dirs: Vec<PathBuf>,
    pub env_prefix: String,
    pub env_separator: String,
    pub sources: Vec<Source>,
    pub array_merge: ArrayMergeMethod,
    pub format: Format,
}

impl Settings {
    /// Read and parse a settings file.
    pub fn from_file(path: &Path) -> Result<Self, LayerconfError> {
        let content = std::fs::read_to_string(path).map_err(|e| LayerconfError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let raw: RawSettings =
            toml::from_str(&content).map_err(|e| LayerconfError::InvalidSettings {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        Ok(Self::from_raw(raw, path))
    }

    fn from_raw(raw: RawSettings, file: &Path) -> Self {
        let base = file.parent().unwrap_or(Path::new("."));
        let dirs = match raw.path {
            None => vec![DEFAULT_CONFIG_DIR.to_string()],
            Some(PathSetting::One(p)) => vec![p],
            Some(PathSetting::Many(ps)) => ps,
        }
        .into_iter()
        .map(|p| base.join(p))
        .collect();

        let sources = match raw.sources {
            Some(tokens) => tokens.iter().map(|t| Source::from(t.as_str())).collect(),
            None => vec![Source::File("default".into()), Source::RuntimeEnv, Source::Env],
        };

        Self {
            file: file.to_path_buf(),
            dirs,
            env_prefix: raw.env_prefix.unwrap_or_else(|| DEFAULT_PREFIX.to_string()),
            env_separator: raw
                .env_separator
                .unwrap_or_else(|| DEFAULT_SEPARATOR.to_string()),
            sources,
            array_merge: raw.array_merge.unwrap_or(ArrayMergeMethod::Combine),
            format: raw.format.unwrap_or_default(),
        }
    }

    /// A loader configured from these settings.
    pub fn builder(&self) -> LayerconfBuilder {
        Layerconf::builder()
            .paths(self.dirs.iter().cloned())
            .format(self.format)
            .env_prefix(&self.env_prefix)
            .env_separator(&self.env_separator)
            .sources(self.sources.iter().cloned())
            .array_merge(self.array_merge)
    }
}

/// Find `layerconf.toml` in `start` or the nearest ancestor and parse it.
pub fn discover_settings(start: &Path) -> Result<Settings, LayerconfError> {
    let path = file::find_upwards(start, SETTINGS_FILE).ok_or_else(|| {
        LayerconfError::SettingsNotFound {
            file_name: SETTINGS_FILE.to_string(),
            start: start.to_path_buf(),
        }
    })?;
    debug!(path = %path.display(), "found settings file");
    Settings::from_file(&path)
}

type LayerCache = Mutex<HashMap<PathBuf, Arc<Vec<Layer>>>>;

/// File layers per settings file, read once and never invalidated.
fn cache() -> &'static LayerCache {
    static CACHE: OnceLock<LayerCache> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

fn cached_layers(
    settings: &Settings,
    builder: &LayerconfBuilder,
    env: &Environment,
) -> Result<Arc<Vec<Layer>>, LayerconfError> {
    let mut cache = cache().lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(layers) = cache.get(&settings.file) {
        warn!(path = %settings.file.display(), "configuration has already been loaded, using cached files");
        return Ok(Arc::clone(layers));
    }
    debug!(path = %settings.file.display(), "initializing configuration");
    let layers = Arc::new(builder.read_layers(env)?);
    cache.insert(settings.file.clone(), Arc::clone(&layers));
    Ok(layers)
}

/// Load the `namespace` slice of the configuration, validated by `schema`,
/// using the process environment.
pub fn load_module(
    settings: &Settings,
    namespace: &str,
    schema: Schema,
) -> Result<Value, LayerconfError> {
    load_module_with_env(settings, namespace, schema, Environment::from_process())
}

/// [`load_module`] with an explicit environment.
pub fn load_module_with_env(
    settings: &Settings,
    namespace: &str,
    schema: Schema,
    env: Environment,
) -> Result<Value, LayerconfError> {
    let builder = settings
        .builder()
        .schema(Schema::object([(namespace.to_string(), schema)]));
    let layers = cached_layers(settings, &builder, &env)?;
    let input = builder.input_with_layers(layers.as_ref().clone(), env);
    let config = resolve::resolve(input)?;
    Ok(config[namespace].clone())
}

/// [`load_module`], then deserialize into `T`.
pub fn load_module_as<T: DeserializeOwned>(
    settings: &Settings,
    namespace: &str,
    schema: Schema,
) -> Result<T, LayerconfError> {
    let slice = load_module(settings, namespace, schema)?;
    deserialize(&slice)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::{CryptoConfig, crypto_schema};
    use std::fs;
    use tempfile::TempDir;

    fn project(settings: &str, files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(SETTINGS_FILE), settings).unwrap();
        let config = dir.path().join("config");
        fs::create_dir_all(&config).unwrap();
        for (name, content) in files {
            fs::write(config.join(name), content).unwrap();
        }
        dir
    }

    fn env(pairs: &[(&str, &str)]) -> Environment {
        pairs.iter().copied().collect()
    }

    #[test]
    fn defaults_applied() {
        let dir = project("", &[]);
        let settings = Settings::from_file(&dir.path().join(SETTINGS_FILE)).unwrap();
        assert_eq!(settings.dirs, vec![dir.path().join("./config")]);
        assert_eq!(settings.env_prefix, "CONFIG_");
        assert_eq!(
            settings.sources,
            vec![Source::File("default".into()), Source::RuntimeEnv, Source::Env]
        );
        assert_eq!(settings.array_merge, ArrayMergeMethod::Combine);
        assert_eq!(settings.format, Format::Yaml);
    }

    #[test]
    fn path_accepts_string_or_list() {
        let dir = project("path = \"conf\"\n", &[]);
        let one = Settings::from_file(&dir.path().join(SETTINGS_FILE)).unwrap();
        assert_eq!(one.dirs, vec![dir.path().join("conf")]);

        fs::write(dir.path().join(SETTINGS_FILE), "path = [\"a\", \"b\"]\n").unwrap();
        let many = Settings::from_file(&dir.path().join(SETTINGS_FILE)).unwrap();
        assert_eq!(many.dirs, vec![dir.path().join("a"), dir.path().join("b")]);
    }

    #[test]
    fn invalid_settings_reported() {
        let dir = project("array_merge = \"sometimes\"\n", &[]);
        let err = Settings::from_file(&dir.path().join(SETTINGS_FILE)).unwrap_err();
        assert!(matches!(err, LayerconfError::InvalidSettings { .. }));
    }

    #[test]
    fn discover_walks_up_from_nested_dir() {
        let dir = project("path = \"config\"\n", &[]);
        let nested = dir.path().join("src").join("module");
        fs::create_dir_all(&nested).unwrap();
        let settings = discover_settings(&nested).unwrap();
        assert_eq!(settings.file, dir.path().join(SETTINGS_FILE));
    }

    #[test]
    fn discover_fails_without_settings() {
        let dir = TempDir::new().unwrap();
        // Walks past the temp dir; only meaningful when no ancestor has one.
        if file::find_upwards(dir.path(), SETTINGS_FILE).is_none() {
            let err = discover_settings(dir.path()).unwrap_err();
            assert!(matches!(err, LayerconfError::SettingsNotFound { .. }));
        }
    }

    #[test]
    fn module_slice_validated() {
        let dir = project(
            "",
            &[("default.yaml", "crypto:\n  key: secret\nother:\n  x: 1\n")],
        );
        let settings = discover_settings(dir.path()).unwrap();
        let crypto = load_module_with_env(
            &settings,
            "crypto",
            crypto_schema(),
            env(&[("CONFIG_crypto__rounds", "20")]),
        )
        .unwrap();
        assert_eq!(crypto["key"].as_str(), Some("secret"));
        assert_eq!(crypto["rounds"].as_integer(), Some(20));
    }

    #[test]
    fn files_read_once_per_settings_file() {
        let dir = project("", &[("default.yaml", "crypto:\n  key: first\n")]);
        let settings = discover_settings(dir.path()).unwrap();
        let first = load_module_with_env(&settings, "crypto", crypto_schema(), env(&[])).unwrap();
        assert_eq!(first["key"].as_str(), Some("first"));

        fs::write(dir.path().join("config").join("default.yaml"), "crypto:\n  key: second\n")
            .unwrap();
        let again = load_module_with_env(&settings, "crypto", crypto_schema(), env(&[])).unwrap();
        assert_eq!(again["key"].as_str(), Some("first"));

        // The environment layer is not cached.
        let env_override = load_module_with_env(
            &settings,
            "crypto",
            crypto_schema(),
            env(&[("CONFIG_crypto__key", "from-env")]),
        )
        .unwrap();
        assert_eq!(env_override["key"].as_str(), Some("from-env"));
    }

    #[test]
    fn modules_share_cached_files() {
        let dir = project(
            "",
            &[("default.yaml", "crypto:\n  key: k\nhttp:\n  port: 80\n")],
        );
        let settings = discover_settings(dir.path()).unwrap();
        load_module_with_env(&settings, "crypto", crypto_schema(), env(&[])).unwrap();
        let http = load_module_with_env(
            &settings,
            "http",
            Schema::object([("port", Schema::integer())]),
            env(&[]),
        )
        .unwrap();
        assert_eq!(http["port"].as_integer(), Some(80));
    }

    #[test]
    fn missing_namespace_fails_validation() {
        let dir = project("", &[("default.yaml", "other: 1\n")]);
        let settings = discover_settings(dir.path()).unwrap();
        let err = load_module_with_env(&settings, "crypto", crypto_schema(), env(&[])).unwrap_err();
        match err {
            LayerconfError::Validation(e) => assert!(e.issue_at("crypto").is_some()),
            other => panic!("Expected Validation, got: {other:?}"),
        }
    }

    #[test]
    fn combine_is_the_default_policy() {
        let dir = project(
            "sources = [\"default\", \"local\"]\n",
            &[
                ("default.yaml", "list:\n  items: [1, 2]\n"),
                ("local.yaml", "list:\n  items: [3]\n"),
            ],
        );
        let settings = discover_settings(dir.path()).unwrap();
        let list = load_module_with_env(
            &settings,
            "list",
            Schema::object([("items", Schema::array(Schema::integer()))]),
            env(&[]),
        )
        .unwrap();
        assert_eq!(
            list["items"],
            Value::Array(vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)])
        );
    }

    #[test]
    fn typed_module() {
        let dir = project("", &[("default.yaml", "crypto:\n  key: k\n  rounds: 3\n")]);
        let settings = discover_settings(dir.path()).unwrap();
        // Warm the cache so the process environment does not affect the files.
        load_module_with_env(&settings, "crypto", crypto_schema(), env(&[])).unwrap();
        let crypto: CryptoConfig = load_module_as(&settings, "crypto", crypto_schema()).unwrap();
        assert_eq!(crypto.key, "k");
    }
}
