//! File discovery and parsing for configuration layers.
//!
//! # Discovery
//!
//! Each [`SearchPath`] resolves to one concrete directory. For every file
//! source the loader checks `{dir}/{source}.{ext}` in each directory, in the
//! order the directories were given, so later directories override earlier
//! ones.
//!
//! # Parsing
//!
//! The [`Format`] picks the parser. A file that does not exist is an empty
//! layer, as is an empty document. Anything other than a table at the top
//! level is rejected, and parse failures carry the file path.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::LayerconfError;
use crate::types::{Format, SearchPath};
use crate::value::{Table, Value, table_from_toml};

/// Resolve a [`SearchPath`] to a concrete directory.
///
/// Returns `None` if the path cannot be resolved (e.g. no home directory found).
pub fn resolve_search_path(sp: &SearchPath) -> Option<PathBuf> {
    match sp {
        SearchPath::Platform(app_name) => {
            let proj = directories::ProjectDirs::from("", "", app_name)?;
            Some(proj.config_dir().to_path_buf())
        }
        SearchPath::Home(subdir) => {
            let user = directories::UserDirs::new()?;
            Some(user.home_dir().join(subdir))
        }
        SearchPath::Cwd => std::env::current_dir().ok(),
        SearchPath::Path(p) => Some(p.clone()),
    }
}

/// Resolve all search paths, skipping the ones that cannot be resolved.
pub fn expand_search_paths(search_paths: &[SearchPath]) -> Vec<PathBuf> {
    search_paths
        .iter()
        .filter_map(|sp| {
            let dir = resolve_search_path(sp);
            if dir.is_none() {
                debug!(search_path = ?sp, "unable to resolve config directory");
            }
            dir
        })
        .collect()
}

/// Walk from `start` toward the filesystem root and return the first
/// `{dir}/{file_name}` that exists.
pub fn find_upwards(start: &Path, file_name: &str) -> Option<PathBuf> {
    let mut current = start;
    loop {
        let candidate = current.join(file_name);
        if candidate.is_file() {
            return Some(candidate);
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => return None, // reached root
        }
    }
}

/// Parse `content` in `format`. `path` is only used in error messages.
pub fn parse_layer(content: &str, format: Format, path: &Path) -> Result<Table, LayerconfError> {
    let parse_err = |message: String| LayerconfError::Parse {
        path: path.to_path_buf(),
        message,
    };

    let value: Value = match format {
        Format::Toml => {
            let table: toml::Table =
                toml::from_str(content).map_err(|e| parse_err(e.to_string()))?;
            return Ok(table_from_toml(table));
        }
        Format::Yaml => {
            if content.trim().is_empty() {
                Value::Null
            } else {
                serde_yaml::from_str(content).map_err(|e| parse_err(e.to_string()))?
            }
        }
        Format::Json => serde_json::from_str(content).map_err(|e| parse_err(e.to_string()))?,
        Format::Json5 => json5::from_str(content).map_err(|e| parse_err(e.to_string()))?,
    };

    match value {
        Value::Table(table) => Ok(table),
        Value::Null => Ok(Table::new()),
        _ => Err(LayerconfError::NotATable {
            path: path.to_path_buf(),
        }),
    }
}

/// Read and parse one layer file. A missing file is an empty layer; other
/// I/O errors propagate.
pub fn read_layer(path: &Path, format: Format) -> Result<Table, LayerconfError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found");
            return Ok(Table::new());
        }
        Err(e) => {
            return Err(LayerconfError::Io {
                path: path.to_path_buf(),
                source: e,
            });
        }
    };
    debug!(path = %path.display(), "parsing config");
    parse_layer(&content, format, path)
}

/// Read `{dir}/{name}.{ext}` from every directory, in order.
pub fn read_source(
    dirs: &[PathBuf],
    name: &str,
    format: Format,
) -> Result<Vec<(PathBuf, Table)>, LayerconfError> {
    let file_name = format!("{name}.{}", format.extension());
    dirs.iter()
        .map(|dir| {
            let path = dir.join(&file_name);
            let table = read_layer(&path, format)?;
            Ok((path, table))
        })
        .collect()
}
