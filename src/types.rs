//! Option types shared across the loader.
//!
//! # Sources and layers
//!
//! A load reads an ordered list of [`Source`]s. Each file source is looked
//! up in every configured directory ([`SearchPath`]) as
//! `{dir}/{source}.{ext}`, where `ext` comes from the [`Format`]. The
//! special `ENV` source stands for the harvested environment variables, and
//! `NODE_ENV` stands for a file named after the current runtime environment.
//!
//! ```text
//! defaults        .defaults(...)
//!    ↑ overridden by
//! default.yaml    every directory, in order
//!    ↑ overridden by
//! {NODE_ENV}.yaml
//!    ↑ overridden by
//! ENV             CONFIG_database__host=...
//!    ↑ overridden by
//! local.yaml
//! ```
//!
//! # Array merging
//!
//! [`ArrayMergeMethod::Overwrite`] replaces an earlier array with a later
//! one. [`ArrayMergeMethod::Combine`] merges arrays element-wise; see
//! [`merge`](crate::merge) for the exact rules.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Deserialize;

/// Where to look for config files.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchPath {
    /// An explicit directory.
    Path(PathBuf),
    /// Current working directory.
    Cwd,
    /// A subdirectory under the user's home directory, e.g. `Home(".myapp")`.
    Home(String),
    /// Platform config directory for the named app (XDG on Linux,
    /// `~/Library/Application Support` on macOS).
    Platform(String),
}

impl From<PathBuf> for SearchPath {
    fn from(p: PathBuf) -> Self {
        SearchPath::Path(p)
    }
}

impl From<&std::path::Path> for SearchPath {
    fn from(p: &std::path::Path) -> Self {
        SearchPath::Path(p.to_path_buf())
    }
}

impl From<&str> for SearchPath {
    fn from(p: &str) -> Self {
        SearchPath::Path(PathBuf::from(p))
    }
}

/// Config file format. Also decides the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Yaml,
    Json,
    Json5,
    Toml,
}

impl Format {
    pub fn extension(self) -> &'static str {
        match self {
            Format::Yaml => "yaml",
            Format::Json => "json",
            Format::Json5 => "json5",
            Format::Toml => "toml",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Some(Format::Yaml),
            "json" => Some(Format::Json),
            "json5" => Some(Format::Json5),
            "toml" => Some(Format::Toml),
            _ => None,
        }
    }
}

/// How arrays from different layers are merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArrayMergeMethod {
    /// The later array replaces the earlier one.
    #[default]
    Overwrite,
    /// Arrays are merged element by element.
    Combine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeOpts {
    pub array_merge: ArrayMergeMethod,
}

impl MergeOpts {
    pub fn combine() -> Self {
        Self {
            array_merge: ArrayMergeMethod::Combine,
        }
    }
}

/// What array coercion does with elements that fail to coerce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArrayCoercion {
    /// Drop failing elements; the array shrinks.
    #[default]
    Lenient,
    /// Any failing element makes the whole array uncoercible.
    Strict,
}

/// One entry of the ordered source list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// `{name}.{ext}` in every config directory.
    File(String),
    /// The file named after the `NODE_ENV` environment variable, if set.
    RuntimeEnv,
    /// The harvested environment variables.
    Env,
}

impl Source {
    /// `default`, `NODE_ENV`, `ENV`, `local`.
    pub fn default_order() -> Vec<Source> {
        vec![
            Source::File("default".into()),
            Source::RuntimeEnv,
            Source::Env,
            Source::File("local".into()),
        ]
    }
}

impl FromStr for Source {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "ENV" => Source::Env,
            "NODE_ENV" => Source::RuntimeEnv,
            name => Source::File(name.to_string()),
        })
    }
}

impl From<&str> for Source {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(source) => source,
            Err(never) => match never {},
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::File(name) => write!(f, "{name}"),
            Source::RuntimeEnv => write!(f, "NODE_ENV"),
            Source::Env => write!(f, "ENV"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_tokens() {
        assert_eq!(Source::from("ENV"), Source::Env);
        assert_eq!(Source::from("NODE_ENV"), Source::RuntimeEnv);
        assert_eq!(Source::from("local"), Source::File("local".into()));
        // Tokens are case-sensitive.
        assert_eq!(Source::from("env"), Source::File("env".into()));
    }

    #[test]
    fn default_source_order() {
        let names: Vec<String> = Source::default_order()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(names, vec!["default", "NODE_ENV", "ENV", "local"]);
    }

    #[test]
    fn format_extensions() {
        assert_eq!(Format::default(), Format::Yaml);
        assert_eq!(Format::from_extension("yml"), Some(Format::Yaml));
        assert_eq!(Format::from_extension("JSON5"), Some(Format::Json5));
        assert_eq!(Format::from_extension("ini"), None);
        assert_eq!(Format::Toml.extension(), "toml");
    }

    #[test]
    fn array_merge_defaults_to_overwrite() {
        assert_eq!(MergeOpts::default().array_merge, ArrayMergeMethod::Overwrite);
        assert_eq!(MergeOpts::combine().array_merge, ArrayMergeMethod::Combine);
    }
}
