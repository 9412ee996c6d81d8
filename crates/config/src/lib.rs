//! Layered configuration for lectern.
//!
//! Values are resolved in increasing order of precedence:
//! 1. built-in defaults ([`Config::default`]),
//! 2. the per-user configuration file (`lectern.toml` in the platform config
//!    directory), when it exists,
//! 3. an explicitly provided file (TOML, YAML or JSON, chosen by extension),
//! 4. `LECTERN_`-prefixed environment variables, using `__` to nest
//!    (`LECTERN_SEARCH__URL=http://search:9200`).

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ENV_PREFIX: &str = "LECTERN_";
pub const CONFIG_FILE_NAME: &str = "lectern.toml";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub search: SearchConfig,
    pub indexing: IndexingConfig,
    pub resources: ResourceConfig,
}

/// Connection and query shaping for the external search engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Base URL of the Elasticsearch-compatible REST endpoint.
    pub url: String,
    /// Collection holding one document per chapter.
    pub chapter_index: String,
    /// Collection holding one document per paragraph.
    pub paragraph_index: String,
    /// Results per page for paginated searches.
    pub page_size: u32,
    /// Upper bound for "fetch everything" requests and aggregation buckets.
    /// Mirrors the `max_inner_result_window` applied to both collections.
    pub max_result_window: u32,
    pub highlight_pre: String,
    pub highlight_post: String,
    /// Hunspell locale for the signature analyzer.
    pub locale: String,
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".to_string(),
            chapter_index: "chapters".to_string(),
            paragraph_index: "paragraphs".to_string(),
            page_size: 10,
            max_result_window: 1000,
            highlight_pre: "<strong>".to_string(),
            highlight_post: "</strong>".to_string(),
            locale: "en_US".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingConfig {
    /// Size of the background indexing worker pool.
    pub workers: usize,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self { workers: 4 }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    /// Route prefix that rewritten image sources point at:
    /// `{image_route}/{book}/images/{name}`.
    pub image_route: String,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            image_route: "/api/books".to_string(),
        }
    }
}

/// Location of the per-user configuration file, if the platform has one.
pub fn user_config_path() -> Option<PathBuf> {
    ProjectDirs::from("org", "lectern", "lectern").map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

impl Config {
    /// Build the layered [`Figment`] without extracting it.
    pub fn figment(explicit: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = user_config_path().filter(|p| p.is_file()) {
            tracing::debug!(path = %path.display(), "merging user configuration");
            figment = figment.merge(Toml::file(path));
        }
        if let Some(path) = explicit {
            if !path.is_file() {
                exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
            }
            tracing::debug!(path = %path.display(), "merging explicit configuration");
            figment = match path.extension().and_then(|e| e.to_str()) {
                Some("toml") => figment.merge(Toml::file(path)),
                Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
                Some("json") => figment.merge(Json::file(path)),
                _ => exn::bail!(ErrorKind::UnsupportedFormat(path.to_path_buf())),
            };
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Load, merge and validate configuration.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config: Config = Self::figment(explicit)?
            .extract()
            .map_err(|e| exn::Exn::from(ErrorKind::Load(e.to_string())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.search.page_size == 0 {
            exn::bail!(ErrorKind::Invalid {
                field: "search.page_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.search.page_size > self.search.max_result_window {
            exn::bail!(ErrorKind::Invalid {
                field: "search.page_size",
                reason: format!("exceeds search.max_result_window ({})", self.search.max_result_window),
            });
        }
        if self.indexing.workers == 0 {
            exn::bail!(ErrorKind::Invalid {
                field: "indexing.workers",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.search.chapter_index == self.search.paragraph_index {
            exn::bail!(ErrorKind::Invalid {
                field: "search.paragraph_index",
                reason: "must differ from search.chapter_index".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use rstest::rstest;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.search.page_size, 10);
        assert_eq!(config.search.max_result_window, 1000);
        assert_eq!(config.indexing.workers, 4);
    }

    #[test]
    fn test_explicit_file_and_env_layers() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "lectern.toml",
                r#"
                    [search]
                    url = "http://search.internal:9200"
                    page_size = 25

                    [indexing]
                    workers = 2
                "#,
            )?;
            jail.set_env("LECTERN_SEARCH__PARAGRAPH_INDEX", "paras");
            let config = Config::load(Some(Path::new("lectern.toml"))).map_err(|e| e.to_string())?;
            assert_eq!(config.search.url, "http://search.internal:9200");
            assert_eq!(config.search.page_size, 25);
            assert_eq!(config.search.paragraph_index, "paras");
            assert_eq!(config.search.chapter_index, "chapters");
            assert_eq!(config.indexing.workers, 2);
            Ok(())
        });
    }

    #[test]
    fn test_yaml_file() {
        Jail::expect_with(|jail| {
            jail.create_file("lectern.yaml", "resources:\n  image_route: /media/books\n")?;
            let config = Config::load(Some(Path::new("lectern.yaml"))).map_err(|e| e.to_string())?;
            assert_eq!(config.resources.image_route, "/media/books");
            Ok(())
        });
    }

    #[test]
    fn test_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lectern.ini");
        std::fs::write(&path, "search.url = nope").unwrap();
        let err = Config::load(Some(&path)).unwrap_err();
        assert!(matches!(&*err, ErrorKind::UnsupportedFormat(_)));
    }

    #[rstest]
    #[case(0, 1000, 4, "search.page_size")]
    #[case(2000, 1000, 4, "search.page_size")]
    #[case(10, 1000, 0, "indexing.workers")]
    fn test_validation(#[case] page_size: u32, #[case] window: u32, #[case] workers: usize, #[case] field: &str) {
        let mut config = Config::default();
        config.search.page_size = page_size;
        config.search.max_result_window = window;
        config.indexing.workers = workers;
        let err = config.validate().unwrap_err();
        match &*err {
            ErrorKind::Invalid { field: f, .. } => assert_eq!(*f, field),
            other => panic!("unexpected error: {other}"),
        }
    }
}
