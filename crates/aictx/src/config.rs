//! Configuration loading.
//!
//! Configuration is merged from several sources, later ones winning:
//! 1. Global config: `~/.config/aictx/config.json` (or the platform config dir)
//! 2. Environment variable: `AICTX_CONFIG_CONTENT`
//! 3. Project config: `aictx.jsonc` or `aictx.json` at the project root
//! 4. Environment overrides: `AICTX_KEEP_COUNT`, `AICTX_STORAGE_DIR`
//!
//! Files may contain `//` and `/* */` comments.

use aictx_snapshot::SnapshotConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

const CONTENT_ENV: &str = "AICTX_CONFIG_CONTENT";
const KEEP_COUNT_ENV: &str = "AICTX_KEEP_COUNT";
const STORAGE_DIR_ENV: &str = "AICTX_STORAGE_DIR";

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {message}")]
    InvalidJson { path: String, message: String },

    #[error("Invalid value for {name}: {value}")]
    InvalidEnv { name: String, value: String },
}

/// One configuration source. Unset fields leave earlier values alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigLayer {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_dir: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_count: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_cleanup: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff_preview_lines: Option<usize>,

    /// Default log filter level (`error`, `warn`, `info`, `debug`, `trace`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl ConfigLayer {
    /// Merge another layer into this one (other takes precedence).
    pub fn merge(mut self, other: Self) -> Self {
        if other.storage_dir.is_some() {
            self.storage_dir = other.storage_dir;
        }
        if other.keep_count.is_some() {
            self.keep_count = other.keep_count;
        }
        if other.auto_cleanup.is_some() {
            self.auto_cleanup = other.auto_cleanup;
        }
        if other.diff_preview_lines.is_some() {
            self.diff_preview_lines = other.diff_preview_lines;
        }
        if other.log_level.is_some() {
            self.log_level = other.log_level;
        }
        self
    }

    /// Parse JSONC (JSON with comments).
    pub fn parse_jsonc(content: &str, source: &str) -> Result<Self, ConfigError> {
        let stripped = strip_comments(content);
        if stripped.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_json::from_str(&stripped).map_err(|e| ConfigError::InvalidJson {
            path: source.to_string(),
            message: e.to_string(),
        })
    }

    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse_jsonc(&content, &path.display().to_string())
    }
}

/// Resolved configuration for the CLI.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub snapshot: SnapshotConfig,
    pub log_level: Option<String>,
}

impl Config {
    /// Load configuration for a project, returning it with the files read.
    pub fn load(project_root: &Path) -> Result<(Self, Vec<PathBuf>), ConfigError> {
        let mut layer = ConfigLayer::default();
        let mut sources = Vec::new();

        // 1. Global config
        if let Some(global_dir) = global_config_dir() {
            if let Some(path) = first_existing(&global_dir, &["config.json", "aictx.jsonc", "aictx.json"]) {
                layer = layer.merge(ConfigLayer::load_file(&path)?);
                sources.push(path);
            }
        }

        // 2. Environment content
        if let Ok(content) = std::env::var(CONTENT_ENV) {
            layer = layer.merge(ConfigLayer::parse_jsonc(&content, "<env>")?);
        }

        // 3. Project config
        if let Some(path) = first_existing(project_root, &["aictx.jsonc", "aictx.json"]) {
            layer = layer.merge(ConfigLayer::load_file(&path)?);
            sources.push(path);
        }

        // 4. Single-value overrides
        layer = layer.merge(env_overrides(|name| std::env::var(name).ok())?);

        Ok((Self::from_layer(layer), sources))
    }

    /// Apply a merged layer over the defaults.
    pub fn from_layer(layer: ConfigLayer) -> Self {
        let mut snapshot = SnapshotConfig::default();
        if let Some(storage_dir) = layer.storage_dir {
            snapshot.storage_dir = storage_dir;
        }
        if let Some(keep_count) = layer.keep_count {
            snapshot.keep_count = keep_count;
        }
        if let Some(auto_cleanup) = layer.auto_cleanup {
            snapshot.auto_cleanup = auto_cleanup;
        }
        if let Some(lines) = layer.diff_preview_lines {
            snapshot.diff_preview_lines = lines;
        }

        Self {
            snapshot,
            log_level: layer.log_level,
        }
    }
}

/// Get the global config directory.
///
/// On Unix, prefers `~/.config/aictx` when it exists.
pub fn global_config_dir() -> Option<PathBuf> {
    #[cfg(unix)]
    {
        if let Some(home) = dirs::home_dir() {
            let xdg_config = home.join(".config").join("aictx");
            if xdg_config.exists() {
                return Some(xdg_config);
            }
        }
    }

    dirs::config_dir().map(|d| d.join("aictx"))
}

fn first_existing(dir: &Path, names: &[&str]) -> Option<PathBuf> {
    names.iter().map(|name| dir.join(name)).find(|path| path.is_file())
}

fn env_overrides(get: impl Fn(&str) -> Option<String>) -> Result<ConfigLayer, ConfigError> {
    let mut layer = ConfigLayer::default();

    if let Some(value) = get(KEEP_COUNT_ENV) {
        let keep_count = value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
            name: KEEP_COUNT_ENV.to_string(),
            value: value.clone(),
        })?;
        layer.keep_count = Some(keep_count);
    }
    if let Some(value) = get(STORAGE_DIR_ENV).filter(|v| !v.trim().is_empty()) {
        layer.storage_dir = Some(PathBuf::from(value));
    }

    Ok(layer)
}

/// Strip JSON comments, leaving string contents alone.
fn strip_comments(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;
    let mut escape_next = false;

    while let Some(c) = chars.next() {
        if escape_next {
            result.push(c);
            escape_next = false;
            continue;
        }

        if c == '\\' && in_string {
            result.push(c);
            escape_next = true;
            continue;
        }

        if c == '"' {
            in_string = !in_string;
            result.push(c);
            continue;
        }

        if in_string {
            result.push(c);
            continue;
        }

        if c == '/' {
            match chars.peek() {
                Some('/') => {
                    chars.next();
                    for c in chars.by_ref() {
                        if c == '\n' {
                            result.push('\n');
                            break;
                        }
                    }
                    continue;
                }
                Some('*') => {
                    chars.next();
                    let mut prev = ' ';
                    for c in chars.by_ref() {
                        if prev == '*' && c == '/' {
                            break;
                        }
                        // Keep line numbers stable for error messages
                        if c == '\n' {
                            result.push('\n');
                        }
                        prev = c;
                    }
                    continue;
                }
                _ => {}
            }
        }

        result.push(c);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use aictx_test_utils::TestProject;
    use std::collections::HashMap;

    #[test]
    fn test_strip_comments() {
        let input = r#"{
            // keep a few
            "keep_count": 3, /* inline */
            "storage_dir": "dir//not-a-comment"
        }"#;
        let layer = ConfigLayer::parse_jsonc(input, "test").unwrap();

        assert_eq!(layer.keep_count, Some(3));
        assert_eq!(layer.storage_dir, Some(PathBuf::from("dir//not-a-comment")));
    }

    #[test]
    fn test_invalid_json_names_source() {
        let err = ConfigLayer::parse_jsonc("{ keep_count: }", "aictx.json").unwrap_err();
        assert!(err.to_string().contains("aictx.json"));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        assert!(ConfigLayer::parse_jsonc(r#"{"keep": 3}"#, "test").is_err());
    }

    #[test]
    fn test_empty_content_is_default() {
        let layer = ConfigLayer::parse_jsonc("// nothing here\n", "test").unwrap();
        assert_eq!(layer, ConfigLayer::default());
    }

    #[test]
    fn test_merge_prefers_later_layer() {
        let base = ConfigLayer {
            keep_count: Some(5),
            auto_cleanup: Some(true),
            ..Default::default()
        };
        let project = ConfigLayer {
            keep_count: Some(2),
            ..Default::default()
        };

        let merged = base.merge(project);
        assert_eq!(merged.keep_count, Some(2));
        assert_eq!(merged.auto_cleanup, Some(true));
    }

    #[test]
    fn test_from_layer_applies_defaults() {
        let config = Config::from_layer(ConfigLayer {
            diff_preview_lines: Some(10),
            log_level: Some("debug".to_string()),
            ..Default::default()
        });

        assert_eq!(config.snapshot.keep_count, 10);
        assert_eq!(config.snapshot.diff_preview_lines, 10);
        assert_eq!(config.snapshot.storage_dir, PathBuf::from(".ai-context"));
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_project_file_is_read() {
        let project = TestProject::new()
            .with_file("aictx.jsonc", "{\n  // retention\n  \"keep_count\": 4\n}")
            .build();

        let path = first_existing(project.path(), &["aictx.jsonc", "aictx.json"]).unwrap();
        let layer = ConfigLayer::load_file(&path).unwrap();

        assert_eq!(layer.keep_count, Some(4));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> =
            HashMap::from([(KEEP_COUNT_ENV, " 7 "), (STORAGE_DIR_ENV, "/tmp/snapshots")]);
        let layer = env_overrides(|name| vars.get(name).map(|v| v.to_string())).unwrap();

        assert_eq!(layer.keep_count, Some(7));
        assert_eq!(layer.storage_dir, Some(PathBuf::from("/tmp/snapshots")));
    }

    #[test]
    fn test_invalid_env_override() {
        let err = env_overrides(|name| (name == KEEP_COUNT_ENV).then(|| "many".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { .. }));
    }
}
