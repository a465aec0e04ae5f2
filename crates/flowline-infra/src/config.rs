//! Host configuration loader.
//!
//! Reads `flowline.toml` (from `$FLOWLINE_HOME` or `~/.flowline/` by
//! default) into [`FlowlineConfig`]. Falls back to defaults when the file is
//! missing or malformed.

use std::path::{Path, PathBuf};

use flowline_types::config::FlowlineConfig;

pub const CONFIG_FILE_NAME: &str = "flowline.toml";

/// Resolve the Flowline home directory.
///
/// Priority:
/// 1. `FLOWLINE_HOME` environment variable
/// 2. `~/.flowline`
/// 3. `.flowline` in the current directory
pub fn resolve_home_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("FLOWLINE_HOME") {
        return PathBuf::from(dir);
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".flowline");
    }
    PathBuf::from(".flowline")
}

pub fn default_config_path() -> PathBuf {
    resolve_home_dir().join(CONFIG_FILE_NAME)
}

/// Load configuration from `path`.
///
/// - Missing file: [`FlowlineConfig::default()`].
/// - Unreadable or unparseable file: logs a warning, returns the default.
pub async fn load_config(path: &Path) -> FlowlineConfig {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("no config found at {}, using defaults", path.display());
            return FlowlineConfig::default();
        }
        Err(err) => {
            tracing::warn!("failed to read {}: {err}, using defaults", path.display());
            return FlowlineConfig::default();
        }
    };

    match toml::from_str::<FlowlineConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("failed to parse {}: {err}, using defaults", path.display());
            FlowlineConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join(CONFIG_FILE_NAME)).await;
        assert_eq!(config, FlowlineConfig::default());
    }

    #[tokio::test]
    async fn valid_toml_is_parsed() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        tokio::fs::write(
            &path,
            r#"
workflows_dir = "workflows"

[engine]
max_delay_ms = 1000

[[agents]]
slug = "writer"
"#,
        )
        .await
        .unwrap();

        let config = load_config(&path).await;
        assert_eq!(config.engine.max_delay_ms, 1000);
        assert_eq!(config.workflows_dir, Some(PathBuf::from("workflows")));
        assert_eq!(config.agents[0].slug, "writer");
    }

    #[tokio::test]
    async fn invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        tokio::fs::write(&path, "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = load_config(&path).await;
        assert_eq!(config, FlowlineConfig::default());
    }

    #[test]
    fn default_config_path_ends_with_file_name() {
        assert!(default_config_path().ends_with(CONFIG_FILE_NAME));
    }
}
