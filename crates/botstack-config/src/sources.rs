// Configuration source loading.
//
// Priority order:
// 1. Environment variables (BOTSTACK_* prefix)
// 2. Config file path from BOTSTACK_CONFIG
// 3. Inline config content from BOTSTACK_CONFIG_CONTENT
// 4. Default config files (./botstack.toml, ./.botstack.toml)
// 5. Built-in defaults

use crate::env_overrides::{self, EnvSource, ENV_PREFIX};
use crate::StackConfig;
use anyhow::{Context, Result};
use std::env;
use std::path::Path;
use tracing::debug;

const DEFAULT_PATHS: &[&str] = &["./botstack.toml", "./.botstack.toml"];

/// Load configuration using native environment/file access.
pub fn load_config() -> Result<StackConfig> {
    let mut config = StackConfig::default();

    if let Some(file_config) = load_from_file()? {
        config.merge(file_config);
    }

    env_overrides::apply_env_overrides(&mut config, &StdEnvSource)?;
    config.validate()?;
    Ok(config)
}

fn load_from_file() -> Result<Option<StackConfig>> {
    if let Ok(path) = env::var("BOTSTACK_CONFIG") {
        debug!(path = %path, "Loading config from BOTSTACK_CONFIG");
        return read_toml(Path::new(&path)).map(Some);
    }

    if let Ok(content) = env::var("BOTSTACK_CONFIG_CONTENT") {
        let config: StackConfig = toml::from_str(&content)
            .context("Failed to parse inline config from BOTSTACK_CONFIG_CONTENT")?;
        return Ok(Some(config));
    }

    for path in DEFAULT_PATHS {
        let path = Path::new(path);
        if path.exists() {
            debug!(path = %path.display(), "Loading config from default location");
            return read_toml(path).map(Some);
        }
    }

    Ok(None)
}

fn read_toml(path: &Path) -> Result<StackConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Load configuration from a specific file path (for CLI --config flag).
/// Returns error if file doesn't exist or can't be parsed.
pub fn load_from_file_path(path: impl AsRef<Path>) -> Result<StackConfig> {
    let file_config = read_toml(path.as_ref())?;

    let mut config = StackConfig::default();
    config.merge(file_config);

    env_overrides::apply_env_overrides(&mut config, &StdEnvSource)?;
    config.validate()?;
    Ok(config)
}

struct StdEnvSource;

impl EnvSource for StdEnvSource {
    fn get(&self, key: &str) -> Option<String> {
        env::var(format!("{}{}", ENV_PREFIX, key)).ok()
    }

    fn get_raw(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn read_toml_reports_path_on_parse_failure() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[logging]\nretention_days = \"forever\"").unwrap();

        let err = read_toml(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse config file"));
    }

    #[test]
    fn read_toml_missing_file() {
        let err = read_toml(Path::new("/nonexistent/botstack.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
