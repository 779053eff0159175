//! Configuration service for aya-client
//!
//! Global file, then the project file on top, then environment overrides.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::ConfigError;
use crate::models::config::ClientConfig;

#[async_trait]
pub trait ConfigService: Send + Sync {
    async fn load(&self, global_only: bool) -> Result<ClientConfig, ConfigError>;
    fn config_path(&self, global: bool) -> PathBuf;
    async fn init(&self, global: bool, force: bool) -> Result<PathBuf, ConfigError>;
}

pub struct DefaultConfigService {
    root: PathBuf,
}

impl DefaultConfigService {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    fn global_config_path() -> PathBuf {
        // XDG standard: ~/.config/aya-client/config.toml
        std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .ok()
            .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("aya-client")
            .join("config.toml")
    }

    fn project_config_path(&self) -> PathBuf {
        self.root.join(".aya").join("client.toml")
    }

    async fn read_table(path: &Path) -> Result<toml::Table, ConfigError> {
        if !path.exists() {
            return Ok(toml::Table::new());
        }
        let content = tokio::fs::read_to_string(path).await?;
        content
            .parse::<toml::Table>()
            .map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)))
    }

    async fn write_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let config = ClientConfig::default();
        let content =
            toml::to_string_pretty(&config).map_err(|e| ConfigError::Parse(e.to_string()))?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

#[async_trait]
impl ConfigService for DefaultConfigService {
    async fn load(&self, global_only: bool) -> Result<ClientConfig, ConfigError> {
        let mut table = Self::read_table(&Self::global_config_path()).await?;
        if !global_only {
            let project = Self::read_table(&self.project_config_path()).await?;
            merge_tables(&mut table, project);
        }

        let config: ClientConfig = toml::Value::Table(table)
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::Parse(e.to_string()))?;
        if global_only {
            return Ok(config);
        }
        apply_env_overrides(config, |key| std::env::var(key).ok())
    }

    fn config_path(&self, global: bool) -> PathBuf {
        if global {
            Self::global_config_path()
        } else {
            self.project_config_path()
        }
    }

    async fn init(&self, global: bool, force: bool) -> Result<PathBuf, ConfigError> {
        let path = self.config_path(global);

        if path.exists() && !force {
            return Err(ConfigError::InvalidValue {
                key: "config".to_string(),
                message: format!(
                    "Config already exists: {}. Use --force to overwrite.",
                    path.display()
                ),
            });
        }

        Self::write_default_config(&path).await?;
        Ok(path)
    }
}

/// Keys set in `overlay` win; nested tables merge key by key
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(nested)) => {
                merge_tables(existing, nested);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

fn apply_env_overrides(
    mut config: ClientConfig,
    var: impl Fn(&str) -> Option<String>,
) -> Result<ClientConfig, ConfigError> {
    if let Some(val) = var("AYA_LSP_MODE") {
        config.lsp.mode = val.parse().map_err(|message| ConfigError::InvalidValue {
            key: "AYA_LSP_MODE".to_string(),
            message,
        })?;
    }
    if let Some(val) = var("AYA_LSP_HOST") {
        config.lsp.host = val;
    }
    if let Some(val) = var("AYA_LSP_PORT") {
        config.lsp.port = val.parse().map_err(|e| ConfigError::InvalidValue {
            key: "AYA_LSP_PORT".to_string(),
            message: format!("{}: {}", val, e),
        })?;
    }
    if let Some(val) = var("AYA_LSP_PATH") {
        config.lsp.path = Some(val);
    }
    if config.java.home.is_none() {
        config.java.home = var("JAVA_HOME").filter(|home| !home.is_empty());
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::TransportMode;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_project_overlay_merges_nested_keys() {
        let mut base: toml::Table = r#"
            [lsp]
            mode = "server"
            port = 4000
            [java]
            home = "/opt/jdk"
        "#
        .parse()
        .unwrap();
        let overlay: toml::Table = r#"
            [lsp]
            port = 5000
        "#
        .parse()
        .unwrap();

        merge_tables(&mut base, overlay);
        let config: ClientConfig = toml::Value::Table(base).try_into().unwrap();
        assert_eq!(config.lsp.mode, TransportMode::TcpServer);
        assert_eq!(config.lsp.port, 5000);
        assert_eq!(config.java.home.as_deref(), Some("/opt/jdk"));
    }

    #[test]
    fn test_env_overrides() {
        let config = apply_env_overrides(
            ClientConfig::default(),
            env(&[
                ("AYA_LSP_MODE", "debug"),
                ("AYA_LSP_PORT", "9999"),
                ("AYA_LSP_PATH", "/usr/local/bin/aya-lsp"),
                ("JAVA_HOME", "/env/jdk"),
            ]),
        )
        .unwrap();
        assert_eq!(config.lsp.mode, TransportMode::StdioSpawn);
        assert_eq!(config.lsp.port, 9999);
        assert_eq!(config.lsp.path.as_deref(), Some("/usr/local/bin/aya-lsp"));
        assert_eq!(config.java.home.as_deref(), Some("/env/jdk"));
    }

    #[test]
    fn test_configured_java_home_beats_env() {
        let mut config = ClientConfig::default();
        config.java.home = Some("/configured".into());
        let config = apply_env_overrides(config, env(&[("JAVA_HOME", "/env/jdk")])).unwrap();
        assert_eq!(config.java.home.as_deref(), Some("/configured"));
    }

    #[test]
    fn test_bad_env_values_are_rejected() {
        assert!(
            apply_env_overrides(ClientConfig::default(), env(&[("AYA_LSP_PORT", "lots")]))
                .is_err()
        );
        assert!(
            apply_env_overrides(ClientConfig::default(), env(&[("AYA_LSP_MODE", "pigeon")]))
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_init_writes_loadable_project_file() {
        let dir = TempDir::new().unwrap();
        let service = DefaultConfigService::new(dir.path());

        let path = service.init(false, false).await.unwrap();
        assert_eq!(path, dir.path().join(".aya").join("client.toml"));
        assert!(service.init(false, false).await.is_err());
        assert!(service.init(false, true).await.is_ok());

        let table = DefaultConfigService::read_table(&path).await.unwrap();
        let config: ClientConfig = toml::Value::Table(table).try_into().unwrap();
        assert_eq!(config, ClientConfig::default());
    }
}
