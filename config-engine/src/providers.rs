// Configuration providers: defaults, file and environment layered with figment
use figment::{
    providers::{Env, Format, Serialized, Toml, Yaml},
    Figment,
};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result};
use crate::validation::ConfigValidator;
use crate::GatewayConfig;

pub const ENV_PREFIX: &str = "KIM_GATEWAY_";

#[derive(Debug, Clone)]
pub struct ConfigLoader {
    file: Option<PathBuf>,
    env_prefix: String,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            file: None,
            env_prefix: ENV_PREFIX.to_string(),
        }
    }

    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        self.file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Builds the layered figment without extracting it.
    pub fn figment(&self) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(GatewayConfig::default()));

        if let Some(path) = &self.file {
            if !path.exists() {
                return Err(ConfigError::SourceNotFound(path.clone()));
            }
            let extension = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(str::to_ascii_lowercase)
                .unwrap_or_default();
            figment = match extension.as_str() {
                "yaml" | "yml" => figment.merge(Yaml::file(path)),
                "toml" => figment.merge(Toml::file(path)),
                other => return Err(ConfigError::UnsupportedFormat(other.to_string())),
            };
        }

        Ok(figment.merge(Env::prefixed(&self.env_prefix).split("__")))
    }

    /// Loads and validates the configuration.
    pub fn load(&self) -> Result<GatewayConfig> {
        let config: GatewayConfig = self.figment()?.extract()?;
        config.validate()?;
        tracing::debug!(
            komle_version = %config.komle_version,
            retention_days = config.retention_days,
            file = ?self.file,
            "gateway configuration loaded"
        );
        Ok(config)
    }
}
