// Configuration validation
use crate::error::{ConfigError, Result};
use crate::GatewayConfig;

pub const MAX_RETENTION_DAYS: u32 = 3650;

pub trait ConfigValidator {
    fn validate(&self) -> Result<()>;
}

impl ConfigValidator for GatewayConfig {
    fn validate(&self) -> Result<()> {
        if self.retention_days == 0 || self.retention_days > MAX_RETENTION_DAYS {
            return Err(ConfigError::ValidationError(format!(
                "retention_days must be between 1 and {MAX_RETENTION_DAYS}, got {}",
                self.retention_days
            )));
        }

        if self.cm_version.trim().is_empty() || self.pt_version.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "cm_version and pt_version must not be empty".to_string(),
            ));
        }

        // Dienstkennung has the form <service>;<usage>;<version>
        let parts: Vec<&str> = self.dienstkennung.split(';').collect();
        if parts.len() != 3 || parts.iter().any(|p| p.trim().is_empty()) {
            return Err(ConfigError::ValidationError(format!(
                "dienstkennung must have three ';'-separated parts: {}",
                self.dienstkennung
            )));
        }

        if let Some(sender) = &self.dsn.sender {
            if !sender.contains('@') {
                return Err(ConfigError::ValidationError(format!(
                    "dsn.sender is not a mail address: {sender}"
                )));
            }
        }

        if self.logging.log_level.trim().is_empty() {
            return Err(ConfigError::ValidationError("logging.log_level must not be empty".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(GatewayConfig::default().validate().is_ok());
    }

    #[test]
    fn test_retention_bounds() {
        let mut config = GatewayConfig::default();
        config.retention_days = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
        config.retention_days = MAX_RETENTION_DAYS + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_dienstkennung_shape() {
        let mut config = GatewayConfig::default();
        config.dienstkennung = "KIM-Mail;Default".to_string();
        assert!(config.validate().is_err());
        config.dienstkennung = "KIM-Mail;eAU;V1.0".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_dsn_sender_must_be_address() {
        let mut config = GatewayConfig::default();
        config.dsn.sender = Some("postmaster".to_string());
        assert!(config.validate().is_err());
    }
}
