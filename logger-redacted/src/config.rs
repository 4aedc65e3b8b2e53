// Logger configuration
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub redaction_enabled: bool,
    pub log_level: String,
    /// JSON lines instead of the human readable format.
    pub json: bool,
    /// Directory for daily rolling log files. Logs go to stdout when unset.
    pub log_dir: Option<PathBuf>,
    pub file_prefix: String,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            redaction_enabled: true,
            log_level: "info".to_string(),
            json: false,
            log_dir: None,
            file_prefix: "kim-gateway.log".to_string(),
        }
    }
}
