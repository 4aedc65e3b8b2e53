//! Layered configuration for the KIM gateway
//!
//! Values are resolved in order, later sources overriding earlier ones:
//! - **Defaults**: `GatewayConfig::default()`
//! - **File**: YAML or TOML, selected by extension
//! - **Environment**: `KIM_GATEWAY_` prefixed variables, `__` separating nested keys
//!   (e.g. `KIM_GATEWAY_DSN__REPORTING_MTA`)
//!
//! # Example
//!
//! ```rust,no_run
//! use config_engine::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .with_file("/etc/kim-gateway/gateway.yaml")
//!     .load()?;
//! println!("local KOM-LE version {}", config.komle_version);
//! # Ok::<(), config_engine::ConfigError>(())
//! ```

pub mod error;
pub mod providers;
pub mod validation;
pub mod version;

pub use error::*;
pub use providers::*;
pub use validation::*;
pub use version::*;

use logger_redacted::LoggerConfig;
use serde::{Deserialize, Serialize};

pub const DEFAULT_DIENSTKENNUNG: &str = "KIM-Mail;Default;V1.5";
pub const DEFAULT_RETENTION_DAYS: u32 = 90;

/// Gateway settings shared by the sending and receiving pipelines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// KOM-LE version this gateway speaks.
    pub komle_version: KomLeVersion,
    /// Days until a sent mail expires, unless the account overrides it.
    pub retention_days: u32,
    /// Client module version written to `X-KIM-CMVersion`.
    pub cm_version: String,
    /// Primary system version written to `X-KIM-PTVersion`.
    pub pt_version: String,
    /// `X-KIM-Dienstkennung` used when the origin mail carries none.
    pub dienstkennung: String,
    pub dsn: DsnConfig,
    pub logging: LoggerConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            komle_version: KomLeVersion::V1_5Plus,
            retention_days: DEFAULT_RETENTION_DAYS,
            cm_version: "1.5.1".to_string(),
            pt_version: "1.5.1".to_string(),
            dienstkennung: DEFAULT_DIENSTKENNUNG.to_string(),
            dsn: DsnConfig::default(),
            logging: LoggerConfig::default(),
        }
    }
}

/// Delivery status notification settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DsnConfig {
    /// `From` of generated notifications; the postmaster of the origin domain when unset.
    pub sender: Option<String>,
    /// `Reporting-MTA` name; the host name when unset.
    pub reporting_mta: Option<String>,
}
