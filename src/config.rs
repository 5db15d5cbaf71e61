//! Client configuration
//!
//! Every field has a default, so a configuration file only needs to list what differs:
//!
//! ```
//! let cfg = uds_client::config::ClientConfig::from_json(r#"{"interface": "vcan0"}"#).unwrap();
//! assert_eq!(cfg.interface, "vcan0");
//! assert_eq!(cfg.transaction.response_timeout_ms, 7000);
//! ```

use serde::{Deserialize, Serialize};

use crate::{
    channel::{EcuBinding, IsoTPSettings},
    uds::TransactionSettings,
};

/// Configuration of a diagnostic client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// CAN interface name
    pub interface: String,
    /// ISO-TP options
    pub iso_tp: IsoTPSettings,
    /// Transaction timing
    pub transaction: TransactionSettings,
    /// ECU to bind to when no profile is used
    pub binding: EcuBinding,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            interface: "can0".to_string(),
            iso_tp: IsoTPSettings::default(),
            transaction: TransactionSettings::default(),
            binding: EcuBinding::default(),
        }
    }
}

impl ClientConfig {
    /// Parses a configuration from JSON
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Reads a configuration file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> std::io::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::from_json(&text)?)
    }
}
