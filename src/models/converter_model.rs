use gpy::WriterConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Seconds between forced reference records; null keeps the writer
    /// purely overflow driven.
    pub reference_interval_secs: Option<i64>,
    pub csv_delimiter: char,
    pub log_level: String,
    pub device: DeviceDefaults,
}

/// Header strings used when a .gpy file is built from CSV.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceDefaults {
    pub description: String,
    pub serial_number: String,
    pub firmware_version: String,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            reference_interval_secs: None,
            csv_delimiter: ',',
            log_level: "info".to_string(),
            device: DeviceDefaults::default(),
        }
    }
}

impl Default for DeviceDefaults {
    fn default() -> Self {
        Self {
            description: "File".to_string(),
            serial_number: "unknown".to_string(),
            firmware_version: "gpy".to_string(),
        }
    }
}

impl ConverterConfig {
    pub fn writer_config(&self) -> WriterConfig {
        WriterConfig {
            reference_interval_secs: self.reference_interval_secs,
        }
    }
}
