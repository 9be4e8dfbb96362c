use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use tracing::Level;

use crate::models::converter_model::ConverterConfig;

static CONFIG_CACHE: OnceLock<ConverterConfig> = OnceLock::new();

/// Load the converter config once; without a path the defaults are used.
pub fn init_config(path: Option<&Path>) -> Result<&'static ConverterConfig, String> {
    let config = match path {
        Some(file_path) => {
            let data = fs::read_to_string(file_path)
                .map_err(|e| format!("File read Error: {e} {}", file_path.display()))?;
            parse_config(&data)?
        }
        None => ConverterConfig::default(),
    };

    if let Some(interval) = config.reference_interval_secs {
        if interval <= 0 {
            return Err(format!("reference_interval_secs must be positive, got {interval}"));
        }
    }

    CONFIG_CACHE
        .set(config)
        .map_err(|_| "Config already initialized".to_string())?;

    Ok(get_cached_config())
}

pub fn parse_config(data: &str) -> Result<ConverterConfig, String> {
    serde_json::from_str(data).map_err(|e| format!("JSON Parse Error: {e}"))
}

pub fn get_cached_config() -> &'static ConverterConfig {
    CONFIG_CACHE.get_or_init(ConverterConfig::default)
}

pub fn log_level(config: &ConverterConfig, verbose: bool) -> Level {
    if verbose {
        return Level::DEBUG;
    }
    config.log_level.parse().unwrap_or(Level::INFO)
}
