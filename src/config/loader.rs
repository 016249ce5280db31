//! Configuration loading from disk.

use std::path::Path;

use crate::config::schema::RpcServerConfig;
use crate::config::validation::validate_config;
use crate::error::ConfigError;

/// Load and validate a configuration snapshot from a TOML file.
///
/// Any failure here is fatal to startup; nothing is retried.
pub fn load_config(path: &Path) -> Result<RpcServerConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: RpcServerConfig = toml::from_str(&content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    tracing::info!(
        path = %path.display(),
        policy = ?config.trust_policy(),
        tls = config.tls.is_some(),
        "Configuration loaded"
    );

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_config(Path::new("/nonexistent/rpclink.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
