// Configuration file parser

//! Configuration file parsing and validation
//!
//! This module handles loading TOML configuration files and validating
//! their contents, including shell-safety checks on names that end up as
//! arguments to privileged executables.

use crate::types::Config;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Load configuration from TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let contents = fs::read_to_string(path.as_ref()).context("Failed to read config file")?;

    let config: Config = toml::from_str(&contents).context("Failed to parse config file")?;

    validate_config(&config)?;
    Ok(config)
}

/// Validates that a name (interface, identity, account) is safe to pass to
/// privileged executables. Only allows alphanumeric characters, hyphens,
/// and underscores to prevent command injection.
pub fn validate_name(name: &str, field_name: &str) -> Result<()> {
    if name.is_empty() {
        anyhow::bail!("{} cannot be empty", field_name);
    }

    // Check for valid characters: alphanumeric, hyphen, underscore
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        anyhow::bail!(
            "{} contains invalid characters: '{}'. Only alphanumeric, hyphens, and underscores are allowed",
            field_name,
            name
        );
    }

    Ok(())
}

/// Validate configuration values
fn validate_config(config: &Config) -> Result<()> {
    validate_name(&config.general.wg_interface, "wg_interface")?;

    if config.proxy.tail_lines == 0 {
        anyhow::bail!("proxy.tail_lines must be > 0");
    }

    if config.purge.inactive_days < 0 {
        anyhow::bail!("purge.inactive_days must be >= 0");
    }

    if config.purge.interval_secs == 0 {
        anyhow::bail!("purge.interval_secs must be > 0");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GeneralConfig, ProxyConfig, PurgeConfig};
    use std::path::PathBuf;

    fn base_config() -> Config {
        Config {
            general: GeneralConfig {
                wg_interface: "wg0".to_string(),
                storage_dir: PathBuf::from("/tmp/peers"),
                log_level: "info".to_string(),
            },
            proxy: ProxyConfig::default(),
            purge: PurgeConfig::default(),
        }
    }

    #[test]
    fn test_validate_config_ok() {
        assert!(validate_config(&base_config()).is_ok());
    }

    #[test]
    fn test_validate_config_empty_interface() {
        let mut config = base_config();
        config.general.wg_interface = "".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_config_zero_tail_lines() {
        let mut config = base_config();
        config.proxy.tail_lines = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_config_negative_days() {
        let mut config = base_config();
        config.purge.inactive_days = -1;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_config_zero_interval() {
        let mut config = base_config();
        config.purge.interval_secs = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_name_valid() {
        assert!(validate_name("wg0", "test").is_ok());
        assert!(validate_name("my-vpn", "test").is_ok());
        assert!(validate_name("my_vpn", "test").is_ok());
        assert!(validate_name("Peer-User_123", "test").is_ok());
    }

    #[test]
    fn test_validate_name_invalid_special_chars() {
        assert!(validate_name("wg0; rm -rf /", "test").is_err());
        assert!(validate_name("wg0 && echo pwned", "test").is_err());
        assert!(validate_name("$(malicious)", "test").is_err());
        assert!(validate_name("`whoami`", "test").is_err());
        assert!(validate_name("user:pw", "test").is_err());
        assert!(validate_name("user/../../etc", "test").is_err());
        assert!(validate_name("wg0\ntest", "test").is_err());
    }

    #[test]
    fn test_validate_name_empty() {
        assert!(validate_name("", "test").is_err());
    }

    #[test]
    fn test_load_config_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
            [general]
            wg_interface = "wg0"

            [purge]
            inactive_days = 14
            "#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.general.wg_interface, "wg0");
        assert_eq!(config.purge.inactive_days, 14);
    }

    #[test]
    fn test_load_config_missing_file() {
        assert!(load_config("/nonexistent/config.toml").is_err());
    }

    #[test]
    fn test_load_config_rejects_unsafe_interface() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
            [general]
            wg_interface = "wg0; reboot"
            "#,
        )
        .unwrap();

        assert!(load_config(&path).is_err());
    }
}
