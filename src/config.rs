use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};

/// How the probe obtains the directory listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ListingMode {
    /// Send `LIST` as a raw command and report the control-channel reply
    #[default]
    Raw,
    /// Run `LIST` over a data connection and report the listing itself
    Data,
}

/// Everything the probe needs to know about the server and what to send it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProbeConfig {
    pub host: String,
    pub port: u16,
    /// Connect and reply timeout in seconds
    pub timeout_secs: u64,
    pub user: String,
    pub password: String,
    pub directory: String,
    pub passive: bool,
    /// Trust the address in PASV replies instead of the control peer address
    pub use_pasv_address: bool,
    /// Raw command announcing the transfer type
    pub type_command: String,
    pub listing: ListingMode,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 9090,
            timeout_secs: 10,
            user: "jt".to_string(),
            password: "test".to_string(),
            directory: "/".to_string(),
            passive: true,
            use_pasv_address: false,
            type_command: "TYPE I".to_string(),
            listing: ListingMode::Raw,
        }
    }
}

impl ProbeConfig {
    /// Reads a JSON config file; fields it omits keep their defaults
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.host.trim().is_empty() {
            bail!("host must not be empty");
        }
        if self.timeout_secs == 0 {
            bail!("timeout must be at least one second");
        }
        if self.type_command.trim().is_empty() {
            bail!("type command must not be empty");
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_local_test_server() {
        let config = ProbeConfig::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 9090);
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert_eq!(config.user, "jt");
        assert_eq!(config.password, "test");
        assert_eq!(config.type_command, "TYPE I");
        assert!(!config.use_pasv_address);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"port": 2121, "listing": "data"}}"#).unwrap();

        let config = ProbeConfig::load(file.path()).unwrap();
        assert_eq!(config.port, 2121);
        assert_eq!(config.listing, ListingMode::Data);
        assert_eq!(config.host, "localhost");
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"hostname": "example.com"}}"#).unwrap();

        let err = ProbeConfig::load(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("hostname"));
    }

    #[test]
    fn zero_timeout_is_invalid() {
        let config = ProbeConfig {
            timeout_secs: 0,
            ..ProbeConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = ProbeConfig::load(Path::new("/nonexistent/ftp-probe.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/ftp-probe.json"));
    }
}
