use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use log::info;
use serde::{Deserialize, Serialize};

use crate::tls::{CertificateProfile, CertificateStore};

/// Config file picked up from the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "devhttps.toml";

/// Top-level server configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub tls: TlsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address (host:port)
    pub bind: String,
    /// Directory served at `/`
    pub static_dir: PathBuf,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8443".into(),
            static_dir: "static".into(),
            request_timeout_secs: 15,
        }
    }
}

/// What to do when the certificate exists but its key does not.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartialPairPolicy {
    /// Generate a fresh pair, overwriting the lone certificate.
    #[default]
    Regenerate,
    /// Leave the certificate alone and skip generation.
    Keep,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    pub common_name: String,
    pub organization: String,
    pub validity_days: u32,
    pub key_bits: usize,
    /// Check that an existing pair parses and shares a public key before
    /// trusting it. When false, presence of both files is enough.
    pub verify_existing_pair: bool,
    pub on_partial_pair: PartialPairPolicy,
}

impl Default for TlsConfig {
    fn default() -> Self {
        let profile = CertificateProfile::default();
        Self {
            cert_path: "localhost.crt".into(),
            key_path: "localhost.key".into(),
            common_name: profile.common_name,
            organization: profile.organization,
            validity_days: profile.validity_days,
            key_bits: profile.key_bits,
            verify_existing_pair: true,
            on_partial_pair: PartialPairPolicy::default(),
        }
    }
}

impl TlsConfig {
    pub fn profile(&self) -> CertificateProfile {
        CertificateProfile {
            common_name: self.common_name.clone(),
            organization: self.organization.clone(),
            validity_days: self.validity_days,
            key_bits: self.key_bits,
        }
    }

    pub fn store(&self) -> CertificateStore {
        CertificateStore::new(&self.cert_path, &self.key_path)
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if !(2048..=8192).contains(&self.tls.key_bits) {
            bail!("tls.key_bits must be between 2048 and 8192, got {}", self.tls.key_bits);
        }
        if self.tls.validity_days == 0 {
            bail!("tls.validity_days must be positive");
        }
        if self.tls.cert_path.as_os_str().is_empty() || self.tls.key_path.as_os_str().is_empty() {
            bail!("tls.cert_path and tls.key_path must not be empty");
        }
        if self.tls.cert_path == self.tls.key_path {
            bail!("tls.cert_path and tls.key_path must differ");
        }
        if self.server.request_timeout_secs == 0 {
            bail!("server.request_timeout_secs must be positive");
        }
        Ok(())
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let cfg: Config = toml::from_str(content).context("Failed to parse config")?;
        cfg.validate()?;
        Ok(cfg)
    }
}

/// Load the configuration.
///
/// An explicit path must exist. Without one, `devhttps.toml` in the working
/// directory is used when present, otherwise the built-in defaults.
pub fn load(explicit: Option<&Path>) -> Result<Config> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let path = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !path.exists() {
                info!("No {DEFAULT_CONFIG_FILE} found, using default configuration");
                return Ok(Config::default());
            }
            path
        }
    };

    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let cfg = Config::from_toml(&content)
        .with_context(|| format!("Invalid config file {}", path.display()))?;

    info!("Using config from: {}", path.display());
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let cfg = Config::from_toml("").unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.server.bind, "0.0.0.0:8443");
        assert_eq!(cfg.tls.cert_path, PathBuf::from("localhost.crt"));
        assert_eq!(cfg.tls.key_path, PathBuf::from("localhost.key"));
        assert_eq!(cfg.tls.key_bits, 2048);
        assert_eq!(cfg.tls.on_partial_pair, PartialPairPolicy::Regenerate);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = Config::from_toml(
            r#"
            [server]
            bind = "127.0.0.1:9443"

            [tls]
            organization = "Acme Dev"
            on_partial_pair = "keep"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.server.bind, "127.0.0.1:9443");
        assert_eq!(cfg.server.request_timeout_secs, 15);
        assert_eq!(cfg.tls.organization, "Acme Dev");
        assert_eq!(cfg.tls.common_name, "localhost");
        assert_eq!(cfg.tls.on_partial_pair, PartialPairPolicy::Keep);
    }

    #[test]
    fn weak_keys_are_rejected() {
        let err = Config::from_toml("[tls]\nkey_bits = 1024\n").unwrap_err();
        assert!(err.to_string().contains("key_bits"));
    }

    #[test]
    fn identical_artifact_paths_are_rejected() {
        let toml = "[tls]\ncert_path = \"both.pem\"\nkey_path = \"both.pem\"\n";
        assert!(Config::from_toml(toml).is_err());
    }

    #[test]
    fn unknown_policy_is_a_parse_error() {
        assert!(Config::from_toml("[tls]\non_partial_pair = \"ignore\"\n").is_err());
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to read config file"));
    }

    #[test]
    fn explicit_file_is_loaded() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("dev.toml");
        fs::write(&path, "[server]\nstatic_dir = \"public\"\n").unwrap();

        let cfg = load(Some(&path)).unwrap();
        assert_eq!(cfg.server.static_dir, PathBuf::from("public"));
    }
}
