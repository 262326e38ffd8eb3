//! On-disk certificate/key pair.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use rsa::RsaPrivateKey;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::traits::PublicKeyParts;
use tempfile::NamedTempFile;
use x509_parser::public_key::PublicKey;

use super::error::{BootstrapError, Result};
use super::materialize::{CERTIFICATE_TAG, GeneratedCertificate, PRIVATE_KEY_TAG};

/// What the store found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairState {
    /// Both files present (and, when verified, belonging together).
    Complete,
    /// Neither file present.
    Absent,
    /// Certificate present, key missing.
    CertificateOnly,
    /// Key present, certificate missing.
    KeyOnly,
    /// Both present but unreadable or not from the same key.
    Mismatched(String),
}

enum PairCheck {
    Matched,
    /// Parsed fine but not an RSA pair, so the keys cannot be compared.
    Unverifiable(&'static str),
}

/// Label of an unencrypted PKCS#8 key, as written by openssl and mkcert.
const PKCS8_PRIVATE_KEY_TAG: &str = "PRIVATE KEY";

/// Fixed-path certificate and key artifacts.
#[derive(Debug, Clone)]
pub struct CertificateStore {
    cert_path: PathBuf,
    key_path: PathBuf,
}

impl CertificateStore {
    pub fn new(cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        Self {
            cert_path: cert_path.into(),
            key_path: key_path.into(),
        }
    }

    pub fn cert_path(&self) -> &Path {
        &self.cert_path
    }

    pub fn key_path(&self) -> &Path {
        &self.key_path
    }

    /// True only if both files are present. Contents are not examined.
    pub fn exists(&self) -> bool {
        self.cert_path.exists() && self.key_path.exists()
    }

    /// Classify the artifacts on disk. With `verify_pair`, a complete pair is
    /// additionally checked for matching PEM labels and public key.
    pub fn probe(&self, verify_pair: bool) -> PairState {
        match (self.cert_path.exists(), self.key_path.exists()) {
            (false, false) => PairState::Absent,
            (true, false) => PairState::CertificateOnly,
            (false, true) => PairState::KeyOnly,
            (true, true) if !verify_pair => PairState::Complete,
            (true, true) => match self.verify_pair() {
                Ok(PairCheck::Matched) => PairState::Complete,
                Ok(PairCheck::Unverifiable(why)) => {
                    log::debug!("Keeping existing certificate pair unverified: {why}");
                    PairState::Complete
                }
                Err(e) => {
                    log::debug!("Existing certificate pair failed verification: {e:#}");
                    PairState::Mismatched(format!("{e:#}"))
                }
            },
        }
    }

    fn verify_pair(&self) -> anyhow::Result<PairCheck> {
        let cert_block = read_block(&self.cert_path)?;
        if cert_block.tag() != CERTIFICATE_TAG {
            return Err(unexpected_tag(&self.cert_path, &cert_block, CERTIFICATE_TAG));
        }
        let (_, cert) = x509_parser::parse_x509_certificate(cert_block.contents())
            .context("Failed to parse X.509 certificate")?;
        let parsed = cert
            .public_key()
            .parsed()
            .context("Failed to parse certificate public key")?;
        let PublicKey::RSA(cert_key) = parsed else {
            return Ok(PairCheck::Unverifiable("certificate key is not RSA"));
        };

        let key_block = read_block(&self.key_path)?;
        let key = match key_block.tag() {
            PRIVATE_KEY_TAG => RsaPrivateKey::from_pkcs1_der(key_block.contents())
                .context("Failed to parse PKCS#1 private key")?,
            PKCS8_PRIVATE_KEY_TAG => RsaPrivateKey::from_pkcs8_der(key_block.contents())
                .context("Failed to parse PKCS#8 RSA private key")?,
            _ => return Err(unexpected_tag(&self.key_path, &key_block, PRIVATE_KEY_TAG)),
        };

        if strip_leading_zeros(cert_key.modulus) != key.n().to_bytes_be().as_slice() {
            return Err(anyhow!("certificate public key does not match private key"));
        }
        Ok(PairCheck::Matched)
    }

    /// Write both artifacts. Each file is replaced atomically, the key before
    /// the certificate.
    pub fn persist(&self, generated: &GeneratedCertificate) -> Result<()> {
        write_atomic(&self.key_path, generated.key_pem.as_bytes(), true)?;
        write_atomic(&self.cert_path, generated.cert_pem.as_bytes(), false)?;
        Ok(())
    }
}

fn read_block(path: &Path) -> anyhow::Result<pem::Pem> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    pem::parse(content).with_context(|| format!("Failed to parse PEM in {}", path.display()))
}

fn unexpected_tag(path: &Path, block: &pem::Pem, expected: &str) -> anyhow::Error {
    anyhow!(
        "{} holds a {} block, expected {expected}",
        path.display(),
        block.tag()
    )
}

fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

fn write_atomic(path: &Path, contents: &[u8], private: bool) -> Result<()> {
    let write_err = |source: std::io::Error| BootstrapError::ArtifactWrite {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(write_err)?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(contents).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let mode = if private { 0o600 } else { 0o644 };
        fs::set_permissions(tmp.path(), fs::Permissions::from_mode(mode)).map_err(write_err)?;
    }
    #[cfg(not(unix))]
    let _ = private;

    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}
