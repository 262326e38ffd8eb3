use std::path::PathBuf;

use thiserror::Error;

/// Failures that abort certificate bootstrap. None of them are retried; the
/// server must not start listening when one occurs.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// The host's interface list could not be read at all.
    #[error("could not get network interfaces: {0}")]
    InterfaceEnumeration(#[source] std::io::Error),

    #[error("error generating private key: {0}")]
    KeyGeneration(String),

    #[error("error creating certificate: {0}")]
    CertificateCreation(String),

    #[error("error writing {}: {source}", path.display())]
    ArtifactWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, BootstrapError>;
