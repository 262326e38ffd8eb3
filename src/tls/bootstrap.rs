//! Startup sequence guaranteeing a certificate/key pair exists before the
//! HTTPS listener binds.

use log::{info, warn};
use time::OffsetDateTime;

use super::error::Result;
use super::identity::{self, IdentitySet, InterfaceTable, SystemInterfaces};
use super::materialize;
use super::store::{CertificateStore, PairState};
use crate::config::{PartialPairPolicy, TlsConfig};

/// How a bootstrap run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// A usable pair was already on disk and left untouched.
    AlreadyPresent,
    /// Only the certificate exists and the policy says to leave it alone.
    KeptPartial,
    /// A new pair was generated for these identities and written.
    Generated(IdentitySet),
}

pub struct CertificateBootstrap<'a, T = SystemInterfaces> {
    config: &'a TlsConfig,
    interfaces: T,
}

impl<'a> CertificateBootstrap<'a> {
    pub fn new(config: &'a TlsConfig) -> Self {
        Self::with_interfaces(config, SystemInterfaces)
    }
}

impl<'a, T: InterfaceTable> CertificateBootstrap<'a, T> {
    pub fn with_interfaces(config: &'a TlsConfig, interfaces: T) -> Self {
        Self { config, interfaces }
    }

    pub fn store(&self) -> CertificateStore {
        self.config.store()
    }

    pub fn ensure_certificate(&self) -> Result<BootstrapOutcome> {
        self.ensure_certificate_at(OffsetDateTime::now_utc())
    }

    /// Run the bootstrap with `now` as the generation instant.
    pub fn ensure_certificate_at(&self, now: OffsetDateTime) -> Result<BootstrapOutcome> {
        let store = self.store();

        match store.probe(self.config.verify_existing_pair) {
            PairState::Complete => {
                info!("Certificate files already exist.");
                return Ok(BootstrapOutcome::AlreadyPresent);
            }
            PairState::CertificateOnly => match self.config.on_partial_pair {
                PartialPairPolicy::Keep => {
                    warn!(
                        "{} exists but {} is missing; leaving it as is",
                        store.cert_path().display(),
                        store.key_path().display()
                    );
                    return Ok(BootstrapOutcome::KeptPartial);
                }
                PartialPairPolicy::Regenerate => {
                    warn!(
                        "{} is missing, regenerating certificate pair",
                        store.key_path().display()
                    );
                }
            },
            PairState::Mismatched(cause) => {
                warn!("Existing certificate pair is not usable ({cause}), regenerating");
            }
            PairState::Absent | PairState::KeyOnly => {}
        }

        info!("Generating SSL certificate...");
        let identities = identity::discover(&self.interfaces)?;
        let generated = materialize::materialize(&identities, &self.config.profile(), now)?;
        store.persist(&generated)?;

        info!(
            "SSL certificate generated successfully! (valid until {})",
            generated.not_after
        );
        Ok(BootstrapOutcome::Generated(identities))
    }
}

/// Bootstrap against the host's real interfaces.
pub fn ensure_certificate(config: &TlsConfig) -> Result<BootstrapOutcome> {
    CertificateBootstrap::new(config).ensure_certificate()
}
