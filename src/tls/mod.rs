//! TLS material for the development server.
//!
//! Before the listener binds, [`ensure_certificate`] makes sure a
//! self-signed certificate and RSA key exist on disk. When they are missing
//! the host's IPv4 addresses are discovered, a new pair is generated for
//! `localhost` plus those addresses, and both files are written.

mod bootstrap;
mod error;
mod identity;
mod materialize;
mod store;

pub use bootstrap::{BootstrapOutcome, CertificateBootstrap, ensure_certificate};
pub use error::BootstrapError;
pub use identity::{IdentitySet, InterfaceTable, LOCALHOST, SystemInterfaces, discover};
pub use materialize::{
    CERTIFICATE_TAG, CertificateProfile, GeneratedCertificate, PRIVATE_KEY_TAG, materialize,
};
pub use store::{CertificateStore, PairState};
