//! The contract of the external entry registry.
//!
//! Storage, versioning and concurrency control of entries are the registry's business. The
//! issuance pipeline only hands factories to it and reads entries back.

use x509_cert::crl::CertificateList;

use crate::cert::extensions::{FlagSet, KeyUsages};
use crate::cert::{Certificate, CertificateRequest};
use crate::error::Result;
use crate::factory::{CertificateFactory, CertificateRequestFactory};
use crate::key::KeyPair;

/// A named registry entry.
///
/// Every artifact is optional; which ones are present depends on how the entry was created.
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub name: String,
    pub key: Option<KeyPair>,
    pub certificate: Option<Certificate>,
    pub certificate_request: Option<CertificateRequest>,
    pub revocation_list: Option<CertificateList>,
}

impl RegistryEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: None,
            certificate: None,
            certificate_request: None,
            revocation_list: None,
        }
    }

    pub fn has_key(&self) -> bool {
        self.key.is_some()
    }

    pub fn has_certificate(&self) -> bool {
        self.certificate.is_some()
    }

    pub fn has_certificate_request(&self) -> bool {
        self.certificate_request.is_some()
    }

    pub fn has_revocation_list(&self) -> bool {
        self.revocation_list.is_some()
    }

    /// Whether this entry may issue certificates with the given key usage.
    ///
    /// Requires a private key and a CA certificate whose key usage contains every
    /// requested bit.
    pub fn can_issue(&self, key_usage: FlagSet<KeyUsages>) -> bool {
        if !self.has_key() {
            return false;
        }
        let Some(certificate) = &self.certificate else {
            return false;
        };
        let extensions = certificate.extensions();
        extensions.is_ca() && extensions.key_usage_bits().contains(key_usage)
    }
}

/// Lazily evaluated sequence of registry entries.
pub type EntryIter<'a> = Box<dyn Iterator<Item = Result<RegistryEntry>> + 'a>;

/// Versioned store of certificate entries.
///
/// `actor` identifies the party on whose behalf a change is made (audit trail).
pub trait Registry: Send + Sync {
    /// Invokes the factory and stores the result; returns the name of the new entry.
    ///
    /// An empty `name` lets the registry pick one.
    fn create_certificate(
        &self,
        name: &str,
        factory: &dyn CertificateFactory,
        actor: &str,
    ) -> Result<String>;

    fn create_certificate_request(
        &self,
        name: &str,
        factory: &dyn CertificateRequestFactory,
        actor: &str,
    ) -> Result<String>;

    /// Returns the named entry, or [`crate::error::CertMgrError::NotFound`].
    fn entry(&self, name: &str) -> Result<RegistryEntry>;

    /// All entries in registry order. Each call starts a fresh iteration.
    fn entries(&self) -> Result<EntryIter<'_>>;

    fn delete(&self, name: &str, actor: &str) -> Result<()>;
}
