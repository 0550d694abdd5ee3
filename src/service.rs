//! The operations exposed to the transport layer.
//!
//! [`IssuanceService`] dispatches generation requests to the local, remote and ACME
//! strategies and renders registry entries for presentation.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::acme::{AcmeClient, AcmeConfig, ca_from_provider, provider_from_ca};
use crate::cert::CertificateWithPrivateKey;
use crate::cert::extensions::{FlagSet, KeyUsages};
use crate::config::Config;
use crate::details::{Ca, Cas, Entries, Entry, EntryDetails};
use crate::error::{CertMgrError, Result};
use crate::factory::{AcmeCertificateFactory, LocalCertificateFactory, RemoteCertificateRequestFactory};
use crate::key::registry::KeyRegistry;
use crate::registry::Registry;
use crate::request::{GenerateAcme, GenerateLocal, GenerateRemote, GenerationRequest};

/// CA name of the local issuance strategy.
pub const LOCAL_CA: &str = "Local";
/// CA name of the remote (CSR) strategy.
pub const REMOTE_CA: &str = "Remote";

/// Issuance and presentation operations on top of a [`Registry`].
#[derive(Debug)]
pub struct IssuanceService<R> {
    keys: Arc<KeyRegistry>,
    registry: R,
    config: Config,
    acme_client: Arc<dyn AcmeClient>,
}

impl<R: Registry> IssuanceService<R> {
    pub fn new(
        keys: Arc<KeyRegistry>,
        registry: R,
        config: Config,
        acme_client: Arc<dyn AcmeClient>,
    ) -> Self {
        Self {
            keys,
            registry,
            config,
            acme_client,
        }
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub fn key_registry(&self) -> &KeyRegistry {
        &self.keys
    }

    /// Lists entry summaries starting at `start`; a `limit` of `0` means no limit.
    ///
    /// `total` counts every entry in the registry, not only the returned page.
    pub fn entries(&self, start: usize, limit: usize) -> Result<Entries> {
        let mut entries = Vec::new();
        let mut total = 0;
        for entry in self.registry.entries()? {
            let entry = entry?;
            if total >= start && (limit == 0 || total - start < limit) {
                entries.push(Entry::from_registry_entry(&entry));
            }
            total += 1;
        }
        Ok(Entries {
            entries,
            start,
            total,
        })
    }

    pub fn details(&self, name: &str) -> Result<EntryDetails> {
        let entry = self.registry.entry(name)?;
        Ok(EntryDetails::from_registry_entry(&entry))
    }

    /// Lists the CA names: `Local`, `Remote`, then one `ACME:<provider>` per configured
    /// provider.
    pub fn cas(&self) -> Result<Cas> {
        let mut cas = vec![
            Ca {
                name: LOCAL_CA.to_string(),
            },
            Ca {
                name: REMOTE_CA.to_string(),
            },
        ];
        if self.config.acme_config.is_empty() {
            debug!("no ACME config, listing local CAs only");
        } else {
            let acme_config = AcmeConfig::load(self.config.acme_config_path())?;
            cas.extend(acme_config.providers.iter().map(|provider| Ca {
                name: ca_from_provider(&provider.name),
            }));
        }
        Ok(Cas { cas })
    }

    /// Lists the entries that can issue certificates with the given key usage.
    pub fn issuers(&self, key_usage: FlagSet<KeyUsages>) -> Result<Entries> {
        let mut entries = Vec::new();
        for entry in self.registry.entries()? {
            let entry = entry?;
            if entry.can_issue(key_usage) {
                entries.push(Entry::from_registry_entry(&entry));
            }
        }
        Ok(Entries {
            total: entries.len(),
            start: 0,
            entries,
        })
    }

    pub fn generate(&self, request: &GenerationRequest, actor: &str) -> Result<Entry> {
        match request {
            GenerationRequest::Local(request) => self.generate_local(request, actor),
            GenerationRequest::Remote(request) => self.generate_remote(request, actor),
            GenerationRequest::Acme(request) => self.generate_acme(request, actor),
        }
    }

    /// Issues a certificate locally, self-signed when no issuer is named.
    pub fn generate_local(&self, request: &GenerateLocal, actor: &str) -> Result<Entry> {
        request.validate()?;
        let template = request.to_template()?;
        let key_pair_factory = self.keys.factory(&request.key_type)?;
        let issuer = self.resolve_issuer(&request.issuer)?;
        info!(
            strategy = LOCAL_CA,
            name = %request.name,
            key_type = %request.key_type,
            issuer = %request.issuer,
            actor,
            "generating certificate"
        );
        let factory = LocalCertificateFactory::new(template, key_pair_factory, issuer);
        let name = self
            .registry
            .create_certificate(&request.name, &factory, actor)?;
        self.read_back(&name)
    }

    /// Creates a certificate signing request for a remote CA.
    pub fn generate_remote(&self, request: &GenerateRemote, actor: &str) -> Result<Entry> {
        request.validate()?;
        let template = request.to_template()?;
        let key_pair_factory = self.keys.factory(&request.key_type)?;
        info!(
            strategy = REMOTE_CA,
            name = %request.name,
            key_type = %request.key_type,
            actor,
            "generating certificate request"
        );
        let factory = RemoteCertificateRequestFactory::new(template, key_pair_factory);
        let name = self
            .registry
            .create_certificate_request(&request.name, &factory, actor)?;
        self.read_back(&name)
    }

    /// Obtains a certificate from the ACME provider named by the request's CA.
    pub fn generate_acme(&self, request: &GenerateAcme, actor: &str) -> Result<Entry> {
        request.validate()?;
        let provider = provider_from_ca(&request.ca)?;
        let acme_config = AcmeConfig::load(self.config.acme_config_path())?;
        let acme_request = acme_config.resolve_certificate_request(&request.domains, provider)?;
        let key_pair_factory = self.keys.factory(&request.key_type)?;
        info!(
            strategy = %request.ca,
            name = %request.name,
            key_type = %request.key_type,
            domains = ?request.domains,
            actor,
            "generating ACME certificate"
        );
        let factory =
            AcmeCertificateFactory::new(acme_request, key_pair_factory, self.acme_client.as_ref());
        let name = self
            .registry
            .create_certificate(&request.name, &factory, actor)?;
        self.read_back(&name)
    }

    pub fn delete(&self, name: &str, actor: &str) -> Result<()> {
        info!(name, actor, "deleting entry");
        self.registry.delete(name, actor)
    }

    fn resolve_issuer(&self, name: &str) -> Result<Option<CertificateWithPrivateKey>> {
        if name.is_empty() {
            return Ok(None);
        }
        let entry = self.registry.entry(name)?;
        if !entry.can_issue(KeyUsages::KeyCertSign.into()) {
            warn!(issuer = name, "entry cannot sign certificates");
            return Err(CertMgrError::InvalidIssuer(name.to_string()));
        }
        match (entry.certificate, entry.key) {
            (Some(certificate), Some(key)) => {
                CertificateWithPrivateKey::new(certificate, key.private().clone()).map(Some)
            }
            _ => Err(CertMgrError::InvalidIssuer(name.to_string())),
        }
    }

    fn read_back(&self, name: &str) -> Result<Entry> {
        let entry = self
            .registry
            .entry(name)
            .map_err(|e| CertMgrError::EntryReadback {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        debug!(name, "created entry");
        Ok(Entry::from_registry_entry(&entry))
    }
}
