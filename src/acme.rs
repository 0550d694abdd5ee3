//! ACME provider configuration and the collaborator that talks to ACME providers.
//!
//! The ACME protocol itself is not implemented here; an [`AcmeClient`] obtains certificates
//! for the requests resolved against an [`AcmeConfig`].

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cert::{Certificate, CertificateRequest};
use crate::error::{CertMgrError, Result};

/// Prefix of the CA names derived from ACME providers.
pub const ACME_CA_PREFIX: &str = "ACME:";

/// CA name of an ACME provider, e.g. `ACME:letsencrypt`.
pub fn ca_from_provider(provider: &str) -> String {
    format!("{ACME_CA_PREFIX}{provider}")
}

/// Provider name of an ACME CA name.
///
/// # Errors
/// Returns [`CertMgrError::InvalidCa`] if the name lacks the `ACME:` prefix.
pub fn provider_from_ca(ca: &str) -> Result<&str> {
    ca.strip_prefix(ACME_CA_PREFIX)
        .ok_or_else(|| CertMgrError::InvalidCa(ca.to_string()))
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcmeProvider {
    pub name: String,
    pub url: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

/// Where a challenge responder listens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeConfig {
    #[serde(default)]
    pub iface: String,
    pub port: u16,
}

/// A domain the ACME providers may issue for, together with its challenge setup.
///
/// A configured domain covers itself and all of its sub-domains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcmeDomain {
    pub domain: String,
    #[serde(default)]
    pub http01: Option<ChallengeConfig>,
    #[serde(default)]
    pub tls_alpn01: Option<ChallengeConfig>,
}

impl AcmeDomain {
    pub fn covers(&self, domain: &str) -> bool {
        let configured = self.domain.trim_start_matches("*.");
        let requested = domain.trim_start_matches("*.");
        requested.eq_ignore_ascii_case(configured)
            || requested
                .to_ascii_lowercase()
                .ends_with(&format!(".{}", configured.to_ascii_lowercase()))
    }
}

/// The ACME provider configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcmeConfig {
    #[serde(default)]
    pub providers: Vec<AcmeProvider>,
    #[serde(default)]
    pub domains: Vec<AcmeDomain>,
}

impl AcmeConfig {
    /// Loads the configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading ACME config");
        let content = std::fs::read_to_string(path).map_err(|e| {
            CertMgrError::Config(format!(
                "failed to read ACME config '{}': {e}",
                path.display()
            ))
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::from_str(content, config::FileFormat::Yaml))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    pub fn provider(&self, name: &str) -> Option<&AcmeProvider> {
        self.providers.iter().find(|provider| provider.name == name)
    }

    /// Resolves a provider scoped request for the given domains.
    ///
    /// # Errors
    /// Returns [`CertMgrError::Validation`] if the provider is unknown or disabled, if no
    /// domain is requested, or if a requested domain is not covered by the configuration.
    pub fn resolve_certificate_request(
        &self,
        domains: &[String],
        provider: &str,
    ) -> Result<AcmeCertificateRequest> {
        let provider = self
            .provider(provider)
            .ok_or_else(|| CertMgrError::Validation(format!("unknown ACME provider '{provider}'")))?;
        if !provider.enabled {
            return Err(CertMgrError::Validation(format!(
                "ACME provider '{}' is disabled",
                provider.name
            )));
        }
        if domains.is_empty() {
            return Err(CertMgrError::Validation("missing domains".to_string()));
        }
        let mut challenges = Vec::with_capacity(domains.len());
        for domain in domains {
            let configured = self
                .domains
                .iter()
                .find(|configured| configured.covers(domain))
                .ok_or_else(|| {
                    CertMgrError::Validation(format!("domain '{domain}' is not configured for ACME"))
                })?;
            challenges.push(configured.clone());
        }
        Ok(AcmeCertificateRequest {
            provider: provider.clone(),
            domains: domains.to_vec(),
            challenges,
        })
    }
}

/// A certificate request bound to one ACME provider.
///
/// `challenges[i]` is the configured domain covering `domains[i]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcmeCertificateRequest {
    pub provider: AcmeProvider,
    pub domains: Vec<String>,
    pub challenges: Vec<AcmeDomain>,
}

/// Obtains certificates from ACME providers.
pub trait AcmeClient: fmt::Debug + Send + Sync {
    /// Runs the ACME order for `csr` and returns the issued certificate.
    fn obtain_certificate(
        &self,
        request: &AcmeCertificateRequest,
        csr: &CertificateRequest,
    ) -> Result<Certificate>;
}
