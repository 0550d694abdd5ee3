//! Certificate and certificate request factories handed to the registry.
//!
//! A factory owns everything needed to produce one artifact: the template, the key pair
//! factory and, where applicable, the issuer or the ACME collaborator. The registry decides
//! when to invoke it and stores the result.

use tracing::{debug, info};

use crate::acme::{AcmeCertificateRequest, AcmeClient, ca_from_provider};
use crate::cert::{Certificate, CertificateRequest, CertificateWithPrivateKey, SelfIssuer};
use crate::error::{CertMgrError, Result};
use crate::issuer::Issuer;
use crate::key::KeyPair;
use crate::key::factory::KeyPairFactory;
use crate::key::public_keys_equal;
use crate::template::{CertificateTemplate, RequestTemplate};

/// Produces a key pair and a certificate for it.
pub trait CertificateFactory {
    /// Name of the issuing CA, e.g. `Local` or `ACME:letsencrypt`.
    fn name(&self) -> String;

    fn new_certificate(&self) -> Result<(KeyPair, Certificate)>;
}

/// Produces a key pair and a certificate signing request for it.
pub trait CertificateRequestFactory {
    fn name(&self) -> String;

    fn new_certificate_request(&self) -> Result<(KeyPair, CertificateRequest)>;
}

/// Issues certificates locally, either self-signed or signed by an issuer entry.
pub struct LocalCertificateFactory<'a> {
    template: CertificateTemplate,
    key_pair_factory: &'a dyn KeyPairFactory,
    issuer: Option<CertificateWithPrivateKey>,
}

impl<'a> LocalCertificateFactory<'a> {
    pub fn new(
        template: CertificateTemplate,
        key_pair_factory: &'a dyn KeyPairFactory,
        issuer: Option<CertificateWithPrivateKey>,
    ) -> Self {
        Self {
            template,
            key_pair_factory,
            issuer,
        }
    }
}

impl CertificateFactory for LocalCertificateFactory<'_> {
    fn name(&self) -> String {
        "Local".to_string()
    }

    fn new_certificate(&self) -> Result<(KeyPair, Certificate)> {
        let key_pair = self.key_pair_factory.generate()?;
        let certificate = match &self.issuer {
            Some(issuer) => {
                debug!(issuer = %issuer.cert.subject_dn(), "signing certificate with issuer");
                issuer.issue(&self.template, key_pair.public())?
            }
            None => {
                debug!(subject = %self.template.subject, "self-signing certificate");
                SelfIssuer {
                    name: self.template.subject.clone(),
                    key: key_pair.private(),
                }
                .issue(&self.template, key_pair.public())?
            }
        };
        Ok((key_pair, certificate))
    }
}

/// Creates certificate signing requests to be signed by a remote CA.
pub struct RemoteCertificateRequestFactory<'a> {
    template: RequestTemplate,
    key_pair_factory: &'a dyn KeyPairFactory,
}

impl<'a> RemoteCertificateRequestFactory<'a> {
    pub fn new(template: RequestTemplate, key_pair_factory: &'a dyn KeyPairFactory) -> Self {
        Self {
            template,
            key_pair_factory,
        }
    }
}

impl CertificateRequestFactory for RemoteCertificateRequestFactory<'_> {
    fn name(&self) -> String {
        "Remote".to_string()
    }

    fn new_certificate_request(&self) -> Result<(KeyPair, CertificateRequest)> {
        let key_pair = self.key_pair_factory.generate()?;
        let request = CertificateRequest::new_signed(&self.template, key_pair.private())?;
        Ok((key_pair, request))
    }
}

/// Obtains certificates from an ACME provider.
pub struct AcmeCertificateFactory<'a> {
    request: AcmeCertificateRequest,
    key_pair_factory: &'a dyn KeyPairFactory,
    client: &'a dyn AcmeClient,
}

impl<'a> AcmeCertificateFactory<'a> {
    pub fn new(
        request: AcmeCertificateRequest,
        key_pair_factory: &'a dyn KeyPairFactory,
        client: &'a dyn AcmeClient,
    ) -> Self {
        Self {
            request,
            key_pair_factory,
            client,
        }
    }
}

impl CertificateFactory for AcmeCertificateFactory<'_> {
    fn name(&self) -> String {
        ca_from_provider(&self.request.provider.name)
    }

    fn new_certificate(&self) -> Result<(KeyPair, Certificate)> {
        let key_pair = self.key_pair_factory.generate()?;
        let csr = CertificateRequest::new_signed(
            &RequestTemplate::for_domains(&self.request.domains)?,
            key_pair.private(),
        )?;
        info!(
            provider = %self.request.provider.name,
            domains = ?self.request.domains,
            "requesting ACME certificate"
        );
        let certificate = self.client.obtain_certificate(&self.request, &csr)?;
        let issued_for_key = certificate
            .public_key()
            .map(|public| public_keys_equal(&public, key_pair.public()))
            .unwrap_or(false);
        if !issued_for_key {
            return Err(CertMgrError::Upstream(format!(
                "ACME provider '{}' returned a certificate for a different key",
                self.request.provider.name
            )));
        }
        Ok((key_pair, certificate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::extensions::KeyUsages;
    use crate::cert::params::parse_dn;
    use crate::key::factory::{EcdsaCurve, EcdsaKeyPairFactory, Ed25519KeyPairFactory};
    use time::{Duration, OffsetDateTime};

    fn template(dn: &str) -> CertificateTemplate {
        let now = OffsetDateTime::now_utc();
        CertificateTemplate::builder()
            .subject(parse_dn(dn).unwrap())
            .not_before(now)
            .not_after(now + Duration::days(7))
            .build()
    }

    #[test]
    fn local_factory_self_signs_without_issuer() {
        let key_pair_factory = EcdsaKeyPairFactory::new(EcdsaCurve::P256);
        let factory = LocalCertificateFactory::new(template("CN=root"), &key_pair_factory, None);
        let (key_pair, certificate) = factory.new_certificate().unwrap();
        assert_eq!(certificate.issuer_dn(), "CN=root");
        assert_eq!(&certificate.public_key().unwrap(), key_pair.public());
        assert_eq!(factory.name(), "Local");
    }

    #[test]
    fn local_factory_signs_with_issuer() {
        let key_pair_factory = Ed25519KeyPairFactory;
        let mut ca_template = template("CN=ca");
        ca_template.key_usage = KeyUsages::KeyCertSign.into();
        ca_template.basic_constraints_valid = true;
        ca_template.is_ca = true;
        let (ca_key, ca_cert) = LocalCertificateFactory::new(ca_template, &key_pair_factory, None)
            .new_certificate()
            .unwrap();
        let issuer = CertificateWithPrivateKey::new(ca_cert, ca_key.private().clone()).unwrap();

        let factory =
            LocalCertificateFactory::new(template("CN=leaf"), &key_pair_factory, Some(issuer));
        let (_, certificate) = factory.new_certificate().unwrap();
        assert_eq!(certificate.issuer_dn(), "CN=ca");
        assert_eq!(certificate.subject_dn(), "CN=leaf");
    }

    #[test]
    fn remote_factory_creates_request() {
        let key_pair_factory = EcdsaKeyPairFactory::new(EcdsaCurve::P521);
        let template = RequestTemplate::builder()
            .subject(parse_dn("CN=remote").unwrap())
            .build();
        let factory = RemoteCertificateRequestFactory::new(template, &key_pair_factory);
        let (key_pair, request) = factory.new_certificate_request().unwrap();
        assert_eq!(request.subject_dn(), "CN=remote");
        assert_eq!(&request.public_key().unwrap(), key_pair.public());
        assert_eq!(factory.name(), "Remote");
    }
}
