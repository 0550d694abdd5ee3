use der::Encode;
use der::asn1::BitString;
use tracing::debug;
use x509_cert::certificate::CertificateInner;
use x509_cert::name::Name;

use crate::cert::Certificate;
use crate::cert::extensions::{
    AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, KeyUsage, SubjectAltName,
    SubjectKeyIdentifier, key_identifier,
};
use crate::cert::params::{ExtensionParam, Validity};
use crate::error::{CertMgrError, Result};
use crate::key::{PrivateKey, PublicKey, public_keys_equal};
use crate::tbs_certificate::TbsCertificate;
use crate::template::CertificateTemplate;

/// Creates a random, positive 128-bit serial number.
pub fn random_serial_number() -> Vec<u8> {
    let mut serial: [u8; 16] = rand::random();
    // positive and without a leading zero byte
    serial[0] &= 0x7f;
    serial[0] |= 0x01;
    serial.to_vec()
}

/// Builds the extensions a certificate template asks for.
///
/// `authority_key_id` is only added when the certificate is issued by another certificate.
pub fn template_extensions(
    template: &CertificateTemplate,
    subject_public_key: &PublicKey,
    authority_key_id: Option<Vec<u8>>,
) -> Result<Vec<ExtensionParam>> {
    let mut extensions = Vec::new();

    if !template.key_usage.is_empty() {
        extensions.push(ExtensionParam::from_extension(
            &KeyUsage(template.key_usage),
            true,
        )?);
    }

    if !template.ext_key_usage.is_empty() {
        let extended_key_usage = ExtendedKeyUsage {
            usage: template.ext_key_usage.clone(),
            unknown: Vec::new(),
        };
        extensions.push(ExtensionParam::from_extension(&extended_key_usage, false)?);
    }

    if template.basic_constraints_valid {
        let max_path_length = template
            .path_len_constraint()
            .map(u8::try_from)
            .transpose()
            .map_err(|_| {
                CertMgrError::Validation(format!(
                    "path length constraint out of range: {}",
                    template.max_path_len
                ))
            })?;
        let basic_constraints = BasicConstraints {
            is_ca: template.is_ca,
            max_path_length,
        };
        extensions.push(ExtensionParam::from_extension(&basic_constraints, true)?);
    }

    let subject_key_id = SubjectKeyIdentifier::from_spki(&subject_public_key.to_spki()?);
    extensions.push(ExtensionParam::from_extension(&subject_key_id, false)?);

    if let Some(key_identifier) = authority_key_id {
        extensions.push(ExtensionParam::from_extension(
            &AuthorityKeyIdentifier { key_identifier },
            false,
        )?);
    }

    if !template.subject_alt_names.is_empty() {
        let san = SubjectAltName {
            names: template.subject_alt_names.clone(),
        };
        extensions.push(ExtensionParam::from_extension(&san, false)?);
    }

    Ok(extensions)
}

/// Represents an entity capable of issuing certificates.
///
/// This trait provides methods to retrieve issuer details and issue certificates.
pub trait Issuer {
    /// Returns the distinguished name of the issuer.
    fn issuer_name(&self) -> Name;

    /// Returns the signing key of the issuer.
    fn signing_key(&self) -> &PrivateKey;

    /// Key identifier placed into the authority key identifier of issued certificates.
    ///
    /// `None` for self-signed certificates.
    fn authority_key_id(&self) -> Option<Vec<u8>>;

    /// Issues a certificate for `subject_public_key` based on the template.
    fn issue(
        &self,
        template: &CertificateTemplate,
        subject_public_key: &PublicKey,
    ) -> Result<Certificate> {
        let signature_algorithm = self.signing_key().signature_algorithm();

        let tbs_cert = TbsCertificate {
            serial_number: random_serial_number(),
            signature_algorithm,
            issuer: self.issuer_name(),
            validity: Validity {
                not_before: template.not_before,
                not_after: template.not_after,
            },
            subject: template.subject.clone(),
            subject_public_key: subject_public_key.clone(),
            extensions: template_extensions(
                template,
                subject_public_key,
                self.authority_key_id(),
            )?,
        };

        let tbs_cert_inner = tbs_cert.to_tbs_certificate_inner()?;
        let signature = self.signing_key().sign(&tbs_cert_inner.to_der()?)?;

        debug!(
            subject = %tbs_cert_inner.subject,
            issuer = %tbs_cert_inner.issuer,
            "issued certificate"
        );

        let cert_inner = CertificateInner {
            tbs_certificate: tbs_cert_inner,
            signature_algorithm: signature_algorithm.into(),
            signature: BitString::from_bytes(&signature)?,
        };

        Ok(Certificate { inner: cert_inner })
    }
}

/// Issuer for self-signed certificates: the issuer name is the subject of the template.
pub struct SelfIssuer<'a> {
    pub name: Name,
    pub key: &'a PrivateKey,
}

impl Issuer for SelfIssuer<'_> {
    fn issuer_name(&self) -> Name {
        self.name.clone()
    }

    fn signing_key(&self) -> &PrivateKey {
        self.key
    }

    fn authority_key_id(&self) -> Option<Vec<u8>> {
        None
    }
}

/// An issuer certificate together with its private key.
#[derive(Debug, Clone)]
pub struct CertificateWithPrivateKey {
    pub cert: Certificate,
    pub key: PrivateKey,
}

impl CertificateWithPrivateKey {
    /// Pairs a certificate with its private key.
    ///
    /// # Errors
    /// Returns [`CertMgrError::InvalidIssuer`] if the key does not belong to the certificate.
    pub fn new(cert: Certificate, key: PrivateKey) -> Result<Self> {
        let matches = cert
            .public_key()
            .map(|public| public_keys_equal(&public, &key.public_key()))
            .unwrap_or(false);
        if !matches {
            return Err(CertMgrError::InvalidIssuer(cert.subject_dn()));
        }
        Ok(Self { cert, key })
    }
}

impl Issuer for CertificateWithPrivateKey {
    fn issuer_name(&self) -> Name {
        // The name of the issuer is the subject of the certificate
        self.cert.subject().clone()
    }

    fn signing_key(&self) -> &PrivateKey {
        &self.key
    }

    fn authority_key_id(&self) -> Option<Vec<u8>> {
        let subject_key_id = self.cert.extensions().subject_key_id;
        if subject_key_id.is_empty() {
            Some(key_identifier(self.cert.spki()))
        } else {
            Some(subject_key_id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::extensions::{ExtendedKeyUsageOption, KeyUsages, SubjectAltNameEntry};
    use crate::cert::params::parse_dn;
    use crate::key::KeyPair;
    use time::{Duration, OffsetDateTime};

    fn template(dn: &str) -> CertificateTemplate {
        let now = OffsetDateTime::from_unix_timestamp(OffsetDateTime::now_utc().unix_timestamp())
            .unwrap();
        CertificateTemplate::builder()
            .subject(parse_dn(dn).unwrap())
            .not_before(now)
            .not_after(now + Duration::days(30))
            .build()
    }

    fn ca(key_pair: &KeyPair) -> Certificate {
        let mut ca_template = template("CN=Test CA");
        ca_template.key_usage = KeyUsages::KeyCertSign | KeyUsages::CRLSign;
        ca_template.basic_constraints_valid = true;
        ca_template.is_ca = true;
        ca_template.max_path_len = 0;
        ca_template.max_path_len_zero = true;
        SelfIssuer {
            name: ca_template.subject.clone(),
            key: key_pair.private(),
        }
        .issue(&ca_template, key_pair.public())
        .unwrap()
    }

    #[test]
    fn serial_numbers_are_positive_and_random() {
        let a = random_serial_number();
        let b = random_serial_number();
        assert_eq!(a.len(), 16);
        assert!(a[0] & 0x80 == 0 && a[0] != 0);
        assert_ne!(a, b);
    }

    #[test]
    fn self_signed_certificate() {
        let key_pair = KeyPair::generate_ecdsa_p256();
        let cert = ca(&key_pair);
        let decoded = Certificate::from_der(&cert.to_der().unwrap()).unwrap();

        assert_eq!(decoded.subject_dn(), "CN=Test CA");
        assert_eq!(decoded.issuer_dn(), "CN=Test CA");
        assert_eq!(decoded.version(), 3);
        assert_eq!(decoded.signature_algorithm_name(), "ECDSA-SHA256");
        assert!(decoded.is_ca());

        let extensions = decoded.extensions();
        assert_eq!(extensions.max_path_len, 0);
        assert!(extensions.max_path_len_zero);
        assert_eq!(
            extensions.key_usage_bits(),
            KeyUsages::KeyCertSign | KeyUsages::CRLSign
        );
        assert_eq!(extensions.subject_key_id.len(), 20);
        assert!(extensions.authority_key_id.is_empty());
    }

    #[test]
    fn certificate_issued_by_ca() {
        let ca_key = KeyPair::generate_ed25519();
        let ca_cert = ca(&ca_key);
        let issuer = CertificateWithPrivateKey::new(ca_cert.clone(), ca_key.private().clone())
            .unwrap();

        let server_key = KeyPair::generate_ecdsa_p384();
        let mut server_template = template("CN=server.example.com,O=Example");
        server_template.ext_key_usage = vec![ExtendedKeyUsageOption::ServerAuth];
        server_template.subject_alt_names =
            vec![SubjectAltNameEntry::Dns("server.example.com".to_string())];
        let cert = issuer.issue(&server_template, server_key.public()).unwrap();

        assert_eq!(cert.issuer_dn(), "CN=Test CA");
        assert_eq!(cert.key_type(), "ECDSA P-384");
        assert_eq!(cert.signature_algorithm_name(), "Ed25519");
        assert_eq!(cert.not_before().unwrap(), server_template.not_before);
        assert_eq!(cert.not_after().unwrap(), server_template.not_after);
        assert!(!cert.is_ca());

        let extensions = cert.extensions();
        assert_eq!(
            extensions.authority_key_id,
            ca_cert.extensions().subject_key_id
        );
        assert_eq!(
            extensions.ext_key_usage.usage,
            [ExtendedKeyUsageOption::ServerAuth]
        );
        assert!(extensions.key_usage.is_none());
        assert!(!extensions.basic_constraints_valid);
    }

    #[test]
    fn mismatched_issuer_key_is_rejected() {
        let ca_key = KeyPair::generate_ecdsa_p256();
        let ca_cert = ca(&ca_key);
        let other = KeyPair::generate_ecdsa_p256();
        let err = CertificateWithPrivateKey::new(ca_cert, other.private().clone()).unwrap_err();
        assert!(matches!(err, CertMgrError::InvalidIssuer(name) if name == "CN=Test CA"));
    }

    #[test]
    fn rsa_issuer_signs_with_sha256() {
        let key_pair = KeyPair::generate_rsa(2048).unwrap();
        let cert = ca(&key_pair);
        assert_eq!(cert.signature_algorithm_name(), "SHA256-RSA");
        assert_eq!(cert.key_type(), "RSA 2048");
    }
}
