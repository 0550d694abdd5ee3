pub mod extensions;
pub mod params;

use const_oid::AssociatedOid;
use der::asn1::{AnyRef, BitString, SetOfVec};
use der::{Decode, Encode, EncodePem};
use time::OffsetDateTime;
use x509_cert::attr::Attribute;
use x509_cert::certificate::CertificateInner;
use x509_cert::name::Name;
use x509_cert::request::{CertReq, CertReqInfo, ExtensionReq};
use x509_cert::spki::{AlgorithmIdentifierOwned, ObjectIdentifier, SubjectPublicKeyInfoOwned};

use crate::error::{CertMgrError, Result};
use crate::key::{KeyAlgorithm, PrivateKey, PublicKey, declared_algorithm_name};
use crate::template::RequestTemplate;
use extensions::{ParsedExtensions, SubjectAltName};
use params::{ExtensionParam, Validity};

pub use crate::issuer::{CertificateWithPrivateKey, SelfIssuer};

/// Represents the supported signature algorithms for certificates.
///
/// This enum provides a mapping to the corresponding OIDs for each algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    /// SHA-256 with RSA encryption (PKCS#1 v1.5).
    Sha256WithRSA,
    /// SHA-224 with ECDSA.
    Sha224WithECDSA,
    /// SHA-256 with ECDSA.
    Sha256WithECDSA,
    /// SHA-384 with ECDSA.
    Sha384WithECDSA,
    /// SHA-512 with ECDSA.
    Sha512WithECDSA,
    /// Pure EdDSA over Ed25519.
    Ed25519,
}

impl SignatureAlgorithm {
    pub fn oid(&self) -> ObjectIdentifier {
        match self {
            SignatureAlgorithm::Sha256WithRSA => const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION,
            SignatureAlgorithm::Sha224WithECDSA => ECDSA_WITH_SHA_224,
            SignatureAlgorithm::Sha256WithECDSA => const_oid::db::rfc5912::ECDSA_WITH_SHA_256,
            SignatureAlgorithm::Sha384WithECDSA => const_oid::db::rfc5912::ECDSA_WITH_SHA_384,
            SignatureAlgorithm::Sha512WithECDSA => const_oid::db::rfc5912::ECDSA_WITH_SHA_512,
            SignatureAlgorithm::Ed25519 => const_oid::db::rfc8410::ID_ED_25519,
        }
    }
}

impl From<SignatureAlgorithm> for AlgorithmIdentifierOwned {
    /// Converts a `SignatureAlgorithm` into an `AlgorithmIdentifierOwned`.
    ///
    /// RSA carries explicit NULL parameters; ECDSA and EdDSA carry none (RFC 5758, RFC 8410).
    fn from(value: SignatureAlgorithm) -> Self {
        let parameters = match value {
            SignatureAlgorithm::Sha256WithRSA => Some(AnyRef::NULL.into()),
            _ => None,
        };
        AlgorithmIdentifierOwned {
            oid: value.oid(),
            parameters,
        }
    }
}

const ECDSA_WITH_SHA_224: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.1");

const SIGNATURE_ALGORITHM_NAMES: [(&str, &str); 16] = [
    ("1.2.840.113549.1.1.2", "MD2-RSA"),
    ("1.2.840.113549.1.1.4", "MD5-RSA"),
    ("1.2.840.113549.1.1.5", "SHA1-RSA"),
    ("1.2.840.113549.1.1.11", "SHA256-RSA"),
    ("1.2.840.113549.1.1.12", "SHA384-RSA"),
    ("1.2.840.113549.1.1.13", "SHA512-RSA"),
    ("1.2.840.113549.1.1.10", "RSA-PSS"),
    ("1.2.840.10040.4.3", "DSA-SHA1"),
    ("2.16.840.1.101.3.4.3.2", "DSA-SHA256"),
    ("1.2.840.10045.4.1", "ECDSA-SHA1"),
    ("1.2.840.10045.4.3.1", "ECDSA-SHA224"),
    ("1.2.840.10045.4.3.2", "ECDSA-SHA256"),
    ("1.2.840.10045.4.3.3", "ECDSA-SHA384"),
    ("1.2.840.10045.4.3.4", "ECDSA-SHA512"),
    ("1.3.101.112", "Ed25519"),
    ("1.3.101.113", "Ed448"),
];

/// Display name of a signature algorithm, e.g. `SHA256-RSA`; the dotted OID if unknown.
pub fn signature_algorithm_name(oid: &ObjectIdentifier) -> String {
    let dotted = oid.to_string();
    SIGNATURE_ALGORITHM_NAMES
        .iter()
        .find(|(known, _)| *known == dotted)
        .map(|(_, name)| name.to_string())
        .unwrap_or(dotted)
}

/// Key type name of an encoded public key.
///
/// The [`KeyAlgorithm`] name when the key decodes, otherwise the declared algorithm name.
pub fn key_type_name(spki: &SubjectPublicKeyInfoOwned) -> String {
    KeyAlgorithm::from_spki(spki)
        .map(|algorithm| algorithm.to_string())
        .unwrap_or_else(|| declared_algorithm_name(spki))
}

/// Renders a serial number as a decimal string.
pub fn serial_string(serial: &[u8]) -> String {
    rsa::BigUint::from_bytes_be(serial).to_string()
}

/// Represents an X.509 certificate.
///
/// This struct provides methods to encode the certificate into DER or PEM formats and to read
/// the fields the entry views are built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    /// The inner representation of the certificate.
    pub inner: CertificateInner,
}

impl Certificate {
    /// Encodes the certificate into DER format.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.inner
            .to_der()
            .map_err(|e| CertMgrError::Encoding(e.to_string()))
    }

    /// Encodes the certificate into PEM format.
    pub fn to_pem(&self) -> Result<String> {
        self.inner
            .to_pem(pkcs8::LineEnding::LF)
            .map_err(|e| CertMgrError::Encoding(e.to_string()))
    }

    /// Decodes a DER-encoded certificate.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        Ok(Self {
            inner: CertificateInner::from_der(der)?,
        })
    }

    pub fn subject(&self) -> &Name {
        &self.inner.tbs_certificate.subject
    }

    pub fn subject_dn(&self) -> String {
        params::dn_string(self.subject())
    }

    pub fn issuer_dn(&self) -> String {
        params::dn_string(&self.inner.tbs_certificate.issuer)
    }

    /// Certificate version, 1-based (`3` for X.509 v3).
    pub fn version(&self) -> u8 {
        self.inner.tbs_certificate.version as u8 + 1
    }

    /// Serial number as a decimal string.
    pub fn serial(&self) -> String {
        serial_string(self.inner.tbs_certificate.serial_number.as_bytes())
    }

    pub fn spki(&self) -> &SubjectPublicKeyInfoOwned {
        &self.inner.tbs_certificate.subject_public_key_info
    }

    pub fn public_key(&self) -> Result<PublicKey> {
        PublicKey::from_spki(self.spki())
    }

    pub fn key_type(&self) -> String {
        key_type_name(self.spki())
    }

    pub fn signature_algorithm_name(&self) -> String {
        signature_algorithm_name(&self.inner.signature_algorithm.oid)
    }

    pub fn validity(&self) -> Result<Validity> {
        Validity::from_x509_validity(&self.inner.tbs_certificate.validity)
    }

    pub fn not_before(&self) -> Result<OffsetDateTime> {
        Ok(self.validity()?.not_before)
    }

    pub fn not_after(&self) -> Result<OffsetDateTime> {
        Ok(self.validity()?.not_after)
    }

    pub fn extensions(&self) -> ParsedExtensions {
        ParsedExtensions::parse(
            self.inner
                .tbs_certificate
                .extensions
                .as_deref()
                .unwrap_or_default(),
        )
    }

    /// Whether the basic constraints are present and mark this certificate as a CA.
    pub fn is_ca(&self) -> bool {
        self.extensions().is_ca()
    }
}

/// Represents a PKCS#10 certificate signing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRequest {
    pub inner: CertReq,
}

impl CertificateRequest {
    /// Builds a request from the template and signs it with `key`.
    ///
    /// Subject alternative names are carried in an extension request attribute.
    pub fn new_signed(template: &RequestTemplate, key: &PrivateKey) -> Result<Self> {
        let mut attributes = Vec::new();
        if !template.subject_alt_names.is_empty() {
            let san = ExtensionParam::from_extension(
                &SubjectAltName {
                    names: template.subject_alt_names.clone(),
                },
                false,
            )?;
            let extension_req = ExtensionReq(vec![san.to_x509_extension()?]);
            attributes.push(Attribute {
                oid: ExtensionReq::OID,
                values: SetOfVec::try_from(vec![der::Any::encode_from(&extension_req)?])?,
            });
        }

        let info = CertReqInfo {
            version: x509_cert::request::Version::V1,
            subject: template.subject.clone(),
            public_key: key.public_key().to_spki()?,
            attributes: SetOfVec::try_from(attributes)?,
        };
        let signature = key.sign(&info.to_der()?)?;

        Ok(Self {
            inner: CertReq {
                info,
                algorithm: key.signature_algorithm().into(),
                signature: BitString::from_bytes(&signature)?,
            },
        })
    }

    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.inner
            .to_der()
            .map_err(|e| CertMgrError::Encoding(e.to_string()))
    }

    pub fn to_pem(&self) -> Result<String> {
        self.inner
            .to_pem(pkcs8::LineEnding::LF)
            .map_err(|e| CertMgrError::Encoding(e.to_string()))
    }

    pub fn from_der(der: &[u8]) -> Result<Self> {
        Ok(Self {
            inner: CertReq::from_der(der)?,
        })
    }

    pub fn subject(&self) -> &Name {
        &self.inner.info.subject
    }

    pub fn subject_dn(&self) -> String {
        params::dn_string(self.subject())
    }

    /// Request version, 1-based.
    pub fn version(&self) -> u8 {
        self.inner.info.version as u8 + 1
    }

    pub fn spki(&self) -> &SubjectPublicKeyInfoOwned {
        &self.inner.info.public_key
    }

    pub fn public_key(&self) -> Result<PublicKey> {
        PublicKey::from_spki(self.spki())
    }

    pub fn key_type(&self) -> String {
        key_type_name(self.spki())
    }

    pub fn signature_algorithm_name(&self) -> String {
        signature_algorithm_name(&self.inner.algorithm.oid)
    }

    /// Extensions carried in extension request attributes.
    ///
    /// Attribute values that do not decode as an extension request are skipped.
    pub fn extensions(&self) -> ParsedExtensions {
        let extensions: Vec<_> = self
            .inner
            .info
            .attributes
            .iter()
            .filter(|attribute| attribute.oid == ExtensionReq::OID)
            .flat_map(|attribute| attribute.values.iter())
            .filter_map(|value| {
                value
                    .to_der()
                    .ok()
                    .and_then(|der| ExtensionReq::from_der(&der).ok())
            })
            .flat_map(|extension_req| extension_req.0)
            .collect();
        ParsedExtensions::parse(&extensions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::extensions::SubjectAltNameEntry;
    use crate::key::KeyPair;

    #[test]
    fn signature_algorithm_names() {
        assert_eq!(
            signature_algorithm_name(&SignatureAlgorithm::Sha256WithRSA.oid()),
            "SHA256-RSA"
        );
        assert_eq!(
            signature_algorithm_name(&SignatureAlgorithm::Sha224WithECDSA.oid()),
            "ECDSA-SHA224"
        );
        assert_eq!(
            signature_algorithm_name(&SignatureAlgorithm::Ed25519.oid()),
            "Ed25519"
        );
        assert_eq!(
            signature_algorithm_name(&ObjectIdentifier::new_unwrap("1.2.3.4")),
            "1.2.3.4"
        );
    }

    #[test]
    fn rsa_signature_algorithm_has_null_parameters() {
        let rsa: AlgorithmIdentifierOwned = SignatureAlgorithm::Sha256WithRSA.into();
        assert!(rsa.parameters.is_some());
        let ecdsa: AlgorithmIdentifierOwned = SignatureAlgorithm::Sha384WithECDSA.into();
        assert!(ecdsa.parameters.is_none());
    }

    #[test]
    fn serial_numbers_render_in_decimal() {
        assert_eq!(serial_string(&[0x01]), "1");
        assert_eq!(serial_string(&[0x01, 0x00]), "256");
        assert_eq!(serial_string(&[0x00, 0xff]), "255");
    }

    #[test]
    fn request_carries_subject_and_alt_names() {
        let key_pair = KeyPair::generate_ecdsa_p384();
        let template = RequestTemplate::builder()
            .subject(params::parse_dn("CN=www.example.com").unwrap())
            .subject_alt_names(vec![
                SubjectAltNameEntry::Dns("www.example.com".to_string()),
                SubjectAltNameEntry::Dns("example.com".to_string()),
            ])
            .build();
        let request = CertificateRequest::new_signed(&template, key_pair.private()).unwrap();
        let decoded = CertificateRequest::from_der(&request.to_der().unwrap()).unwrap();

        assert_eq!(decoded.subject_dn(), "CN=www.example.com");
        assert_eq!(decoded.version(), 1);
        assert_eq!(decoded.key_type(), "ECDSA P-384");
        assert_eq!(decoded.signature_algorithm_name(), "ECDSA-SHA384");
        assert_eq!(&decoded.public_key().unwrap(), key_pair.public());
        assert_eq!(
            decoded.extensions().subject_alt_names,
            [
                SubjectAltNameEntry::Dns("www.example.com".to_string()),
                SubjectAltNameEntry::Dns("example.com".to_string()),
            ]
        );
        assert!(decoded.to_pem().unwrap().starts_with("-----BEGIN CERTIFICATE REQUEST-----"));
    }

    #[test]
    fn request_without_alt_names_has_no_extensions() {
        let key_pair = KeyPair::generate_ed25519();
        let template = RequestTemplate::builder()
            .subject(params::parse_dn("CN=remote,O=Example").unwrap())
            .build();
        let request = CertificateRequest::new_signed(&template, key_pair.private()).unwrap();
        assert!(request.inner.info.attributes.is_empty());
        assert!(request.extensions().all.is_empty());
        assert_eq!(request.key_type(), "ED25519");
    }
}
