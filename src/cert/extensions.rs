use std::net::IpAddr;

use const_oid::AssociatedOid;
use der::{
    Decode, Encode,
    asn1::{Ia5String, OctetString},
    oid::ObjectIdentifier,
};
use sha1::{Digest, Sha1};
use x509_cert::ext::Extension;
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::spki::SubjectPublicKeyInfoOwned;

pub use der::flagset::FlagSet;
use x509_cert::ext::pkix::KeyUsage as X509KeyUsage;
pub use x509_cert::ext::pkix::KeyUsages;

use super::params::ExtensionParam;
use crate::error::{CertMgrError, Result};

/// Trait for converting to and from X.509 extensions.
///
/// This trait provides methods to encode and decode X.509 extension values.
///
/// # Example
/// ```
/// use certmgr::cert::extensions::{SubjectAltName, SubjectAltNameEntry, ToAndFromX509Extension};
/// let san = SubjectAltName { names: vec![SubjectAltNameEntry::Dns("example.com".to_string())] };
/// let encoded = san.to_x509_extension_value().unwrap();
/// let decoded = SubjectAltName::from_x509_extension_value(&encoded).unwrap();
/// assert_eq!(san.names, decoded.names);
/// ```
pub trait ToAndFromX509Extension {
    /// The Object Identifier (OID) for the extension.
    const OID: ObjectIdentifier;

    /// Encodes the extension into a DER-encoded byte vector.
    fn to_x509_extension_value(&self) -> Result<Vec<u8>>;

    /// Decodes the extension from a DER-encoded byte slice.
    fn from_x509_extension_value(extension: &[u8]) -> Result<Self>
    where
        Self: Sized;
}

/// A single subject alternative name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubjectAltNameEntry {
    Dns(String),
    Email(String),
    Ip(IpAddr),
    Uri(String),
}

/// Represents the Subject Alternative Name (SAN) extension.
///
/// Only DNS, email, IP address and URI names are modelled; other name forms are skipped
/// when decoding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubjectAltName {
    pub names: Vec<SubjectAltNameEntry>,
}

fn ia5(value: &str) -> Result<Ia5String> {
    Ia5String::new(value).map_err(|e| CertMgrError::Validation(format!("'{value}': {e}")))
}

impl ToAndFromX509Extension for SubjectAltName {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::SubjectAltName::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let names = self
            .names
            .iter()
            .map(|name| match name {
                SubjectAltNameEntry::Dns(dns) => Ok(GeneralName::DnsName(ia5(dns)?)),
                SubjectAltNameEntry::Email(email) => Ok(GeneralName::Rfc822Name(ia5(email)?)),
                SubjectAltNameEntry::Uri(uri) => {
                    Ok(GeneralName::UniformResourceIdentifier(ia5(uri)?))
                }
                SubjectAltNameEntry::Ip(ip) => {
                    let octets = match ip {
                        IpAddr::V4(v4) => v4.octets().to_vec(),
                        IpAddr::V6(v6) => v6.octets().to_vec(),
                    };
                    Ok(GeneralName::IpAddress(OctetString::new(octets)?))
                }
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(x509_cert::ext::pkix::SubjectAltName(names).to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let san = x509_cert::ext::pkix::SubjectAltName::from_der(extension)?;
        let names = san
            .0
            .iter()
            .filter_map(|name| match name {
                GeneralName::DnsName(dns) => Some(SubjectAltNameEntry::Dns(dns.to_string())),
                GeneralName::Rfc822Name(email) => {
                    Some(SubjectAltNameEntry::Email(email.to_string()))
                }
                GeneralName::UniformResourceIdentifier(uri) => {
                    Some(SubjectAltNameEntry::Uri(uri.to_string()))
                }
                GeneralName::IpAddress(octets) => ip_from_octets(octets.as_bytes()),
                _ => None,
            })
            .collect();
        Ok(Self { names })
    }
}

fn ip_from_octets(octets: &[u8]) -> Option<SubjectAltNameEntry> {
    if let Ok(v4) = <[u8; 4]>::try_from(octets) {
        Some(SubjectAltNameEntry::Ip(IpAddr::from(v4)))
    } else if let Ok(v6) = <[u8; 16]>::try_from(octets) {
        Some(SubjectAltNameEntry::Ip(IpAddr::from(v6)))
    } else {
        None
    }
}

/// Represents the Basic Constraints extension.
///
/// This extension indicates whether the certificate is a CA certificate and its path length.
///
/// # Fields
/// * `is_ca` - Indicates if the certificate is a CA.
/// * `max_path_length` - The maximum number of intermediate CAs allowed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BasicConstraints {
    pub is_ca: bool,
    pub max_path_length: Option<u8>,
}

impl ToAndFromX509Extension for BasicConstraints {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::BasicConstraints::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let bc = x509_cert::ext::pkix::BasicConstraints {
            ca: self.is_ca,
            path_len_constraint: self.max_path_length,
        };

        Ok(bc.to_der()?)
    }

    fn from_x509_extension_value(der_bytes: &[u8]) -> Result<Self> {
        let bc = x509_cert::ext::pkix::BasicConstraints::from_der(der_bytes)?;
        Ok(Self {
            is_ca: bc.ca,
            max_path_length: bc.path_len_constraint,
        })
    }
}

/// Represents the Key Usage extension.
///
/// This extension defines the purpose of the key contained in the certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyUsage(pub FlagSet<KeyUsages>);

impl ToAndFromX509Extension for KeyUsage {
    const OID: ObjectIdentifier = <X509KeyUsage as AssociatedOid>::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let ku = X509KeyUsage::from(self.0);
        Ok(ku.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let ku = X509KeyUsage::from_der(extension)?;
        Ok(Self(ku.0))
    }
}

/// Key usage bits with their RFC 5280 names, in bit order.
pub const KEY_USAGE_NAMES: [(KeyUsages, &str); 9] = [
    (KeyUsages::DigitalSignature, "digitalSignature"),
    (KeyUsages::NonRepudiation, "nonRepudiation"),
    (KeyUsages::KeyEncipherment, "keyEncipherment"),
    (KeyUsages::DataEncipherment, "dataEncipherment"),
    (KeyUsages::KeyAgreement, "keyAgreement"),
    (KeyUsages::KeyCertSign, "keyCertSign"),
    (KeyUsages::CRLSign, "cRLSign"),
    (KeyUsages::EncipherOnly, "encipherOnly"),
    (KeyUsages::DecipherOnly, "decipherOnly"),
];

/// Renders a key usage bitmask as comma-separated names in bit order.
pub fn key_usage_string(key_usage: FlagSet<KeyUsages>) -> String {
    KEY_USAGE_NAMES
        .iter()
        .filter(|(flag, _)| key_usage.contains(*flag))
        .map(|(_, name)| *name)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Represents the Extended Key Usage extension.
///
/// Purposes without an [`ExtendedKeyUsageOption`] are kept in `unknown`, in encoding order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtendedKeyUsage {
    pub usage: Vec<ExtendedKeyUsageOption>,
    pub unknown: Vec<ObjectIdentifier>,
}

impl ToAndFromX509Extension for ExtendedKeyUsage {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::ExtendedKeyUsage::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let oids: Vec<ObjectIdentifier> = self
            .usage
            .iter()
            .map(|v| (*v).into())
            .chain(self.unknown.iter().copied())
            .collect();
        let eku = x509_cert::ext::pkix::ExtendedKeyUsage(oids);
        Ok(eku.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let eku = x509_cert::ext::pkix::ExtendedKeyUsage::from_der(extension)?;
        let mut decoded = Self::default();
        for oid in eku.0 {
            match ExtendedKeyUsageOption::from_oid(&oid) {
                Some(option) => decoded.usage.push(option),
                None => decoded.unknown.push(oid),
            }
        }
        Ok(decoded)
    }
}

impl ExtendedKeyUsage {
    /// Renders the purposes as comma-separated names followed by the unknown OIDs.
    pub fn to_display_string(&self) -> String {
        self.usage
            .iter()
            .map(|option| option.name().to_string())
            .chain(self.unknown.iter().map(|oid| oid.to_string()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Represents an option for the Extended Key Usage extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtendedKeyUsageOption {
    Any,
    ServerAuth,
    ClientAuth,
    CodeSigning,
    EmailProtection,
    IpsecEndSystem,
    IpsecTunnel,
    IpsecUser,
    TimeStamping,
    OcspSigning,
    MicrosoftServerGatedCrypto,
    NetscapeServerGatedCrypto,
    MicrosoftCommercialCodeSigning,
    MicrosoftKernelCodeSigning,
}

const ANY_EXTENDED_KEY_USAGE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.37.0");
const ID_KP_IPSEC_END_SYSTEM: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.5");
const ID_KP_IPSEC_TUNNEL: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.6");
const ID_KP_IPSEC_USER: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.7");
const MS_SERVER_GATED_CRYPTO: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.311.10.3.3");
const NS_SERVER_GATED_CRYPTO: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("2.16.840.1.113730.4.1");
const MS_COMMERCIAL_CODE_SIGNING: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.311.2.1.22");
const MS_KERNEL_CODE_SIGNING: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.311.61.1.1");

impl ExtendedKeyUsageOption {
    pub const ALL: [ExtendedKeyUsageOption; 14] = [
        ExtendedKeyUsageOption::Any,
        ExtendedKeyUsageOption::ServerAuth,
        ExtendedKeyUsageOption::ClientAuth,
        ExtendedKeyUsageOption::CodeSigning,
        ExtendedKeyUsageOption::EmailProtection,
        ExtendedKeyUsageOption::IpsecEndSystem,
        ExtendedKeyUsageOption::IpsecTunnel,
        ExtendedKeyUsageOption::IpsecUser,
        ExtendedKeyUsageOption::TimeStamping,
        ExtendedKeyUsageOption::OcspSigning,
        ExtendedKeyUsageOption::MicrosoftServerGatedCrypto,
        ExtendedKeyUsageOption::NetscapeServerGatedCrypto,
        ExtendedKeyUsageOption::MicrosoftCommercialCodeSigning,
        ExtendedKeyUsageOption::MicrosoftKernelCodeSigning,
    ];

    pub fn from_oid(oid: &ObjectIdentifier) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|option| ObjectIdentifier::from(*option) == *oid)
    }

    /// The purpose name, as used in request bodies.
    pub fn name(&self) -> &'static str {
        match self {
            ExtendedKeyUsageOption::Any => "any",
            ExtendedKeyUsageOption::ServerAuth => "serverAuth",
            ExtendedKeyUsageOption::ClientAuth => "clientAuth",
            ExtendedKeyUsageOption::CodeSigning => "codeSigning",
            ExtendedKeyUsageOption::EmailProtection => "emailProtection",
            ExtendedKeyUsageOption::IpsecEndSystem => "ipsecEndSystem",
            ExtendedKeyUsageOption::IpsecTunnel => "ipsecTunnel",
            ExtendedKeyUsageOption::IpsecUser => "ipsecUser",
            ExtendedKeyUsageOption::TimeStamping => "timeStamping",
            ExtendedKeyUsageOption::OcspSigning => "ocspSigning",
            ExtendedKeyUsageOption::MicrosoftServerGatedCrypto => "microsoftServerGatedCrypto",
            ExtendedKeyUsageOption::NetscapeServerGatedCrypto => "netscapeServerGatedCrypto",
            ExtendedKeyUsageOption::MicrosoftCommercialCodeSigning => {
                "microsoftCommercialCodeSigning"
            }
            ExtendedKeyUsageOption::MicrosoftKernelCodeSigning => "microsoftKernelCodeSigning",
        }
    }
}

impl From<ExtendedKeyUsageOption> for ObjectIdentifier {
    fn from(value: ExtendedKeyUsageOption) -> Self {
        match value {
            ExtendedKeyUsageOption::Any => ANY_EXTENDED_KEY_USAGE,
            ExtendedKeyUsageOption::ServerAuth => const_oid::db::rfc5912::ID_KP_SERVER_AUTH,
            ExtendedKeyUsageOption::ClientAuth => const_oid::db::rfc5912::ID_KP_CLIENT_AUTH,
            ExtendedKeyUsageOption::CodeSigning => const_oid::db::rfc5912::ID_KP_CODE_SIGNING,
            ExtendedKeyUsageOption::EmailProtection => {
                const_oid::db::rfc5912::ID_KP_EMAIL_PROTECTION
            }
            ExtendedKeyUsageOption::IpsecEndSystem => ID_KP_IPSEC_END_SYSTEM,
            ExtendedKeyUsageOption::IpsecTunnel => ID_KP_IPSEC_TUNNEL,
            ExtendedKeyUsageOption::IpsecUser => ID_KP_IPSEC_USER,
            ExtendedKeyUsageOption::TimeStamping => const_oid::db::rfc5912::ID_KP_TIME_STAMPING,
            ExtendedKeyUsageOption::OcspSigning => const_oid::db::rfc5912::ID_KP_OCSP_SIGNING,
            ExtendedKeyUsageOption::MicrosoftServerGatedCrypto => MS_SERVER_GATED_CRYPTO,
            ExtendedKeyUsageOption::NetscapeServerGatedCrypto => NS_SERVER_GATED_CRYPTO,
            ExtendedKeyUsageOption::MicrosoftCommercialCodeSigning => MS_COMMERCIAL_CODE_SIGNING,
            ExtendedKeyUsageOption::MicrosoftKernelCodeSigning => MS_KERNEL_CODE_SIGNING,
        }
    }
}

/// Represents the Subject Key Identifier (SKI) extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectKeyIdentifier(pub Vec<u8>);

impl SubjectKeyIdentifier {
    /// Derives the identifier from a public key (RFC 5280, 4.2.1.2, method 1).
    pub fn from_spki(spki: &SubjectPublicKeyInfoOwned) -> Self {
        Self(key_identifier(spki))
    }
}

impl ToAndFromX509Extension for SubjectKeyIdentifier {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::SubjectKeyIdentifier::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let ski = x509_cert::ext::pkix::SubjectKeyIdentifier(OctetString::new(self.0.clone())?);
        Ok(ski.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let ski = x509_cert::ext::pkix::SubjectKeyIdentifier::from_der(extension)?;
        Ok(Self(ski.0.as_bytes().to_vec()))
    }
}

/// SHA-1 over the subject public key bits.
pub fn key_identifier(spki: &SubjectPublicKeyInfoOwned) -> Vec<u8> {
    Sha1::digest(spki.subject_public_key.raw_bytes()).to_vec()
}

/// Represents the Authority Key Identifier (AKI) extension.
///
/// Only the key identifier form is produced; issuer name and serial are ignored when decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorityKeyIdentifier {
    pub key_identifier: Vec<u8>,
}

impl ToAndFromX509Extension for AuthorityKeyIdentifier {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::AuthorityKeyIdentifier::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let aki = x509_cert::ext::pkix::AuthorityKeyIdentifier {
            key_identifier: Some(OctetString::new(self.key_identifier.as_slice())?),
            authority_cert_issuer: None,
            authority_cert_serial_number: None,
        };

        Ok(aki.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let aki = x509_cert::ext::pkix::AuthorityKeyIdentifier::from_der(extension)?;
        Ok(Self {
            key_identifier: aki
                .key_identifier
                .map(|id| id.as_bytes().to_vec())
                .unwrap_or_default(),
        })
    }
}

/// The extensions of a certificate or request, decoded into their typed forms.
///
/// Extensions that are unknown, or that fail to decode, only appear in `all`.
#[derive(Debug, Clone, Default)]
pub struct ParsedExtensions {
    pub key_usage: Option<FlagSet<KeyUsages>>,
    pub ext_key_usage: ExtendedKeyUsage,
    pub basic_constraints_valid: bool,
    pub is_ca: bool,
    /// `-1` when no path length constraint is present.
    pub max_path_len: i32,
    pub max_path_len_zero: bool,
    pub subject_key_id: Vec<u8>,
    pub authority_key_id: Vec<u8>,
    pub subject_alt_names: Vec<SubjectAltNameEntry>,
    /// Every extension, in encoding order.
    pub all: Vec<ExtensionParam>,
}

impl ParsedExtensions {
    pub fn parse(extensions: &[Extension]) -> Self {
        let mut parsed = Self {
            max_path_len: -1,
            ..Self::default()
        };
        for extension in extensions {
            let param = ExtensionParam::from_x509_extension(extension);
            parsed.decode(&param);
            parsed.all.push(param);
        }
        parsed
    }

    // Extensions that fail to decode leave their typed field at its default.
    fn decode(&mut self, param: &ExtensionParam) {
        let oid = param.oid;
        if oid == KeyUsage::OID {
            if let Ok(ku) = param.to_extension::<KeyUsage>() {
                self.key_usage = Some(ku.0);
            }
        } else if oid == ExtendedKeyUsage::OID {
            if let Ok(eku) = param.to_extension::<ExtendedKeyUsage>() {
                self.ext_key_usage = eku;
            }
        } else if oid == BasicConstraints::OID {
            if let Ok(bc) = param.to_extension::<BasicConstraints>() {
                self.basic_constraints_valid = true;
                self.is_ca = bc.is_ca;
                self.max_path_len = bc.max_path_length.map_or(-1, i32::from);
                self.max_path_len_zero = self.max_path_len == 0;
            }
        } else if oid == SubjectKeyIdentifier::OID {
            if let Ok(ski) = param.to_extension::<SubjectKeyIdentifier>() {
                self.subject_key_id = ski.0;
            }
        } else if oid == AuthorityKeyIdentifier::OID {
            if let Ok(aki) = param.to_extension::<AuthorityKeyIdentifier>() {
                self.authority_key_id = aki.key_identifier;
            }
        } else if oid == SubjectAltName::OID {
            if let Ok(san) = param.to_extension::<SubjectAltName>() {
                self.subject_alt_names = san.names;
            }
        }
    }

    /// Key usage bits, empty when the extension is absent.
    pub fn key_usage_bits(&self) -> FlagSet<KeyUsages> {
        self.key_usage.unwrap_or_default()
    }

    /// Whether the basic constraints mark the subject as a CA.
    pub fn is_ca(&self) -> bool {
        self.basic_constraints_valid && self.is_ca
    }
}
