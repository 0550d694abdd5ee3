//! Presentation views of registry entries.
//!
//! [`Entry`] is the compact summary used in listings, [`EntryDetails`] the grouped attribute
//! view of a single entry. Both are pure functions of the registry entry.

use const_oid::ObjectIdentifier;
use serde::{Deserialize, Serialize};

use crate::cert::extensions::{
    AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, KeyUsage, ParsedExtensions,
    SubjectAltName, SubjectAltNameEntry, SubjectKeyIdentifier, ToAndFromX509Extension,
    key_usage_string,
};
use crate::cert::params::{ExtensionParam, format_rfc3339};
use crate::cert::{Certificate, CertificateRequest};
use crate::registry::RegistryEntry;

/// Key type reported when an entry holds neither a certificate nor a request.
pub const UNKNOWN_KEY_TYPE: &str = "Unknown";

/// Compact summary of a registry entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub name: String,
    pub dn: String,
    /// Decimal serial number; `0` for request-only entries.
    ///
    /// Serialized as a JSON string rather than a number: serials are up to 20 bytes long and
    /// do not fit the integer range most JSON parsers preserve.
    pub serial: String,
    pub key_type: String,
    pub key: bool,
    pub crt: bool,
    pub csr: bool,
    pub crl: bool,
    pub ca: bool,
    pub valid_from: String,
    pub valid_to: String,
}

impl Entry {
    /// Summarizes an entry: the certificate wins over the request.
    pub fn from_registry_entry(entry: &RegistryEntry) -> Self {
        let mut summary = Self {
            name: entry.name.clone(),
            dn: String::new(),
            serial: String::new(),
            key_type: String::new(),
            key: entry.has_key(),
            crt: entry.has_certificate(),
            csr: entry.has_certificate_request(),
            crl: entry.has_revocation_list(),
            ca: false,
            valid_from: String::new(),
            valid_to: String::new(),
        };
        if let Some(certificate) = &entry.certificate {
            summary.dn = certificate.subject_dn();
            summary.serial = certificate.serial();
            summary.key_type = certificate.key_type();
            summary.ca = certificate.is_ca();
            if let Ok(validity) = certificate.validity() {
                summary.valid_from = format_rfc3339(validity.not_before);
                summary.valid_to = format_rfc3339(validity.not_after);
            }
        } else if let Some(request) = &entry.certificate_request {
            summary.dn = request.subject_dn();
            summary.serial = "0".to_string();
            summary.key_type = request.key_type();
        }
        summary
    }
}

/// A page of entry summaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entries {
    pub entries: Vec<Entry>,
    pub start: usize,
    /// Number of entries seen, including those outside the page.
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ca {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cas {
    pub cas: Vec<Ca>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryDetailsAttribute {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryDetailsGroup {
    pub title: String,
    pub attributes: Vec<EntryDetailsAttribute>,
}

impl EntryDetailsGroup {
    fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            attributes: Vec::new(),
        }
    }

    fn push(&mut self, key: &str, value: impl Into<String>) {
        self.attributes.push(EntryDetailsAttribute {
            key: key.to_string(),
            value: value.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Value of the first attribute with the given key.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attribute| attribute.key == key)
            .map(|attribute| attribute.value.as_str())
    }
}

/// Grouped attribute view of a registry entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryDetails {
    pub name: String,
    pub groups: Vec<EntryDetailsGroup>,
}

impl EntryDetails {
    /// Builds the view: a "Key" group, then certificate and request groups for the artifacts
    /// present. Extension groups are only emitted when non-empty.
    pub fn from_registry_entry(entry: &RegistryEntry) -> Self {
        let mut groups = vec![key_group(entry)];
        if let Some(certificate) = &entry.certificate {
            groups.push(certificate_group(certificate));
            let extensions = certificate_extensions_group(&certificate.extensions());
            if !extensions.is_empty() {
                groups.push(extensions);
            }
        }
        if let Some(request) = &entry.certificate_request {
            groups.push(request_group(request));
            let extensions = request_extensions_group(&request.extensions());
            if !extensions.is_empty() {
                groups.push(extensions);
            }
        }
        Self {
            name: entry.name.clone(),
            groups,
        }
    }

    pub fn group(&self, title: &str) -> Option<&EntryDetailsGroup> {
        self.groups.iter().find(|group| group.title == title)
    }
}

fn key_group(entry: &RegistryEntry) -> EntryDetailsGroup {
    let key_type = if let Some(certificate) = &entry.certificate {
        certificate.key_type()
    } else if let Some(request) = &entry.certificate_request {
        request.key_type()
    } else {
        UNKNOWN_KEY_TYPE.to_string()
    };
    let mut group = EntryDetailsGroup::new("Key");
    group.push("Key type", key_type);
    group.push("Private key", if entry.has_key() { "yes" } else { "no" });
    group
}

fn certificate_group(certificate: &Certificate) -> EntryDetailsGroup {
    let mut group = EntryDetailsGroup::new("Certificate");
    group.push("Version", certificate.version().to_string());
    group.push("DN", certificate.subject_dn());
    group.push("Serial", certificate.serial());
    group.push("Issuer DN", certificate.issuer_dn());
    group.push("Signature type", certificate.signature_algorithm_name());
    let (valid_from, valid_to) = certificate
        .validity()
        .map(|validity| {
            (
                format_rfc3339(validity.not_before),
                format_rfc3339(validity.not_after),
            )
        })
        .unwrap_or_default();
    group.push("Valid from", valid_from);
    group.push("Valid to", valid_to);
    group
}

fn request_group(request: &CertificateRequest) -> EntryDetailsGroup {
    let mut group = EntryDetailsGroup::new("Certificate request");
    group.push("Version", request.version().to_string());
    group.push("DN", request.subject_dn());
    group.push("Signature type", request.signature_algorithm_name());
    group
}

const CERTIFICATE_INLINE_EXTENSIONS: [ObjectIdentifier; 6] = [
    KeyUsage::OID,
    ExtendedKeyUsage::OID,
    BasicConstraints::OID,
    SubjectKeyIdentifier::OID,
    AuthorityKeyIdentifier::OID,
    SubjectAltName::OID,
];

const REQUEST_INLINE_EXTENSIONS: [ObjectIdentifier; 1] = [SubjectAltName::OID];

fn certificate_extensions_group(extensions: &ParsedExtensions) -> EntryDetailsGroup {
    let mut group = EntryDetailsGroup::new("Certificate extensions");
    let key_usage = extensions.key_usage_bits();
    if !key_usage.is_empty() {
        group.push("Key usage", key_usage_string(key_usage));
    }
    let ext_key_usage = &extensions.ext_key_usage;
    if !ext_key_usage.usage.is_empty() || !ext_key_usage.unknown.is_empty() {
        group.push("Extended key usage", ext_key_usage.to_display_string());
    }
    if extensions.basic_constraints_valid {
        group.push(
            "Basic constraints",
            basic_constraints_string(
                extensions.is_ca,
                extensions.max_path_len,
                extensions.max_path_len_zero,
            ),
        );
    }
    if !extensions.subject_key_id.is_empty() {
        group.push("Subject key id", key_identifier_string(&extensions.subject_key_id));
    }
    if !extensions.authority_key_id.is_empty() {
        group.push(
            "Authority key id",
            key_identifier_string(&extensions.authority_key_id),
        );
    }
    push_subject_alt_names(&mut group, &extensions.subject_alt_names);
    push_generic_extensions(&mut group, &extensions.all, &CERTIFICATE_INLINE_EXTENSIONS);
    group
}

fn request_extensions_group(extensions: &ParsedExtensions) -> EntryDetailsGroup {
    let mut group = EntryDetailsGroup::new("Certificate request extensions");
    push_subject_alt_names(&mut group, &extensions.subject_alt_names);
    push_generic_extensions(&mut group, &extensions.all, &REQUEST_INLINE_EXTENSIONS);
    group
}

/// Alternative names grouped by kind (DNS, email, IP, URI). Only the first row carries the
/// attribute key; the following rows have a blank key.
fn push_subject_alt_names(group: &mut EntryDetailsGroup, names: &[SubjectAltNameEntry]) {
    let dns = names.iter().filter_map(|name| match name {
        SubjectAltNameEntry::Dns(dns) => Some(format!("DNS:{dns}")),
        _ => None,
    });
    let emails = names.iter().filter_map(|name| match name {
        SubjectAltNameEntry::Email(email) => Some(format!("EMAIL:{email}")),
        _ => None,
    });
    let ips = names.iter().filter_map(|name| match name {
        SubjectAltNameEntry::Ip(ip) => Some(format!("IP:{ip}")),
        _ => None,
    });
    let uris = names.iter().filter_map(|name| match name {
        SubjectAltNameEntry::Uri(uri) => Some(format!("URI:{uri}")),
        _ => None,
    });
    let mut key = "Subject alternative name";
    for value in dns.chain(emails).chain(ips).chain(uris) {
        group.push(key, value);
        key = "";
    }
}

fn push_generic_extensions(
    group: &mut EntryDetailsGroup,
    extensions: &[ExtensionParam],
    inline: &[ObjectIdentifier],
) {
    for extension in extensions {
        if inline.contains(&extension.oid) {
            continue;
        }
        let critical = if extension.critical { "critical " } else { "" };
        group.push(
            &extension_name(&extension.oid),
            format!("{critical}{}", hex(&extension.value)),
        );
    }
}

const EXTENSION_NAMES: [(&str, &str); 11] = [
    ("2.5.29.14", "SubjectKeyIdentifier"),
    ("2.5.29.15", "KeyUsage"),
    ("2.5.29.17", "SubjectAlternativeName"),
    ("2.5.29.18", "IssuerAlternativeName"),
    ("2.5.29.19", "BasicConstraints"),
    ("2.5.29.30", "NameConstraints"),
    ("2.5.29.31", "CRLDistributionPoints"),
    ("2.5.29.32", "CertificatePolicies"),
    ("2.5.29.35", "AuthorityKeyIdentifier"),
    ("2.5.29.37", "ExtKeyUsage"),
    ("1.3.6.1.5.5.7.1.1", "AuthorityInfoAccess"),
];

/// Display name of an extension: the fixed table, then the OID database, then the OID.
pub fn extension_name(oid: &ObjectIdentifier) -> String {
    let dotted = oid.to_string();
    EXTENSION_NAMES
        .iter()
        .find(|(known, _)| *known == dotted)
        .map(|(_, name)| name.to_string())
        .or_else(|| const_oid::db::DB.by_oid(oid).map(str::to_string))
        .unwrap_or(dotted)
}

/// Renders basic constraints, e.g. `CA = true, pathLenConstraint = 0`.
pub fn basic_constraints_string(is_ca: bool, max_path_len: i32, max_path_len_zero: bool) -> String {
    if !is_ca {
        return "CA = false".to_string();
    }
    if max_path_len > 0 || (max_path_len == 0 && max_path_len_zero) {
        format!("CA = true, pathLenConstraint = {max_path_len}")
    } else {
        "CA = true".to_string()
    }
}

/// Renders a key identifier as colon separated hex bytes.
pub fn key_identifier_string(key_id: &[u8]) -> String {
    key_id
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(":")
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
