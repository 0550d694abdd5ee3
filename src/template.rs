//! Unsigned certificate and request templates, and the extension specs applied to them.
//!
//! An [`ExtensionSpec`] only touches the template when it is enabled. A disabled spec leaves
//! the template field at whatever value it had before (its zero value for a fresh template).

use bon::Builder;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use x509_cert::name::Name;

use crate::cert::extensions::{ExtendedKeyUsageOption, FlagSet, KeyUsages, SubjectAltNameEntry};
use crate::cert::params::parse_dn;
use crate::error::{CertMgrError, Result};

/// The unsigned contents of a certificate.
///
/// `max_path_len` follows the usual convention: a positive value is a path length
/// constraint, `0` is only a constraint when `max_path_len_zero` is set, and `-1` means
/// unconstrained.
#[derive(Clone, Debug, Builder)]
pub struct CertificateTemplate {
    pub subject: Name,
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
    #[builder(default)]
    pub key_usage: FlagSet<KeyUsages>,
    #[builder(default)]
    pub ext_key_usage: Vec<ExtendedKeyUsageOption>,
    #[builder(default)]
    pub basic_constraints_valid: bool,
    #[builder(default)]
    pub is_ca: bool,
    #[builder(default)]
    pub max_path_len: i32,
    #[builder(default)]
    pub max_path_len_zero: bool,
    #[builder(default)]
    pub subject_alt_names: Vec<SubjectAltNameEntry>,
}

impl CertificateTemplate {
    /// Path length to encode into the basic constraints, if any.
    pub fn path_len_constraint(&self) -> Option<i32> {
        if self.max_path_len > 0 || (self.max_path_len == 0 && self.max_path_len_zero) {
            Some(self.max_path_len)
        } else {
            None
        }
    }
}

/// The unsigned contents of a certificate signing request.
#[derive(Clone, Debug, Builder)]
pub struct RequestTemplate {
    pub subject: Name,
    #[builder(default)]
    pub subject_alt_names: Vec<SubjectAltNameEntry>,
}

impl RequestTemplate {
    /// Request for a set of domains: CN is the first domain, every domain becomes a DNS
    /// alternative name.
    pub fn for_domains(domains: &[String]) -> Result<Self> {
        let first = domains
            .first()
            .ok_or_else(|| CertMgrError::Validation("missing domains".to_string()))?;
        Ok(Self::builder()
            .subject(parse_dn(&format!("CN={first}"))?)
            .subject_alt_names(
                domains
                    .iter()
                    .map(|domain| SubjectAltNameEntry::Dns(domain.clone()))
                    .collect(),
            )
            .build())
    }
}

/// Something that can be applied to a certificate template.
pub trait ApplyToCertificate {
    fn apply(&self, template: &mut CertificateTemplate);
}

/// An optional extension setting as received in a request body.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionSpec<T> {
    #[serde(default)]
    pub enabled: bool,
    #[serde(flatten)]
    pub payload: T,
}

impl<T: ApplyToCertificate> ExtensionSpec<T> {
    pub fn enabled(payload: T) -> Self {
        Self {
            enabled: true,
            payload,
        }
    }

    pub fn apply_to_certificate(&self, template: &mut CertificateTemplate) {
        if !self.enabled {
            return;
        }
        self.payload.apply(template);
    }
}

/// Key usage bitmask in RFC 5280 bit order (bit 0 = `digitalSignature`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyUsageFlags {
    #[serde(default)]
    pub key_usage: u16,
}

impl KeyUsageFlags {
    pub fn flags(&self) -> FlagSet<KeyUsages> {
        FlagSet::new_truncated(self.key_usage)
    }
}

impl ApplyToCertificate for KeyUsageFlags {
    fn apply(&self, template: &mut CertificateTemplate) {
        template.key_usage = self.flags();
    }
}

pub type KeyUsageSpec = ExtensionSpec<KeyUsageFlags>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtKeyUsageFlags {
    pub any: bool,
    pub server_auth: bool,
    pub client_auth: bool,
    pub code_signing: bool,
    pub email_protection: bool,
    pub ipsec_end_system: bool,
    pub ipsec_tunnel: bool,
    pub ipsec_user: bool,
    pub time_stamping: bool,
    pub ocsp_signing: bool,
    pub microsoft_server_gated_crypto: bool,
    pub netscape_server_gated_crypto: bool,
    pub microsoft_commercial_code_signing: bool,
    pub microsoft_kernel_code_signing: bool,
}

impl ExtKeyUsageFlags {
    /// The selected purposes, in their fixed output order.
    pub fn options(&self) -> Vec<ExtendedKeyUsageOption> {
        use ExtendedKeyUsageOption::*;

        [
            (self.any, Any),
            (self.server_auth, ServerAuth),
            (self.client_auth, ClientAuth),
            (self.code_signing, CodeSigning),
            (self.email_protection, EmailProtection),
            (self.time_stamping, TimeStamping),
            (self.ocsp_signing, OcspSigning),
            (self.ipsec_end_system, IpsecEndSystem),
            (self.ipsec_tunnel, IpsecTunnel),
            (self.ipsec_user, IpsecUser),
            (self.microsoft_server_gated_crypto, MicrosoftServerGatedCrypto),
            (self.netscape_server_gated_crypto, NetscapeServerGatedCrypto),
            (
                self.microsoft_commercial_code_signing,
                MicrosoftCommercialCodeSigning,
            ),
            (self.microsoft_kernel_code_signing, MicrosoftKernelCodeSigning),
        ]
        .into_iter()
        .filter_map(|(selected, option)| selected.then_some(option))
        .collect()
    }
}

impl ApplyToCertificate for ExtKeyUsageFlags {
    fn apply(&self, template: &mut CertificateTemplate) {
        template.ext_key_usage = self.options();
    }
}

pub type ExtKeyUsageSpec = ExtensionSpec<ExtKeyUsageFlags>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BasicConstraintsParams {
    pub ca: bool,
    pub path_len_constraint: i32,
}

impl ApplyToCertificate for BasicConstraintsParams {
    fn apply(&self, template: &mut CertificateTemplate) {
        template.basic_constraints_valid = true;
        template.is_ca = self.ca;
        if self.ca && self.path_len_constraint >= 0 {
            template.max_path_len = self.path_len_constraint;
            template.max_path_len_zero = true;
        } else {
            template.max_path_len = -1;
            template.max_path_len_zero = false;
        }
    }
}

pub type BasicConstraintsSpec = ExtensionSpec<BasicConstraintsParams>;

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_template() -> CertificateTemplate {
        let now = OffsetDateTime::now_utc();
        CertificateTemplate::builder()
            .subject(parse_dn("CN=template").unwrap())
            .not_before(now)
            .not_after(now + time::Duration::days(1))
            .build()
    }

    #[test]
    fn path_length_zero_is_kept_apart_from_unconstrained() {
        let mut template = empty_template();
        BasicConstraintsSpec::enabled(BasicConstraintsParams {
            ca: true,
            path_len_constraint: 0,
        })
        .apply_to_certificate(&mut template);
        assert!(template.basic_constraints_valid);
        assert!(template.is_ca);
        assert_eq!(template.max_path_len, 0);
        assert!(template.max_path_len_zero);
        assert_eq!(template.path_len_constraint(), Some(0));

        let mut template = empty_template();
        BasicConstraintsSpec::enabled(BasicConstraintsParams {
            ca: true,
            path_len_constraint: -1,
        })
        .apply_to_certificate(&mut template);
        assert_eq!(template.max_path_len, -1);
        assert!(!template.max_path_len_zero);
        assert_eq!(template.path_len_constraint(), None);
    }

    #[test]
    fn path_length_is_ignored_for_non_ca() {
        let mut template = empty_template();
        BasicConstraintsSpec::enabled(BasicConstraintsParams {
            ca: false,
            path_len_constraint: 3,
        })
        .apply_to_certificate(&mut template);
        assert!(template.basic_constraints_valid);
        assert!(!template.is_ca);
        assert_eq!(template.max_path_len, -1);
        assert!(!template.max_path_len_zero);
    }

    #[test]
    fn ext_key_usage_order_is_fixed() {
        let spec: ExtKeyUsageSpec = serde_json::from_str(
            r#"{"enabled": true, "codeSigning": true, "serverAuth": true}"#,
        )
        .unwrap();
        let mut template = empty_template();
        spec.apply_to_certificate(&mut template);
        assert_eq!(
            template.ext_key_usage,
            [
                ExtendedKeyUsageOption::ServerAuth,
                ExtendedKeyUsageOption::CodeSigning
            ]
        );
    }

    #[test]
    fn ext_key_usage_places_ipsec_after_ocsp() {
        let flags = ExtKeyUsageFlags {
            ipsec_user: true,
            ocsp_signing: true,
            any: true,
            microsoft_kernel_code_signing: true,
            ..Default::default()
        };
        assert_eq!(
            flags.options(),
            [
                ExtendedKeyUsageOption::Any,
                ExtendedKeyUsageOption::OcspSigning,
                ExtendedKeyUsageOption::IpsecUser,
                ExtendedKeyUsageOption::MicrosoftKernelCodeSigning,
            ]
        );
    }

    #[test]
    fn disabled_specs_leave_the_template_untouched() {
        let mut template = empty_template();
        KeyUsageSpec {
            enabled: false,
            payload: KeyUsageFlags { key_usage: 0x05 },
        }
        .apply_to_certificate(&mut template);
        ExtKeyUsageSpec {
            enabled: false,
            payload: ExtKeyUsageFlags {
                server_auth: true,
                ..Default::default()
            },
        }
        .apply_to_certificate(&mut template);
        BasicConstraintsSpec {
            enabled: false,
            payload: BasicConstraintsParams {
                ca: true,
                path_len_constraint: 2,
            },
        }
        .apply_to_certificate(&mut template);

        assert!(template.key_usage.is_empty());
        assert!(template.ext_key_usage.is_empty());
        assert!(!template.basic_constraints_valid);
        assert!(!template.is_ca);
        assert_eq!(template.max_path_len, 0);
        assert!(!template.max_path_len_zero);
    }

    #[test]
    fn domain_request_template() {
        let domains = vec!["example.com".to_string(), "www.example.com".to_string()];
        let template = RequestTemplate::for_domains(&domains).unwrap();
        assert_eq!(template.subject.to_string(), "CN=example.com");
        assert_eq!(
            template.subject_alt_names,
            [
                SubjectAltNameEntry::Dns("example.com".to_string()),
                SubjectAltNameEntry::Dns("www.example.com".to_string()),
            ]
        );
        assert!(RequestTemplate::for_domains(&[]).is_err());
    }

    #[test]
    fn key_usage_overwrites_bitmask() {
        let mut template = empty_template();
        template.key_usage = KeyUsages::DecipherOnly.into();
        let spec: KeyUsageSpec = serde_json::from_str(r#"{"enabled":true,"keyUsage":97}"#).unwrap();
        spec.apply_to_certificate(&mut template);
        // 97 = digitalSignature | keyCertSign | cRLSign
        assert_eq!(
            template.key_usage,
            KeyUsages::DigitalSignature | KeyUsages::KeyCertSign | KeyUsages::CRLSign
        );
    }
}
