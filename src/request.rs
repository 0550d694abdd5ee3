//! Generation requests, as received from the transport layer.
//!
//! Each request validates itself before any template is built from it.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::cert::params::parse_dn;
use crate::error::{CertMgrError, Result};
use crate::template::{
    BasicConstraintsSpec, CertificateTemplate, ExtKeyUsageSpec, KeyUsageSpec, RequestTemplate,
};

// optional wildcard label, then LDH labels of at most 63 characters
static DNS_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(\*\.)?([A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?\.)*[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?$",
    )
    .expect("DNS name pattern compiles")
});

// largest path length a basic constraints extension can carry
const MAX_PATH_LEN_CONSTRAINT: i32 = u8::MAX as i32;

fn require(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(CertMgrError::Validation(format!("missing {field}")));
    }
    Ok(())
}

/// Checks that `domain` is a syntactically valid DNS name.
pub fn validate_domain(domain: &str) -> Result<()> {
    if domain.len() > 253 || !DNS_NAME.is_match(domain) {
        return Err(CertMgrError::Validation(format!(
            "invalid domain name '{domain}'"
        )));
    }
    Ok(())
}

/// Request for a locally signed (or self-signed) certificate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateLocal {
    /// Entry name; the registry picks one when empty.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub ca: String,
    pub dn: String,
    pub key_type: String,
    /// Name of the issuing entry; self-signed when empty.
    #[serde(default)]
    pub issuer: String,
    #[serde(with = "time::serde::rfc3339")]
    pub valid_from: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub valid_to: OffsetDateTime,
    #[serde(default)]
    pub key_usage: KeyUsageSpec,
    #[serde(default)]
    pub ext_key_usage: ExtKeyUsageSpec,
    #[serde(default)]
    pub basic_constraints: BasicConstraintsSpec,
}

impl GenerateLocal {
    pub fn validate(&self) -> Result<()> {
        require(&self.dn, "DN")?;
        require(&self.key_type, "key type")?;
        if self.valid_to <= self.valid_from {
            return Err(CertMgrError::Validation(format!(
                "validTo ({}) must be after validFrom ({})",
                self.valid_to, self.valid_from
            )));
        }
        if self.valid_from < OffsetDateTime::UNIX_EPOCH {
            return Err(CertMgrError::Validation(format!(
                "validFrom ({}) must not be before 1970",
                self.valid_from
            )));
        }
        let basic_constraints = &self.basic_constraints;
        if basic_constraints.enabled
            && basic_constraints.payload.ca
            && basic_constraints.payload.path_len_constraint > MAX_PATH_LEN_CONSTRAINT
        {
            return Err(CertMgrError::Validation(format!(
                "pathLenConstraint ({}) must not exceed {MAX_PATH_LEN_CONSTRAINT}",
                basic_constraints.payload.path_len_constraint
            )));
        }
        Ok(())
    }

    /// Builds the certificate template; extension specs are applied only when enabled.
    pub fn to_template(&self) -> Result<CertificateTemplate> {
        let mut template = CertificateTemplate::builder()
            .subject(parse_dn(&self.dn)?)
            .not_before(self.valid_from)
            .not_after(self.valid_to)
            .build();
        self.key_usage.apply_to_certificate(&mut template);
        self.ext_key_usage.apply_to_certificate(&mut template);
        self.basic_constraints.apply_to_certificate(&mut template);
        Ok(template)
    }
}

/// Request for a certificate signing request to be signed elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRemote {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub ca: String,
    pub dn: String,
    pub key_type: String,
}

impl GenerateRemote {
    pub fn validate(&self) -> Result<()> {
        require(&self.dn, "DN")?;
        require(&self.key_type, "key type")
    }

    /// Only the subject is carried into the request.
    pub fn to_template(&self) -> Result<RequestTemplate> {
        Ok(RequestTemplate::builder()
            .subject(parse_dn(&self.dn)?)
            .build())
    }
}

/// Request for a certificate obtained from an ACME provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateAcme {
    #[serde(default)]
    pub name: String,
    /// `ACME:<provider>`
    pub ca: String,
    pub domains: Vec<String>,
    pub key_type: String,
}

impl GenerateAcme {
    pub fn validate(&self) -> Result<()> {
        require(&self.ca, "CA")?;
        require(&self.key_type, "key type")?;
        if self.domains.is_empty() {
            return Err(CertMgrError::Validation("missing domains".to_string()));
        }
        self.domains.iter().try_for_each(|domain| validate_domain(domain))
    }
}

/// Any of the three generation requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GenerationRequest {
    Local(GenerateLocal),
    Remote(GenerateRemote),
    Acme(GenerateAcme),
}

impl GenerationRequest {
    pub fn validate(&self) -> Result<()> {
        match self {
            GenerationRequest::Local(request) => request.validate(),
            GenerationRequest::Remote(request) => request.validate(),
            GenerationRequest::Acme(request) => request.validate(),
        }
    }

    pub fn key_type(&self) -> &str {
        match self {
            GenerationRequest::Local(request) => &request.key_type,
            GenerationRequest::Remote(request) => &request.key_type,
            GenerationRequest::Acme(request) => &request.key_type,
        }
    }
}
