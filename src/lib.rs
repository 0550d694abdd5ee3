//! # certmgr - Issuance pipeline of a certificate management service
//!
//! certmgr turns structured issuance requests into X.509 certificates and certificate
//! signing requests, and renders stored registry entries for presentation. It is built
//! entirely on the RustCrypto crates.
//!
//! ## Supported Key Types
//!
//! Key types are looked up by name in the [`key::registry::KeyRegistry`]:
//! - **ECDSA**: `ECDSA P-224`, `ECDSA P-256`, `ECDSA P-384`, `ECDSA P-521`
//! - **Ed25519**: `ED25519`
//! - **RSA**: `RSA 2048`, `RSA 3072`, `RSA 4096`
//!
//! ## Issuance Strategies
//!
//! - **Local**: self-signed, or signed by a CA entry of the registry
//! - **Remote**: a certificate signing request to be signed elsewhere
//! - **ACME**: a certificate obtained from an ACME provider through an
//!   [`acme::AcmeClient`]
//!
//! Storage of the results is left to an implementation of [`registry::Registry`].
//!
//! ## Quick Start
//!
//! ### Issuing a Self-Signed Certificate
//!
//! ```rust
//! use certmgr::cert::params::parse_dn;
//! use certmgr::details::EntryDetails;
//! use certmgr::factory::{CertificateFactory, LocalCertificateFactory};
//! use certmgr::key::registry::KeyRegistry;
//! use certmgr::registry::RegistryEntry;
//! use certmgr::template::CertificateTemplate;
//! use time::{Duration, OffsetDateTime};
//!
//! # fn main() -> Result<(), certmgr::error::CertMgrError> {
//! let keys = KeyRegistry::with_standard_keys();
//!
//! let now = OffsetDateTime::now_utc();
//! let template = CertificateTemplate::builder()
//!     .subject(parse_dn("CN=example.com,O=Example Corp")?)
//!     .not_before(now)
//!     .not_after(now + Duration::days(365))
//!     .build();
//!
//! let factory = LocalCertificateFactory::new(template, keys.factory("ECDSA P-256")?, None);
//! let (key, certificate) = factory.new_certificate()?;
//!
//! let entry = RegistryEntry {
//!     key: Some(key),
//!     certificate: Some(certificate),
//!     ..RegistryEntry::new("example")
//! };
//! let details = EntryDetails::from_registry_entry(&entry);
//! assert_eq!(details.groups[0].title, "Key");
//! assert_eq!(details.groups[1].title, "Certificate");
//! # Ok(())
//! # }
//! ```
//!
//! ### Parsing a Generation Request
//!
//! ```rust
//! use certmgr::request::GenerationRequest;
//!
//! let request: GenerationRequest = serde_json::from_str(
//!     r#"{
//!         "type": "local",
//!         "dn": "CN=Example CA",
//!         "keyType": "ED25519",
//!         "validFrom": "2024-01-01T00:00:00Z",
//!         "validTo": "2034-01-01T00:00:00Z",
//!         "keyUsage": {"enabled": true, "keyUsage": 96},
//!         "basicConstraints": {"enabled": true, "ca": true, "pathLenConstraint": 0}
//!     }"#,
//! )
//! .unwrap();
//! request.validate().unwrap();
//! assert_eq!(request.key_type(), "ED25519");
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`error::Result`]. [`error::CertMgrError::is_client_fault`] and
//! [`error::CertMgrError::is_not_found`] classify errors for the transport layer.
//!
//! ## Module Organization
//!
//! - [`key`]: Key algorithms, key pair factories and the key registry
//! - [`cert`]: Certificate and request wrappers, extension encoding
//! - [`issuer`]: Certificate signing
//! - [`template`]: Certificate and request templates, extension specs
//! - [`request`]: Generation requests and their validation
//! - [`factory`]: Local, remote and ACME factories handed to the registry
//! - [`registry`]: The registry contract and its entries
//! - [`details`]: Entry summaries and grouped details
//! - [`service`]: The operations exposed to the transport layer
//! - [`acme`]: ACME provider configuration and client contract
//! - [`config`]: Service configuration
//! - [`error`]: Error types
//! - [`tbs_certificate`]: Low-level certificate structure

pub mod acme;
pub mod cert;
pub mod config;
pub mod details;
pub mod error;
pub mod factory;
pub mod issuer;
pub mod key;
pub mod registry;
pub mod request;
pub mod service;
pub mod tbs_certificate;
pub mod template;
