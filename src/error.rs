//! Error type shared by every certmgr operation, and its classification for callers.

use serde::Serialize;
use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, CertMgrError>;

/// Represents errors that can occur while issuing or describing certificate entries.
///
/// The variants fall into three classes: client faults (`Validation`, `InvalidIssuer`,
/// `InvalidCa`), missing resources (`NotFound`) and internal failures (everything else).
#[derive(Debug, Error, Clone)]
pub enum CertMgrError {
    /// A request or one of its fields is malformed.
    #[error("Invalid request: {0}")]
    Validation(String),

    /// A key algorithm or registry entry does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The named issuer entry cannot sign certificates.
    #[error("Invalid issuer: '{0}'")]
    InvalidIssuer(String),

    /// The CA reference is not a valid ACME provider reference.
    #[error("Unexpected ACME CA: '{0}'")]
    InvalidCa(String),

    /// Error during key generation.
    #[error("Key generation error: {0}")]
    KeyGeneration(String),

    /// Error during data encoding.
    #[error("Failed to encode data: {0}")]
    Encoding(String),

    /// Error during data decoding.
    #[error("Failed to decode data: {0}")]
    Decoding(String),

    /// Configuration could not be read or parsed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The registry or the ACME collaborator failed.
    #[error("Upstream failure: {0}")]
    Upstream(String),

    /// An entry was created but could not be read back.
    #[error("Failed to read back entry '{name}': {reason}")]
    EntryReadback { name: String, reason: String },
}

impl CertMgrError {
    /// Whether the error was caused by the caller's input.
    pub fn is_client_fault(&self) -> bool {
        matches!(
            self,
            CertMgrError::Validation(_) | CertMgrError::InvalidIssuer(_) | CertMgrError::InvalidCa(_)
        )
    }

    /// Whether the error denotes a missing resource.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CertMgrError::NotFound(_))
    }
}

impl From<der::Error> for CertMgrError {
    /// Converts a `der::Error` into a `CertMgrError`.
    fn from(err: der::Error) -> Self {
        CertMgrError::Decoding(err.to_string())
    }
}

impl From<rsa::Error> for CertMgrError {
    fn from(err: rsa::Error) -> Self {
        CertMgrError::KeyGeneration(err.to_string())
    }
}

impl From<x509_cert::spki::Error> for CertMgrError {
    fn from(err: x509_cert::spki::Error) -> Self {
        CertMgrError::Encoding(err.to_string())
    }
}

impl From<config::ConfigError> for CertMgrError {
    fn from(err: config::ConfigError) -> Self {
        CertMgrError::Config(err.to_string())
    }
}

/// Uniform error envelope handed to the transport layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    pub message: String,
}

impl From<&CertMgrError> for ErrorResponse {
    fn from(err: &CertMgrError) -> Self {
        Self {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_errors() {
        assert!(CertMgrError::Validation("dn".into()).is_client_fault());
        assert!(CertMgrError::InvalidIssuer("ca".into()).is_client_fault());
        assert!(CertMgrError::InvalidCa("Local".into()).is_client_fault());
        assert!(!CertMgrError::Upstream("io".into()).is_client_fault());
        assert!(CertMgrError::NotFound("RSA 1024".into()).is_not_found());
        assert!(
            !CertMgrError::EntryReadback {
                name: "a".into(),
                reason: "gone".into()
            }
            .is_not_found()
        );
    }

    #[test]
    fn error_response_carries_message() {
        let err = CertMgrError::InvalidCa("Local".to_string());
        let response = ErrorResponse::from(&err);
        assert_eq!(response.message, "Unexpected ACME CA: 'Local'");
        assert_eq!(
            serde_json::to_string(&response).unwrap(),
            r#"{"message":"Unexpected ACME CA: 'Local'"}"#
        );
    }
}
