//! Key pair factories, one per algorithm and parameter set.

use std::fmt;

use tracing::debug;

use super::{KeyAlgorithm, KeyPair};
use crate::error::{CertMgrError, Result};

/// Name of the ECDSA key provider.
pub const ECDSA_PROVIDER: &str = "ECDSA";
/// Name of the ED25519 key provider.
pub const ED25519_PROVIDER: &str = "ED25519";
/// Name of the RSA key provider.
pub const RSA_PROVIDER: &str = "RSA";

/// Generic way to create a key pair.
///
/// Factories are stateless beyond their fixed parameters and may be shared freely.
pub trait KeyPairFactory: fmt::Debug + Send + Sync {
    /// The algorithm of the key pairs this factory creates.
    fn algorithm(&self) -> KeyAlgorithm;

    /// Returns the name of this factory, e.g. `"ECDSA P-384"`.
    fn name(&self) -> String {
        self.algorithm().to_string()
    }

    /// Creates a new key pair.
    ///
    /// Failures are returned as is; retrying is up to the caller.
    fn generate(&self) -> Result<KeyPair>;
}

/// NIST curves supported for ECDSA keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcdsaCurve {
    P224,
    P256,
    P384,
    P521,
}

/// Creates ECDSA key pairs for a fixed curve.
#[derive(Debug, Clone, Copy)]
pub struct EcdsaKeyPairFactory {
    curve: EcdsaCurve,
}

impl EcdsaKeyPairFactory {
    pub fn new(curve: EcdsaCurve) -> Self {
        Self { curve }
    }

    /// Factories for the standard curves (P-224, P-256, P-384, P-521).
    pub fn standard_keys() -> Vec<Box<dyn KeyPairFactory>> {
        [
            EcdsaCurve::P224,
            EcdsaCurve::P256,
            EcdsaCurve::P384,
            EcdsaCurve::P521,
        ]
        .into_iter()
        .map(|curve| Box::new(Self::new(curve)) as Box<dyn KeyPairFactory>)
        .collect()
    }
}

impl KeyPairFactory for EcdsaKeyPairFactory {
    fn algorithm(&self) -> KeyAlgorithm {
        match self.curve {
            EcdsaCurve::P224 => KeyAlgorithm::EcdsaP224,
            EcdsaCurve::P256 => KeyAlgorithm::EcdsaP256,
            EcdsaCurve::P384 => KeyAlgorithm::EcdsaP384,
            EcdsaCurve::P521 => KeyAlgorithm::EcdsaP521,
        }
    }

    fn generate(&self) -> Result<KeyPair> {
        debug!(factory = %self.name(), "generating key pair");
        Ok(match self.curve {
            EcdsaCurve::P224 => KeyPair::generate_ecdsa_p224(),
            EcdsaCurve::P256 => KeyPair::generate_ecdsa_p256(),
            EcdsaCurve::P384 => KeyPair::generate_ecdsa_p384(),
            EcdsaCurve::P521 => KeyPair::generate_ecdsa_p521(),
        })
    }
}

/// Creates Ed25519 key pairs.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519KeyPairFactory;

impl Ed25519KeyPairFactory {
    /// The single standard Ed25519 factory.
    pub fn standard_keys() -> Vec<Box<dyn KeyPairFactory>> {
        vec![Box::new(Ed25519KeyPairFactory)]
    }
}

impl KeyPairFactory for Ed25519KeyPairFactory {
    fn algorithm(&self) -> KeyAlgorithm {
        KeyAlgorithm::Ed25519
    }

    fn generate(&self) -> Result<KeyPair> {
        debug!(factory = %self.name(), "generating key pair");
        Ok(KeyPair::generate_ed25519())
    }
}

/// Creates RSA key pairs with a fixed modulus size.
#[derive(Debug, Clone, Copy)]
pub struct RsaKeyPairFactory {
    bits: usize,
}

impl RsaKeyPairFactory {
    pub fn new(bits: usize) -> Self {
        Self { bits }
    }

    /// Factories for the standard modulus sizes (2048, 3072, 4096).
    pub fn standard_keys() -> Vec<Box<dyn KeyPairFactory>> {
        [2048, 3072, 4096]
            .into_iter()
            .map(|bits| Box::new(Self::new(bits)) as Box<dyn KeyPairFactory>)
            .collect()
    }
}

impl KeyPairFactory for RsaKeyPairFactory {
    fn algorithm(&self) -> KeyAlgorithm {
        KeyAlgorithm::Rsa(self.bits)
    }

    fn generate(&self) -> Result<KeyPair> {
        debug!(factory = %self.name(), "generating key pair");
        KeyPair::generate_rsa(self.bits)
            .map_err(|e| CertMgrError::KeyGeneration(format!("{}: {e}", self.name())))
    }
}
