//! Key material for the three supported algorithm families (ECDSA, Ed25519, RSA).
//!
//! Keys are modelled as closed enums. Comparing two keys of different families is never an
//! error; the keys are simply unequal.

pub mod factory;
pub mod registry;

use std::fmt;

use const_oid::{AssociatedOid, ObjectIdentifier};
use der::{Decode, Encode};
use ecdsa::signature::{SignatureEncoding, Signer};
use ed25519_dalek::{SigningKey as Ed25519SigningKey, VerifyingKey as Ed25519VerifyingKey};
use rsa::{RsaPrivateKey, RsaPublicKey, traits::PublicKeyParts};
use sha2::Sha256;
use x509_cert::spki::{DecodePublicKey, EncodePublicKey, SubjectPublicKeyInfoOwned};

use crate::cert::SignatureAlgorithm;
use crate::error::{CertMgrError, Result};

/// Identifies a concrete key generation strategy.
///
/// The display name doubles as the external key type identifier (`"ECDSA P-256"`,
/// `"ED25519"`, `"RSA 2048"`) and matches the name of the factory producing such keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyAlgorithm {
    EcdsaP224,
    EcdsaP256,
    EcdsaP384,
    EcdsaP521,
    Ed25519,
    /// RSA with the given modulus size in bits.
    Rsa(usize),
}

impl KeyAlgorithm {
    /// Name of the provider this algorithm belongs to.
    pub fn provider(&self) -> &'static str {
        match self {
            KeyAlgorithm::EcdsaP224
            | KeyAlgorithm::EcdsaP256
            | KeyAlgorithm::EcdsaP384
            | KeyAlgorithm::EcdsaP521 => factory::ECDSA_PROVIDER,
            KeyAlgorithm::Ed25519 => factory::ED25519_PROVIDER,
            KeyAlgorithm::Rsa(_) => factory::RSA_PROVIDER,
        }
    }

    /// Derives the algorithm from an encoded public key, if it is one of the known families.
    pub fn from_spki(spki: &SubjectPublicKeyInfoOwned) -> Option<Self> {
        PublicKey::from_spki(spki).ok().map(|key| key.algorithm())
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyAlgorithm::EcdsaP224 => write!(f, "{} P-224", factory::ECDSA_PROVIDER),
            KeyAlgorithm::EcdsaP256 => write!(f, "{} P-256", factory::ECDSA_PROVIDER),
            KeyAlgorithm::EcdsaP384 => write!(f, "{} P-384", factory::ECDSA_PROVIDER),
            KeyAlgorithm::EcdsaP521 => write!(f, "{} P-521", factory::ECDSA_PROVIDER),
            KeyAlgorithm::Ed25519 => write!(f, "{}", factory::ED25519_PROVIDER),
            KeyAlgorithm::Rsa(bits) => write!(f, "{} {}", factory::RSA_PROVIDER, bits),
        }
    }
}

const ID_DSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10040.4.1");

/// Name of the public key algorithm as declared in a SubjectPublicKeyInfo.
///
/// Used as the fallback when the key itself cannot be decoded into a [`KeyAlgorithm`].
pub fn declared_algorithm_name(spki: &SubjectPublicKeyInfoOwned) -> String {
    match spki.algorithm.oid {
        const_oid::db::rfc5912::RSA_ENCRYPTION => "RSA".to_string(),
        ID_DSA => "DSA".to_string(),
        const_oid::db::rfc5912::ID_EC_PUBLIC_KEY => "ECDSA".to_string(),
        const_oid::db::rfc8410::ID_ED_25519 => "Ed25519".to_string(),
        oid => oid.to_string(),
    }
}

/// A public key of one of the supported families.
#[derive(Clone, Debug)]
pub enum PublicKey {
    EcdsaP224(p224::PublicKey),
    EcdsaP256(p256::PublicKey),
    EcdsaP384(p384::PublicKey),
    EcdsaP521(p521::PublicKey),
    Ed25519(Ed25519VerifyingKey),
    Rsa(RsaPublicKey),
}

impl PublicKey {
    /// The algorithm of this key.
    pub fn algorithm(&self) -> KeyAlgorithm {
        match self {
            PublicKey::EcdsaP224(_) => KeyAlgorithm::EcdsaP224,
            PublicKey::EcdsaP256(_) => KeyAlgorithm::EcdsaP256,
            PublicKey::EcdsaP384(_) => KeyAlgorithm::EcdsaP384,
            PublicKey::EcdsaP521(_) => KeyAlgorithm::EcdsaP521,
            PublicKey::Ed25519(_) => KeyAlgorithm::Ed25519,
            PublicKey::Rsa(key) => KeyAlgorithm::Rsa(key.size() * 8),
        }
    }

    /// Encodes the key as a SubjectPublicKeyInfo.
    pub fn to_spki(&self) -> Result<SubjectPublicKeyInfoOwned> {
        let document = match self {
            PublicKey::EcdsaP224(key) => key.to_public_key_der()?,
            PublicKey::EcdsaP256(key) => key.to_public_key_der()?,
            PublicKey::EcdsaP384(key) => key.to_public_key_der()?,
            PublicKey::EcdsaP521(key) => key.to_public_key_der()?,
            PublicKey::Ed25519(key) => key.to_public_key_der()?,
            PublicKey::Rsa(key) => key.to_public_key_der()?,
        };
        Ok(SubjectPublicKeyInfoOwned::from_der(document.as_bytes())?)
    }

    /// Decodes a SubjectPublicKeyInfo into a key of one of the supported families.
    pub fn from_spki(spki: &SubjectPublicKeyInfoOwned) -> Result<Self> {
        let der = spki.to_der()?;
        match spki.algorithm.oid {
            const_oid::db::rfc5912::ID_EC_PUBLIC_KEY => {
                let curve = spki
                    .algorithm
                    .parameters
                    .as_ref()
                    .ok_or_else(|| CertMgrError::Decoding("missing named curve".to_string()))?
                    .decode_as::<ObjectIdentifier>()?;
                if curve == p224::NistP224::OID {
                    Ok(PublicKey::EcdsaP224(p224::PublicKey::from_public_key_der(&der)?))
                } else if curve == p256::NistP256::OID {
                    Ok(PublicKey::EcdsaP256(p256::PublicKey::from_public_key_der(&der)?))
                } else if curve == p384::NistP384::OID {
                    Ok(PublicKey::EcdsaP384(p384::PublicKey::from_public_key_der(&der)?))
                } else if curve == p521::NistP521::OID {
                    Ok(PublicKey::EcdsaP521(p521::PublicKey::from_public_key_der(&der)?))
                } else {
                    Err(CertMgrError::Decoding(format!("unsupported curve: {curve}")))
                }
            }
            const_oid::db::rfc8410::ID_ED_25519 => Ok(PublicKey::Ed25519(
                Ed25519VerifyingKey::from_public_key_der(&der)?,
            )),
            const_oid::db::rfc5912::RSA_ENCRYPTION => {
                Ok(PublicKey::Rsa(RsaPublicKey::from_public_key_der(&der)?))
            }
            oid => Err(CertMgrError::Decoding(format!(
                "unsupported public key algorithm: {oid}"
            ))),
        }
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        public_keys_equal(self, other)
    }
}

/// A private key of one of the supported families.
#[derive(Clone, Debug)]
pub enum PrivateKey {
    EcdsaP224(p224::SecretKey),
    EcdsaP256(p256::SecretKey),
    EcdsaP384(p384::SecretKey),
    EcdsaP521(p521::SecretKey),
    Ed25519(Ed25519SigningKey),
    Rsa(Box<RsaPrivateKey>),
}

impl PrivateKey {
    /// Derives the public half of this key.
    pub fn public_key(&self) -> PublicKey {
        match self {
            PrivateKey::EcdsaP224(key) => PublicKey::EcdsaP224(key.public_key()),
            PrivateKey::EcdsaP256(key) => PublicKey::EcdsaP256(key.public_key()),
            PrivateKey::EcdsaP384(key) => PublicKey::EcdsaP384(key.public_key()),
            PrivateKey::EcdsaP521(key) => PublicKey::EcdsaP521(key.public_key()),
            PrivateKey::Ed25519(key) => PublicKey::Ed25519(key.verifying_key()),
            PrivateKey::Rsa(key) => PublicKey::Rsa(key.to_public_key()),
        }
    }

    /// The signature algorithm used when this key signs a certificate or request.
    pub fn signature_algorithm(&self) -> SignatureAlgorithm {
        match self {
            PrivateKey::EcdsaP224(_) => SignatureAlgorithm::Sha224WithECDSA,
            PrivateKey::EcdsaP256(_) => SignatureAlgorithm::Sha256WithECDSA,
            PrivateKey::EcdsaP384(_) => SignatureAlgorithm::Sha384WithECDSA,
            PrivateKey::EcdsaP521(_) => SignatureAlgorithm::Sha512WithECDSA,
            PrivateKey::Ed25519(_) => SignatureAlgorithm::Ed25519,
            PrivateKey::Rsa(_) => SignatureAlgorithm::Sha256WithRSA,
        }
    }

    /// Signs `data` according to [`PrivateKey::signature_algorithm`].
    ///
    /// ECDSA signatures are returned DER encoded, as X.509 expects them.
    pub fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        let signing_error = |e: ecdsa::signature::Error| CertMgrError::Encoding(e.to_string());
        match self {
            PrivateKey::EcdsaP224(key) => {
                let signing_key = p224::ecdsa::SigningKey::from(key);
                let signature: p224::ecdsa::Signature =
                    signing_key.try_sign(data).map_err(signing_error)?;
                Ok(signature.to_der().as_bytes().to_vec())
            }
            PrivateKey::EcdsaP256(key) => {
                let signing_key = p256::ecdsa::SigningKey::from(key);
                let signature: p256::ecdsa::Signature =
                    signing_key.try_sign(data).map_err(signing_error)?;
                Ok(signature.to_der().as_bytes().to_vec())
            }
            PrivateKey::EcdsaP384(key) => {
                let signing_key = p384::ecdsa::SigningKey::from(key);
                let signature: p384::ecdsa::Signature =
                    signing_key.try_sign(data).map_err(signing_error)?;
                Ok(signature.to_der().as_bytes().to_vec())
            }
            PrivateKey::EcdsaP521(key) => {
                let signing_key = p521::ecdsa::SigningKey::from_bytes(&key.to_bytes())
                    .map_err(signing_error)?;
                let signature: p521::ecdsa::Signature =
                    signing_key.try_sign(data).map_err(signing_error)?;
                Ok(signature.to_der().as_bytes().to_vec())
            }
            PrivateKey::Ed25519(signing_key) => {
                let signature = signing_key.try_sign(data).map_err(signing_error)?;
                Ok(signature.to_bytes().to_vec())
            }
            PrivateKey::Rsa(private) => {
                let signing_key = rsa::pkcs1v15::SigningKey::<Sha256>::new((**private).clone());
                let signature = signing_key.try_sign(data).map_err(signing_error)?;
                Ok(signature.to_vec())
            }
        }
    }
}

impl PartialEq for PrivateKey {
    fn eq(&self, other: &Self) -> bool {
        private_keys_equal(self, other)
    }
}

/// Checks whether two public keys are equal.
///
/// Keys of different algorithm families (or different curves) are unequal.
pub fn public_keys_equal(key1: &PublicKey, key2: &PublicKey) -> bool {
    match (key1, key2) {
        (PublicKey::EcdsaP224(a), PublicKey::EcdsaP224(b)) => a == b,
        (PublicKey::EcdsaP256(a), PublicKey::EcdsaP256(b)) => a == b,
        (PublicKey::EcdsaP384(a), PublicKey::EcdsaP384(b)) => a == b,
        (PublicKey::EcdsaP521(a), PublicKey::EcdsaP521(b)) => a == b,
        (PublicKey::Ed25519(a), PublicKey::Ed25519(b)) => a == b,
        (PublicKey::Rsa(a), PublicKey::Rsa(b)) => a == b,
        _ => false,
    }
}

/// Checks whether two private keys are equal.
///
/// Keys of different algorithm families (or different curves) are unequal.
pub fn private_keys_equal(key1: &PrivateKey, key2: &PrivateKey) -> bool {
    match (key1, key2) {
        (PrivateKey::EcdsaP224(a), PrivateKey::EcdsaP224(b)) => a.to_bytes() == b.to_bytes(),
        (PrivateKey::EcdsaP256(a), PrivateKey::EcdsaP256(b)) => a.to_bytes() == b.to_bytes(),
        (PrivateKey::EcdsaP384(a), PrivateKey::EcdsaP384(b)) => a.to_bytes() == b.to_bytes(),
        (PrivateKey::EcdsaP521(a), PrivateKey::EcdsaP521(b)) => a.to_bytes() == b.to_bytes(),
        (PrivateKey::Ed25519(a), PrivateKey::Ed25519(b)) => a.to_bytes() == b.to_bytes(),
        (PrivateKey::Rsa(a), PrivateKey::Rsa(b)) => a == b,
        _ => false,
    }
}

/// A freshly generated private key together with its public key.
#[derive(Clone, Debug)]
pub struct KeyPair {
    private: PrivateKey,
    public: PublicKey,
}

impl KeyPair {
    /// Wraps an existing private key.
    pub fn from_private(private: PrivateKey) -> Self {
        let public = private.public_key();
        Self { private, public }
    }

    /// Generate an RSA key pair with the specified number of bits.
    pub fn generate_rsa(bits: usize) -> Result<Self> {
        let mut rng = rand_core::OsRng;
        let private = RsaPrivateKey::new(&mut rng, bits)?;
        Ok(Self::from_private(PrivateKey::Rsa(Box::new(private))))
    }

    /// Generate an ECDSA P-224 key pair.
    pub fn generate_ecdsa_p224() -> Self {
        let mut rng = rand_core::OsRng;
        Self::from_private(PrivateKey::EcdsaP224(p224::SecretKey::random(&mut rng)))
    }

    /// Generate an ECDSA P-256 key pair.
    pub fn generate_ecdsa_p256() -> Self {
        let mut rng = rand_core::OsRng;
        Self::from_private(PrivateKey::EcdsaP256(p256::SecretKey::random(&mut rng)))
    }

    /// Generate an ECDSA P-384 key pair.
    pub fn generate_ecdsa_p384() -> Self {
        let mut rng = rand_core::OsRng;
        Self::from_private(PrivateKey::EcdsaP384(p384::SecretKey::random(&mut rng)))
    }

    /// Generate an ECDSA P-521 key pair.
    pub fn generate_ecdsa_p521() -> Self {
        let mut rng = rand_core::OsRng;
        Self::from_private(PrivateKey::EcdsaP521(p521::SecretKey::random(&mut rng)))
    }

    /// Generate an Ed25519 key pair.
    pub fn generate_ed25519() -> Self {
        let mut rng = rand_core::OsRng;
        let signing_key: Ed25519SigningKey = Ed25519SigningKey::generate(&mut rng);
        Self::from_private(PrivateKey::Ed25519(signing_key))
    }

    pub fn public(&self) -> &PublicKey {
        &self.public
    }

    pub fn private(&self) -> &PrivateKey {
        &self.private
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        self.public.algorithm()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_equal_only_within_their_family() {
        let ecdsa = KeyPair::generate_ecdsa_p224();
        let ed25519 = KeyPair::generate_ed25519();
        let rsa = KeyPair::generate_rsa(2048).unwrap();

        // ecdsa
        assert!(private_keys_equal(ecdsa.private(), ecdsa.private()));
        assert!(!private_keys_equal(ecdsa.private(), ed25519.private()));
        assert!(!private_keys_equal(ecdsa.private(), rsa.private()));
        assert!(public_keys_equal(ecdsa.public(), ecdsa.public()));
        assert!(!public_keys_equal(ecdsa.public(), ed25519.public()));
        assert!(!public_keys_equal(ecdsa.public(), rsa.public()));

        // ed25519
        assert!(!private_keys_equal(ed25519.private(), ecdsa.private()));
        assert!(private_keys_equal(ed25519.private(), ed25519.private()));
        assert!(!private_keys_equal(ed25519.private(), rsa.private()));
        assert!(!public_keys_equal(ed25519.public(), ecdsa.public()));
        assert!(public_keys_equal(ed25519.public(), ed25519.public()));
        assert!(!public_keys_equal(ed25519.public(), rsa.public()));

        // rsa
        assert!(!private_keys_equal(rsa.private(), ecdsa.private()));
        assert!(!private_keys_equal(rsa.private(), ed25519.private()));
        assert!(private_keys_equal(rsa.private(), rsa.private()));
        assert!(!public_keys_equal(rsa.public(), ecdsa.public()));
        assert!(!public_keys_equal(rsa.public(), ed25519.public()));
        assert!(public_keys_equal(rsa.public(), rsa.public()));
    }

    #[test]
    fn keys_of_different_curves_are_unequal() {
        let p256 = KeyPair::generate_ecdsa_p256();
        let p384 = KeyPair::generate_ecdsa_p384();
        assert!(!public_keys_equal(p256.public(), p384.public()));
        assert!(!private_keys_equal(p256.private(), p384.private()));
        assert_ne!(p256.public(), KeyPair::generate_ecdsa_p256().public());
    }

    #[test]
    fn spki_round_trip_preserves_algorithm() {
        for key_pair in [
            KeyPair::generate_ecdsa_p224(),
            KeyPair::generate_ecdsa_p256(),
            KeyPair::generate_ecdsa_p384(),
            KeyPair::generate_ecdsa_p521(),
            KeyPair::generate_ed25519(),
        ] {
            let spki = key_pair.public().to_spki().unwrap();
            let decoded = PublicKey::from_spki(&spki).unwrap();
            assert_eq!(&decoded, key_pair.public());
            assert_eq!(KeyAlgorithm::from_spki(&spki), Some(key_pair.algorithm()));
        }
    }

    #[test]
    fn rsa_algorithm_reports_modulus_size() {
        let key_pair = KeyPair::generate_rsa(2048).unwrap();
        assert_eq!(key_pair.algorithm(), KeyAlgorithm::Rsa(2048));
        assert_eq!(key_pair.algorithm().to_string(), "RSA 2048");
        let spki = key_pair.public().to_spki().unwrap();
        assert_eq!(declared_algorithm_name(&spki), "RSA");
    }

    #[test]
    fn algorithm_names() {
        assert_eq!(KeyAlgorithm::EcdsaP256.to_string(), "ECDSA P-256");
        assert_eq!(KeyAlgorithm::EcdsaP521.to_string(), "ECDSA P-521");
        assert_eq!(KeyAlgorithm::Ed25519.to_string(), "ED25519");
        assert_eq!(KeyAlgorithm::Rsa(4096).provider(), "RSA");
    }

    #[test]
    fn every_key_type_signs() {
        for key_pair in [
            KeyPair::generate_ecdsa_p224(),
            KeyPair::generate_ecdsa_p521(),
            KeyPair::generate_ed25519(),
        ] {
            let signature = key_pair.private().sign(b"to be signed").unwrap();
            assert!(!signature.is_empty());
        }
    }
}
