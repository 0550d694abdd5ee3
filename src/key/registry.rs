//! Name-keyed table of the standard key pair factories.
//!
//! The registry is built once during bootstrap and is read-only afterwards, so it can be
//! shared between threads (e.g. behind an `Arc`) without synchronization.

use std::collections::HashMap;

use tracing::error;

use super::factory::{
    ECDSA_PROVIDER, ED25519_PROVIDER, EcdsaKeyPairFactory, Ed25519KeyPairFactory, KeyPairFactory,
    RSA_PROVIDER, RsaKeyPairFactory,
};
use crate::error::{CertMgrError, Result};

/// Provides access to all key providers and their standard factories.
#[derive(Debug)]
pub struct KeyRegistry {
    providers: Vec<(&'static str, Vec<Box<dyn KeyPairFactory>>)>,
    // (provider index, factory index) by factory name
    by_name: HashMap<String, (usize, usize)>,
}

impl KeyRegistry {
    /// Builds the registry with the standard keys of the ECDSA, ED25519 and RSA providers.
    pub fn with_standard_keys() -> Self {
        let mut registry = Self::empty();
        for (provider, factories) in [
            (ECDSA_PROVIDER, EcdsaKeyPairFactory::standard_keys()),
            (ED25519_PROVIDER, Ed25519KeyPairFactory::standard_keys()),
            (RSA_PROVIDER, RsaKeyPairFactory::standard_keys()),
        ] {
            if let Err(err) = registry.register(provider, factories) {
                error!(provider, %err, "skipping key provider");
            }
        }
        registry
    }

    /// Builds a registry without any provider.
    pub fn empty() -> Self {
        Self {
            providers: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Registers a provider and its factories.
    ///
    /// Provider and factory names must be unique across the registry. On a duplicate the
    /// registry is left unchanged.
    pub fn register(
        &mut self,
        provider: &'static str,
        factories: Vec<Box<dyn KeyPairFactory>>,
    ) -> Result<()> {
        if self.providers.iter().any(|(name, _)| *name == provider) {
            return Err(CertMgrError::Validation(format!(
                "key provider '{provider}' already registered"
            )));
        }
        let provider_index = self.providers.len();
        let mut names = HashMap::with_capacity(factories.len());
        for (factory_index, factory) in factories.iter().enumerate() {
            let name = factory.name();
            if self.by_name.contains_key(&name) || names.contains_key(&name) {
                return Err(CertMgrError::Validation(format!(
                    "key type '{name}' already registered"
                )));
            }
            names.insert(name, (provider_index, factory_index));
        }
        self.by_name.extend(names);
        self.providers.push((provider, factories));
        Ok(())
    }

    /// Returns the known key providers, in registration order.
    pub fn providers(&self) -> Vec<&'static str> {
        self.providers.iter().map(|(name, _)| *name).collect()
    }

    /// Returns the standard factories of the given provider.
    pub fn standard_factories(&self, provider: &str) -> Result<&[Box<dyn KeyPairFactory>]> {
        self.providers
            .iter()
            .find(|(name, _)| *name == provider)
            .map(|(_, factories)| factories.as_slice())
            .ok_or_else(|| CertMgrError::NotFound(format!("unknown key provider '{provider}'")))
    }

    /// Returns the factory registered under the given name.
    pub fn factory(&self, name: &str) -> Result<&dyn KeyPairFactory> {
        self.by_name
            .get(name)
            .map(|&(provider, factory)| self.providers[provider].1[factory].as_ref())
            .ok_or_else(|| CertMgrError::NotFound(format!("unknown key type '{name}'")))
    }
}

impl Default for KeyRegistry {
    fn default() -> Self {
        Self::with_standard_keys()
    }
}
