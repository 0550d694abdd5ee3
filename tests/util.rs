#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use certmgr::acme::{AcmeCertificateRequest, AcmeClient};
use certmgr::cert::extensions::{ExtendedKeyUsageOption, KeyUsages};
use certmgr::cert::params::parse_dn;
use certmgr::cert::{Certificate, CertificateRequest, CertificateWithPrivateKey, SelfIssuer};
use certmgr::config::Config;
use certmgr::error::{CertMgrError, Result};
use certmgr::factory::{CertificateFactory, CertificateRequestFactory};
use certmgr::issuer::Issuer;
use certmgr::key::KeyPair;
use certmgr::key::registry::KeyRegistry;
use certmgr::registry::{EntryIter, Registry, RegistryEntry};
use certmgr::service::IssuanceService;
use certmgr::template::CertificateTemplate;
use time::{Duration, OffsetDateTime};
use tracing_subscriber::EnvFilter;

pub const ACME_CONFIG: &str = r#"
providers:
  - name: letsencrypt
    url: https://acme-v02.api.letsencrypt.org/directory
  - name: staging
    url: https://acme-staging-v02.api.letsencrypt.org/directory
    enabled: false
domains:
  - domain: example.com
    http01:
      port: 5002
"#;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Registry keeping its entries in memory, in name order.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    entries: Mutex<BTreeMap<String, RegistryEntry>>,
    next_id: AtomicUsize,
    /// When set, created entries are not stored.
    pub forget_created: AtomicBool,
}

impl MemoryRegistry {
    fn store(&self, name: &str, entry: impl FnOnce(String) -> RegistryEntry) -> Result<String> {
        let name = if name.is_empty() {
            format!("entry-{}", self.next_id.fetch_add(1, Ordering::SeqCst))
        } else {
            name.to_string()
        };
        let mut entries = self.entries.lock().unwrap();
        if entries.contains_key(&name) {
            return Err(CertMgrError::Upstream(format!("entry '{name}' already exists")));
        }
        if !self.forget_created.load(Ordering::SeqCst) {
            entries.insert(name.clone(), entry(name.clone()));
        }
        Ok(name)
    }
}

impl Registry for MemoryRegistry {
    fn create_certificate(
        &self,
        name: &str,
        factory: &dyn CertificateFactory,
        _actor: &str,
    ) -> Result<String> {
        let (key, certificate) = factory.new_certificate()?;
        self.store(name, |name| RegistryEntry {
            key: Some(key),
            certificate: Some(certificate),
            ..RegistryEntry::new(name)
        })
    }

    fn create_certificate_request(
        &self,
        name: &str,
        factory: &dyn CertificateRequestFactory,
        _actor: &str,
    ) -> Result<String> {
        let (key, request) = factory.new_certificate_request()?;
        self.store(name, |name| RegistryEntry {
            key: Some(key),
            certificate_request: Some(request),
            ..RegistryEntry::new(name)
        })
    }

    fn entry(&self, name: &str) -> Result<RegistryEntry> {
        self.entries
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| CertMgrError::NotFound(format!("entry '{name}'")))
    }

    fn entries(&self) -> Result<EntryIter<'_>> {
        let entries: Vec<_> = self.entries.lock().unwrap().values().cloned().collect();
        Ok(Box::new(entries.into_iter().map(Ok)))
    }

    fn delete(&self, name: &str, _actor: &str) -> Result<()> {
        self.entries
            .lock()
            .unwrap()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| CertMgrError::NotFound(format!("entry '{name}'")))
    }
}

/// ACME client answering every order with a certificate from a local CA.
#[derive(Debug)]
pub struct FakeAcmeClient {
    ca: CertificateWithPrivateKey,
    /// Domains of every order, in call order.
    pub orders: Mutex<Vec<Vec<String>>>,
    /// When set, certificates are issued for a different key than the request's.
    pub swap_key: AtomicBool,
}

impl FakeAcmeClient {
    pub fn new() -> Self {
        Self {
            ca: generate_ca_cert("CN=Fake ACME CA"),
            orders: Mutex::new(Vec::new()),
            swap_key: AtomicBool::new(false),
        }
    }
}

impl AcmeClient for FakeAcmeClient {
    fn obtain_certificate(
        &self,
        request: &AcmeCertificateRequest,
        csr: &CertificateRequest,
    ) -> Result<Certificate> {
        self.orders.lock().unwrap().push(request.domains.clone());
        let now = OffsetDateTime::now_utc();
        let template = CertificateTemplate::builder()
            .subject(csr.subject().clone())
            .not_before(now)
            .not_after(now + Duration::days(90))
            .key_usage(KeyUsages::DigitalSignature.into())
            .ext_key_usage(vec![ExtendedKeyUsageOption::ServerAuth])
            .subject_alt_names(csr.extensions().subject_alt_names)
            .build();
        let public_key = if self.swap_key.load(Ordering::SeqCst) {
            KeyPair::generate_ecdsa_p256().public().clone()
        } else {
            csr.public_key()?
        };
        self.ca.issue(&template, &public_key)
    }
}

pub fn ca_template(dn: &str) -> CertificateTemplate {
    let now = OffsetDateTime::now_utc();
    CertificateTemplate::builder()
        .subject(parse_dn(dn).unwrap())
        .not_before(now)
        .not_after(now + Duration::days(365))
        .key_usage(KeyUsages::KeyCertSign | KeyUsages::CRLSign)
        .basic_constraints_valid(true)
        .is_ca(true)
        .max_path_len(-1)
        .build()
}

pub fn generate_ca_cert(dn: &str) -> CertificateWithPrivateKey {
    let key_pair = KeyPair::generate_ecdsa_p256();
    let template = ca_template(dn);
    let cert = SelfIssuer {
        name: template.subject.clone(),
        key: key_pair.private(),
    }
    .issue(&template, key_pair.public())
    .unwrap();
    CertificateWithPrivateKey::new(cert, key_pair.private().clone()).unwrap()
}

/// Writes the ACME provider configuration into `dir` and returns a config pointing at it.
pub fn config_with_acme(dir: &Path) -> Config {
    std::fs::write(dir.join("acme.yaml"), ACME_CONFIG).unwrap();
    Config::from_yaml_str("acme_config: acme.yaml\nstate_path: state\n", dir).unwrap()
}

pub fn service(config: Config) -> (IssuanceService<MemoryRegistry>, Arc<FakeAcmeClient>) {
    init_tracing();
    let acme_client = Arc::new(FakeAcmeClient::new());
    let service = IssuanceService::new(
        Arc::new(KeyRegistry::with_standard_keys()),
        MemoryRegistry::default(),
        config,
        acme_client.clone(),
    );
    (service, acme_client)
}
