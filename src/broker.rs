use pem::Pem;
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rustls::pki_types::PrivateKeyDer;
use thiserror::Error;
use time::OffsetDateTime;

use async_trait::async_trait;

use crate::cache::{Cache, CacheError};
use crate::client::BrokerTransport;
use crate::hello::{HelloInfo, WireHelloInfo};
use crate::issuer::{IssuedCertificate, Issuer, CHALLENGE_NAME_SUFFIX};

/// Server-side orchestration: answers a negotiation with a PEM bundle, from
/// the cache when a usable one is stored, from the issuance engine otherwise.
pub struct CertificateBroker<I> {
    issuer: I,
    cache: Option<Box<dyn Cache>>,
}

impl<I: Issuer> CertificateBroker<I> {
    /// Broker without persistence: every request reaches the engine.
    pub fn new(issuer: I) -> Self {
        Self {
            issuer,
            cache: None,
        }
    }

    /// Adds the shared bundle cache. Stored values are the serialized PEM
    /// bundles themselves, keyed by server name.
    pub fn with_cache(mut self, cache: impl Cache + 'static) -> Self {
        self.cache = Some(Box::new(cache));
        self
    }

    /// PEM bundle for the negotiation: the private key block first, then the
    /// chain, leaf first.
    pub async fn get_certificate(&self, hello: &HelloInfo) -> Result<Vec<u8>, BrokerError> {
        let name = hello.server_name.as_str();
        // Challenge placeholders are ephemeral; they never touch the cache.
        let cache = match name.ends_with(CHALLENGE_NAME_SUFFIX) {
            true => None,
            false => self.cache.as_deref(),
        };

        if let Some(cache) = cache {
            match cache.get(name).await? {
                Some(bundle) if bundle_within_validity(&bundle, OffsetDateTime::now_utc()) => {
                    return Ok(bundle);
                }
                Some(_) => {
                    log::info!(
                        "cached certificate for {:?} is outside its validity window, reissuing",
                        name
                    );
                }
                None => {}
            }
        }

        let issued = match self.issuer.issue_or_renew(hello).await {
            Ok(issued) => issued,
            Err(err) => {
                log::error!("failed to get certificate for {:?}: {}", name, err);
                return Err(BrokerError::Issue(err.into()));
            }
        };
        let bundle = encode_bundle(&issued)?;

        if let Some(cache) = cache {
            if let Err(err) = cache.put(name, &bundle).await {
                log::warn!("failed to cache certificate for {:?}: {}", name, err);
            }
        }
        Ok(bundle)
    }
}

/// A broker is also a transport: the in-process loopback used by tests and
/// single-process deployments. Networked deployments put their own channel
/// in front instead.
#[async_trait]
impl<I: Issuer> BrokerTransport for CertificateBroker<I> {
    async fn fetch_certificate(
        &self,
        hello: WireHelloInfo,
    ) -> Result<Vec<u8>, Box<dyn std::error::Error + Send + Sync>> {
        let hello = HelloInfo::from(&hello);
        Ok(self.get_certificate(&hello).await?)
    }
}

/// A cached bundle is served only while its leaf is inside the validity
/// window; anything else is reissued and overwritten.
fn bundle_within_validity(bundle: &[u8], now: OffsetDateTime) -> bool {
    let blocks = match pem::parse_many(bundle) {
        Ok(blocks) => blocks,
        Err(_) => return false,
    };
    let leaf = match blocks.iter().find(|block| block.tag() == "CERTIFICATE") {
        Some(block) => block,
        None => return false,
    };
    match x509_parser::parse_x509_certificate(leaf.contents()) {
        Ok((_, cert)) => {
            let validity = cert.validity();
            now >= validity.not_before.to_datetime() && now <= validity.not_after.to_datetime()
        }
        Err(_) => false,
    }
}

fn encode_bundle(issued: &IssuedCertificate) -> Result<Vec<u8>, BrokerError> {
    let (tag, key_der) = match &issued.key {
        PrivateKeyDer::Pkcs1(key) => ("RSA PRIVATE KEY", key.secret_pkcs1_der().to_vec()),
        PrivateKeyDer::Sec1(key) => ("EC PRIVATE KEY", key.secret_sec1_der().to_vec()),
        PrivateKeyDer::Pkcs8(key) => unwrap_pkcs8(key.secret_pkcs8_der())?,
        _ => return Err(BrokerError::UnsupportedKey),
    };

    let mut blocks = vec![Pem::new(tag, key_der)];
    blocks.extend(
        issued
            .chain
            .iter()
            .map(|cert| Pem::new("CERTIFICATE", cert.as_ref().to_vec())),
    );
    Ok(pem::encode_many(&blocks).into_bytes())
}

/// Engines commonly hand back PKCS#8; the bundle format wants the legacy
/// per-algorithm encodings. Anything that is neither RSA nor P-256/P-384 is
/// refused rather than guessed at.
fn unwrap_pkcs8(der: &[u8]) -> Result<(&'static str, Vec<u8>), BrokerError> {
    if let Ok(key) = rsa::RsaPrivateKey::from_pkcs8_der(der) {
        let doc = key
            .to_pkcs1_der()
            .map_err(|err| BrokerError::KeyEncode(err.to_string()))?;
        return Ok(("RSA PRIVATE KEY", doc.as_bytes().to_vec()));
    }
    if let Ok(key) = p256::SecretKey::from_pkcs8_der(der) {
        let doc = key
            .to_sec1_der()
            .map_err(|err| BrokerError::KeyEncode(err.to_string()))?;
        return Ok(("EC PRIVATE KEY", doc.to_vec()));
    }
    if let Ok(key) = p384::SecretKey::from_pkcs8_der(der) {
        let doc = key
            .to_sec1_der()
            .map_err(|err| BrokerError::KeyEncode(err.to_string()))?;
        return Ok(("EC PRIVATE KEY", doc.to_vec()));
    }
    Err(BrokerError::UnsupportedKey)
}

#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("certificate issuance failed: {0}")]
    Issue(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("unsupported private key algorithm")]
    UnsupportedKey,
    #[error("re-encoding private key: {0}")]
    KeyEncode(String),
}
