use std::convert::TryFrom;

use async_trait::async_trait;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::pkcs8::DecodePrivateKey;
use rsa::traits::PublicKeyParts;
use rustls::crypto::ring::sign::any_supported_type;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::sign::CertifiedKey;
use rustls::ServerConfig;
use thiserror::Error;
use time::OffsetDateTime;
use x509_parser::certificate::X509Certificate;
use x509_parser::extensions::GeneralName;
use x509_parser::public_key::PublicKey;

use crate::hello::{HelloInfo, WireHelloInfo};
use crate::issuer::CHALLENGE_NAME_SUFFIX;

const TYPE_MISMATCH: &str = "private key type does not match public key type";
const VALUE_MISMATCH: &str = "private key does not match public key";

/// Channel over which a client reaches a broker. [`CertificateBroker`]
/// implements this directly for in-process use; a networked deployment
/// implements it over whatever RPC layer it already runs.
///
/// [`CertificateBroker`]: crate::CertificateBroker
#[async_trait]
pub trait BrokerTransport: Send + Sync {
    async fn fetch_certificate(
        &self,
        hello: WireHelloInfo,
    ) -> Result<Vec<u8>, Box<dyn std::error::Error + Send + Sync>>;
}

/// Client side of the broker protocol. Fetches a PEM bundle for a
/// negotiation and refuses to use it unless it passes validation: the key
/// must parse, the leaf must cover the requested name and the current time,
/// and the private key must actually belong to the leaf's public key.
pub struct BrokerClient<T> {
    transport: T,
}

impl<T: BrokerTransport> BrokerClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Certificate material for the negotiation, fetched and validated.
    pub async fn obtain(&self, hello: &HelloInfo) -> Result<CertificateBundle, AcceptError> {
        let bundle = self
            .transport
            .fetch_certificate(WireHelloInfo::from(hello))
            .await
            .map_err(AcceptError::Transport)?;
        accept_bundle(&bundle, &hello.server_name, OffsetDateTime::now_utc())
    }
}

/// Private half of a validated bundle. P-256 and P-384 are the only curves
/// the broker protocol carries; everything else is rejected during
/// validation.
#[derive(Clone)]
pub enum PrivateKey {
    Rsa(rsa::RsaPrivateKey),
    EcP256(p256::SecretKey),
    EcP384(p384::SecretKey),
}

impl PrivateKey {
    fn to_der(&self) -> Result<PrivateKeyDer<'static>, AcceptError> {
        match self {
            PrivateKey::Rsa(key) => {
                let doc = key
                    .to_pkcs1_der()
                    .map_err(|err| AcceptError::KeyEncode(err.to_string()))?;
                Ok(PrivateKeyDer::Pkcs1(doc.as_bytes().to_vec().into()))
            }
            PrivateKey::EcP256(key) => {
                let doc = key
                    .to_sec1_der()
                    .map_err(|err| AcceptError::KeyEncode(err.to_string()))?;
                Ok(PrivateKeyDer::Sec1(doc.to_vec().into()))
            }
            PrivateKey::EcP384(key) => {
                let doc = key
                    .to_sec1_der()
                    .map_err(|err| AcceptError::KeyEncode(err.to_string()))?;
                Ok(PrivateKeyDer::Sec1(doc.to_vec().into()))
            }
        }
    }
}

/// A bundle that passed validation, ready to serve with.
#[derive(Clone)]
pub struct CertificateBundle {
    chain: Vec<CertificateDer<'static>>,
    key: PrivateKey,
}

impl CertificateBundle {
    /// The leaf certificate in DER form.
    pub fn leaf_der(&self) -> &CertificateDer<'static> {
        &self.chain[0]
    }

    /// Full chain, leaf first.
    pub fn chain(&self) -> &[CertificateDer<'static>] {
        &self.chain
    }

    pub fn key(&self) -> &PrivateKey {
        &self.key
    }

    /// The bundle as a [`CertifiedKey`] for use with a rustls certificate
    /// resolver.
    pub fn certified_key(&self) -> Result<CertifiedKey, AcceptError> {
        let signer = any_supported_type(&self.key.to_der()?)?;
        Ok(CertifiedKey::new(self.chain.clone(), signer))
    }

    /// A minimal [`ServerConfig`] serving exactly this bundle.
    pub fn server_config(&self) -> Result<ServerConfig, AcceptError> {
        let config = ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(self.chain.clone(), self.key.to_der()?)?;
        Ok(config)
    }
}

/// Validates a PEM bundle against the negotiation it was requested for.
///
/// Layout is fixed: one private key block first, then the chain, leaf
/// first. The leaf must be inside its validity window at `now` (expiry is
/// waived for challenge placeholder names), must cover `server_name`, and
/// must certify the public half of the delivered key.
fn accept_bundle(
    bundle: &[u8],
    server_name: &str,
    now: OffsetDateTime,
) -> Result<CertificateBundle, AcceptError> {
    let blocks =
        pem::parse_many(bundle).map_err(|err| AcceptError::MalformedResponse(err.to_string()))?;
    let (key_block, cert_blocks) = blocks
        .split_first()
        .ok_or_else(|| AcceptError::MalformedResponse("empty response".into()))?;
    if !key_block.tag().contains("PRIVATE") {
        return Err(AcceptError::MalformedResponse(
            "leading block is not a private key".into(),
        ));
    }
    let key = parse_private_key(key_block.contents())?;

    let mut leaf = None;
    let mut chain = Vec::with_capacity(cert_blocks.len());
    for block in cert_blocks {
        let (_, cert) = x509_parser::parse_x509_certificate(block.contents())
            .map_err(|_| AcceptError::MalformedResponse("undecodable certificate block".into()))?;
        if leaf.is_none() {
            leaf = Some(cert);
        }
        chain.push(CertificateDer::from(block.contents().to_vec()));
    }
    let leaf = leaf.ok_or(AcceptError::NoCertificate)?;

    let validity = leaf.validity();
    if now < validity.not_before.to_datetime() {
        return Err(AcceptError::NotYetValid);
    }
    // Challenge placeholders are minted with whatever validity the engine
    // chose; only their start time is checked.
    let is_challenge = server_name.ends_with(CHALLENGE_NAME_SUFFIX);
    if !is_challenge && now > validity.not_after.to_datetime() {
        return Err(AcceptError::Expired);
    }
    if !domain_match(&leaf, server_name) {
        return Err(AcceptError::DomainMismatch);
    }
    check_key_binding(&leaf, &key)?;

    Ok(CertificateBundle { chain, key })
}

/// The key block may use any of the encodings a broker is allowed to send:
/// PKCS#1 (RSA), PKCS#8 (RSA or EC) or SEC1 (EC). A well-formed PKCS#8
/// wrapper around any other algorithm is reported as such rather than as a
/// parse failure.
fn parse_private_key(der: &[u8]) -> Result<PrivateKey, AcceptError> {
    if let Ok(key) = rsa::RsaPrivateKey::from_pkcs1_der(der) {
        return Ok(PrivateKey::Rsa(key));
    }
    if let Ok(key) = rsa::RsaPrivateKey::from_pkcs8_der(der) {
        return Ok(PrivateKey::Rsa(key));
    }
    if let Ok(key) = p256::SecretKey::from_pkcs8_der(der) {
        return Ok(PrivateKey::EcP256(key));
    }
    if let Ok(key) = p384::SecretKey::from_pkcs8_der(der) {
        return Ok(PrivateKey::EcP384(key));
    }
    if let Ok(info) = rsa::pkcs8::PrivateKeyInfo::try_from(der) {
        return Err(AcceptError::UnsupportedAlgorithm(
            info.algorithm.oid.to_string(),
        ));
    }
    if let Ok(key) = p256::SecretKey::from_sec1_der(der) {
        return Ok(PrivateKey::EcP256(key));
    }
    if let Ok(key) = p384::SecretKey::from_sec1_der(der) {
        return Ok(PrivateKey::EcP384(key));
    }
    Err(AcceptError::KeyParse)
}

/// Exact match against the subject common name, then against the DNS
/// subject alternative names. No wildcard expansion: `*.example.com` covers
/// only the literal name `*.example.com`.
fn domain_match(cert: &X509Certificate<'_>, server_name: &str) -> bool {
    if let Some(common_name) = cert.subject().iter_common_name().next() {
        if common_name.as_str().map_or(false, |name| name == server_name) {
            return true;
        }
    }
    let mut names: Vec<&str> = match cert.subject_alternative_name() {
        Ok(Some(ext)) => ext
            .value
            .general_names
            .iter()
            .filter_map(|name| match name {
                GeneralName::DNSName(name) => Some(*name),
                _ => None,
            })
            .collect(),
        _ => return false,
    };
    names.sort_unstable();
    names.binary_search(&server_name).is_ok()
}

/// The delivered private key must be the counterpart of the leaf's public
/// key: same algorithm, same RSA modulus or same curve point.
fn check_key_binding(cert: &X509Certificate<'_>, key: &PrivateKey) -> Result<(), AcceptError> {
    match cert.public_key().parsed() {
        Ok(PublicKey::RSA(leaf_key)) => {
            let private = match key {
                PrivateKey::Rsa(private) => private,
                _ => return Err(AcceptError::KeyMismatch(TYPE_MISMATCH)),
            };
            if strip_leading_zeros(leaf_key.modulus) != private.n().to_bytes_be().as_slice() {
                return Err(AcceptError::KeyMismatch(VALUE_MISMATCH));
            }
            Ok(())
        }
        Ok(PublicKey::EC(point)) => {
            let matches = match key {
                PrivateKey::EcP256(private) => ec_point_matches_p256(private, point.data()),
                PrivateKey::EcP384(private) => ec_point_matches_p384(private, point.data()),
                PrivateKey::Rsa(_) => return Err(AcceptError::KeyMismatch(TYPE_MISMATCH)),
            };
            if !matches {
                return Err(AcceptError::KeyMismatch(VALUE_MISMATCH));
            }
            Ok(())
        }
        _ => Err(AcceptError::UnsupportedAlgorithm(
            "unknown public key algorithm".into(),
        )),
    }
}

fn ec_point_matches_p256(key: &p256::SecretKey, leaf_point: &[u8]) -> bool {
    match p256::EncodedPoint::from_bytes(leaf_point) {
        Ok(point) => {
            let public = key.public_key();
            public.to_encoded_point(false) == point || public.to_encoded_point(true) == point
        }
        Err(_) => false,
    }
}

fn ec_point_matches_p384(key: &p384::SecretKey, leaf_point: &[u8]) -> bool {
    match p384::EncodedPoint::from_bytes(leaf_point) {
        Ok(point) => {
            let public = key.public_key();
            public.to_encoded_point(false) == point || public.to_encoded_point(true) == point
        }
        Err(_) => false,
    }
}

/// DER integers carry a sign padding byte the raw modulus does not.
fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|byte| *byte != 0)
        .unwrap_or(bytes.len());
    &bytes[start..]
}

#[derive(Error, Debug)]
pub enum AcceptError {
    #[error("broker request failed: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
    #[error("malformed broker response: {0}")]
    MalformedResponse(String),
    #[error("failed to parse private key")]
    KeyParse,
    #[error("no public key found in response")]
    NoCertificate,
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("certificate is not valid yet")]
    NotYetValid,
    #[error("expired certificate")]
    Expired,
    #[error("certificate does not match domain name")]
    DomainMismatch,
    #[error("{0}")]
    KeyMismatch(&'static str),
    #[error("re-encoding private key: {0}")]
    KeyEncode(String),
    #[error(transparent)]
    Tls(#[from] rustls::Error),
}
