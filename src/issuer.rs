use async_trait::async_trait;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};

use crate::hello::HelloInfo;

/// Names under this suffix are ACME validation placeholders: short-lived
/// certificates minted to answer a challenge. They are never cached and are
/// exempt from the client's expiry check.
pub const CHALLENGE_NAME_SUFFIX: &str = ".acme.invalid";

/// Key and chain as they come back from the issuance engine, leaf first.
pub struct IssuedCertificate {
    pub key: PrivateKeyDer<'static>,
    pub chain: Vec<CertificateDer<'static>>,
}

/// The issuance engine a broker drives. Implementations own the whole ACME
/// conversation (accounts, orders, challenges) and their renewal policy;
/// the broker only asks for a usable key and chain for a negotiation.
#[async_trait]
pub trait Issuer: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn issue_or_renew(&self, hello: &HelloInfo) -> Result<IssuedCertificate, Self::Error>;
}
