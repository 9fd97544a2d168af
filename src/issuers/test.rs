use async_trait::async_trait;
use rcgen::{
    date_time_ymd, BasicConstraints, CertificateParams, DistinguishedName, DnType, IsCa,
    KeyUsagePurpose, PKCS_ECDSA_P256_SHA256,
};
use rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
use std::sync::Arc;
use time::OffsetDateTime;

use crate::hello::HelloInfo;
use crate::issuer::{IssuedCertificate, Issuer};

/// Test issuer, which signs certificates for ACME incompatible test
/// environments. Every request gets a fresh P-256 key and a leaf signed by a
/// generated CA; trust the CA via [`TestIssuer::ca_pem`].
#[derive(Clone)]
pub struct TestIssuer {
    ca_cert: Arc<rcgen::Certificate>,
    ca_pem: Arc<String>,
    ca_key_pair: Arc<rcgen::KeyPair>,
    not_before: OffsetDateTime,
    not_after: OffsetDateTime,
}

impl Default for TestIssuer {
    fn default() -> Self {
        let mut dn = DistinguishedName::new();
        dn.push(DnType::OrganizationName, "acme-broker");
        dn.push(DnType::CommonName, "acme-broker test CA");

        let mut params = CertificateParams::default();
        params.distinguished_name = dn;
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];
        // wide open on purpose; issued leaves carry the real window
        params.not_before = date_time_ymd(2000, 1, 1);
        params.not_after = date_time_ymd(3000, 1, 1);

        let ca_key_pair = rcgen::KeyPair::generate_for(&PKCS_ECDSA_P256_SHA256).unwrap();
        let ca_cert = params.self_signed(&ca_key_pair).unwrap();
        let ca_pem = ca_cert.pem();
        Self {
            ca_cert: ca_cert.into(),
            ca_key_pair: ca_key_pair.into(),
            ca_pem: ca_pem.into(),
            not_before: date_time_ymd(2000, 1, 1),
            not_after: date_time_ymd(3000, 1, 1),
        }
    }
}

impl TestIssuer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validity window stamped on issued leaves.
    pub fn with_validity(mut self, not_before: OffsetDateTime, not_after: OffsetDateTime) -> Self {
        self.not_before = not_before;
        self.not_after = not_after;
        self
    }

    pub fn ca_pem(&self) -> &str {
        &self.ca_pem
    }
}

#[async_trait]
impl Issuer for TestIssuer {
    type Error = rcgen::Error;

    async fn issue_or_renew(&self, hello: &HelloInfo) -> Result<IssuedCertificate, Self::Error> {
        let key_pair = rcgen::KeyPair::generate_for(&PKCS_ECDSA_P256_SHA256)?;
        let mut params = CertificateParams::new(vec![hello.server_name.clone()])?;
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, "acme-broker test leaf");
        params.distinguished_name = dn;
        params.not_before = self.not_before;
        params.not_after = self.not_after;

        let cert = params.signed_by(&key_pair, &self.ca_cert, &self.ca_key_pair)?;
        log::debug!("test issuer: signed certificate for {:?}", hello.server_name);

        let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_pair.serialize_der()));
        let chain = vec![cert.der().clone(), self.ca_cert.der().clone()];
        Ok(IssuedCertificate { key, chain })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn issues_a_leaf_for_the_requested_name() {
        let issuer = TestIssuer::new();
        let issued = issuer
            .issue_or_renew(&HelloInfo::new("example.com"))
            .await
            .unwrap();
        assert_eq!(issued.chain.len(), 2);

        let (_, leaf) = x509_parser::parse_x509_certificate(issued.chain[0].as_ref()).unwrap();
        let san = leaf.subject_alternative_name().unwrap().unwrap();
        assert_eq!(san.value.general_names.len(), 1);
    }

    #[tokio::test]
    async fn validity_window_is_configurable() {
        let issuer =
            TestIssuer::new().with_validity(date_time_ymd(2024, 1, 1), date_time_ymd(2024, 4, 1));
        let issued = issuer
            .issue_or_renew(&HelloInfo::new("example.com"))
            .await
            .unwrap();
        let (_, leaf) = x509_parser::parse_x509_certificate(issued.chain[0].as_ref()).unwrap();
        assert_eq!(leaf.validity().not_before.to_datetime(), date_time_ymd(2024, 1, 1));
        assert_eq!(leaf.validity().not_after.to_datetime(), date_time_ymd(2024, 4, 1));
    }
}
