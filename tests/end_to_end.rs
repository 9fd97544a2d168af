use std::convert::TryFrom;
use std::sync::Arc;

use acme_broker::caches::{EncryptedCache, MemoryCache};
use acme_broker::issuers::TestIssuer;
use acme_broker::tokio_rustls::rustls::pki_types::ServerName;
use acme_broker::tokio_rustls::rustls::{ClientConfig, RootCertStore};
use acme_broker::tokio_rustls::TlsConnector;
use acme_broker::{
    BrokerAcceptor, BrokerClient, Cache, CertificateBroker, HelloInfo, Keyring, PrivateKey,
};
use time::{Duration, OffsetDateTime};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

fn fresh_issuer() -> TestIssuer {
    let now = OffsetDateTime::now_utc();
    TestIssuer::new().with_validity(now - Duration::hours(1), now + Duration::days(90))
}

#[tokio::test]
async fn obtain_through_loopback_broker() {
    let broker = CertificateBroker::new(fresh_issuer()).with_cache(MemoryCache::new());
    let client = BrokerClient::new(broker);

    let bundle = client.obtain(&HelloInfo::new("example.com")).await.unwrap();
    assert_eq!(bundle.chain().len(), 2);
    assert!(matches!(bundle.key(), PrivateKey::EcP256(_)));

    let (_, leaf) = x509_parser::parse_x509_certificate(bundle.leaf_der().as_ref()).unwrap();
    let san = leaf.subject_alternative_name().unwrap().unwrap();
    let names: Vec<_> = san
        .value
        .general_names
        .iter()
        .filter_map(|name| match name {
            x509_parser::extensions::GeneralName::DNSName(name) => Some(*name),
            _ => None,
        })
        .collect();
    assert_eq!(names, ["example.com"]);
}

#[tokio::test]
async fn ciphertext_at_rest_through_the_full_stack() {
    let store = Arc::new(MemoryCache::new());
    let cache = EncryptedCache::new(store.clone(), Keyring::generate());
    let broker = CertificateBroker::new(fresh_issuer()).with_cache(cache);
    let client = BrokerClient::new(broker);

    client.obtain(&HelloInfo::new("example.com")).await.unwrap();

    let stored = store.get("example.com").await.unwrap().unwrap();
    assert!(!stored.starts_with(b"-----BEGIN"));
    let marker = b"PRIVATE KEY";
    assert!(!stored.windows(marker.len()).any(|window| window == marker));
}

#[tokio::test]
async fn tls_handshake_end_to_end() {
    let issuer = fresh_issuer();
    let ca_pem = issuer.ca_pem().to_string();
    let broker = CertificateBroker::new(issuer).with_cache(MemoryCache::new());
    let acceptor = BrokerAcceptor::new(BrokerClient::new(broker));

    let (client_io, server_io) = tokio::io::duplex(16 * 1024);

    let server = tokio::spawn(async move {
        let mut tls = acceptor.accept(server_io).await.unwrap();
        let mut buf = [0u8; 4];
        tls.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");
        tls.write_all(b"pong").await.unwrap();
        tls.shutdown().await.unwrap();
    });

    let ca = pem::parse(ca_pem).unwrap();
    let mut roots = RootCertStore::empty();
    roots.add(ca.contents().to_vec().into()).unwrap();
    let config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    let connector = TlsConnector::from(Arc::new(config));

    let server_name = ServerName::try_from("example.com").unwrap();
    let mut tls = connector.connect(server_name, client_io).await.unwrap();
    tls.write_all(b"ping").await.unwrap();
    tls.flush().await.unwrap();
    let mut reply = Vec::new();
    tls.read_to_end(&mut reply).await.unwrap();
    assert_eq!(reply, b"pong");

    server.await.unwrap();
}
