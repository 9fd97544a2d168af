//! Centralized TLS certificate management for [rustls] servers.
//!
//! A fleet of frontends should not each run their own certificate issuance:
//! rate limits, private keys and renewal state all want to live in one place.
//! This crate splits TLS serving into a broker, which owns an issuance engine
//! and a layered bundle cache, and thin clients, which forward the parameters
//! of each incoming ClientHello and serve whatever certificate comes back.
//! Clients validate every bundle before use, so a confused or compromised
//! broker cannot hand a frontend a certificate for the wrong name or a
//! private key that does not match its certificate.
//!
//! [rustls] is configured with the [ring] backend here because it compiles
//! almost everywhere without fuss; switching the crate to [aws-lc-rs] would
//! only take the matching `Cargo.toml` feature wiring.
//!
//! ## Brokering a handshake
//!
//! [CertificateBroker] answers negotiations out of its cache and falls back to
//! its [Issuer] when nothing usable is stored. A broker is itself a
//! [BrokerTransport], which makes single-process setups and tests a matter of
//! plugging it straight into a [BrokerClient]:
//!
//! ```rust,no_run
//! use acme_broker::caches::{EncryptedCache, MemoryCache};
//! use acme_broker::issuers::TestIssuer;
//! use acme_broker::{BrokerClient, CertificateBroker, HelloInfo, Keyring};
//!
//! #[tokio::main]
//! async fn main() {
//!     let cache = EncryptedCache::new(MemoryCache::new(), Keyring::generate());
//!     let broker = CertificateBroker::new(TestIssuer::new()).with_cache(cache);
//!
//!     let client = BrokerClient::new(broker);
//!     let bundle = client.obtain(&HelloInfo::new("example.com")).await.unwrap();
//!     let _config = bundle.server_config().unwrap();
//! }
//! ```
//!
//! Deployments with the broker on another machine implement [BrokerTransport]
//! over their RPC layer of choice and hand that to the [BrokerClient] instead.
//! [BrokerAcceptor] drives the whole flow for a raw TCP stream: it pauses the
//! handshake at the ClientHello, obtains a bundle through its client and
//! finishes the handshake with [tokio_rustls].
//!
//! ## Certificate caching
//!
//! Issued bundles are cached under their server name, so repeat negotiations
//! and broker restarts do not cost another round through the issuance engine.
//! [caches::MemoryCache] keeps bundles in process memory, [caches::EtcdCache]
//! shares them across brokers through an [etcd] cluster, and caches backed by
//! other persistence layers may be implemented using the [Cache] trait.
//!
//! Bundles contain private keys, so a shared store should never see them in
//! the clear. [caches::EncryptedCache] wraps any inner cache with [age]
//! encryption using the x25519 keys of a [Keyring]: values are encrypted to
//! all recipients on the way in and decrypted with any matching identity on
//! the way out. Split keyrings allow write-only producers and read-only
//! consumers.
//!
//! ## Issuance engines
//!
//! The broker is agnostic about where certificates come from: anything
//! implementing [Issuer] fits, an ACME account as well as an internal CA.
//! [issuers::TestIssuer] mints throwaway certificates from an in-memory CA
//! and exists so that servers, clients and caches can be exercised without
//! any network at all.
//!
//! ## Acknowledgements
//!
//! The cache-or-issue flow owes a debt to Go's
//! [autocert](https://golang.org/x/crypto/acme/autocert/) package, and the
//! handshake plumbing to the authors of [rustls] and
//! [tokio-rustls](https://github.com/tokio-rs/tls/tree/master/tokio-rustls).
//!
//! [ring]: https://github.com/briansmith/ring
//! [rustls]: https://github.com/ctz/rustls
//! [aws-lc-rs]: https://github.com/aws/aws-lc-rs
//! [age]: https://github.com/str4d/rage
//! [etcd]: https://etcd.io

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

mod acceptor;
mod broker;
mod cache;
pub mod caches;
mod client;
mod hello;
mod issuer;
pub mod issuers;
mod keyring;

pub use tokio_rustls;

pub use acceptor::*;
pub use broker::*;
pub use cache::*;
pub use client::*;
pub use hello::*;
pub use issuer::*;
pub use keyring::*;
