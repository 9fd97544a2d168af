use rustls::server::ClientHello;
use rustls::{CipherSuite, NamedGroup};
use serde::{Deserialize, Serialize};

/// Negotiation facts a TLS terminator forwards to the broker: which name the
/// peer asked for and what it can negotiate. Pure data, no behavior.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HelloInfo {
    /// SNI name; empty when the peer sent none.
    pub server_name: String,
    pub cipher_suites: Vec<CipherSuite>,
    pub named_groups: Vec<NamedGroup>,
    /// Raw EC point format identifiers, uninterpreted.
    pub ec_point_formats: Vec<u8>,
}

impl HelloInfo {
    pub fn new(server_name: impl Into<String>) -> Self {
        Self {
            server_name: server_name.into(),
            ..Self::default()
        }
    }

    /// Captures what rustls exposes from a live ClientHello. rustls does not
    /// surface the peer's supported groups or point formats, so those lists
    /// stay empty here.
    pub fn from_client_hello(hello: &ClientHello<'_>) -> Self {
        Self {
            server_name: hello.server_name().unwrap_or_default().to_owned(),
            cipher_suites: hello.cipher_suites().to_vec(),
            named_groups: Vec::new(),
            ec_point_formats: Vec::new(),
        }
    }
}

/// Transport-neutral form of [`HelloInfo`]: identifiers widened to u32 so
/// any integer encoding can carry them. The conversions are total in both
/// directions and never inspect the values, so unknown identifiers survive
/// the round trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireHelloInfo {
    pub server_name: String,
    pub cipher_suites: Vec<u32>,
    pub supported_curves: Vec<u32>,
    pub supported_points: Vec<u8>,
}

impl From<&HelloInfo> for WireHelloInfo {
    fn from(hello: &HelloInfo) -> Self {
        Self {
            server_name: hello.server_name.clone(),
            cipher_suites: hello
                .cipher_suites
                .iter()
                .map(|suite| u16::from(*suite) as u32)
                .collect(),
            supported_curves: hello
                .named_groups
                .iter()
                .map(|group| u16::from(*group) as u32)
                .collect(),
            supported_points: hello.ec_point_formats.clone(),
        }
    }
}

impl From<&WireHelloInfo> for HelloInfo {
    fn from(wire: &WireHelloInfo) -> Self {
        Self {
            server_name: wire.server_name.clone(),
            cipher_suites: wire
                .cipher_suites
                .iter()
                .map(|id| CipherSuite::from(*id as u16))
                .collect(),
            named_groups: wire
                .supported_curves
                .iter()
                .map(|id| NamedGroup::from(*id as u16))
                .collect(),
            ec_point_formats: wire.supported_points.clone(),
        }
    }
}
