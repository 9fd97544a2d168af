use std::sync::Arc;

use rustls::server::Acceptor;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_rustls::LazyConfigAcceptor;

use crate::client::{AcceptError, BrokerClient, BrokerTransport};
use crate::hello::HelloInfo;

/// Accepts TLS connections with certificates obtained from a broker.
///
/// The handshake is paused after the ClientHello, the negotiation is
/// forwarded to the broker, and the handshake resumes with whatever bundle
/// came back. No certificate state is kept locally.
pub struct BrokerAcceptor<T: BrokerTransport> {
    client: Arc<BrokerClient<T>>,
}

impl<T: BrokerTransport> Clone for BrokerAcceptor<T> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
        }
    }
}

impl<T: BrokerTransport> BrokerAcceptor<T> {
    pub fn new(client: BrokerClient<T>) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    pub async fn accept<IO>(
        &self,
        io: IO,
    ) -> Result<tokio_rustls::server::TlsStream<IO>, HandshakeError>
    where
        IO: AsyncRead + AsyncWrite + Unpin,
    {
        let handshake = LazyConfigAcceptor::new(Acceptor::default(), io).await?;
        let hello = HelloInfo::from_client_hello(&handshake.client_hello());
        let bundle = self.client.obtain(&hello).await?;
        let config = Arc::new(bundle.server_config()?);
        Ok(handshake.into_stream(config).await?)
    }
}

#[derive(Error, Debug)]
pub enum HandshakeError {
    #[error("io error: {0:?}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Accept(#[from] AcceptError),
}
