use std::fmt::Display;
use std::time::Duration;

use async_trait::async_trait;
use etcd_client::Client;
use tokio::time::timeout;

use crate::cache::{Cache, CacheError};

/// Everything this crate writes lives under one namespace, so certificate
/// state never collides with other tenants of the cluster.
const ETCD_PREFIX: &str = "acme-broker";

const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(5);

/// Backend over an etcd v3 cluster. etcd serializes writes per key, so
/// brokers sharing the cluster observe a consistent view without any local
/// locking layered on top.
pub struct EtcdCache {
    client: Client,
    op_timeout: Duration,
}

impl EtcdCache {
    /// Wraps a connected client. The handle is a cheap channel clone; it is
    /// cloned again per operation because the client API takes `&mut self`.
    pub fn new(client: Client) -> Self {
        Self {
            client,
            op_timeout: DEFAULT_OP_TIMEOUT,
        }
    }

    /// Deadline applied to each store operation. Expiry surfaces as
    /// [`CacheError::Timeout`], never as a miss.
    pub fn with_op_timeout(mut self, op_timeout: Duration) -> Self {
        self.op_timeout = op_timeout;
        self
    }

    fn wire_key(key: &str) -> String {
        format!("{}/cache/{}", ETCD_PREFIX, key)
    }
}

impl Display for EtcdCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EtcdCache({})", ETCD_PREFIX)
    }
}

#[async_trait]
impl Cache for EtcdCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut client = self.client.clone();
        let resp = timeout(self.op_timeout, client.get(Self::wire_key(key), None))
            .await
            .map_err(|_| CacheError::Timeout(self.op_timeout))?
            .map_err(|err| CacheError::Store(err.into()))?;
        Ok(resp.kvs().first().map(|kv| kv.value().to_vec()))
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), CacheError> {
        let mut client = self.client.clone();
        timeout(self.op_timeout, client.put(Self::wire_key(key), value.to_vec(), None))
            .await
            .map_err(|_| CacheError::Timeout(self.op_timeout))?
            .map_err(|err| CacheError::Store(err.into()))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut client = self.client.clone();
        timeout(self.op_timeout, client.delete(Self::wire_key(key), None))
            .await
            .map_err(|_| CacheError::Timeout(self.op_timeout))?
            .map_err(|err| CacheError::Store(err.into()))?;
        Ok(())
    }
}
