use std::time::Duration;

use bytes::Bytes;
use itertools::Itertools;
use redis::aio::MultiplexedConnection;
use redis::cluster::ClusterClientBuilder;
use redis::cluster_async::ClusterConnection;
use redis::{ConnectionAddr, ConnectionInfo, RedisConnectionInfo};
use thiserror::Error as ThisError;
use tracing::{debug, info};

use crate::config::HostPort;

#[derive(Debug, ThisError)]
pub enum EndpointError {
    #[error("connection to {addrs} failed: {source}")]
    Connect {
        addrs: String,
        source: redis::RedisError,
    },
    #[error(transparent)]
    Redis(#[from] redis::RedisError),
}

/// Whether an endpoint is one addressable node or a sharded cluster
/// presenting a single logical keyspace.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Topology {
    Single,
    Sharded,
}

/// How topology is picked at connect time. `Auto` keeps the historical
/// behavior of inferring it from the address count, which misclassifies a
/// one-seed cluster; the explicit variants exist to override that.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum TopologyMode {
    #[default]
    Auto,
    Single,
    Sharded,
}

impl Topology {
    pub fn resolve(mode: TopologyMode, address_count: usize) -> Topology {
        match mode {
            TopologyMode::Single => Topology::Single,
            TopologyMode::Sharded => Topology::Sharded,
            TopologyMode::Auto if address_count > 1 => Topology::Sharded,
            TopologyMode::Auto => Topology::Single,
        }
    }
}

/// Remaining time-to-live of a key. "Persists indefinitely" is a distinct
/// value, never conflated with a zero duration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ttl {
    Persistent,
    Remaining(Duration),
}

impl Ttl {
    /// Milliseconds argument for RESTORE. Zero means "no expiration", so a
    /// live remaining TTL is floored at 1ms to keep a nearly-expired key
    /// from being restored as persistent.
    pub fn restore_millis(self) -> u64 {
        match self {
            Ttl::Persistent => 0,
            Ttl::Remaining(d) => (d.as_millis() as u64).max(1),
        }
    }
}

/// Capability interface over one side of a migration: key enumeration,
/// the dump/restore pair, TTL queries and logical database selection.
#[allow(async_fn_in_trait)]
pub trait Endpoint {
    /// Numbered logical databases are a single-node concept; sharded
    /// clusters expose one implicit keyspace. Callers must branch on this
    /// instead of assuming database iteration applies everywhere.
    fn supports_databases(&self) -> bool;

    async fn select_database(&mut self, index: u32) -> Result<(), EndpointError>;

    /// All keys in the currently selected database whose name matches
    /// `pattern` (glob syntax). No ordering guarantee.
    async fn keys(&mut self, pattern: &str) -> Result<Vec<String>, EndpointError>;

    /// Serialized representation of the value at `key`, or `None` if the
    /// key no longer exists at call time.
    async fn dump(&mut self, key: &str) -> Result<Option<Bytes>, EndpointError>;

    /// Remaining TTL of `key`, or `None` if the key no longer exists.
    async fn remaining_ttl(&mut self, key: &str) -> Result<Option<Ttl>, EndpointError>;

    /// Write a serialized value at `key` with the given TTL. Without
    /// `replace`, a live key with the same name makes this fail (BUSYKEY).
    async fn restore(
        &mut self,
        key: &str,
        ttl: Ttl,
        payload: &[u8],
        replace: bool,
    ) -> Result<(), EndpointError>;
}

enum Backend {
    Single(MultiplexedConnection),
    Cluster(ClusterConnection),
}

/// A live connection to a Redis instance or cluster.
pub struct RedisEndpoint {
    addrs: String,
    topology: Topology,
    backend: Backend,
}

impl RedisEndpoint {
    /// Connects and runs a PING liveness probe. An unreachable host or a
    /// rejected credential fails here, before any migration work starts.
    pub async fn connect(
        hosts: &[HostPort],
        password: Option<&str>,
        mode: TopologyMode,
        timeouts: Timeouts,
    ) -> Result<RedisEndpoint, EndpointError> {
        let addrs = hosts.iter().map(HostPort::to_string).join(",");
        if hosts.is_empty() {
            return Err(EndpointError::Connect {
                addrs,
                source: redis::RedisError::from((
                    redis::ErrorKind::InvalidClientConfig,
                    "no addresses given",
                )),
            });
        }
        let topology = Topology::resolve(mode, hosts.len());

        let backend = match topology {
            Topology::Single => connect_single(&hosts[0], password, timeouts).await,
            Topology::Sharded => connect_cluster(hosts, password, timeouts).await,
        }
        .map_err(|source| EndpointError::Connect {
            addrs: addrs.clone(),
            source,
        })?;

        let mut endpoint = RedisEndpoint {
            addrs,
            topology,
            backend,
        };
        endpoint.ping().await?;
        info!(addrs = %endpoint.addrs, topology = %topology, "connected");

        Ok(endpoint)
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    async fn ping(&mut self) -> Result<(), EndpointError> {
        let pong: String =
            self.query(redis::cmd("PING"))
                .await
                .map_err(|source| EndpointError::Connect {
                    addrs: self.addrs.clone(),
                    source,
                })?;
        debug!(addrs = %self.addrs, response = %pong, "liveness probe");
        Ok(())
    }

    async fn query<T: redis::FromRedisValue>(
        &mut self,
        cmd: redis::Cmd,
    ) -> Result<T, redis::RedisError> {
        match &mut self.backend {
            Backend::Single(conn) => cmd.query_async(conn).await,
            Backend::Cluster(conn) => cmd.query_async(conn).await,
        }
    }
}

impl Endpoint for RedisEndpoint {
    fn supports_databases(&self) -> bool {
        self.topology == Topology::Single
    }

    async fn select_database(&mut self, index: u32) -> Result<(), EndpointError> {
        if self.topology == Topology::Sharded {
            // One logical keyspace; nothing to select.
            debug!(addrs = %self.addrs, index, "SELECT skipped on sharded endpoint");
            return Ok(());
        }
        let mut cmd = redis::cmd("SELECT");
        cmd.arg(index);
        let _: () = self.query(cmd).await?;
        Ok(())
    }

    async fn keys(&mut self, pattern: &str) -> Result<Vec<String>, EndpointError> {
        // On a cluster the redis crate fans KEYS out to every primary and
        // combines the reply arrays.
        let mut cmd = redis::cmd("KEYS");
        cmd.arg(pattern);
        let keys: Vec<String> = self.query(cmd).await?;
        Ok(keys)
    }

    async fn dump(&mut self, key: &str) -> Result<Option<Bytes>, EndpointError> {
        let mut cmd = redis::cmd("DUMP");
        cmd.arg(key);
        let payload: Option<Vec<u8>> = self.query(cmd).await?;
        Ok(payload.map(Bytes::from))
    }

    async fn remaining_ttl(&mut self, key: &str) -> Result<Option<Ttl>, EndpointError> {
        let mut cmd = redis::cmd("PTTL");
        cmd.arg(key);
        let millis: i64 = self.query(cmd).await?;
        let ttl = match millis {
            -2 => None,
            -1 => Some(Ttl::Persistent),
            n => Some(Ttl::Remaining(Duration::from_millis(n.max(0) as u64))),
        };
        Ok(ttl)
    }

    async fn restore(
        &mut self,
        key: &str,
        ttl: Ttl,
        payload: &[u8],
        replace: bool,
    ) -> Result<(), EndpointError> {
        let mut cmd = redis::cmd("RESTORE");
        cmd.arg(key).arg(ttl.restore_millis()).arg(payload);
        if replace {
            cmd.arg("REPLACE");
        }
        let _: () = self.query(cmd).await?;
        Ok(())
    }
}

/// Connect and response timeouts applied to every round trip, so a single
/// stuck key cannot hang the whole run.
#[derive(Clone, Copy, Debug)]
pub struct Timeouts {
    pub connect: Duration,
    pub response: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Timeouts {
            connect: Duration::from_secs(10),
            response: Duration::from_secs(30),
        }
    }
}

async fn connect_single(
    host: &HostPort,
    password: Option<&str>,
    timeouts: Timeouts,
) -> Result<Backend, redis::RedisError> {
    let info = ConnectionInfo {
        addr: ConnectionAddr::Tcp(host.host.clone(), host.port),
        redis: RedisConnectionInfo {
            password: password.map(str::to_string),
            ..Default::default()
        },
    };
    let client = redis::Client::open(info)?;
    let conn = client
        .get_multiplexed_async_connection_with_timeouts(timeouts.response, timeouts.connect)
        .await?;
    Ok(Backend::Single(conn))
}

async fn connect_cluster(
    hosts: &[HostPort],
    password: Option<&str>,
    timeouts: Timeouts,
) -> Result<Backend, redis::RedisError> {
    let nodes: Vec<ConnectionInfo> = hosts
        .iter()
        .map(|h| ConnectionInfo {
            addr: ConnectionAddr::Tcp(h.host.clone(), h.port),
            redis: RedisConnectionInfo::default(),
        })
        .collect();

    let mut builder = ClusterClientBuilder::new(nodes)
        .connection_timeout(timeouts.connect)
        .response_timeout(timeouts.response);
    if let Some(password) = password {
        builder = builder.password(password.to_string());
    }

    let conn = builder.build()?.get_async_connection().await?;
    Ok(Backend::Cluster(conn))
}
