use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use thiserror::Error as ThisError;

use crate::endpoint::{Timeouts, TopologyMode};
use crate::keyset::KeyFilter;

pub const DEFAULT_KEY_FILTER: &str = "*";
pub const DEFAULT_MAX_DATABASES: u32 = 16;

#[derive(Debug, PartialEq, ThisError)]
pub enum ConfigError {
    #[error("invalid address {0:?}: expected host:port")]
    InvalidAddress(String),
    #[error("please specify a source with --source-hosts")]
    MissingSourceHosts,
    #[error("please specify a destination with --destination-hosts")]
    MissingDestinationHosts,
    #[error("cannot use --key-filter and --key-file together")]
    FilterConflict,
    #[error("nothing to do: pass --get-keys and/or --copy-data")]
    NoAction,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostPort {
    pub host: String,
    pub port: u16,
}

impl HostPort {
    fn parse(addr: &str) -> Result<HostPort, ConfigError> {
        let invalid = || ConfigError::InvalidAddress(addr.to_string());
        let (host, port) = addr.rsplit_once(':').ok_or_else(invalid)?;
        if host.is_empty() {
            return Err(invalid());
        }
        let port = port.parse().map_err(|_| invalid())?;
        Ok(HostPort {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for HostPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Parses a comma-separated `host:port` list.
pub fn parse_hosts(list: &str) -> Result<Vec<HostPort>, ConfigError> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(HostPort::parse)
        .collect()
}

#[derive(Debug, Parser)]
#[command(name = "keyhaul", version, about = "Copies keys between Redis instances or clusters, preserving values and TTLs")]
pub struct Options {
    /// Comma-separated list of source Redis servers (host:port)
    #[arg(long, env = "KEYHAUL_SOURCE_HOSTS")]
    pub source_hosts: Option<String>,

    /// Comma-separated list of destination Redis servers (host:port)
    #[arg(long, env = "KEYHAUL_DESTINATION_HOSTS")]
    pub destination_hosts: Option<String>,

    /// Password for the source servers
    #[arg(long, env = "KEYHAUL_SOURCE_PASSWORD")]
    pub source_password: Option<String>,

    /// Password for the destination servers
    #[arg(long, env = "KEYHAUL_DESTINATION_PASSWORD")]
    pub destination_password: Option<String>,

    /// Glob pattern selecting the keys to migrate
    #[arg(long, default_value = DEFAULT_KEY_FILTER)]
    pub key_filter: String,

    /// Path to a newline-delimited file of keys to migrate
    #[arg(long)]
    pub key_file: Option<PathBuf>,

    /// Fetch and display keys from the source without migrating
    #[arg(long)]
    pub get_keys: bool,

    /// Migrate keys to the destination
    #[arg(long)]
    pub copy_data: bool,

    /// Number of logical databases to sweep on a single-node source
    #[arg(long, default_value_t = DEFAULT_MAX_DATABASES)]
    pub max_databases: u32,

    /// Source topology; auto infers sharded when several hosts are given
    #[arg(long, value_enum, default_value_t = TopologyMode::Auto)]
    pub source_topology: TopologyMode,

    /// Destination topology; auto infers sharded when several hosts are given
    #[arg(long, value_enum, default_value_t = TopologyMode::Auto)]
    pub destination_topology: TopologyMode,

    /// Overwrite keys that already exist at the destination
    #[arg(long)]
    pub replace: bool,

    /// Per-command timeout in milliseconds
    #[arg(long, default_value_t = 30_000)]
    pub command_timeout_ms: u64,
}

impl Options {
    /// Cross-option checks that must fail before any connection attempt.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.get_keys && !self.copy_data {
            return Err(ConfigError::NoAction);
        }
        if self.key_file.is_some() && self.key_filter != DEFAULT_KEY_FILTER {
            return Err(ConfigError::FilterConflict);
        }
        if self.source_hosts.as_deref().unwrap_or("").is_empty() {
            return Err(ConfigError::MissingSourceHosts);
        }
        if self.copy_data && self.destination_hosts.as_deref().unwrap_or("").is_empty() {
            return Err(ConfigError::MissingDestinationHosts);
        }
        Ok(())
    }

    pub fn filter(&self) -> KeyFilter {
        match &self.key_file {
            Some(path) => KeyFilter::File(path.clone()),
            None => KeyFilter::Pattern(self.key_filter.clone()),
        }
    }

    pub fn source_addrs(&self) -> Result<Vec<HostPort>, ConfigError> {
        let hosts = parse_hosts(self.source_hosts.as_deref().unwrap_or(""))?;
        if hosts.is_empty() {
            return Err(ConfigError::MissingSourceHosts);
        }
        Ok(hosts)
    }

    pub fn destination_addrs(&self) -> Result<Vec<HostPort>, ConfigError> {
        let hosts = parse_hosts(self.destination_hosts.as_deref().unwrap_or(""))?;
        if hosts.is_empty() {
            return Err(ConfigError::MissingDestinationHosts);
        }
        Ok(hosts)
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            response: Duration::from_millis(self.command_timeout_ms),
            ..Timeouts::default()
        }
    }
}
