//! In-memory `Endpoint` used by the unit tests: a handful of numbered
//! keyspaces with fault injection for the races and rejections a live
//! server produces.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use bytes::Bytes;
use glob_match::glob_match;
use redis::{ErrorKind, RedisError};

use crate::endpoint::{Endpoint, EndpointError, Ttl};

struct Entry {
    data: Bytes,
    ttl: Option<Duration>,
}

pub struct MemoryEndpoint {
    databases: Vec<HashMap<String, Entry>>,
    current: usize,
    sharded: bool,
    vanished: HashSet<String>,
    rejected: HashSet<String>,
}

impl MemoryEndpoint {
    pub fn new() -> MemoryEndpoint {
        MemoryEndpoint {
            databases: (0..16).map(|_| HashMap::new()).collect(),
            current: 0,
            sharded: false,
            vanished: HashSet::new(),
            rejected: HashSet::new(),
        }
    }

    /// One implicit keyspace, no database selection.
    pub fn sharded() -> MemoryEndpoint {
        MemoryEndpoint {
            databases: vec![HashMap::new()],
            current: 0,
            sharded: true,
            vanished: HashSet::new(),
            rejected: HashSet::new(),
        }
    }

    pub fn insert(&mut self, database: usize, key: &str, value: &[u8], ttl: Option<Duration>) {
        let database = if self.sharded { 0 } else { database };
        self.databases[database].insert(
            key.to_string(),
            Entry {
                data: Bytes::copy_from_slice(value),
                ttl,
            },
        );
    }

    /// The key stays enumerable but its dump returns nothing, like a key
    /// expiring between KEYS and DUMP.
    pub fn vanish_on_dump(&mut self, key: &str) {
        self.vanished.insert(key.to_string());
    }

    /// Force RESTORE of `key` to be rejected.
    pub fn fail_restore(&mut self, key: &str) {
        self.rejected.insert(key.to_string());
    }

    pub fn value(&self, database: usize, key: &str) -> Option<Vec<u8>> {
        let database = if self.sharded { 0 } else { database };
        self.databases[database].get(key).map(|e| e.data.to_vec())
    }

    pub fn ttl(&self, database: usize, key: &str) -> Option<Ttl> {
        let database = if self.sharded { 0 } else { database };
        self.databases[database].get(key).map(|e| match e.ttl {
            None => Ttl::Persistent,
            Some(d) => Ttl::Remaining(d),
        })
    }

    pub fn total_keys(&self) -> usize {
        self.databases.iter().map(HashMap::len).sum()
    }

    fn selected(&self) -> &HashMap<String, Entry> {
        &self.databases[self.current]
    }
}

impl Endpoint for MemoryEndpoint {
    fn supports_databases(&self) -> bool {
        !self.sharded
    }

    async fn select_database(&mut self, index: u32) -> Result<(), EndpointError> {
        if !self.sharded {
            self.current = index as usize;
        }
        Ok(())
    }

    async fn keys(&mut self, pattern: &str) -> Result<Vec<String>, EndpointError> {
        let mut keys: Vec<String> = self
            .selected()
            .keys()
            .filter(|key| glob_match(pattern, key))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn dump(&mut self, key: &str) -> Result<Option<Bytes>, EndpointError> {
        if self.vanished.contains(key) {
            return Ok(None);
        }
        Ok(self.selected().get(key).map(|e| e.data.clone()))
    }

    async fn remaining_ttl(&mut self, key: &str) -> Result<Option<Ttl>, EndpointError> {
        if self.vanished.contains(key) {
            return Ok(None);
        }
        let ttl = self.selected().get(key).map(|e| match e.ttl {
            None => Ttl::Persistent,
            Some(d) => Ttl::Remaining(d),
        });
        Ok(ttl)
    }

    async fn restore(
        &mut self,
        key: &str,
        ttl: Ttl,
        payload: &[u8],
        replace: bool,
    ) -> Result<(), EndpointError> {
        if self.rejected.contains(key) {
            let err = RedisError::from((ErrorKind::ResponseError, "restore rejected"));
            return Err(EndpointError::Redis(err));
        }
        if !replace && self.selected().contains_key(key) {
            let err = RedisError::from((
                ErrorKind::ResponseError,
                "BUSYKEY",
                "Target key name already exists.".to_string(),
            ));
            return Err(EndpointError::Redis(err));
        }
        let entry = Entry {
            data: Bytes::copy_from_slice(payload),
            ttl: match ttl {
                Ttl::Persistent => None,
                Ttl::Remaining(d) => Some(d),
            },
        };
        self.databases[self.current].insert(key.to_string(), entry);
        Ok(())
    }
}
