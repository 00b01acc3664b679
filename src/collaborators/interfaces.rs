// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Interface id to local address table.

use std::net::IpAddr;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::InterfaceResolver;
use crate::settings::LOCALHOST_INTERFACE;
use crate::storage::{FileStorage, StorageError, StorageResult};

/// One configured interface and the addresses bound to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceEntry {
    pub name: String,
    #[serde(default)]
    pub addresses: Vec<IpAddr>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct InterfacesFile {
    #[serde(default)]
    interfaces: Vec<InterfaceEntry>,
}

#[derive(Debug, Default)]
pub struct InterfaceTable {
    interfaces: Vec<InterfaceEntry>,
}

impl InterfaceTable {
    /// Load from `path`. A missing file yields an empty table, in which case
    /// only `any` and `localhost` can be allowed.
    pub fn load(storage: &FileStorage, path: impl AsRef<Path>) -> StorageResult<Self> {
        match storage.read_json::<InterfacesFile>(path) {
            Ok(file) => Ok(Self::new(file.interfaces)),
            Err(StorageError::NotFound(_)) => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    pub fn new(interfaces: Vec<InterfaceEntry>) -> Self {
        Self { interfaces }
    }
}

impl InterfaceResolver for InterfaceTable {
    fn interface_for(&self, local: IpAddr) -> Option<String> {
        let local = local.to_canonical();
        if local.is_loopback() {
            return Some(LOCALHOST_INTERFACE.to_string());
        }
        self.interfaces
            .iter()
            .find(|i| i.addresses.iter().any(|a| a.to_canonical() == local))
            .map(|i| i.name.clone())
    }

    fn interface_names(&self) -> Vec<String> {
        self.interfaces.iter().map(|i| i.name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> InterfaceTable {
        InterfaceTable::new(vec![
            InterfaceEntry {
                name: "wan".to_string(),
                addresses: vec!["203.0.113.1".parse().unwrap()],
            },
            InterfaceEntry {
                name: "lan".to_string(),
                addresses: vec!["192.168.1.1".parse().unwrap(), "fd00::1".parse().unwrap()],
            },
        ])
    }

    #[test]
    fn resolves_by_local_address() {
        let t = table();
        assert_eq!(t.interface_for("203.0.113.1".parse().unwrap()).as_deref(), Some("wan"));
        assert_eq!(t.interface_for("fd00::1".parse().unwrap()).as_deref(), Some("lan"));
        assert_eq!(
            t.interface_for("::ffff:192.168.1.1".parse().unwrap()).as_deref(),
            Some("lan")
        );
        assert_eq!(t.interface_for("10.9.9.9".parse().unwrap()), None);
    }

    #[test]
    fn loopback_is_localhost() {
        let t = InterfaceTable::default();
        assert_eq!(t.interface_for("127.0.0.1".parse().unwrap()).as_deref(), Some("localhost"));
        assert_eq!(t.interface_for("::1".parse().unwrap()).as_deref(), Some("localhost"));
    }

    #[test]
    fn lists_names() {
        assert_eq!(table().interface_names(), vec!["wan".to_string(), "lan".to_string()]);
    }
}
