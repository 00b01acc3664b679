// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! CIDR access list entries.

use std::net::IpAddr;
use std::str::FromStr;

use ipnetwork::IpNetwork;

use super::SettingsError;

/// A validated CIDR block: mask 1-32 (v4) or 1-128 (v6), no host bits set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessListEntry(IpNetwork);

impl AccessListEntry {
    pub fn parse(entry: &str) -> Result<Self, SettingsError> {
        let invalid = |reason: &'static str| SettingsError::AccessListEntry {
            entry: entry.to_string(),
            reason,
        };

        if !entry.contains('/') {
            return Err(invalid("missing prefix length"));
        }
        let network = IpNetwork::from_str(entry.trim()).map_err(|_| invalid("not a valid CIDR"))?;

        let max_prefix = match network {
            IpNetwork::V4(_) => 32,
            IpNetwork::V6(_) => 128,
        };
        if network.prefix() == 0 || network.prefix() > max_prefix {
            return Err(invalid("prefix length out of range"));
        }
        if network.network() != network.ip() {
            return Err(invalid("host bits are set"));
        }

        Ok(Self(network))
    }

    pub fn contains(&self, address: IpAddr) -> bool {
        self.0.contains(address.to_canonical())
    }
}

/// Whether `source` may reach the API under `access_list`.
///
/// An empty list permits everyone. Entries are validated at save time; an
/// entry that no longer parses never matches.
pub fn permits(access_list: &[String], source: IpAddr) -> bool {
    access_list.is_empty()
        || access_list
            .iter()
            .filter_map(|entry| AccessListEntry::parse(entry).ok())
            .any(|entry| entry.contains(source))
}
