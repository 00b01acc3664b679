// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Named privileges for authorization.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Universal privilege; satisfies every requirement.
pub const PAGE_ALL: &str = "page-all";
/// Manage package settings, rotation, backup and sync.
pub const PAGE_SYSTEM_API: &str = "page-system-api";
/// Request API credentials or signed tokens.
pub const PAGE_ACCESS_TOKEN: &str = "page-system-api-access-token";
/// Receive replicated settings from an HA peer.
pub const PAGE_SYNC: &str = "page-system-api-sync";

/// Privileges granted to a principal.
///
/// ## Matching
///
/// A route declares the privileges that may reach it. The principal is
/// admitted when it holds *any* of them (OR semantics), when it holds
/// [`PAGE_ALL`], or when the route declares none.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrivilegeSet(BTreeSet<String>);

impl PrivilegeSet {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(names.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    /// Whether this set satisfies a route's requirement.
    pub fn satisfies(&self, required: &[&str]) -> bool {
        required.is_empty()
            || self.contains(PAGE_ALL)
            || required.iter().any(|name| self.contains(name))
    }
}

impl<S: Into<String>> FromIterator<S> for PrivilegeSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_all_satisfies_everything() {
        let set = PrivilegeSet::new([PAGE_ALL]);
        assert!(set.satisfies(&[PAGE_SYSTEM_API]));
        assert!(set.satisfies(&[PAGE_SYNC, PAGE_ACCESS_TOKEN]));
    }

    #[test]
    fn any_overlap_is_enough() {
        let set = PrivilegeSet::new([PAGE_ACCESS_TOKEN]);
        assert!(set.satisfies(&[PAGE_SYSTEM_API, PAGE_ACCESS_TOKEN]));
        assert!(!set.satisfies(&[PAGE_SYSTEM_API]));
    }

    #[test]
    fn empty_requirement_always_passes() {
        assert!(PrivilegeSet::default().satisfies(&[]));
        assert!(!PrivilegeSet::default().satisfies(&[PAGE_SYNC]));
    }

    #[test]
    fn deserializes_from_plain_list() {
        let set: PrivilegeSet = serde_json::from_str(r#"["page-system-api"]"#).unwrap();
        assert!(set.contains(PAGE_SYSTEM_API));
    }
}
