// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Local user directory backed by a JSON file of bcrypt hashes.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{LocalAuthenticator, PrivilegeResolver};
use crate::auth::PrivilegeSet;
use crate::storage::{FileStorage, StorageError, StorageResult};

/// A local account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalUser {
    pub username: String,
    /// bcrypt hash
    pub password_hash: String,
    #[serde(default)]
    pub privileges: PrivilegeSet,
    #[serde(default)]
    pub disabled: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct UsersFile {
    #[serde(default)]
    users: Vec<LocalUser>,
}

/// In-memory view of the user file.
#[derive(Debug, Default)]
pub struct UserDirectory {
    users: Vec<LocalUser>,
}

impl UserDirectory {
    /// Load from `path`. A missing file yields an empty directory.
    pub fn load(storage: &FileStorage, path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        match storage.read_json::<UsersFile>(path) {
            Ok(file) => Ok(Self::from_users(file.users)),
            Err(StorageError::NotFound(_)) => {
                warn!(
                    path = %path.display(),
                    "User directory not found; local authentication will reject everyone"
                );
                Ok(Self::default())
            }
            Err(e) => Err(e),
        }
    }

    pub fn from_users(users: Vec<LocalUser>) -> Self {
        Self { users }
    }

    pub fn user(&self, username: &str) -> Option<&LocalUser> {
        self.users
            .iter()
            .find(|u| u.username == username && !u.disabled)
    }
}

impl LocalAuthenticator for UserDirectory {
    fn authenticate(&self, username: &str, password: &str) -> bool {
        self.user(username)
            .is_some_and(|u| bcrypt::verify(password, &u.password_hash).unwrap_or(false))
    }
}

impl PrivilegeResolver for UserDirectory {
    fn privileges_for(&self, principal: &str) -> PrivilegeSet {
        self.user(principal)
            .map(|u| u.privileges.clone())
            .unwrap_or_default()
    }
}
