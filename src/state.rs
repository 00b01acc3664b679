// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::auth::AccessGate;
use crate::collaborators::{
    AuditLoginProtection, InterfaceResolver, InterfaceTable, UserDirectory,
};
use crate::config::ServerConfig;
use crate::services::{sync_channel, ReplicationService, SyncHandle, SyncWorker};
use crate::settings::SettingsRepository;
use crate::storage::{FileStorage, StorageError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("storage: {0}")]
    Storage(#[from] StorageError),

    #[error("peer client: {0}")]
    Client(#[from] reqwest::Error),
}

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<FileStorage>,
    pub settings: Arc<SettingsRepository>,
    pub gate: AccessGate,
    pub interfaces: Arc<dyn InterfaceResolver>,
    pub replication: Arc<ReplicationService>,
    pub sync: SyncHandle,
}

impl AppState {
    /// Open the store, load collaborators and wire the sync worker.
    ///
    /// The returned worker must be spawned for deferred replication to run.
    pub fn build(config: &ServerConfig) -> Result<(Self, SyncWorker), StartupError> {
        let mut storage = FileStorage::new(config.paths.clone());
        storage.initialize()?;
        let storage = Arc::new(storage);

        let settings = Arc::new(SettingsRepository::new(Arc::clone(&storage)));
        settings.load_or_init()?;

        let users = Arc::new(UserDirectory::load(&storage, &config.users_file)?);
        let interfaces = Arc::new(InterfaceTable::load(&storage, &config.interfaces_file)?);
        let gate = AccessGate::new(
            users.clone(),
            users,
            Arc::new(AuditLoginProtection::new(Arc::clone(&storage))),
        );

        let replication = Arc::new(ReplicationService::new(config.transport.clone())?);
        let (sync, worker) = sync_channel(Arc::clone(&settings), Arc::clone(&replication));

        info!(data_dir = %config.paths.root().display(), "Application state ready");

        Ok((
            Self {
                storage,
                settings,
                gate,
                interfaces,
                replication,
                sync,
            },
            worker,
        ))
    }
}

/// State over a temporary store, with local users:
///
/// | user | password | privileges |
/// |------|----------|------------|
/// | `admin` | `admin-pw` | `page-all` |
/// | `tokens` | `tokens-pw` | `page-system-api-access-token` |
/// | `syncer` | `syncer-pw` | `page-system-api-sync` |
/// | `nobody` | `nobody-pw` | none |
///
/// and interfaces `lan` (192.168.1.1) and `wan` (203.0.113.1).
///
/// The sync worker is dropped; use [`test_state_with_worker`] when deferred
/// replication should run.
#[cfg(test)]
pub fn test_state() -> (AppState, tempfile::TempDir) {
    let (state, _worker, temp) = test_state_with_worker();
    (state, temp)
}

/// [`test_state`] plus its unspawned sync worker. Peers are reached over
/// plain HTTP.
#[cfg(test)]
pub fn test_state_with_worker() -> (AppState, SyncWorker, tempfile::TempDir) {
    use crate::auth::privileges::{PAGE_ACCESS_TOKEN, PAGE_ALL, PAGE_SYNC};
    use crate::auth::PrivilegeSet;
    use crate::collaborators::interfaces::InterfaceEntry;
    use crate::collaborators::users::LocalUser;
    use crate::services::PeerTransport;
    use crate::storage::StoragePaths;

    let temp = tempfile::TempDir::new().unwrap();
    let paths = StoragePaths::new(temp.path().join("data"))
        .with_backup_file(temp.path().join("share").join("backup.json"));
    let mut storage = FileStorage::new(paths);
    storage.initialize().unwrap();
    let storage = Arc::new(storage);

    let settings = Arc::new(SettingsRepository::new(Arc::clone(&storage)));
    settings.load_or_init().unwrap();

    let user = |name: &str, privileges: &[&str]| LocalUser {
        username: name.to_string(),
        password_hash: bcrypt::hash(format!("{name}-pw"), 4).unwrap(),
        privileges: PrivilegeSet::new(privileges.iter().copied()),
        disabled: false,
    };
    let users = Arc::new(UserDirectory::from_users(vec![
        user("admin", &[PAGE_ALL]),
        user("tokens", &[PAGE_ACCESS_TOKEN]),
        user("syncer", &[PAGE_SYNC]),
        user("nobody", &[]),
    ]));
    let interfaces = Arc::new(InterfaceTable::new(vec![
        InterfaceEntry {
            name: "lan".to_string(),
            addresses: vec!["192.168.1.1".parse().unwrap()],
        },
        InterfaceEntry {
            name: "wan".to_string(),
            addresses: vec!["203.0.113.1".parse().unwrap()],
        },
    ]));
    let gate = AccessGate::new(
        users.clone(),
        users,
        Arc::new(AuditLoginProtection::new(Arc::clone(&storage))),
    );

    let replication = Arc::new(
        ReplicationService::new(PeerTransport {
            scheme: "http".to_string(),
            timeout: std::time::Duration::from_secs(2),
            ..Default::default()
        })
        .unwrap(),
    );
    let (sync, worker) = sync_channel(Arc::clone(&settings), Arc::clone(&replication));

    (
        AppState {
            storage,
            settings,
            gate,
            interfaces,
            replication,
            sync,
        },
        worker,
        temp,
    )
}
