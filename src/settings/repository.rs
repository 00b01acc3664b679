// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The single persisted settings document and its exclusive-update protocol.

use std::fs::File;
use std::sync::{Arc, Mutex};

use tracing::debug;

use super::model::PackageSettings;
use crate::storage::{FileStorage, StorageError, StorageResult};

/// Repository for the package settings singleton.
///
/// Readers get owned snapshots. Writers go through
/// [`with_exclusive_lock`](Self::with_exclusive_lock), which serializes
/// read-modify-write cycles within the process (mutex) and across processes
/// (advisory lock on `settings.lock`), so the CLI and the server never lose
/// each other's updates.
#[derive(Debug)]
pub struct SettingsRepository {
    storage: Arc<FileStorage>,
    lock: Mutex<()>,
}

impl SettingsRepository {
    pub fn new(storage: Arc<FileStorage>) -> Self {
        Self {
            storage,
            lock: Mutex::new(()),
        }
    }

    pub fn storage(&self) -> &FileStorage {
        &self.storage
    }

    /// Current settings; defaults when nothing has been saved yet.
    pub fn snapshot(&self) -> StorageResult<PackageSettings> {
        self.read_current()
    }

    /// Ensure a settings document exists on disk, writing defaults if absent.
    pub fn load_or_init(&self) -> StorageResult<PackageSettings> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let lock_file = self.lock_file()?;

        let path = self.storage.paths().settings_file();
        let settings = self.read_current()?;
        if !self.storage.exists(&path) {
            self.storage.write_json(&path, &settings)?;
        }

        drop(lock_file);
        Ok(settings)
    }

    /// Run `f` against a working copy under the exclusive lock.
    ///
    /// The copy is written back only when `f` returns `Ok` and actually
    /// changed something. On `Err` the store is untouched.
    pub fn with_exclusive_lock<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut PackageSettings) -> Result<T, E>,
        E: From<StorageError>,
    {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let lock_file = self.lock_file()?;

        let original = self.read_current()?;
        let mut working = original.clone();
        let value = f(&mut working)?;

        if working != original {
            self.storage
                .write_json(self.storage.paths().settings_file(), &working)?;
            debug!("Settings written");
        }

        // Dropping the handle releases the advisory lock.
        drop(lock_file);
        Ok(value)
    }

    /// Replace the whole document (restore, peer replication).
    pub fn replace(&self, settings: PackageSettings) -> StorageResult<()> {
        self.with_exclusive_lock(move |current| {
            *current = settings;
            Ok::<_, StorageError>(())
        })
    }

    fn lock_file(&self) -> StorageResult<File> {
        let file = self
            .storage
            .open_lock_file(self.storage.paths().settings_lock_file())?;
        file.lock()?;
        Ok(file)
    }

    fn read_current(&self) -> StorageResult<PackageSettings> {
        match self.storage.read_json(self.storage.paths().settings_file()) {
            Ok(settings) => Ok(settings),
            Err(StorageError::NotFound(_)) => Ok(PackageSettings::default()),
            Err(e) => Err(e),
        }
    }
}
