// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Settings backup and restore across package reinstallation.
//!
//! The backup is a JSON copy of the full settings document at a fixed path
//! outside the data directory. Both operations are gated on
//! `persist_on_uninstall`.

use serde::Serialize;
use tracing::info;
use utoipa::ToSchema;

use crate::settings::{validate_document, PackageSettings, SaveError, SettingsRepository};
use crate::storage::StorageResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BackupOutcome {
    Success,
    NotConfigured,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RestoreOutcome {
    Success,
    NoChange,
    NoBackup,
    NotConfigured,
}

pub struct BackupService<'a> {
    settings: &'a SettingsRepository,
}

impl<'a> BackupService<'a> {
    pub fn new(settings: &'a SettingsRepository) -> Self {
        Self { settings }
    }

    /// Write the current settings to the backup file.
    pub fn backup_to_file(&self) -> StorageResult<BackupOutcome> {
        let settings = self.settings.snapshot()?;
        if !settings.persist_on_uninstall {
            return Ok(BackupOutcome::NotConfigured);
        }

        let storage = self.settings.storage();
        storage.write_json(storage.paths().backup_file(), &settings)?;
        info!(path = %storage.paths().backup_file().display(), "Settings backed up");
        Ok(BackupOutcome::Success)
    }

    /// Replace the live settings with the backup when they differ.
    ///
    /// A backup that fails validation is rejected and the live settings are
    /// left untouched.
    pub fn restore_from_backup(&self) -> Result<RestoreOutcome, SaveError> {
        let storage = self.settings.storage();
        let path = storage.paths().backup_file();

        let outcome = self.settings.with_exclusive_lock(|current| {
            if !current.persist_on_uninstall {
                return Ok(RestoreOutcome::NotConfigured);
            }
            if !storage.exists(path) {
                return Ok(RestoreOutcome::NoBackup);
            }

            let backup: PackageSettings = storage.read_json(path)?;
            if backup == *current {
                return Ok(RestoreOutcome::NoChange);
            }
            validate_document(&backup)?;
            *current = backup;
            Ok::<_, SaveError>(RestoreOutcome::Success)
        })?;

        if outcome == RestoreOutcome::Success {
            info!("Settings restored from backup");
        }
        Ok(outcome)
    }

    /// Delete the backup file. Returns whether one existed.
    pub fn remove_backup(&self) -> StorageResult<bool> {
        let storage = self.settings.storage();
        let path = storage.paths().backup_file();
        if !storage.exists(path) {
            return Ok(false);
        }
        storage.delete(path)?;
        info!("Settings backup removed");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{AuthMode, SettingsError};
    use crate::storage::{FileStorage, StorageError, StoragePaths};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn repo() -> (TempDir, SettingsRepository) {
        let temp = TempDir::new().unwrap();
        let paths = StoragePaths::new(temp.path().join("data"))
            .with_backup_file(temp.path().join("share").join("backup.json"));
        let mut storage = FileStorage::new(paths);
        storage.initialize().unwrap();
        (temp, SettingsRepository::new(Arc::new(storage)))
    }

    fn update(repo: &SettingsRepository, f: impl FnOnce(&mut PackageSettings)) {
        repo.with_exclusive_lock(|s| {
            f(s);
            Ok::<_, StorageError>(())
        })
        .unwrap();
    }

    #[test]
    fn backup_then_restore_is_no_change() {
        let (_temp, repo) = repo();
        let service = BackupService::new(&repo);

        assert_eq!(service.backup_to_file().unwrap(), BackupOutcome::Success);
        assert_eq!(service.restore_from_backup().unwrap(), RestoreOutcome::NoChange);
    }

    #[test]
    fn restore_reverts_a_change() {
        let (_temp, repo) = repo();
        let service = BackupService::new(&repo);
        service.backup_to_file().unwrap();

        update(&repo, |s| s.auth_mode = AuthMode::Jwt);
        assert_eq!(service.restore_from_backup().unwrap(), RestoreOutcome::Success);
        assert_eq!(repo.snapshot().unwrap().auth_mode, AuthMode::Local);
    }

    #[test]
    fn invalid_backup_is_refused() {
        let (_temp, repo) = repo();
        let service = BackupService::new(&repo);
        let storage = repo.storage();

        let tampered = PackageSettings {
            signed_token_expiry_secs: 10,
            ..Default::default()
        };
        storage
            .write_json(storage.paths().backup_file(), &tampered)
            .unwrap();
        update(&repo, |s| s.auth_mode = AuthMode::Jwt);

        let err = service.restore_from_backup().unwrap_err();
        assert!(matches!(
            err,
            SaveError::Invalid(SettingsError::SignedTokenExpiry(10))
        ));
        let live = repo.snapshot().unwrap();
        assert_eq!(live.auth_mode, AuthMode::Jwt);
        assert_eq!(live.signed_token_expiry_secs, 3600);
    }

    #[test]
    fn persistence_disabled_is_not_configured() {
        let (_temp, repo) = repo();
        let service = BackupService::new(&repo);
        update(&repo, |s| s.persist_on_uninstall = false);

        assert_eq!(service.backup_to_file().unwrap(), BackupOutcome::NotConfigured);
        assert_eq!(
            service.restore_from_backup().unwrap(),
            RestoreOutcome::NotConfigured
        );
        assert!(!repo.storage().exists(repo.storage().paths().backup_file()));
    }

    #[test]
    fn missing_backup() {
        let (_temp, repo) = repo();
        assert_eq!(
            BackupService::new(&repo).restore_from_backup().unwrap(),
            RestoreOutcome::NoBackup
        );
    }

    #[test]
    fn remove_backup_reports_existence() {
        let (_temp, repo) = repo();
        let service = BackupService::new(&repo);
        assert!(!service.remove_backup().unwrap());
        service.backup_to_file().unwrap();
        assert!(service.remove_backup().unwrap());
        assert!(!repo.storage().exists(repo.storage().paths().backup_file()));
    }
}
