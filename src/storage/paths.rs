// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Path constants and utilities for the settings store layout.

use std::path::{Path, PathBuf};

/// Base directory for the package settings store and audit log.
pub const DATA_ROOT: &str = "/var/db/firewall-api";

/// Well-known backup location. Lives outside [`DATA_ROOT`] so that it
/// survives removal of the package data directory on uninstall.
pub const DEFAULT_BACKUP_FILE: &str = "/usr/local/share/firewall-api/backup.json";

/// Storage path utilities.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
    backup_file: PathBuf,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self::new(DATA_ROOT).with_backup_file(DEFAULT_BACKUP_FILE)
    }
}

impl StoragePaths {
    /// Create a new StoragePaths with a custom root (useful for testing).
    ///
    /// The backup file defaults to `<root>/backup.json`; production setups
    /// override it with [`StoragePaths::with_backup_file`].
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        let backup_file = root.join("backup.json");
        Self { root, backup_file }
    }

    /// Override the backup file location.
    pub fn with_backup_file(mut self, path: impl AsRef<Path>) -> Self {
        self.backup_file = path.as_ref().to_path_buf();
        self
    }

    /// Root directory for all package data.
    pub fn root(&self) -> &Path {
        &self.root
    }

    // ========== Settings Paths ==========

    /// The persisted package settings document.
    pub fn settings_file(&self) -> PathBuf {
        self.root.join("settings.json")
    }

    /// Advisory lock file guarding settings read-modify-write cycles.
    pub fn settings_lock_file(&self) -> PathBuf {
        self.root.join("settings.lock")
    }

    /// Settings backup used across package reinstallation.
    pub fn backup_file(&self) -> &Path {
        &self.backup_file
    }

    // ========== Collaborator Paths ==========

    /// Local user directory (password hashes and privileges).
    pub fn users_file(&self) -> PathBuf {
        self.root.join("users.json")
    }

    /// Interface to local address table.
    pub fn interfaces_file(&self) -> PathBuf {
        self.root.join("interfaces.json")
    }

    // ========== Audit Log Paths ==========

    /// Directory containing audit logs.
    pub fn audit_dir(&self) -> PathBuf {
        self.root.join("audit")
    }

    /// Directory for a specific date's audit logs.
    pub fn audit_date_dir(&self, date: &str) -> PathBuf {
        self.audit_dir().join(date)
    }

    /// Path to a daily audit events file (JSONL format).
    pub fn audit_events_file(&self, date: &str) -> PathBuf {
        self.audit_date_dir(date).join("events.jsonl")
    }
}
