// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Durable state for the access-control service lives in plain JSON files
//! under the data directory:
//!
//! ```text
//! /var/db/firewall-api/
//!   settings.json        # PackageSettings singleton (credentials, signing secret)
//!   settings.lock        # advisory lock for read-modify-write cycles
//!   users.json           # local user directory
//!   interfaces.json      # interface -> local address table
//!   audit/
//!     {date}/events.jsonl
//! /usr/local/share/firewall-api/
//!   backup.json          # survives package reinstallation
//! ```

pub mod audit;
pub mod fs;
pub mod paths;

pub use audit::{AuditEvent, AuditEventType, AuditRepository};
pub use fs::{FileStorage, StorageError, StorageResult};
pub use paths::StoragePaths;
