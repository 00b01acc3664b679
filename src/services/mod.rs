// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Operational services: key rotation, HA replication and backup/restore.

pub mod backup;
pub mod replication;
pub mod rotation;
pub mod sync_worker;

pub use backup::{BackupOutcome, BackupService, RestoreOutcome};
pub use replication::{PeerNode, PeerSyncResult, PeerTransport, ReplicationService, SyncReport};
pub use rotation::{KeyRotation, RotationOutcome, RotationScope};
pub use sync_worker::{sync_channel, SyncHandle, SyncRecord, SyncWorker};
