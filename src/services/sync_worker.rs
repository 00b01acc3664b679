// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Deferred Sync Worker
//!
//! Background task that replicates settings after a save without holding up
//! the request that made the change.
//!
//! ## Strategy
//!
//! Handlers call [`SyncHandle::trigger`]. Triggers land on a channel of
//! capacity one, so a burst of saves collapses into a single pending sync.
//! The worker takes a fresh snapshot when it runs, which always reflects the
//! latest save. Per-peer failures are logged, written to the audit log and
//! kept as the last report so they are never silent.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken`, like the other background
//! loops.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use utoipa::ToSchema;

use super::replication::{ReplicationService, SyncReport};
use crate::settings::SettingsRepository;
use crate::storage::{AuditEvent, AuditEventType, AuditRepository};

/// The most recent deferred sync.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SyncRecord {
    pub finished_at: DateTime<Utc>,
    pub report: SyncReport,
}

/// Cloneable handle used by request handlers.
#[derive(Clone)]
pub struct SyncHandle {
    tx: mpsc::Sender<()>,
    last: Arc<RwLock<Option<SyncRecord>>>,
}

impl SyncHandle {
    /// Request a sync. Coalesces with one already pending.
    pub fn trigger(&self) {
        match self.tx.try_send(()) {
            Ok(()) | Err(mpsc::error::TrySendError::Full(())) => {}
            Err(mpsc::error::TrySendError::Closed(())) => {
                warn!("Sync worker is not running; change will replicate on the next sync")
            }
        }
    }

    /// Report of the last deferred sync, if one has run.
    pub async fn last_report(&self) -> Option<SyncRecord> {
        self.last.read().await.clone()
    }
}

/// The background half; see [`sync_channel`].
pub struct SyncWorker {
    rx: mpsc::Receiver<()>,
    last: Arc<RwLock<Option<SyncRecord>>>,
    settings: Arc<SettingsRepository>,
    replication: Arc<ReplicationService>,
}

/// Create a connected handle and worker.
pub fn sync_channel(
    settings: Arc<SettingsRepository>,
    replication: Arc<ReplicationService>,
) -> (SyncHandle, SyncWorker) {
    let (tx, rx) = mpsc::channel(1);
    let last = Arc::new(RwLock::new(None));
    (
        SyncHandle {
            tx,
            last: Arc::clone(&last),
        },
        SyncWorker {
            rx,
            last,
            settings,
            replication,
        },
    )
}

impl SyncWorker {
    /// Run until the cancellation token fires or every handle is dropped.
    ///
    /// ```rust,ignore
    /// tokio::spawn(worker.run(shutdown.clone()));
    /// ```
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("Sync worker starting");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Sync worker shutting down");
                    return;
                }
                trigger = self.rx.recv() => match trigger {
                    Some(()) => self.sync_once().await,
                    None => {
                        info!("Sync worker channel closed");
                        return;
                    }
                },
            }
        }
    }

    async fn sync_once(&self) {
        let settings = match self.settings.snapshot() {
            Ok(settings) => settings,
            Err(e) => {
                warn!(error = %e, "Sync worker could not read settings");
                return;
            }
        };

        let report = self.replication.sync(&settings, true).await;
        record_failures(&self.settings, &report);

        *self.last.write().await = Some(SyncRecord {
            finished_at: Utc::now(),
            report,
        });
    }
}

/// Write one audit event per failed peer.
pub fn record_failures(settings: &SettingsRepository, report: &SyncReport) {
    let audit = AuditRepository::new(settings.storage());
    for failure in report.failures() {
        let mut event = AuditEvent::new(AuditEventType::PeerSyncFailed)
            .with_resource("peer", failure.peer.clone());
        if let Some(reason) = &failure.reason {
            event = event.failed(reason.clone());
        }
        audit.record(&event);
    }
}
