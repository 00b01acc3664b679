// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Rotation, replication and backup endpoints.

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::Auth,
    error::ApiError,
    services::{
        sync_worker::record_failures, BackupOutcome, BackupService, KeyRotation, RestoreOutcome,
        RotationOutcome, RotationScope, SyncRecord, SyncReport,
    },
    settings::{validate_document, PackageSettings, SaveError},
    state::AppState,
    storage::AuditEventType,
};

#[derive(Debug, Deserialize, IntoParams)]
pub struct RotateQuery {
    /// Overrides the scope implied by the configured auth mode.
    pub scope: Option<RotationScope>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BackupResponse {
    pub outcome: BackupOutcome,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RestoreResponse {
    pub outcome: RestoreOutcome,
    /// Present when the restored settings were pushed to peers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync: Option<SyncReport>,
}

#[utoipa::path(
    post,
    path = "/api/v1/system/api/rotate",
    params(RotateQuery),
    tag = "Operations",
    responses((status = 200, body = RotationOutcome))
)]
pub async fn rotate(
    State(state): State<AppState>,
    Auth(principal): Auth,
    Query(query): Query<RotateQuery>,
) -> Result<Json<RotationOutcome>, ApiError> {
    let outcome = KeyRotation::new(&state.settings, &state.replication)
        .rotate(query.scope, &principal.name)
        .await?;
    Ok(Json(outcome))
}

#[utoipa::path(
    post,
    path = "/api/v1/system/api/sync",
    tag = "Operations",
    responses((status = 200, body = SyncReport))
)]
pub async fn sync_now(State(state): State<AppState>) -> Result<Json<SyncReport>, ApiError> {
    let settings = state.settings.snapshot()?;
    let report = state.replication.sync(&settings, true).await;
    record_failures(&state.settings, &report);
    Ok(Json(report))
}

#[utoipa::path(
    get,
    path = "/api/v1/system/api/sync",
    tag = "Operations",
    responses(
        (status = 200, body = SyncRecord),
        (status = 404, description = "No deferred sync has run yet")
    )
)]
pub async fn last_sync(State(state): State<AppState>) -> Result<Json<SyncRecord>, ApiError> {
    state
        .sync
        .last_report()
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found("No sync has run yet"))
}

#[utoipa::path(
    post,
    path = "/api/v1/system/api/backup",
    tag = "Operations",
    responses((status = 200, body = BackupResponse))
)]
pub async fn backup(State(state): State<AppState>) -> Result<Json<BackupResponse>, ApiError> {
    let outcome = BackupService::new(&state.settings).backup_to_file()?;
    Ok(Json(BackupResponse { outcome }))
}

/// Restore from backup. Restored settings are pushed to peers.
#[utoipa::path(
    post,
    path = "/api/v1/system/api/restore",
    tag = "Operations",
    responses(
        (status = 200, body = RestoreResponse),
        (status = 400, description = "Backup failed validation")
    )
)]
pub async fn restore(
    State(state): State<AppState>,
    Auth(principal): Auth,
) -> Result<Json<RestoreResponse>, ApiError> {
    let outcome = BackupService::new(&state.settings).restore_from_backup()?;

    let sync = if outcome == RestoreOutcome::Success {
        crate::audit_log!(&state.storage, AuditEventType::SettingsRestored, &principal.name);
        let settings = state.settings.snapshot()?;
        let report = state.replication.sync(&settings, true).await;
        record_failures(&state.settings, &report);
        Some(report)
    } else {
        None
    };

    Ok(Json(RestoreResponse { outcome, sync }))
}

/// Receive settings pushed by an HA peer.
///
/// A payload that passes validation replaces local settings and is not
/// synced onward, so replication never cascades. Interface names are checked
/// against the payload's own list. The route stays writable on a read-only
/// node.
#[utoipa::path(
    put,
    path = "/api/v1/system/api/sync/peer",
    request_body = PackageSettings,
    tag = "Operations",
    responses(
        (status = 204),
        (status = 400, description = "Malformed or invalid settings document"),
        (status = 401, description = "Authentication required")
    )
)]
pub async fn receive_from_peer(
    State(state): State<AppState>,
    Auth(principal): Auth,
    payload: Result<Json<PackageSettings>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(settings) = payload?;
    if let Err(e) = validate_document(&settings) {
        warn!(peer_user = %principal.name, error = %e, "Rejected settings pushed by HA peer");
        return Err(SaveError::from(e).into());
    }
    state.settings.replace(settings)?;
    info!(peer_user = %principal.name, "Settings replaced by HA peer");
    crate::audit_log!(&state.storage, AuditEventType::SettingsReplicated, &principal.name);
    Ok(StatusCode::NO_CONTENT)
}
