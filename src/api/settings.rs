// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde_json::json;
use tracing::{info, warn};

use crate::{
    auth::Auth,
    error::ApiError,
    services::BackupService,
    settings::{SaveError, SettingsUpdate, SettingsView},
    state::AppState,
    storage::{AuditEvent, AuditEventType, AuditRepository},
};

#[utoipa::path(
    get,
    path = "/api/v1/system/api",
    tag = "Settings",
    responses(
        (status = 200, body = SettingsView),
        (status = 401, description = "Authentication required"),
        (status = 403, description = "Access denied")
    )
)]
pub async fn get_settings(State(state): State<AppState>) -> Result<Json<SettingsView>, ApiError> {
    let settings = state.settings.snapshot()?;
    Ok(Json(SettingsView::from(&settings)))
}

/// Partial update. The backup is refreshed (or removed when persistence is
/// switched off) and a deferred sync is queued.
///
/// Once the save has committed, a backup failure is logged and audited but
/// does not fail the request.
#[utoipa::path(
    put,
    path = "/api/v1/system/api",
    request_body = SettingsUpdate,
    tag = "Settings",
    responses(
        (status = 200, body = SettingsView),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Access denied or read-only")
    )
)]
pub async fn update_settings(
    State(state): State<AppState>,
    Auth(principal): Auth,
    payload: Result<Json<SettingsUpdate>, JsonRejection>,
) -> Result<Json<SettingsView>, ApiError> {
    let Json(update) = payload?;
    let known = state.interfaces.interface_names();
    let updated = state.settings.with_exclusive_lock(|settings| {
        update.apply(settings, &known)?;
        Ok::<_, SaveError>(settings.clone())
    })?;

    let audit = AuditRepository::new(&state.storage);
    let backup = BackupService::new(&state.settings);
    let backed_up = if updated.persist_on_uninstall {
        backup.backup_to_file().map(drop)
    } else {
        backup.remove_backup().map(drop)
    };
    if let Err(e) = backed_up {
        warn!(error = %e, "Settings saved but the backup could not be refreshed");
        audit.record(
            &AuditEvent::new(AuditEventType::SettingsBackupFailed)
                .with_principal(&principal.name)
                .failed(e.to_string()),
        );
    }

    info!(actor = %principal.name, "Settings updated");
    audit.record(
        &AuditEvent::new(AuditEventType::SettingsChanged)
            .with_principal(&principal.name)
            .with_details(json!({ "auth_mode": updated.auth_mode })),
    );
    state.sync.trigger();

    Ok(Json(SettingsView::from(&updated)))
}
