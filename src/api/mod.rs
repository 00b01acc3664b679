// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    routing::{delete, get, post, put},
    Json, Router,
};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;

use crate::{
    auth::{
        guarded,
        privileges::{PAGE_ACCESS_TOKEN, PAGE_SYNC, PAGE_SYSTEM_API},
        RouteAccess,
    },
    services::{
        BackupOutcome, PeerSyncResult, RestoreOutcome, RotationOutcome, RotationScope, SyncRecord,
        SyncReport,
    },
    settings::{
        ApiCredential, AuthMode, HashAlgorithm, PackageSettings, SettingsUpdate, SettingsView,
    },
    state::AppState,
};

pub mod health;
pub mod operations;
pub mod settings;
pub mod tokens;

const SYSTEM_API: RouteAccess = RouteAccess::requires(&[PAGE_SYSTEM_API]);
const ACCESS_TOKEN: RouteAccess = RouteAccess::requires(&[PAGE_ACCESS_TOKEN]).local_auth();
const PEER_SYNC: RouteAccess = RouteAccess::requires(&[PAGE_SYNC])
    .local_auth()
    .ignore_read_only();

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route(
            "/system/api",
            guarded(
                get(settings::get_settings).put(settings::update_settings),
                &state,
                SYSTEM_API,
            ),
        )
        .route(
            "/access_token",
            guarded(
                post(tokens::issue_token).get(tokens::list_tokens),
                &state,
                ACCESS_TOKEN,
            ),
        )
        .route(
            "/access_token/{id}",
            guarded(delete(tokens::revoke_token), &state, SYSTEM_API),
        )
        .route(
            "/system/api/rotate",
            guarded(post(operations::rotate), &state, SYSTEM_API),
        )
        .route(
            "/system/api/sync",
            guarded(
                post(operations::sync_now).get(operations::last_sync),
                &state,
                SYSTEM_API,
            ),
        )
        .route(
            "/system/api/sync/peer",
            guarded(put(operations::receive_from_peer), &state, PEER_SYNC),
        )
        .route(
            "/system/api/backup",
            guarded(post(operations::backup), &state, SYSTEM_API),
        )
        .route(
            "/system/api/restore",
            guarded(post(operations::restore), &state, SYSTEM_API),
        );

    Router::new()
        .nest("/api/v1", v1_routes)
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/api-doc/openapi.json", get(openapi))
        .with_state(state)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        settings::get_settings,
        settings::update_settings,
        tokens::issue_token,
        tokens::list_tokens,
        tokens::revoke_token,
        operations::rotate,
        operations::sync_now,
        operations::last_sync,
        operations::backup,
        operations::restore,
        operations::receive_from_peer,
        health::health,
        health::liveness
    ),
    components(
        schemas(
            SettingsView,
            SettingsUpdate,
            PackageSettings,
            ApiCredential,
            AuthMode,
            HashAlgorithm,
            tokens::IssuedAccess,
            tokens::CredentialSummary,
            RotationScope,
            RotationOutcome,
            SyncReport,
            PeerSyncResult,
            SyncRecord,
            BackupOutcome,
            RestoreOutcome,
            operations::BackupResponse,
            operations::RestoreResponse,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Settings", description = "API package settings"),
        (name = "Access Tokens", description = "API credential and signed-token issuance"),
        (name = "Operations", description = "Key rotation, HA sync and backup"),
        (name = "Health", description = "Service health")
    )
)]
pub struct ApiDoc;
