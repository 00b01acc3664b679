// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    auth::{Auth, CredentialManager, SignedTokenService},
    error::ApiError,
    settings::{ApiCredential, AuthMode, HashAlgorithm},
    state::AppState,
    storage::AuditEventType,
};

/// Access material returned once, at issue time.
#[derive(Debug, Serialize, ToSchema)]
#[serde(untagged)]
pub enum IssuedAccess {
    /// `token` mode: present as `Authorization: <client_id> <client_token>`.
    Credential {
        client_id: String,
        client_token: String,
    },
    /// `jwt` mode: present as `Authorization: Bearer <token>`.
    SignedToken {
        token: String,
        expires_at: DateTime<Utc>,
    },
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CredentialSummary {
    pub id: String,
    pub hash_algorithm: HashAlgorithm,
    pub created_at: DateTime<Utc>,
}

impl From<ApiCredential> for CredentialSummary {
    fn from(c: ApiCredential) -> Self {
        Self {
            id: c.id,
            hash_algorithm: c.hash_algorithm,
            created_at: c.created_at,
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/access_token",
    tag = "Access Tokens",
    responses(
        (status = 201, body = IssuedAccess),
        (status = 401, description = "Authentication required"),
        (status = 403, description = "Local authentication mode issues no tokens")
    )
)]
pub async fn issue_token(
    State(state): State<AppState>,
    Auth(principal): Auth,
) -> Result<(StatusCode, Json<IssuedAccess>), ApiError> {
    let snapshot = state.settings.snapshot()?;
    let storage = &state.storage;

    let issued = match snapshot.auth_mode {
        AuthMode::Local => {
            return Err(ApiError::forbidden(
                "Access tokens are not used in local authentication mode",
            ))
        }
        AuthMode::Token => {
            let credential = CredentialManager::new(&state.settings).generate(&principal.name)?;
            crate::audit_log!(
                storage,
                AuditEventType::CredentialCreated,
                &principal.name,
                "credential",
                &credential.id
            );
            state.sync.trigger();
            IssuedAccess::Credential {
                client_id: credential.id,
                client_token: credential.secret,
            }
        }
        AuthMode::Jwt => {
            let token = SignedTokenService::new(&state.settings).issue(&principal.name)?;
            crate::audit_log!(storage, AuditEventType::SignedTokenIssued, &principal.name);
            // The first issue creates the signing secret.
            if snapshot.signed_token_secret.is_none() {
                state.sync.trigger();
            }
            IssuedAccess::SignedToken {
                token: token.token,
                expires_at: token.expires_at,
            }
        }
    };

    Ok((StatusCode::CREATED, Json(issued)))
}

#[utoipa::path(
    get,
    path = "/api/v1/access_token",
    tag = "Access Tokens",
    responses((status = 200, body = [CredentialSummary]))
)]
pub async fn list_tokens(
    State(state): State<AppState>,
    Auth(principal): Auth,
) -> Result<Json<Vec<CredentialSummary>>, ApiError> {
    let credentials = CredentialManager::new(&state.settings).list_for(&principal.name)?;
    Ok(Json(credentials.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    delete,
    path = "/api/v1/access_token/{id}",
    params(
        ("id" = String, Path, description = "Client id of the credential to revoke")
    ),
    tag = "Access Tokens",
    responses(
        (status = 204),
        (status = 404, description = "Unknown credential")
    )
)]
pub async fn revoke_token(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Auth(principal): Auth,
) -> Result<StatusCode, ApiError> {
    if !CredentialManager::new(&state.settings).revoke(&id)? {
        return Err(ApiError::not_found("Credential not found"));
    }
    crate::audit_log!(
        &state.storage,
        AuditEventType::CredentialRevoked,
        &principal.name,
        "credential",
        &id
    );
    state.sync.trigger();
    Ok(StatusCode::NO_CONTENT)
}
