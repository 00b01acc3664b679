// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Key rotation: irreversible, immediate invalidation of outstanding
//! credentials and/or signed tokens, followed by replication.

use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use super::replication::{ReplicationService, SyncReport};
use super::sync_worker::record_failures;
use crate::auth::signed_token::install_secret;
use crate::auth::CredentialError;
use crate::settings::{AuthMode, SettingsRepository};
use crate::storage::AuditEventType;

/// What a rotation invalidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RotationScope {
    /// Clear every stored API credential.
    Credentials,
    /// Replace the signed-token secret.
    SignedTokenSecret,
    /// Both.
    All,
}

impl RotationScope {
    /// Default scope for the configured auth mode.
    pub fn for_mode(mode: AuthMode) -> Self {
        match mode {
            AuthMode::Token => RotationScope::Credentials,
            AuthMode::Jwt => RotationScope::SignedTokenSecret,
            AuthMode::Local => RotationScope::All,
        }
    }

    fn clears_credentials(self) -> bool {
        matches!(self, RotationScope::Credentials | RotationScope::All)
    }

    fn rotates_secret(self) -> bool {
        matches!(self, RotationScope::SignedTokenSecret | RotationScope::All)
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RotationOutcome {
    pub scope: RotationScope,
    pub credentials_revoked: usize,
    pub secret_rotated: bool,
    /// Replication of the rotated state.
    pub sync: SyncReport,
}

pub struct KeyRotation<'a> {
    settings: &'a SettingsRepository,
    replication: &'a ReplicationService,
}

impl<'a> KeyRotation<'a> {
    pub fn new(settings: &'a SettingsRepository, replication: &'a ReplicationService) -> Self {
        Self {
            settings,
            replication,
        }
    }

    /// Rotate in one locked write, then push the result to peers.
    ///
    /// `scope` defaults to [`RotationScope::for_mode`] of the configured mode.
    /// The local change stands regardless of peer reachability; peer
    /// failures come back in [`RotationOutcome::sync`].
    pub async fn rotate(
        &self,
        scope: Option<RotationScope>,
        actor: &str,
    ) -> Result<RotationOutcome, CredentialError> {
        let (scope, credentials_revoked, secret_rotated, snapshot) =
            self.settings.with_exclusive_lock(|settings| {
                let scope = scope.unwrap_or_else(|| RotationScope::for_mode(settings.auth_mode));

                let mut revoked = 0;
                if scope.clears_credentials() {
                    revoked = settings.credentials.len();
                    settings.credentials.clear();
                }
                if scope.rotates_secret() {
                    install_secret(settings)?;
                }

                Ok::<_, CredentialError>((scope, revoked, scope.rotates_secret(), settings.clone()))
            })?;

        info!(
            scope = ?scope,
            credentials_revoked,
            secret_rotated,
            actor = %actor,
            "Keys rotated"
        );
        crate::audit_log!(self.settings.storage(), AuditEventType::KeyRotated, actor);

        let sync = self.replication.sync(&snapshot, true).await;
        record_failures(self.settings, &sync);

        Ok(RotationOutcome {
            scope,
            credentials_revoked,
            secret_rotated,
            sync,
        })
    }
}
