// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Partial settings updates and save-time validation.

use std::collections::BTreeMap;

use axum::http::{HeaderName, HeaderValue};
use serde::Deserialize;
use utoipa::ToSchema;

use super::access_list::AccessListEntry;
use super::model::{
    AuthMode, HashAlgorithm, PackageSettings, ANY_INTERFACE, LOCALHOST_INTERFACE,
    MAX_SIGNED_TOKEN_EXPIRY_SECS, MIN_SIGNED_TOKEN_EXPIRY_SECS, TOKEN_BYTE_STRENGTHS,
};
use crate::services::replication::PeerNode;
use crate::storage::StorageError;

/// Specific, user-facing validation failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error(
        "signed token expiry must be between {MIN_SIGNED_TOKEN_EXPIRY_SECS} and \
         {MAX_SIGNED_TOKEN_EXPIRY_SECS} seconds (got {0})"
    )]
    SignedTokenExpiry(u64),

    #[error("unknown authentication mode '{0}'")]
    UnknownAuthMode(String),

    #[error("unknown token hash algorithm '{0}'")]
    UnknownHashAlgorithm(String),

    #[error("token byte strength must be 16, 32 or 64 (got {0})")]
    TokenByteStrength(u16),

    #[error("at least one allowed interface is required")]
    NoAllowedInterfaces,

    #[error("unknown interface '{0}'")]
    UnknownInterface(String),

    #[error("invalid access list entry '{entry}': {reason}")]
    AccessListEntry { entry: String, reason: &'static str },

    #[error("invalid custom response header '{0}'")]
    ResponseHeader(String),

    #[error("invalid HA sync peer '{0}'")]
    SyncPeer(String),

    #[error("HA sync requires at least one peer")]
    NoSyncPeers,

    #[error("HA sync requires a username and password")]
    SyncCredentials,
}

/// Failure of a settings save: either the input was rejected or the store
/// could not be written.
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error(transparent)]
    Invalid(#[from] SettingsError),

    #[error("settings store unavailable: {0}")]
    Storage(#[from] StorageError),
}

/// Fields an operator may change. Omitted fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct SettingsUpdate {
    pub enabled: Option<bool>,
    pub read_only: Option<bool>,
    pub auth_mode: Option<String>,
    pub allowed_interfaces: Option<Vec<String>>,
    pub token_hash_algorithm: Option<String>,
    pub token_byte_strength: Option<u16>,
    pub signed_token_expiry_secs: Option<u64>,
    pub persist_on_uninstall: Option<bool>,
    pub access_list: Option<Vec<String>>,
    pub login_protection: Option<bool>,
    pub ha_sync_enabled: Option<bool>,
    pub ha_sync_peers: Option<Vec<String>>,
    pub ha_sync_username: Option<String>,
    pub ha_sync_password: Option<String>,
    pub allow_options_method: Option<bool>,
    pub custom_response_headers: Option<BTreeMap<String, String>>,
}

impl SettingsUpdate {
    /// Apply onto `settings`, then validate the result.
    ///
    /// `known_interfaces` lists the interface ids configured on the host.
    /// On error `settings` may be partially modified; callers run this inside
    /// [`SettingsRepository::with_exclusive_lock`](super::SettingsRepository::with_exclusive_lock),
    /// which discards the working copy when an error is returned.
    pub fn apply(
        self,
        settings: &mut PackageSettings,
        known_interfaces: &[String],
    ) -> Result<(), SettingsError> {
        if let Some(v) = self.enabled {
            settings.enabled = v;
        }
        if let Some(v) = self.read_only {
            settings.read_only = v;
        }
        if let Some(mode) = self.auth_mode {
            settings.auth_mode =
                AuthMode::parse(&mode).ok_or(SettingsError::UnknownAuthMode(mode))?;
        }
        if let Some(v) = self.allowed_interfaces {
            settings.allowed_interfaces = v;
        }
        if let Some(algorithm) = self.token_hash_algorithm {
            settings.token_hash_algorithm = HashAlgorithm::parse(&algorithm)
                .ok_or(SettingsError::UnknownHashAlgorithm(algorithm))?;
        }
        if let Some(v) = self.token_byte_strength {
            settings.token_byte_strength = v;
        }
        if let Some(v) = self.signed_token_expiry_secs {
            settings.signed_token_expiry_secs = v;
        }
        if let Some(v) = self.persist_on_uninstall {
            settings.persist_on_uninstall = v;
        }
        if let Some(v) = self.access_list {
            settings.access_list = v.into_iter().map(|e| e.trim().to_string()).collect();
        }
        if let Some(v) = self.login_protection {
            settings.login_protection = v;
        }
        if let Some(v) = self.ha_sync_enabled {
            settings.ha_sync_enabled = v;
        }
        if let Some(v) = self.ha_sync_peers {
            settings.ha_sync_peers = v;
        }
        if let Some(v) = self.ha_sync_username {
            settings.ha_sync_username = v;
        }
        if let Some(v) = self.ha_sync_password {
            settings.ha_sync_password = v;
        }
        if let Some(v) = self.allow_options_method {
            settings.allow_options_method = v;
        }
        if let Some(v) = self.custom_response_headers {
            settings.custom_response_headers = v;
        }

        validate(settings, known_interfaces)
    }
}

/// Check a document that arrived whole, from a peer or a backup file.
///
/// Interface names belong to the node that wrote the document, so the
/// document's own list stands in for the local interface table.
pub fn validate_document(settings: &PackageSettings) -> Result<(), SettingsError> {
    validate(settings, &settings.allowed_interfaces)
}

/// Check every constraint on a complete settings document.
pub fn validate(
    settings: &PackageSettings,
    known_interfaces: &[String],
) -> Result<(), SettingsError> {
    let expiry = settings.signed_token_expiry_secs;
    if !(MIN_SIGNED_TOKEN_EXPIRY_SECS..=MAX_SIGNED_TOKEN_EXPIRY_SECS).contains(&expiry) {
        return Err(SettingsError::SignedTokenExpiry(expiry));
    }

    if !TOKEN_BYTE_STRENGTHS.contains(&settings.token_byte_strength) {
        return Err(SettingsError::TokenByteStrength(settings.token_byte_strength));
    }

    if settings.allowed_interfaces.is_empty() {
        return Err(SettingsError::NoAllowedInterfaces);
    }
    for interface in &settings.allowed_interfaces {
        let known = interface == ANY_INTERFACE
            || interface == LOCALHOST_INTERFACE
            || known_interfaces.iter().any(|k| k == interface);
        if !known {
            return Err(SettingsError::UnknownInterface(interface.clone()));
        }
    }

    for entry in &settings.access_list {
        AccessListEntry::parse(entry)?;
    }

    for (name, value) in &settings.custom_response_headers {
        if HeaderName::from_bytes(name.as_bytes()).is_err() || HeaderValue::from_str(value).is_err()
        {
            return Err(SettingsError::ResponseHeader(name.clone()));
        }
    }

    for peer in &settings.ha_sync_peers {
        if PeerNode::parse(peer).is_none() {
            return Err(SettingsError::SyncPeer(peer.clone()));
        }
    }
    if settings.ha_sync_enabled {
        if settings.ha_sync_peers.is_empty() {
            return Err(SettingsError::NoSyncPeers);
        }
        if settings.ha_sync_username.is_empty() || settings.ha_sync_password.is_empty() {
            return Err(SettingsError::SyncCredentials);
        }
    }

    Ok(())
}
