// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Persisted package settings and the credential records they carry.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Wildcard entry for `allowed_interfaces`.
pub const ANY_INTERFACE: &str = "any";
/// Pseudo-interface matched by loopback connections.
pub const LOCALHOST_INTERFACE: &str = "localhost";

/// Allowed byte strengths for generated API token secrets.
pub const TOKEN_BYTE_STRENGTHS: [u16; 3] = [16, 32, 64];

/// Signed-token lifetime bounds, in seconds.
pub const MIN_SIGNED_TOKEN_EXPIRY_SECS: u64 = 300;
pub const MAX_SIGNED_TOKEN_EXPIRY_SECS: u64 = 86_400;
pub const DEFAULT_SIGNED_TOKEN_EXPIRY_SECS: u64 = 3_600;

/// How inbound requests prove who they are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Username/password against the firewall's local user database.
    #[default]
    Local,
    /// Stored API credential (client id + secret).
    Token,
    /// Short-lived signed token.
    Jwt,
}

impl AuthMode {
    /// Parse a mode name (case-insensitive).
    pub fn parse(s: &str) -> Option<AuthMode> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Some(AuthMode::Local),
            "token" => Some(AuthMode::Token),
            "jwt" => Some(AuthMode::Jwt),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMode::Local => "local",
            AuthMode::Token => "token",
            AuthMode::Jwt => "jwt",
        }
    }
}

impl std::fmt::Display for AuthMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Digest used when hashing API token secrets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    #[default]
    Sha256,
    Sha384,
    Sha512,
    Md5,
}

impl HashAlgorithm {
    /// Parse an algorithm name (case-insensitive).
    pub fn parse(s: &str) -> Option<HashAlgorithm> {
        match s.to_ascii_lowercase().as_str() {
            "sha256" => Some(HashAlgorithm::Sha256),
            "sha384" => Some(HashAlgorithm::Sha384),
            "sha512" => Some(HashAlgorithm::Sha512),
            "md5" => Some(HashAlgorithm::Md5),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha384 => "sha384",
            HashAlgorithm::Sha512 => "sha512",
            HashAlgorithm::Md5 => "md5",
        }
    }
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored form of an API credential. The plaintext secret is never kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ApiCredential {
    /// Opaque client id presented alongside the secret.
    pub id: String,
    /// Hex encoding of the owning principal's name.
    pub owner_identity: String,
    /// Hex digest of the secret, keyed with `salt`.
    pub stored_hash: String,
    /// Hex-encoded per-credential random salt.
    pub salt: String,
    /// Algorithm in force when the credential was created.
    pub hash_algorithm: HashAlgorithm,
    pub created_at: DateTime<Utc>,
}

impl ApiCredential {
    /// Principal name recovered from the owner identity.
    pub fn owner_name(&self) -> Option<String> {
        let bytes = hex::decode(&self.owner_identity).ok()?;
        String::from_utf8(bytes).ok()
    }
}

/// Deterministic owner identity for a principal name.
pub fn owner_identity(principal: &str) -> String {
    hex::encode(principal.as_bytes())
}

/// The singleton package configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct PackageSettings {
    pub enabled: bool,
    pub read_only: bool,
    pub auth_mode: AuthMode,
    pub allowed_interfaces: Vec<String>,
    pub token_hash_algorithm: HashAlgorithm,
    pub token_byte_strength: u16,
    pub signed_token_expiry_secs: u64,
    pub persist_on_uninstall: bool,
    pub access_list: Vec<String>,
    pub login_protection: bool,
    pub ha_sync_enabled: bool,
    pub ha_sync_peers: Vec<String>,
    pub ha_sync_username: String,
    pub ha_sync_password: String,
    pub allow_options_method: bool,
    pub custom_response_headers: BTreeMap<String, String>,
    pub credentials: Vec<ApiCredential>,
    pub signed_token_secret: Option<String>,
}

impl Default for PackageSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            read_only: false,
            auth_mode: AuthMode::Local,
            allowed_interfaces: vec![ANY_INTERFACE.to_string()],
            token_hash_algorithm: HashAlgorithm::Sha256,
            token_byte_strength: 16,
            signed_token_expiry_secs: DEFAULT_SIGNED_TOKEN_EXPIRY_SECS,
            persist_on_uninstall: true,
            access_list: Vec::new(),
            login_protection: true,
            ha_sync_enabled: false,
            ha_sync_peers: Vec::new(),
            ha_sync_username: String::new(),
            ha_sync_password: String::new(),
            allow_options_method: false,
            custom_response_headers: BTreeMap::new(),
            credentials: Vec::new(),
            signed_token_secret: None,
        }
    }
}

impl PackageSettings {
    pub fn allows_any_interface(&self) -> bool {
        self.allowed_interfaces.iter().any(|i| i == ANY_INTERFACE)
    }

    pub fn credential(&self, id: &str) -> Option<&ApiCredential> {
        self.credentials.iter().find(|c| c.id == id)
    }
}

/// Settings as returned to API callers: secrets, hashes and the sync
/// password are never exposed.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SettingsView {
    pub enabled: bool,
    pub read_only: bool,
    pub auth_mode: AuthMode,
    pub allowed_interfaces: Vec<String>,
    pub token_hash_algorithm: HashAlgorithm,
    pub token_byte_strength: u16,
    pub signed_token_expiry_secs: u64,
    pub persist_on_uninstall: bool,
    pub access_list: Vec<String>,
    pub login_protection: bool,
    pub ha_sync_enabled: bool,
    pub ha_sync_peers: Vec<String>,
    pub ha_sync_username: String,
    pub allow_options_method: bool,
    pub custom_response_headers: BTreeMap<String, String>,
    /// Number of stored API credentials.
    pub credential_count: usize,
    /// Whether a signing secret has been generated.
    pub signed_token_secret_present: bool,
}

impl From<&PackageSettings> for SettingsView {
    fn from(s: &PackageSettings) -> Self {
        Self {
            enabled: s.enabled,
            read_only: s.read_only,
            auth_mode: s.auth_mode,
            allowed_interfaces: s.allowed_interfaces.clone(),
            token_hash_algorithm: s.token_hash_algorithm,
            token_byte_strength: s.token_byte_strength,
            signed_token_expiry_secs: s.signed_token_expiry_secs,
            persist_on_uninstall: s.persist_on_uninstall,
            access_list: s.access_list.clone(),
            login_protection: s.login_protection,
            ha_sync_enabled: s.ha_sync_enabled,
            ha_sync_peers: s.ha_sync_peers.clone(),
            ha_sync_username: s.ha_sync_username.clone(),
            allow_options_method: s.allow_options_method,
            custom_response_headers: s.custom_response_headers.clone(),
            credential_count: s.credentials.len(),
            signed_token_secret_present: s.signed_token_secret.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_fresh_install() {
        let s = PackageSettings::default();
        assert!(s.enabled);
        assert!(!s.read_only);
        assert_eq!(s.auth_mode, AuthMode::Local);
        assert!(s.allows_any_interface());
        assert_eq!(s.token_byte_strength, 16);
        assert_eq!(s.signed_token_expiry_secs, 3600);
        assert!(s.persist_on_uninstall);
        assert!(s.credentials.is_empty());
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let s: PackageSettings = serde_json::from_str(r#"{"auth_mode":"jwt"}"#).unwrap();
        assert_eq!(s.auth_mode, AuthMode::Jwt);
        assert_eq!(s.token_hash_algorithm, HashAlgorithm::Sha256);
        assert!(s.enabled);
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(AuthMode::parse("JWT"), Some(AuthMode::Jwt));
        assert_eq!(HashAlgorithm::parse("SHA512"), Some(HashAlgorithm::Sha512));
        assert_eq!(HashAlgorithm::parse("INVALID"), None);
    }

    #[test]
    fn owner_identity_round_trips() {
        let credential = ApiCredential {
            id: "id".to_string(),
            owner_identity: owner_identity("admin"),
            stored_hash: String::new(),
            salt: String::new(),
            hash_algorithm: HashAlgorithm::Sha256,
            created_at: Utc::now(),
        };
        assert_eq!(credential.owner_identity, "61646d696e");
        assert_eq!(credential.owner_name().as_deref(), Some("admin"));
    }

    #[test]
    fn view_redacts_secrets() {
        let mut s = PackageSettings::default();
        s.ha_sync_password = "hunter2".to_string();
        s.signed_token_secret = Some("secret".to_string());

        let json = serde_json::to_string(&SettingsView::from(&s)).unwrap();
        assert!(!json.contains("hunter2"));
        assert!(!json.contains("\"secret\""));
        assert!(json.contains("\"signed_token_secret_present\":true"));
    }
}
