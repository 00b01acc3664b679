// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! API credential generation, validation and revocation.
//!
//! A credential is an opaque client id plus a random secret. Only a salted,
//! keyed digest of the secret is persisted; the plaintext is handed back to
//! the caller once, from [`CredentialManager::generate`].

use chrono::Utc;
use hmac::{Hmac, Mac};
use md5::Md5;
use ring::rand::{SecureRandom, SystemRandom};
use sha2::{Sha256, Sha384, Sha512};
use tracing::info;
use uuid::Uuid;

use crate::settings::{
    owner_identity, ApiCredential, HashAlgorithm, PackageSettings, SettingsRepository,
};
use crate::storage::{StorageError, StorageResult};

/// Salt length in bytes.
const SALT_LEN: usize = 16;

/// Errors from credential and secret generation.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("system random source failed")]
    Random,

    #[error("failed to compute credential digest")]
    Digest,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// A freshly generated credential. The only place the plaintext exists.
#[derive(Clone)]
pub struct IssuedCredential {
    pub id: String,
    pub owner_identity: String,
    pub secret: String,
}

impl std::fmt::Debug for IssuedCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedCredential")
            .field("id", &self.id)
            .field("owner_identity", &self.owner_identity)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Fill `len` bytes from the system CSPRNG.
pub fn random_bytes(len: usize) -> Result<Vec<u8>, CredentialError> {
    let mut bytes = vec![0u8; len];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| CredentialError::Random)?;
    Ok(bytes)
}

macro_rules! keyed_mac {
    ($digest:ty, $salt:expr, $secret:expr) => {
        <Hmac<$digest> as Mac>::new_from_slice($salt).ok().map(|mut mac| {
            mac.update($secret);
            mac
        })
    };
}

/// Hex digest of `secret` keyed with `salt`.
fn digest(algorithm: HashAlgorithm, salt: &[u8], secret: &[u8]) -> Option<String> {
    match algorithm {
        HashAlgorithm::Sha256 => {
            keyed_mac!(Sha256, salt, secret).map(|m| hex::encode(m.finalize().into_bytes()))
        }
        HashAlgorithm::Sha384 => {
            keyed_mac!(Sha384, salt, secret).map(|m| hex::encode(m.finalize().into_bytes()))
        }
        HashAlgorithm::Sha512 => {
            keyed_mac!(Sha512, salt, secret).map(|m| hex::encode(m.finalize().into_bytes()))
        }
        HashAlgorithm::Md5 => {
            keyed_mac!(Md5, salt, secret).map(|m| hex::encode(m.finalize().into_bytes()))
        }
    }
}

/// Constant-time comparison of a presented secret against a stored digest.
fn matches(algorithm: HashAlgorithm, salt: &[u8], secret: &[u8], expected: &[u8]) -> bool {
    match algorithm {
        HashAlgorithm::Sha256 => {
            keyed_mac!(Sha256, salt, secret).is_some_and(|m| m.verify_slice(expected).is_ok())
        }
        HashAlgorithm::Sha384 => {
            keyed_mac!(Sha384, salt, secret).is_some_and(|m| m.verify_slice(expected).is_ok())
        }
        HashAlgorithm::Sha512 => {
            keyed_mac!(Sha512, salt, secret).is_some_and(|m| m.verify_slice(expected).is_ok())
        }
        HashAlgorithm::Md5 => {
            keyed_mac!(Md5, salt, secret).is_some_and(|m| m.verify_slice(expected).is_ok())
        }
    }
}

/// Check a presented id and secret against a settings snapshot.
///
/// Uses the algorithm recorded on the credential, not the current setting.
/// Unknown ids and wrong secrets are indistinguishable to the caller.
pub fn verify<'s>(
    settings: &'s PackageSettings,
    id: &str,
    secret: &str,
) -> Option<&'s ApiCredential> {
    let credential = settings.credential(id)?;
    let salt = hex::decode(&credential.salt).ok()?;
    let expected = hex::decode(&credential.stored_hash).ok()?;

    matches(credential.hash_algorithm, &salt, secret.as_bytes(), &expected).then_some(credential)
}

/// Build a new credential record for `principal` using the current settings.
fn new_credential(
    settings: &PackageSettings,
    principal: &str,
) -> Result<(ApiCredential, String), CredentialError> {
    let secret = hex::encode(random_bytes(usize::from(settings.token_byte_strength))?);
    let salt = random_bytes(SALT_LEN)?;
    let algorithm = settings.token_hash_algorithm;

    let credential = ApiCredential {
        id: Uuid::new_v4().to_string(),
        owner_identity: owner_identity(principal),
        stored_hash: digest(algorithm, &salt, secret.as_bytes()).ok_or(CredentialError::Digest)?,
        salt: hex::encode(salt),
        hash_algorithm: algorithm,
        created_at: Utc::now(),
    };
    Ok((credential, secret))
}

/// Credential operations against the settings store.
pub struct CredentialManager<'a> {
    settings: &'a SettingsRepository,
}

impl<'a> CredentialManager<'a> {
    pub fn new(settings: &'a SettingsRepository) -> Self {
        Self { settings }
    }

    /// Generate and persist a credential for `principal`.
    pub fn generate(&self, principal: &str) -> Result<IssuedCredential, CredentialError> {
        let issued = self.settings.with_exclusive_lock(|settings| {
            let (credential, secret) = new_credential(settings, principal)?;
            let issued = IssuedCredential {
                id: credential.id.clone(),
                owner_identity: credential.owner_identity.clone(),
                secret,
            };
            settings.credentials.push(credential);
            Ok::<_, CredentialError>(issued)
        })?;

        info!(credential_id = %issued.id, owner = %principal, "API credential created");
        Ok(issued)
    }

    /// Whether `secret` is the live secret for credential `id`.
    pub fn validate(&self, id: &str, secret: &str) -> StorageResult<bool> {
        let settings = self.settings.snapshot()?;
        Ok(verify(&settings, id, secret).is_some())
    }

    /// Remove credential `id`. Returns false when it did not exist.
    pub fn revoke(&self, id: &str) -> StorageResult<bool> {
        let removed = self.settings.with_exclusive_lock(|settings| {
            let before = settings.credentials.len();
            settings.credentials.retain(|c| c.id != id);
            Ok::<_, StorageError>(settings.credentials.len() != before)
        })?;

        if removed {
            info!(credential_id = %id, "API credential revoked");
        }
        Ok(removed)
    }

    /// Credentials owned by `principal`.
    pub fn list_for(&self, principal: &str) -> StorageResult<Vec<ApiCredential>> {
        let identity = owner_identity(principal);
        Ok(self
            .settings
            .snapshot()?
            .credentials
            .into_iter()
            .filter(|c| c.owner_identity == identity)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileStorage, StoragePaths};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn repo() -> (TempDir, SettingsRepository) {
        let temp = TempDir::new().unwrap();
        let mut storage = FileStorage::new(StoragePaths::new(temp.path()));
        storage.initialize().unwrap();
        (temp, SettingsRepository::new(Arc::new(storage)))
    }

    fn mutate(secret: &str, index: usize) -> String {
        let mut chars: Vec<char> = secret.chars().collect();
        chars[index] = if chars[index] == '0' { '1' } else { '0' };
        chars.into_iter().collect()
    }

    #[test]
    fn generated_credential_validates() {
        let (_temp, repo) = repo();
        let manager = CredentialManager::new(&repo);

        let issued = manager.generate("admin").unwrap();
        assert!(manager.validate(&issued.id, &issued.secret).unwrap());
        assert_eq!(issued.secret.len(), 32);
        assert_eq!(issued.owner_identity, owner_identity("admin"));
    }

    #[test]
    fn every_single_character_mutation_fails() {
        let (_temp, repo) = repo();
        let manager = CredentialManager::new(&repo);
        let issued = manager.generate("admin").unwrap();

        for i in 0..issued.secret.len() {
            let mutated = mutate(&issued.secret, i);
            assert!(
                !manager.validate(&issued.id, &mutated).unwrap(),
                "mutation at {i} validated"
            );
        }
    }

    #[test]
    fn plaintext_is_never_stored() {
        let (_temp, repo) = repo();
        let issued = CredentialManager::new(&repo).generate("admin").unwrap();

        let raw = std::fs::read_to_string(repo.storage().paths().settings_file()).unwrap();
        assert!(!raw.contains(&issued.secret));
    }

    #[test]
    fn recorded_algorithm_survives_settings_change() {
        let (_temp, repo) = repo();
        repo.with_exclusive_lock(|s| {
            s.token_hash_algorithm = HashAlgorithm::Md5;
            s.token_byte_strength = 64;
            Ok::<_, StorageError>(())
        })
        .unwrap();
        let manager = CredentialManager::new(&repo);
        let issued = manager.generate("admin").unwrap();
        assert_eq!(issued.secret.len(), 128);

        repo.with_exclusive_lock(|s| {
            s.token_hash_algorithm = HashAlgorithm::Sha512;
            Ok::<_, StorageError>(())
        })
        .unwrap();

        assert!(manager.validate(&issued.id, &issued.secret).unwrap());
        let stored = repo.snapshot().unwrap();
        assert_eq!(stored.credentials[0].hash_algorithm, HashAlgorithm::Md5);
    }

    #[test]
    fn all_algorithms_round_trip() {
        for algorithm in [
            HashAlgorithm::Sha256,
            HashAlgorithm::Sha384,
            HashAlgorithm::Sha512,
            HashAlgorithm::Md5,
        ] {
            let salt = b"0123456789abcdef";
            let stored = hex::decode(digest(algorithm, salt, b"secret").unwrap()).unwrap();
            assert!(matches(algorithm, salt, b"secret", &stored));
            assert!(!matches(algorithm, salt, b"secreT", &stored));
        }
    }

    #[test]
    fn unknown_id_is_rejected() {
        let (_temp, repo) = repo();
        let manager = CredentialManager::new(&repo);
        let issued = manager.generate("admin").unwrap();
        assert!(!manager.validate("no-such-id", &issued.secret).unwrap());
    }

    #[test]
    fn revoke_reports_existence() {
        let (_temp, repo) = repo();
        let manager = CredentialManager::new(&repo);
        let issued = manager.generate("admin").unwrap();

        assert!(!manager.revoke("no-such-id").unwrap());
        assert!(manager.revoke(&issued.id).unwrap());
        assert!(!manager.validate(&issued.id, &issued.secret).unwrap());
        assert!(!manager.revoke(&issued.id).unwrap());
    }

    #[test]
    fn list_is_scoped_to_owner() {
        let (_temp, repo) = repo();
        let manager = CredentialManager::new(&repo);
        manager.generate("admin").unwrap();
        manager.generate("admin").unwrap();
        manager.generate("operator").unwrap();

        assert_eq!(manager.list_for("admin").unwrap().len(), 2);
        assert_eq!(manager.list_for("operator").unwrap().len(), 1);
        assert!(manager.list_for("nobody").unwrap().is_empty());
    }

    #[test]
    fn issued_credential_debug_redacts_secret() {
        let issued = IssuedCredential {
            id: "id".to_string(),
            owner_identity: "6964".to_string(),
            secret: "topsecret".to_string(),
        };
        assert!(!format!("{issued:?}").contains("topsecret"));
    }
}
