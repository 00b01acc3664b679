// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Short-lived signed tokens (HS256) against a single rotating secret.
//!
//! ## Trade-off
//!
//! Tokens carry no key id and are verified against the current secret only.
//! Replacing the secret therefore invalidates every outstanding token at
//! once, expired or not. There is no rollover window.

use base64ct::{Base64, Encoding};
use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use tracing::info;

use super::claims::SignedTokenClaims;
use super::credentials::{random_bytes, CredentialError};
use crate::settings::{PackageSettings, SettingsRepository};
use crate::storage::StorageError;

/// Secret length in bytes before encoding.
const SECRET_LEN: usize = 64;

/// Signed-token failures.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("no signing secret has been generated")]
    NoSecret,

    #[error("token is malformed")]
    Malformed,

    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token has expired")]
    Expired,

    #[error("failed to sign token")]
    Signing,

    #[error(transparent)]
    Credential(#[from] CredentialError),
}

impl From<StorageError> for TokenError {
    fn from(e: StorageError) -> Self {
        TokenError::Credential(CredentialError::Storage(e))
    }
}

/// A freshly signed token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Generate a new encoded signing secret.
pub fn new_secret() -> Result<String, CredentialError> {
    Ok(Base64::encode_string(&random_bytes(SECRET_LEN)?))
}

/// Replace the signing secret in `settings`.
pub fn install_secret(settings: &mut PackageSettings) -> Result<(), CredentialError> {
    settings.signed_token_secret = Some(new_secret()?);
    Ok(())
}

/// Sign a token for `principal` valid for `lifetime_secs` from `issued_at`.
pub fn sign(
    secret: &str,
    principal: &str,
    lifetime_secs: u64,
    issued_at: DateTime<Utc>,
) -> Result<IssuedToken, TokenError> {
    let iat = issued_at.timestamp();
    let exp = iat.saturating_add(i64::try_from(lifetime_secs).map_err(|_| TokenError::Signing)?);
    let claims = SignedTokenClaims {
        sub: principal.to_string(),
        iat,
        exp,
    };

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| TokenError::Signing)?;

    let expires_at = Utc
        .timestamp_opt(exp, 0)
        .single()
        .ok_or(TokenError::Signing)?;
    Ok(IssuedToken { token, expires_at })
}

/// Verify `token` against the secret in `settings`; returns the subject.
pub fn verify(settings: &PackageSettings, token: &str) -> Result<String, TokenError> {
    let secret = settings
        .signed_token_secret
        .as_deref()
        .ok_or(TokenError::NoSecret)?;

    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.set_required_spec_claims(&["exp", "sub"]);

    let data = decode::<SignedTokenClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::InvalidSignature => TokenError::InvalidSignature,
        _ => TokenError::Malformed,
    })?;

    Ok(data.claims.sub)
}

/// Signed-token operations against the settings store.
pub struct SignedTokenService<'a> {
    settings: &'a SettingsRepository,
}

impl<'a> SignedTokenService<'a> {
    pub fn new(settings: &'a SettingsRepository) -> Self {
        Self { settings }
    }

    /// Return the current secret, generating one when absent or when
    /// `rotate` is set. Rotation replaces the previous value.
    pub fn ensure_secret(&self, rotate: bool) -> Result<String, TokenError> {
        let (secret, created) = self.settings.with_exclusive_lock(|settings| {
            match settings.signed_token_secret.clone() {
                Some(secret) if !rotate => Ok::<_, TokenError>((secret, false)),
                _ => {
                    install_secret(settings)?;
                    let secret = settings
                        .signed_token_secret
                        .clone()
                        .ok_or(TokenError::NoSecret)?;
                    Ok((secret, true))
                }
            }
        })?;

        if created {
            info!(rotated = rotate, "Signed-token secret generated");
        }
        Ok(secret)
    }

    /// Issue a token for `principal`, creating the secret on first use.
    pub fn issue(&self, principal: &str) -> Result<IssuedToken, TokenError> {
        let secret = self.ensure_secret(false)?;
        let lifetime = self.settings.snapshot()?.signed_token_expiry_secs;
        sign(&secret, principal, lifetime, Utc::now())
    }

    /// Validate `token`; returns the principal it was issued to.
    pub fn validate(&self, token: &str) -> Result<String, TokenError> {
        verify(&self.settings.snapshot()?, token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileStorage, StoragePaths};
    use chrono::Duration;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn repo() -> (TempDir, SettingsRepository) {
        let temp = TempDir::new().unwrap();
        let mut storage = FileStorage::new(StoragePaths::new(temp.path()));
        storage.initialize().unwrap();
        (temp, SettingsRepository::new(Arc::new(storage)))
    }

    #[test]
    fn issue_then_validate() {
        let (_temp, repo) = repo();
        let service = SignedTokenService::new(&repo);

        let issued = service.issue("admin").unwrap();
        assert_eq!(service.validate(&issued.token).unwrap(), "admin");

        let remaining = issued.expires_at - Utc::now();
        assert!(remaining <= Duration::seconds(3600));
        assert!(remaining > Duration::seconds(3500));
    }

    #[test]
    fn secret_is_created_lazily_and_reused() {
        let (_temp, repo) = repo();
        let service = SignedTokenService::new(&repo);
        assert!(repo.snapshot().unwrap().signed_token_secret.is_none());

        let first = service.ensure_secret(false).unwrap();
        let second = service.ensure_secret(false).unwrap();
        assert_eq!(first, second);
        assert_eq!(Base64::decode_vec(&first).unwrap().len(), SECRET_LEN);
    }

    #[test]
    fn rotation_invalidates_unexpired_tokens() {
        let (_temp, repo) = repo();
        let service = SignedTokenService::new(&repo);

        let tokens: Vec<_> = ["admin", "operator", "auditor"]
            .iter()
            .map(|p| service.issue(p).unwrap().token)
            .collect();
        let before = service.ensure_secret(false).unwrap();

        let after = service.ensure_secret(true).unwrap();
        assert_ne!(before, after);

        for token in &tokens {
            assert!(matches!(
                service.validate(token),
                Err(TokenError::InvalidSignature)
            ));
        }
        let fresh = service.issue("admin").unwrap();
        assert!(service.validate(&fresh.token).is_ok());
    }

    #[test]
    fn expired_token_is_rejected() {
        let mut settings = PackageSettings::default();
        install_secret(&mut settings).unwrap();
        let secret = settings.signed_token_secret.clone().unwrap();

        let issued = sign(&secret, "admin", 300, Utc::now() - Duration::seconds(301)).unwrap();
        assert!(matches!(verify(&settings, &issued.token), Err(TokenError::Expired)));
    }

    #[test]
    fn garbage_is_malformed() {
        let mut settings = PackageSettings::default();
        install_secret(&mut settings).unwrap();
        assert!(matches!(verify(&settings, "not.a.token"), Err(TokenError::Malformed)));
        assert!(matches!(verify(&settings, ""), Err(TokenError::Malformed)));
    }

    #[test]
    fn validate_without_secret_fails() {
        let settings = PackageSettings::default();
        assert!(matches!(verify(&settings, "x.y.z"), Err(TokenError::NoSecret)));
    }

    #[test]
    fn configured_expiry_is_used() {
        let (_temp, repo) = repo();
        repo.with_exclusive_lock(|s| {
            s.signed_token_expiry_secs = 300;
            Ok::<_, StorageError>(())
        })
        .unwrap();

        let issued = SignedTokenService::new(&repo).issue("admin").unwrap();
        assert!(issued.expires_at - Utc::now() <= Duration::seconds(300));
    }
}
