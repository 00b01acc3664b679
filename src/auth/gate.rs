// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The access gate: the ordered authorization pipeline every guarded
//! request passes through.
//!
//! ## Pipeline
//!
//! Checks run strictly in this order and the first failure wins:
//!
//! 1. Enabled: API switched on
//! 2. Network: source address inside the access list (empty list = all)
//! 3. Interface: arrival interface allowed (`any` = all)
//! 4. Credential: mode-specific authentication
//! 5. Privilege: principal holds one of the route's privileges
//! 6. Read-only: only GET, HEAD and OPTIONS while read-only
//! 7. Method policy: OPTIONS only when enabled
//!
//! Nothing from a later step runs once an earlier step denies. In
//! particular, a request rejected by the network check never reaches the
//! credential database or the login-protection sink.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::Arc;

use axum::http::Method;
use base64ct::{Base64, Encoding};
use tracing::debug;

use super::claims::AuthenticatedPrincipal;
use super::error::Denial;
use super::{credentials, signed_token};
use crate::collaborators::{LocalAuthenticator, LoginAttempt, LoginProtection, PrivilegeResolver};
use crate::settings::{permits, AuthMode, PackageSettings};

/// A credential as presented in the `Authorization` header.
#[derive(Clone, PartialEq, Eq)]
pub enum PresentedCredential {
    /// `Basic base64(user:password)`
    Basic { username: String, password: String },
    /// `<client-id> <client-token>`
    ApiToken { client_id: String, secret: String },
    /// `Bearer <token>`
    Bearer(String),
}

impl PresentedCredential {
    /// Parse an `Authorization` header value.
    pub fn parse(header: &str) -> Option<Self> {
        let (scheme, rest) = header.trim().split_once(' ')?;
        let rest = rest.trim();
        if rest.is_empty() {
            return None;
        }

        if scheme.eq_ignore_ascii_case("basic") {
            let decoded = Base64::decode_vec(rest).ok()?;
            let decoded = String::from_utf8(decoded).ok()?;
            let (username, password) = decoded.split_once(':')?;
            Some(PresentedCredential::Basic {
                username: username.to_string(),
                password: password.to_string(),
            })
        } else if scheme.eq_ignore_ascii_case("bearer") {
            Some(PresentedCredential::Bearer(rest.to_string()))
        } else if !rest.contains(char::is_whitespace) {
            Some(PresentedCredential::ApiToken {
                client_id: scheme.to_string(),
                secret: rest.to_string(),
            })
        } else {
            None
        }
    }

    /// The non-secret identity part, for failure records.
    pub fn identity(&self) -> Option<String> {
        match self {
            PresentedCredential::Basic { username, .. } => Some(username.clone()),
            PresentedCredential::ApiToken { client_id, .. } => Some(client_id.clone()),
            PresentedCredential::Bearer(_) => None,
        }
    }
}

impl std::fmt::Debug for PresentedCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PresentedCredential::Basic { username, .. } => {
                f.debug_struct("Basic").field("username", username).finish_non_exhaustive()
            }
            PresentedCredential::ApiToken { client_id, .. } => f
                .debug_struct("ApiToken")
                .field("client_id", client_id)
                .finish_non_exhaustive(),
            PresentedCredential::Bearer(_) => f.write_str("Bearer(..)"),
        }
    }
}

/// Everything the gate needs to know about one request.
#[derive(Debug, Clone)]
pub struct AccessRequest<'a> {
    pub method: &'a Method,
    /// Remote address of the connection.
    pub source: Option<IpAddr>,
    /// Interface the connection arrived on.
    pub interface: Option<String>,
    pub credential: Option<&'a PresentedCredential>,
    /// Privileges the route accepts (any one suffices).
    pub required_privileges: &'a [&'a str],
    /// Route-pinned authentication mode, overriding the configured one.
    pub auth_mode: Option<AuthMode>,
    /// Skip the read-only step. Only the HA peer receiver sets this.
    pub read_only_exempt: bool,
}

/// A successful gate decision.
#[derive(Debug, Clone)]
pub struct Authorized {
    pub principal: AuthenticatedPrincipal,
    /// Headers to attach to the eventual response.
    pub response_headers: BTreeMap<String, String>,
}

/// The authorization pipeline and its collaborators.
#[derive(Clone)]
pub struct AccessGate {
    local: Arc<dyn LocalAuthenticator>,
    privileges: Arc<dyn PrivilegeResolver>,
    login_protection: Arc<dyn LoginProtection>,
}

impl AccessGate {
    pub fn new(
        local: Arc<dyn LocalAuthenticator>,
        privileges: Arc<dyn PrivilegeResolver>,
        login_protection: Arc<dyn LoginProtection>,
    ) -> Self {
        Self {
            local,
            privileges,
            login_protection,
        }
    }

    /// Run the pipeline against one settings snapshot.
    pub fn authorize(
        &self,
        settings: &PackageSettings,
        request: &AccessRequest<'_>,
    ) -> Result<Authorized, Denial> {
        if !settings.enabled {
            return Err(Denial::ServiceDisabled);
        }

        if !settings.access_list.is_empty() {
            let permitted = request
                .source
                .is_some_and(|source| permits(&settings.access_list, source));
            if !permitted {
                debug!(source = ?request.source, "Source outside access list");
                return Err(Denial::SourceNotAllowed);
            }
        }

        if !settings.allows_any_interface() {
            let allowed = request
                .interface
                .as_deref()
                .is_some_and(|i| settings.allowed_interfaces.iter().any(|a| a == i));
            if !allowed {
                debug!(interface = ?request.interface, "Interface not allowed");
                return Err(Denial::InterfaceNotAllowed);
            }
        }

        let mode = request.auth_mode.unwrap_or(settings.auth_mode);
        let name = match self.authenticate(settings, mode, request.credential) {
            Some(name) => name,
            None => {
                if settings.login_protection {
                    self.login_protection.record_failure(&LoginAttempt {
                        source: request.source,
                        identity: request.credential.and_then(PresentedCredential::identity),
                        method: mode,
                    });
                }
                return Err(Denial::Unauthenticated);
            }
        };

        let privileges = self.privileges.privileges_for(&name);
        if !privileges.satisfies(request.required_privileges) {
            debug!(principal = %name, "Insufficient privileges");
            return Err(Denial::InsufficientPrivileges);
        }

        if settings.read_only && !request.read_only_exempt && !is_read(request.method) {
            return Err(Denial::ReadOnly);
        }

        if *request.method == Method::OPTIONS && !settings.allow_options_method {
            return Err(Denial::MethodNotAllowed);
        }

        Ok(Authorized {
            principal: AuthenticatedPrincipal::new(name, privileges, mode),
            response_headers: settings.custom_response_headers.clone(),
        })
    }

    /// Mode-specific credential check; returns the principal name.
    fn authenticate(
        &self,
        settings: &PackageSettings,
        mode: AuthMode,
        credential: Option<&PresentedCredential>,
    ) -> Option<String> {
        match (mode, credential?) {
            (AuthMode::Local, PresentedCredential::Basic { username, password }) => self
                .local
                .authenticate(username, password)
                .then(|| username.clone()),
            (AuthMode::Token, PresentedCredential::ApiToken { client_id, secret }) => {
                credentials::verify(settings, client_id, secret)?.owner_name()
            }
            (AuthMode::Jwt, PresentedCredential::Bearer(token)) => {
                signed_token::verify(settings, token).ok()
            }
            _ => None,
        }
    }
}

fn is_read(method: &Method) -> bool {
    *method == Method::GET || *method == Method::HEAD || *method == Method::OPTIONS
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::credentials::CredentialManager;
    use crate::auth::privileges::{PrivilegeSet, PAGE_ALL, PAGE_SYSTEM_API};
    use crate::auth::signed_token::SignedTokenService;
    use crate::settings::SettingsRepository;
    use crate::storage::{FileStorage, StorageError, StoragePaths};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingAuthenticator {
        calls: AtomicUsize,
    }

    impl LocalAuthenticator for RecordingAuthenticator {
        fn authenticate(&self, username: &str, password: &str) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            username == "admin" && password == "hunter2"
        }
    }

    struct StaticPrivileges;

    impl PrivilegeResolver for StaticPrivileges {
        fn privileges_for(&self, principal: &str) -> PrivilegeSet {
            match principal {
                "admin" => PrivilegeSet::new([PAGE_ALL]),
                "viewer" => PrivilegeSet::new(["page-dashboard"]),
                _ => PrivilegeSet::default(),
            }
        }
    }

    #[derive(Default)]
    struct RecordingProtection {
        attempts: Mutex<Vec<LoginAttempt>>,
    }

    impl LoginProtection for RecordingProtection {
        fn record_failure(&self, attempt: &LoginAttempt) {
            self.attempts.lock().unwrap().push(attempt.clone());
        }
    }

    struct Harness {
        gate: AccessGate,
        local: Arc<RecordingAuthenticator>,
        protection: Arc<RecordingProtection>,
    }

    fn harness() -> Harness {
        let local = Arc::new(RecordingAuthenticator::default());
        let protection = Arc::new(RecordingProtection::default());
        let gate = AccessGate::new(local.clone(), Arc::new(StaticPrivileges), protection.clone());
        Harness {
            gate,
            local,
            protection,
        }
    }

    fn basic(user: &str, password: &str) -> PresentedCredential {
        PresentedCredential::Basic {
            username: user.to_string(),
            password: password.to_string(),
        }
    }

    fn request<'a>(method: &'a Method, credential: &'a PresentedCredential) -> AccessRequest<'a> {
        AccessRequest {
            method,
            source: Some("192.168.1.50".parse().unwrap()),
            interface: Some("lan".to_string()),
            credential: Some(credential),
            required_privileges: &[PAGE_SYSTEM_API],
            auth_mode: None,
            read_only_exempt: false,
        }
    }

    #[test]
    fn parses_presentations() {
        let header = format!("Basic {}", Base64::encode_string(b"admin:pa:ss"));
        assert_eq!(
            PresentedCredential::parse(&header),
            Some(basic("admin", "pa:ss"))
        );
        assert_eq!(
            PresentedCredential::parse("Bearer abc.def.ghi"),
            Some(PresentedCredential::Bearer("abc.def.ghi".to_string()))
        );
        assert_eq!(
            PresentedCredential::parse("client-1 s3cret"),
            Some(PresentedCredential::ApiToken {
                client_id: "client-1".to_string(),
                secret: "s3cret".to_string(),
            })
        );
        assert_eq!(PresentedCredential::parse("Basic !!!"), None);
        assert_eq!(PresentedCredential::parse("justone"), None);
        assert_eq!(PresentedCredential::parse("a b c"), None);
    }

    #[test]
    fn debug_hides_secrets() {
        let rendered = format!("{:?}", basic("admin", "hunter2"));
        assert!(rendered.contains("admin"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn local_mode_authorizes() {
        let h = harness();
        let credential = basic("admin", "hunter2");
        let method = Method::GET;
        let authorized = h
            .gate
            .authorize(&PackageSettings::default(), &request(&method, &credential))
            .unwrap();
        assert_eq!(authorized.principal.name, "admin");
        assert_eq!(authorized.principal.method, AuthMode::Local);
    }

    #[test]
    fn disabled_wins_over_everything() {
        let h = harness();
        let settings = PackageSettings {
            enabled: false,
            ..Default::default()
        };
        let credential = basic("admin", "hunter2");
        let method = Method::GET;
        assert_eq!(
            h.gate.authorize(&settings, &request(&method, &credential)).unwrap_err(),
            Denial::ServiceDisabled
        );
        assert_eq!(h.local.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn network_denial_short_circuits_credential_check() {
        let h = harness();
        let settings = PackageSettings {
            access_list: vec!["10.0.0.0/8".to_string()],
            ..Default::default()
        };
        let credential = basic("admin", "wrong");
        let method = Method::POST;

        assert_eq!(
            h.gate.authorize(&settings, &request(&method, &credential)).unwrap_err(),
            Denial::SourceNotAllowed
        );
        assert_eq!(h.local.calls.load(Ordering::SeqCst), 0);
        assert!(h.protection.attempts.lock().unwrap().is_empty());
    }

    #[test]
    fn network_allows_matching_source() {
        let h = harness();
        let settings = PackageSettings {
            access_list: vec!["192.168.0.0/16".to_string()],
            ..Default::default()
        };
        let credential = basic("admin", "hunter2");
        let method = Method::GET;
        assert!(h.gate.authorize(&settings, &request(&method, &credential)).is_ok());
    }

    #[test]
    fn interface_check() {
        let h = harness();
        let settings = PackageSettings {
            allowed_interfaces: vec!["wan".to_string()],
            ..Default::default()
        };
        let credential = basic("admin", "hunter2");
        let method = Method::GET;
        assert_eq!(
            h.gate.authorize(&settings, &request(&method, &credential)).unwrap_err(),
            Denial::InterfaceNotAllowed
        );

        let mut req = request(&method, &credential);
        req.interface = Some("wan".to_string());
        assert!(h.gate.authorize(&settings, &req).is_ok());

        req.interface = None;
        assert_eq!(
            h.gate.authorize(&settings, &req).unwrap_err(),
            Denial::InterfaceNotAllowed
        );
    }

    #[test]
    fn bad_credential_is_recorded() {
        let h = harness();
        let credential = basic("admin", "wrong");
        let method = Method::GET;
        assert_eq!(
            h.gate
                .authorize(&PackageSettings::default(), &request(&method, &credential))
                .unwrap_err(),
            Denial::Unauthenticated
        );

        let attempts = h.protection.attempts.lock().unwrap();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].identity.as_deref(), Some("admin"));
        assert_eq!(attempts[0].method, AuthMode::Local);
    }

    #[test]
    fn login_protection_can_be_disabled() {
        let h = harness();
        let settings = PackageSettings {
            login_protection: false,
            ..Default::default()
        };
        let credential = basic("admin", "wrong");
        let method = Method::GET;
        assert!(h.gate.authorize(&settings, &request(&method, &credential)).is_err());
        assert!(h.protection.attempts.lock().unwrap().is_empty());
    }

    #[test]
    fn missing_or_mismatched_credential_is_unauthenticated() {
        let h = harness();
        let method = Method::GET;
        let credential = basic("admin", "hunter2");
        let mut req = request(&method, &credential);
        req.credential = None;
        assert_eq!(
            h.gate.authorize(&PackageSettings::default(), &req).unwrap_err(),
            Denial::Unauthenticated
        );

        let settings = PackageSettings {
            auth_mode: AuthMode::Jwt,
            ..Default::default()
        };
        assert_eq!(
            h.gate
                .authorize(&settings, &request(&method, &credential))
                .unwrap_err(),
            Denial::Unauthenticated
        );
    }

    #[test]
    fn pinned_mode_overrides_settings() {
        let h = harness();
        let settings = PackageSettings {
            auth_mode: AuthMode::Token,
            ..Default::default()
        };
        let credential = basic("admin", "hunter2");
        let method = Method::POST;
        let mut req = request(&method, &credential);
        req.auth_mode = Some(AuthMode::Local);
        assert!(h.gate.authorize(&settings, &req).is_ok());
    }

    #[test]
    fn privilege_check() {
        let h = harness();
        let local = Arc::new(RecordingAuthenticator::default());
        let gate = AccessGate::new(local, Arc::new(StaticPrivileges), h.protection.clone());

        // "viewer" authenticates through a token credential.
        let temp = TempDir::new().unwrap();
        let mut storage = FileStorage::new(StoragePaths::new(temp.path()));
        storage.initialize().unwrap();
        let repo = SettingsRepository::new(Arc::new(storage));
        repo.with_exclusive_lock(|s| {
            s.auth_mode = AuthMode::Token;
            Ok::<_, StorageError>(())
        })
        .unwrap();
        let issued = CredentialManager::new(&repo).generate("viewer").unwrap();
        let settings = repo.snapshot().unwrap();

        let credential = PresentedCredential::ApiToken {
            client_id: issued.id.clone(),
            secret: issued.secret.clone(),
        };
        let method = Method::GET;
        assert_eq!(
            gate.authorize(&settings, &request(&method, &credential)).unwrap_err(),
            Denial::InsufficientPrivileges
        );

        let mut req = request(&method, &credential);
        req.required_privileges = &["page-dashboard", PAGE_SYSTEM_API];
        let authorized = gate.authorize(&settings, &req).unwrap();
        assert_eq!(authorized.principal.name, "viewer");
        assert_eq!(authorized.principal.method, AuthMode::Token);
    }

    #[test]
    fn read_only_blocks_mutations_only() {
        let h = harness();
        let credential = basic("admin", "hunter2");
        let read_only = PackageSettings {
            read_only: true,
            ..Default::default()
        };
        let writable = PackageSettings::default();

        for method in [Method::POST, Method::PUT, Method::PATCH, Method::DELETE] {
            assert_eq!(
                h.gate
                    .authorize(&read_only, &request(&method, &credential))
                    .unwrap_err(),
                Denial::ReadOnly
            );
            assert!(h.gate.authorize(&writable, &request(&method, &credential)).is_ok());
        }

        let get = Method::GET;
        assert!(h.gate.authorize(&read_only, &request(&get, &credential)).is_ok());
    }

    #[test]
    fn read_only_exempt_route_accepts_mutations() {
        let h = harness();
        let credential = basic("admin", "hunter2");
        let read_only = PackageSettings {
            read_only: true,
            ..Default::default()
        };

        let put = Method::PUT;
        let access = AccessRequest {
            read_only_exempt: true,
            ..request(&put, &credential)
        };
        assert!(h.gate.authorize(&read_only, &access).is_ok());
    }

    #[test]
    fn options_policy() {
        let h = harness();
        let credential = basic("admin", "hunter2");
        let method = Method::OPTIONS;
        assert_eq!(
            h.gate
                .authorize(&PackageSettings::default(), &request(&method, &credential))
                .unwrap_err(),
            Denial::MethodNotAllowed
        );

        let settings = PackageSettings {
            allow_options_method: true,
            ..Default::default()
        };
        assert!(h.gate.authorize(&settings, &request(&method, &credential)).is_ok());
    }

    #[test]
    fn jwt_mode_and_rotation() {
        let h = harness();
        let temp = TempDir::new().unwrap();
        let mut storage = FileStorage::new(StoragePaths::new(temp.path()));
        storage.initialize().unwrap();
        let repo = SettingsRepository::new(Arc::new(storage));
        repo.with_exclusive_lock(|s| {
            s.auth_mode = AuthMode::Jwt;
            Ok::<_, StorageError>(())
        })
        .unwrap();

        let service = SignedTokenService::new(&repo);
        let token = service.issue("admin").unwrap().token;
        let credential = PresentedCredential::Bearer(token);
        let method = Method::GET;

        let settings = repo.snapshot().unwrap();
        assert!(h.gate.authorize(&settings, &request(&method, &credential)).is_ok());

        service.ensure_secret(true).unwrap();
        let settings = repo.snapshot().unwrap();
        assert_eq!(
            h.gate
                .authorize(&settings, &request(&method, &credential))
                .unwrap_err(),
            Denial::Unauthenticated
        );
    }

    #[test]
    fn custom_headers_are_passed_through() {
        let h = harness();
        let mut settings = PackageSettings::default();
        settings
            .custom_response_headers
            .insert("Access-Control-Allow-Origin".to_string(), "*".to_string());
        let credential = basic("admin", "hunter2");
        let method = Method::GET;

        let authorized = h
            .gate
            .authorize(&settings, &request(&method, &credential))
            .unwrap();
        assert_eq!(
            authorized.response_headers.get("Access-Control-Allow-Origin").map(String::as_str),
            Some("*")
        );
    }
}
