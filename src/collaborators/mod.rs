// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Host Collaborators
//!
//! The access gate depends on four services owned by the host system. They
//! are traits so the gate can be exercised with recording doubles:
//!
//! | Trait | Purpose | Default implementation |
//! |---|---|---|
//! | [`LocalAuthenticator`] | Username/password check | [`UserDirectory`] |
//! | [`PrivilegeResolver`] | Principal to privilege set | [`UserDirectory`] |
//! | [`InterfaceResolver`] | Local address to interface id | [`InterfaceTable`] |
//! | [`LoginProtection`] | Failed-attempt sink | [`AuditLoginProtection`] |

use std::net::IpAddr;

use crate::auth::PrivilegeSet;
use crate::settings::AuthMode;

pub mod interfaces;
pub mod login_protection;
pub mod users;

pub use interfaces::InterfaceTable;
pub use login_protection::AuditLoginProtection;
pub use users::UserDirectory;

/// The host's own credential database.
pub trait LocalAuthenticator: Send + Sync {
    fn authenticate(&self, username: &str, password: &str) -> bool;
}

/// Resolves the privileges granted to a principal.
pub trait PrivilegeResolver: Send + Sync {
    fn privileges_for(&self, principal: &str) -> PrivilegeSet;
}

/// Maps the local address a request arrived on to an interface id.
pub trait InterfaceResolver: Send + Sync {
    fn interface_for(&self, local: IpAddr) -> Option<String>;

    /// Every configured interface id.
    fn interface_names(&self) -> Vec<String>;
}

/// A failed authentication attempt. Never carries secret material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginAttempt {
    pub source: Option<IpAddr>,
    /// Presented username or client id, when one could be parsed.
    pub identity: Option<String>,
    pub method: AuthMode,
}

/// Write-only sink for failed attempts.
pub trait LoginProtection: Send + Sync {
    fn record_failure(&self, attempt: &LoginAttempt);
}
