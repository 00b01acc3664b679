// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Signed-token claims and the authenticated principal.

use serde::{Deserialize, Serialize};

use super::privileges::PrivilegeSet;
use crate::settings::AuthMode;

/// Claims carried by a signed token.
///
/// No key id is embedded: tokens verify only against the current secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTokenClaims {
    /// Principal name
    pub sub: String,
    /// Issued at (unix seconds)
    pub iat: i64,
    /// Expiration (unix seconds)
    pub exp: i64,
}

/// A principal that passed the access gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedPrincipal {
    /// Principal name (local username, credential owner or token subject)
    pub name: String,
    /// Resolved privileges
    pub privileges: PrivilegeSet,
    /// How the principal authenticated
    pub method: AuthMode,
}

impl AuthenticatedPrincipal {
    pub fn new(name: impl Into<String>, privileges: PrivilegeSet, method: AuthMode) -> Self {
        Self {
            name: name.into(),
            privileges,
            method,
        }
    }
}
