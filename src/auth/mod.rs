// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Credential issuance and the per-request access gate.
//!
//! ## Auth Modes
//!
//! | Mode | Presented as | Checked by |
//! |---|---|---|
//! | `local` | `Authorization: Basic base64(user:pass)` | host user directory |
//! | `token` | `Authorization: <client-id> <client-token>` | [`CredentialManager`] |
//! | `jwt` | `Authorization: Bearer <token>` | [`SignedTokenService`] |
//!
//! ## Security
//!
//! - Only salted digests of API token secrets are stored
//! - Signed tokens verify against the current secret only; rotation
//!   invalidates all of them at once
//! - Denials expose a coarse category, never the failed sub-check

pub mod claims;
pub mod credentials;
pub mod error;
pub mod extractor;
pub mod gate;
pub mod middleware;
pub mod privileges;
pub mod signed_token;

pub use claims::{AuthenticatedPrincipal, SignedTokenClaims};
pub use credentials::{CredentialError, CredentialManager, IssuedCredential};
pub use error::Denial;
pub use extractor::Auth;
pub use gate::{AccessGate, AccessRequest, Authorized, PresentedCredential};
pub use middleware::{guarded, ConnectionAddrs, RouteAccess};
pub use privileges::PrivilegeSet;
pub use signed_token::{IssuedToken, SignedTokenService, TokenError};
