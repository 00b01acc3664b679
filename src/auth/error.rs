// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Access gate denials.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Why the access gate refused a request.
///
/// The variant is kept for logs and tests. The HTTP response only carries the
/// coarse category, so a caller cannot tell which network or credential
/// sub-check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    /// API disabled in settings
    ServiceDisabled,
    /// Source address outside every access list entry
    SourceNotAllowed,
    /// Request arrived on an interface that is not allowed
    InterfaceNotAllowed,
    /// Missing, malformed or invalid credential
    Unauthenticated,
    /// Principal lacks every privilege the route accepts
    InsufficientPrivileges,
    /// Mutating request while the API is read-only
    ReadOnly,
    /// Pre-flight probe while OPTIONS is disabled
    MethodNotAllowed,
}

#[derive(Serialize)]
struct DenialBody {
    error: String,
    error_code: String,
}

impl Denial {
    /// Get the error code for this denial.
    pub fn error_code(&self) -> &'static str {
        match self {
            Denial::ServiceDisabled => "service_unavailable",
            Denial::SourceNotAllowed
            | Denial::InterfaceNotAllowed
            | Denial::InsufficientPrivileges
            | Denial::ReadOnly => "forbidden",
            Denial::Unauthenticated => "unauthorized",
            Denial::MethodNotAllowed => "method_not_allowed",
        }
    }

    /// Get the HTTP status code for this denial.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Denial::ServiceDisabled => StatusCode::SERVICE_UNAVAILABLE,
            Denial::SourceNotAllowed
            | Denial::InterfaceNotAllowed
            | Denial::InsufficientPrivileges
            | Denial::ReadOnly => StatusCode::FORBIDDEN,
            Denial::Unauthenticated => StatusCode::UNAUTHORIZED,
            Denial::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        }
    }
}

impl std::fmt::Display for Denial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Denial::ServiceDisabled => write!(f, "API is disabled"),
            Denial::SourceNotAllowed
            | Denial::InterfaceNotAllowed
            | Denial::InsufficientPrivileges
            | Denial::ReadOnly => write!(f, "Forbidden"),
            Denial::Unauthenticated => write!(f, "Authentication failed"),
            Denial::MethodNotAllowed => write!(f, "Method not allowed"),
        }
    }
}

impl std::error::Error for Denial {}

impl IntoResponse for Denial {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(DenialBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}
