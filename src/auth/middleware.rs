// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum glue for the access gate.
//!
//! Each guarded route is wrapped with [`guarded`], which attaches the gate as
//! a route layer together with the route's declared privileges. The
//! middleware takes one settings snapshot, runs the pipeline on the blocking
//! pool, stores the principal in request extensions for the
//! [`Auth`](super::Auth) extractor and copies the configured response headers
//! onto the handler's response.

use std::net::SocketAddr;

use axum::{
    extract::{connect_info::Connected, ConnectInfo, Request, State},
    http::{header::AUTHORIZATION, HeaderName, HeaderValue, StatusCode},
    middleware::{from_fn_with_state, Next},
    response::{IntoResponse, Response},
    routing::MethodRouter,
    serve::IncomingStream,
};
use tokio::net::TcpListener;
use tracing::{debug, error};

use super::gate::{AccessRequest, PresentedCredential};
use crate::error::ApiError;
use crate::settings::AuthMode;
use crate::state::AppState;

/// Socket addresses of an accepted connection.
///
/// The remote address feeds the network check; the local address identifies
/// the interface the request arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionAddrs {
    pub local: Option<SocketAddr>,
    pub remote: SocketAddr,
}

impl Connected<IncomingStream<'_, TcpListener>> for ConnectionAddrs {
    fn connect_info(stream: IncomingStream<'_, TcpListener>) -> Self {
        Self {
            local: stream.io().local_addr().ok(),
            remote: *stream.remote_addr(),
        }
    }
}

/// Access requirements declared by a route.
#[derive(Debug, Clone, Copy)]
pub struct RouteAccess {
    /// Any one of these privileges admits the caller.
    pub privileges: &'static [&'static str],
    /// Authentication mode pinned by the route, if any.
    pub auth_mode: Option<AuthMode>,
    /// Accept mutations while the package is read-only.
    pub read_only_exempt: bool,
}

impl RouteAccess {
    pub const fn requires(privileges: &'static [&'static str]) -> Self {
        Self {
            privileges,
            auth_mode: None,
            read_only_exempt: false,
        }
    }

    /// Always authenticate with local credentials, whatever the configured mode.
    pub const fn local_auth(mut self) -> Self {
        self.auth_mode = Some(AuthMode::Local);
        self
    }

    /// Skip the read-only check. Only the HA peer receiver uses this.
    pub const fn ignore_read_only(mut self) -> Self {
        self.read_only_exempt = true;
        self
    }
}

#[derive(Clone)]
pub struct GateState {
    app: AppState,
    route: RouteAccess,
}

/// Wrap `route` with the access gate.
///
/// An OPTIONS handler is added so that pre-flight probes reach the gate and
/// the method policy, instead of being answered by the router.
pub fn guarded(
    route: MethodRouter<AppState>,
    state: &AppState,
    access: RouteAccess,
) -> MethodRouter<AppState> {
    let gate = GateState {
        app: state.clone(),
        route: access,
    };
    route
        .options(preflight)
        .route_layer(from_fn_with_state(gate, access_gate))
}

async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// The gate middleware.
pub async fn access_gate(
    State(gate): State<GateState>,
    mut request: Request,
    next: Next,
) -> Response {
    let settings = match gate.app.settings.snapshot() {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "Failed to read settings for access check");
            return ApiError::internal("Settings store unavailable").into_response();
        }
    };

    let addrs = request
        .extensions()
        .get::<ConnectInfo<ConnectionAddrs>>()
        .map(|info| info.0);
    let source = addrs.map(|a| a.remote.ip().to_canonical());
    let interface = addrs
        .and_then(|a| a.local)
        .and_then(|local| gate.app.interfaces.interface_for(local.ip()));
    let credential = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(PresentedCredential::parse);
    let method = request.method().clone();

    // Password hashing inside the pipeline is CPU-bound.
    let checker = gate.app.gate.clone();
    let route = gate.route;
    let checked_method = method.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        let access = AccessRequest {
            method: &checked_method,
            source,
            interface,
            credential: credential.as_ref(),
            required_privileges: route.privileges,
            auth_mode: route.auth_mode,
            read_only_exempt: route.read_only_exempt,
        };
        checker.authorize(&settings, &access)
    })
    .await;

    let authorized = match outcome {
        Ok(Ok(authorized)) => authorized,
        Ok(Err(denial)) => {
            debug!(
                method = %method,
                path = %request.uri().path(),
                denial = ?denial,
                "Request denied"
            );
            return denial.into_response();
        }
        Err(e) => {
            error!(error = %e, "Access check task failed");
            return ApiError::internal("Access check failed").into_response();
        }
    };

    request.extensions_mut().insert(authorized.principal);
    let mut response = next.run(request).await;

    let headers = response.headers_mut();
    for (name, value) in &authorized.response_headers {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            headers.insert(name, value);
        }
    }
    response
}
