// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractor for the principal admitted by the access gate.
//!
//! ```rust,ignore
//! async fn my_handler(Auth(principal): Auth) -> impl IntoResponse {
//!     // principal is AuthenticatedPrincipal
//! }
//! ```

use axum::{extract::FromRequestParts, http::request::Parts};

use super::{AuthenticatedPrincipal, Denial};
use crate::state::AppState;

/// The authenticated principal.
///
/// Only available behind [`guarded`](super::guarded) routes; anywhere else
/// the extractor rejects with 401.
pub struct Auth(pub AuthenticatedPrincipal);

impl FromRequestParts<AppState> for Auth {
    type Rejection = Denial;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedPrincipal>()
            .cloned()
            .map(Auth)
            .ok_or(Denial::Unauthenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::PrivilegeSet;
    use crate::settings::AuthMode;
    use crate::state::test_state;
    use axum::http::Request;

    #[tokio::test]
    async fn rejects_without_gate() {
        let (state, _temp) = test_state();
        let mut parts = Request::builder().uri("/x").body(()).unwrap().into_parts().0;

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(Denial::Unauthenticated)));
    }

    #[tokio::test]
    async fn reads_principal_from_extensions() {
        let (state, _temp) = test_state();
        let mut parts = Request::builder().uri("/x").body(()).unwrap().into_parts().0;
        parts.extensions.insert(AuthenticatedPrincipal::new(
            "admin",
            PrivilegeSet::default(),
            AuthMode::Local,
        ));

        let Auth(principal) = Auth::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(principal.name, "admin");
    }
}
