// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Failed-login sink that feeds the audit log.
//!
//! Lockout policy belongs to the host's brute-force tracker, which tails the
//! audit log. This sink only records.

use std::sync::Arc;

use serde_json::json;
use tracing::warn;

use super::{LoginAttempt, LoginProtection};
use crate::storage::{AuditEvent, AuditEventType, AuditRepository, FileStorage};

pub struct AuditLoginProtection {
    storage: Arc<FileStorage>,
}

impl AuditLoginProtection {
    pub fn new(storage: Arc<FileStorage>) -> Self {
        Self { storage }
    }
}

impl LoginProtection for AuditLoginProtection {
    fn record_failure(&self, attempt: &LoginAttempt) {
        let source = attempt
            .source
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        warn!(
            source = %source,
            identity = attempt.identity.as_deref().unwrap_or("-"),
            method = %attempt.method,
            "Authentication failed"
        );

        let mut event = AuditEvent::new(AuditEventType::AuthFailure)
            .with_ip(source)
            .with_details(json!({ "method": attempt.method.as_str() }))
            .failed("authentication failed");
        if let Some(identity) = &attempt.identity {
            event = event.with_principal(identity.clone());
        }
        AuditRepository::new(&self.storage).record(&event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::AuthMode;
    use crate::storage::StoragePaths;
    use chrono::Utc;
    use tempfile::TempDir;

    #[test]
    fn failure_lands_in_audit_log() {
        let temp = TempDir::new().unwrap();
        let mut storage = FileStorage::new(StoragePaths::new(temp.path()));
        storage.initialize().unwrap();
        let storage = Arc::new(storage);

        AuditLoginProtection::new(Arc::clone(&storage)).record_failure(&LoginAttempt {
            source: Some("198.51.100.7".parse().unwrap()),
            identity: Some("admin".to_string()),
            method: AuthMode::Local,
        });

        let today = Utc::now().format("%Y-%m-%d").to_string();
        let events = AuditRepository::new(&storage).read_events(&today).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, AuditEventType::AuthFailure);
        assert_eq!(events[0].ip_address.as_deref(), Some("198.51.100.7"));
        assert_eq!(events[0].principal.as_deref(), Some("admin"));
        assert!(!events[0].success);
    }
}
