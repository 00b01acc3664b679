// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # HA Settings Replication
//!
//! Best-effort, one-directional push of the full settings document to every
//! configured peer.
//!
//! ## Semantics
//!
//! - Each peer gets one authenticated `PUT` with its own timeout.
//! - Peers are contacted concurrently; one failure never blocks or rolls back
//!   another.
//! - Nothing is retried. A failed peer is reported and picked up by the next
//!   sync trigger.
//! - Last writer wins. There is no versioning or conflict detection.

use std::fmt;
use std::net::{IpAddr, Ipv6Addr};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::settings::PackageSettings;

/// Path of the peer receiver endpoint.
pub const PEER_SYNC_PATH: &str = "/api/v1/system/api/sync/peer";

/// Default per-peer timeout.
pub const DEFAULT_PEER_TIMEOUT: Duration = Duration::from_secs(10);

/// A peer host, optionally with an explicit port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerNode {
    pub host: String,
    pub port: Option<u16>,
}

impl PeerNode {
    /// Parse `host`, `host:port`, `v6addr` or `[v6addr]:port`.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() || s.contains(|c: char| c.is_whitespace() || c == '/') {
            return None;
        }

        if let Some(rest) = s.strip_prefix('[') {
            let (host, tail) = rest.split_once(']')?;
            host.parse::<Ipv6Addr>().ok()?;
            let port = match tail {
                "" => None,
                _ => Some(tail.strip_prefix(':')?.parse().ok()?),
            };
            return Some(Self {
                host: host.to_string(),
                port,
            });
        }

        if s.parse::<Ipv6Addr>().is_ok() {
            return Some(Self {
                host: s.to_string(),
                port: None,
            });
        }

        let (host, port) = match s.split_once(':') {
            Some((host, port)) => (host, Some(port.parse().ok()?)),
            None => (s, None),
        };
        let valid_host = host.parse::<IpAddr>().is_ok()
            || (!host.is_empty()
                && host
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.'));
        valid_host.then(|| Self {
            host: host.to_string(),
            port,
        })
    }

    /// Receiver URL on this peer under `transport`'s conventions.
    pub fn sync_url(&self, transport: &PeerTransport) -> String {
        let port = self.port.unwrap_or(transport.port);
        if self.host.contains(':') {
            format!("{}://[{}]:{}{}", transport.scheme, self.host, port, PEER_SYNC_PATH)
        } else {
            format!("{}://{}:{}{}", transport.scheme, self.host, port, PEER_SYNC_PATH)
        }
    }
}

impl fmt::Display for PeerNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.port, self.host.contains(':')) {
            (Some(port), true) => write!(f, "[{}]:{}", self.host, port),
            (Some(port), false) => write!(f, "{}:{}", self.host, port),
            (None, _) => f.write_str(&self.host),
        }
    }
}

/// How peers are reached. Peers share the local node's web convention.
#[derive(Debug, Clone)]
pub struct PeerTransport {
    pub scheme: String,
    pub port: u16,
    pub timeout: Duration,
    pub verify_tls: bool,
}

impl Default for PeerTransport {
    fn default() -> Self {
        Self {
            scheme: "https".to_string(),
            port: 443,
            timeout: DEFAULT_PEER_TIMEOUT,
            verify_tls: false,
        }
    }
}

/// Outcome for one peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PeerSyncResult {
    pub peer: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl PeerSyncResult {
    fn ok(peer: impl Into<String>) -> Self {
        Self {
            peer: peer.into(),
            success: true,
            reason: None,
        }
    }

    fn failed(peer: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            peer: peer.into(),
            success: false,
            reason: Some(reason.into()),
        }
    }
}

/// Aggregate result of one sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncReport {
    /// HA sync is switched off; nothing was sent.
    Disabled,
    /// Every configured peer was attempted, in configuration order.
    Completed { peers: Vec<PeerSyncResult> },
}

impl SyncReport {
    pub fn peers(&self) -> &[PeerSyncResult] {
        match self {
            SyncReport::Disabled => &[],
            SyncReport::Completed { peers } => peers,
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &PeerSyncResult> {
        self.peers().iter().filter(|p| !p.success)
    }
}

/// Pushes settings to HA peers.
#[derive(Debug, Clone)]
pub struct ReplicationService {
    client: reqwest::Client,
    transport: PeerTransport,
}

impl ReplicationService {
    pub fn new(transport: PeerTransport) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(!transport.verify_tls)
            .connect_timeout(transport.timeout)
            .build()?;
        Ok(Self { client, transport })
    }

    pub fn transport(&self) -> &PeerTransport {
        &self.transport
    }

    /// Push `settings` to every configured peer.
    ///
    /// With `report_status`, each peer outcome is logged at info/warn level;
    /// otherwise only failures are logged. The report is returned either way.
    pub async fn sync(&self, settings: &PackageSettings, report_status: bool) -> SyncReport {
        if !settings.ha_sync_enabled {
            debug!("HA sync disabled; skipping");
            return SyncReport::Disabled;
        }

        let mut tasks = JoinSet::new();
        let mut results: Vec<Option<PeerSyncResult>> = vec![None; settings.ha_sync_peers.len()];

        for (index, entry) in settings.ha_sync_peers.iter().enumerate() {
            let Some(peer) = PeerNode::parse(entry) else {
                results[index] =
                    Some(PeerSyncResult::failed(entry.clone(), "invalid peer address"));
                continue;
            };
            let request = self
                .client
                .put(peer.sync_url(&self.transport))
                .basic_auth(&settings.ha_sync_username, Some(&settings.ha_sync_password))
                .timeout(self.transport.timeout)
                .json(settings);
            let label = entry.clone();

            tasks.spawn(async move { (index, push(request, label).await) });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(e) => warn!(error = %e, "Peer sync task failed"),
            }
        }

        let peers: Vec<PeerSyncResult> = results
            .into_iter()
            .zip(&settings.ha_sync_peers)
            .map(|(result, entry)| {
                result.unwrap_or_else(|| PeerSyncResult::failed(entry.clone(), "sync task aborted"))
            })
            .collect();

        for result in &peers {
            match (&result.reason, report_status) {
                (None, true) => info!(peer = %result.peer, "Settings synced to peer"),
                (Some(reason), _) => {
                    warn!(peer = %result.peer, reason = %reason, "Failed to sync settings to peer")
                }
                (None, false) => {}
            }
        }

        SyncReport::Completed { peers }
    }
}

async fn push(request: reqwest::RequestBuilder, peer: String) -> PeerSyncResult {
    match request.send().await {
        Ok(response) if response.status().is_success() => PeerSyncResult::ok(peer),
        Ok(response) => {
            PeerSyncResult::failed(peer, format!("peer returned HTTP {}", response.status()))
        }
        Err(e) if e.is_timeout() => PeerSyncResult::failed(peer, "timed out"),
        Err(e) if e.is_connect() => PeerSyncResult::failed(peer, "connection failed"),
        Err(_) => PeerSyncResult::failed(peer, "request failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::State, http::HeaderMap, http::StatusCode, routing::put, Json, Router};
    use std::sync::{Arc, Mutex};
    use tokio::net::TcpListener;

    #[derive(Clone, Default)]
    struct PeerLog {
        received: Arc<Mutex<Vec<PackageSettings>>>,
    }

    async fn receive(
        State(log): State<PeerLog>,
        headers: HeaderMap,
        Json(settings): Json<PackageSettings>,
    ) -> StatusCode {
        if headers.get("authorization").is_none() {
            return StatusCode::UNAUTHORIZED;
        }
        log.received.lock().unwrap().push(settings);
        StatusCode::OK
    }

    async fn spawn_peer() -> (String, PeerLog) {
        let log = PeerLog::default();
        let app = Router::new()
            .route(PEER_SYNC_PATH, put(receive))
            .with_state(log.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (addr.to_string(), log)
    }

    async fn unreachable_peer() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        addr.to_string()
    }

    fn service() -> ReplicationService {
        ReplicationService::new(PeerTransport {
            scheme: "http".to_string(),
            port: 80,
            timeout: Duration::from_secs(2),
            verify_tls: true,
        })
        .unwrap()
    }

    fn ha_settings(peers: Vec<String>) -> PackageSettings {
        PackageSettings {
            ha_sync_enabled: true,
            ha_sync_peers: peers,
            ha_sync_username: "sync".to_string(),
            ha_sync_password: "secret".to_string(),
            token_byte_strength: 32,
            ..Default::default()
        }
    }

    #[test]
    fn parses_peer_forms() {
        assert_eq!(
            PeerNode::parse("10.0.0.2"),
            Some(PeerNode { host: "10.0.0.2".into(), port: None })
        );
        assert_eq!(
            PeerNode::parse("fw2.example.net:8443"),
            Some(PeerNode { host: "fw2.example.net".into(), port: Some(8443) })
        );
        assert_eq!(
            PeerNode::parse("fd00::2"),
            Some(PeerNode { host: "fd00::2".into(), port: None })
        );
        assert_eq!(
            PeerNode::parse("[fd00::2]:8443"),
            Some(PeerNode { host: "fd00::2".into(), port: Some(8443) })
        );
        assert_eq!(PeerNode::parse(""), None);
        assert_eq!(PeerNode::parse("host:notaport"), None);
        assert_eq!(PeerNode::parse("http://x"), None);
        assert_eq!(PeerNode::parse("bad host"), None);
    }

    #[test]
    fn sync_url_uses_transport_defaults() {
        let transport = PeerTransport::default();
        assert_eq!(
            PeerNode::parse("10.0.0.2").unwrap().sync_url(&transport),
            "https://10.0.0.2:443/api/v1/system/api/sync/peer"
        );
        assert_eq!(
            PeerNode::parse("[fd00::2]:8443").unwrap().sync_url(&transport),
            "https://[fd00::2]:8443/api/v1/system/api/sync/peer"
        );
    }

    #[tokio::test]
    async fn disabled_sync_is_a_no_op() {
        let report = service().sync(&PackageSettings::default(), true).await;
        assert_eq!(report, SyncReport::Disabled);
    }

    #[tokio::test]
    async fn one_unreachable_peer_of_three() {
        let (peer_a, log_a) = spawn_peer().await;
        let dead = unreachable_peer().await;
        let (peer_b, log_b) = spawn_peer().await;

        let settings = ha_settings(vec![peer_a.clone(), dead.clone(), peer_b.clone()]);
        let report = service().sync(&settings, true).await;

        let peers = report.peers();
        assert_eq!(peers.len(), 3);
        assert_eq!(peers[0], PeerSyncResult::ok(peer_a));
        assert!(!peers[1].success);
        assert_eq!(peers[1].peer, dead);
        assert!(peers[1].reason.is_some());
        assert_eq!(peers[2], PeerSyncResult::ok(peer_b));
        assert_eq!(report.failures().count(), 1);

        // Each healthy peer received exactly one copy, unchanged.
        for log in [log_a, log_b] {
            let received = log.received.lock().unwrap();
            assert_eq!(received.len(), 1);
            assert_eq!(received[0], settings);
        }
    }

    #[tokio::test]
    async fn invalid_peer_entry_is_reported() {
        let settings = ha_settings(vec!["bad host".to_string()]);
        let report = service().sync(&settings, false).await;
        assert_eq!(
            report.peers(),
            &[PeerSyncResult::failed("bad host", "invalid peer address")]
        );
    }

    #[tokio::test]
    async fn peer_rejection_is_a_failure() {
        let app = Router::new().route(PEER_SYNC_PATH, put(|| async { StatusCode::FORBIDDEN }));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let report = service().sync(&ha_settings(vec![addr]), false).await;
        assert_eq!(
            report.peers()[0].reason.as_deref(),
            Some("peer returned HTTP 403 Forbidden")
        );
    }
}
