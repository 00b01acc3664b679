// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Command Line Interface
//!
//! `serve` runs the HTTP service (the default). The remaining commands are
//! the package's maintenance hooks; each prints a short status and exits
//! non-zero only when the store cannot be read or written.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::api::router;
use crate::auth::{
    ConnectionAddrs, CredentialError, CredentialManager, SignedTokenService, TokenError,
};
use crate::config::{ConfigError, ServerConfig};
use crate::services::{
    sync_worker::record_failures, BackupOutcome, BackupService, KeyRotation, ReplicationService,
    RestoreOutcome, RotationScope, SyncReport,
};
use crate::settings::{AuthMode, SaveError, SettingsRepository};
use crate::state::{AppState, StartupError};
use crate::storage::{AuditEventType, FileStorage, StorageError};

#[derive(Parser)]
#[command(name = "firewall-api-access")]
#[command(about = "Credential and access-control service for the firewall REST API")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum Command {
    /// Run the HTTP service
    Serve,

    /// Write the current settings to the backup file
    Backup,

    /// Restore settings from the backup file, then sync to peers
    Restore,

    /// Push the current settings to every HA peer
    Sync,

    /// Invalidate outstanding credentials and/or signed tokens
    Rotate {
        /// Rotate credentials and the signing secret regardless of auth mode
        #[arg(long)]
        all: bool,
    },

    /// Issue an access token for a user in the configured auth mode
    GenerateToken { username: String },

    /// Revoke an API credential by client id
    RevokeToken { id: String },
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Startup(#[from] StartupError),

    #[error("storage: {0}")]
    Storage(#[from] StorageError),

    #[error("settings: {0}")]
    Settings(#[from] SaveError),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("server: {0}")]
    Io(#[from] std::io::Error),
}

/// Parse-free entry point used by `main`.
pub async fn run(cli: Cli) -> Result<(), CliError> {
    let config = ServerConfig::from_env()?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(&config).await,
        command => {
            let (settings, replication) = open(&config)?;
            for line in execute(command, &settings, &replication).await? {
                println!("{line}");
            }
            Ok(())
        }
    }
}

fn open(config: &ServerConfig) -> Result<(SettingsRepository, ReplicationService), CliError> {
    let mut storage = FileStorage::new(config.paths.clone());
    storage.initialize()?;
    let settings = SettingsRepository::new(Arc::new(storage));
    settings.load_or_init()?;
    let replication =
        ReplicationService::new(config.transport.clone()).map_err(StartupError::from)?;
    Ok((settings, replication))
}

/// Run one maintenance command and return the lines to print.
pub async fn execute(
    command: Command,
    settings: &SettingsRepository,
    replication: &ReplicationService,
) -> Result<Vec<String>, CliError> {
    let lines = match command {
        Command::Serve => Vec::new(),

        Command::Backup => match BackupService::new(settings).backup_to_file()? {
            BackupOutcome::Success => vec!["done.".to_string()],
            BackupOutcome::NotConfigured => vec!["not configured.".to_string()],
        },

        Command::Restore => match BackupService::new(settings).restore_from_backup()? {
            RestoreOutcome::Success => {
                crate::audit_log!(settings.storage(), AuditEventType::SettingsRestored, "cli");
                let report = replication.sync(&settings.snapshot()?, false).await;
                record_failures(settings, &report);
                let mut lines = vec!["done.".to_string()];
                lines.extend(failure_lines(&report));
                lines
            }
            RestoreOutcome::NoChange => vec!["no changes found.".to_string()],
            RestoreOutcome::NoBackup => vec!["no backup found.".to_string()],
            RestoreOutcome::NotConfigured => vec!["not configured.".to_string()],
        },

        Command::Sync => {
            let report = replication.sync(&settings.snapshot()?, true).await;
            record_failures(settings, &report);
            match report {
                SyncReport::Disabled => vec!["not configured.".to_string()],
                report => {
                    let mut lines = vec!["done.".to_string()];
                    lines.extend(failure_lines(&report));
                    lines
                }
            }
        }

        Command::Rotate { all } => {
            let scope = all.then_some(RotationScope::All);
            let outcome = KeyRotation::new(settings, replication)
                .rotate(scope, "cli")
                .await?;
            let mut lines = vec!["done.".to_string()];
            lines.extend(failure_lines(&outcome.sync));
            lines
        }

        Command::GenerateToken { username } => {
            let snapshot = settings.snapshot()?;
            match snapshot.auth_mode {
                AuthMode::Local => vec!["not configured.".to_string()],
                AuthMode::Token => {
                    let issued = CredentialManager::new(settings).generate(&username)?;
                    crate::audit_log!(
                        settings.storage(),
                        AuditEventType::CredentialCreated,
                        username.as_str(),
                        "credential",
                        issued.id.as_str()
                    );
                    let mut lines = vec![
                        format!("client-id: {}", issued.id),
                        format!("client-token: {}", issued.secret),
                    ];
                    lines.extend(push_to_peers(settings, replication).await?);
                    lines
                }
                AuthMode::Jwt => {
                    let issued = SignedTokenService::new(settings).issue(&username)?;
                    crate::audit_log!(
                        settings.storage(),
                        AuditEventType::SignedTokenIssued,
                        username.as_str()
                    );
                    let mut lines = vec![
                        format!("token: {}", issued.token),
                        format!("expires-at: {}", issued.expires_at.to_rfc3339()),
                    ];
                    // The first issue creates the signing secret.
                    if snapshot.signed_token_secret.is_none() {
                        lines.extend(push_to_peers(settings, replication).await?);
                    }
                    lines
                }
            }
        }

        Command::RevokeToken { id } => {
            if CredentialManager::new(settings).revoke(&id)? {
                crate::audit_log!(
                    settings.storage(),
                    AuditEventType::CredentialRevoked,
                    "cli",
                    "credential",
                    id.as_str()
                );
                let mut lines = vec!["done.".to_string()];
                lines.extend(push_to_peers(settings, replication).await?);
                lines
            } else {
                vec!["not found.".to_string()]
            }
        }
    };
    Ok(lines)
}

/// Replicate the current settings and return a line per failed peer.
async fn push_to_peers(
    settings: &SettingsRepository,
    replication: &ReplicationService,
) -> Result<Vec<String>, CliError> {
    let report = replication.sync(&settings.snapshot()?, false).await;
    record_failures(settings, &report);
    Ok(failure_lines(&report).collect())
}

fn failure_lines(report: &SyncReport) -> impl Iterator<Item = String> + '_ {
    report.failures().map(|f| {
        format!(
            "sync to {} failed: {}",
            f.peer,
            f.reason.as_deref().unwrap_or("unknown error")
        )
    })
}

async fn serve(config: &ServerConfig) -> Result<(), CliError> {
    let (state, worker) = AppState::build(config)?;

    let shutdown = CancellationToken::new();
    let worker_task = tokio::spawn(worker.run(shutdown.clone()));

    let listener = TcpListener::bind(config.bind).await?;
    info!(
        addr = %config.bind,
        "Firewall API access service listening (OpenAPI at /api-doc/openapi.json)"
    );

    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<ConnectionAddrs>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
    .await?;

    shutdown.cancel();
    if let Err(e) = worker_task.await {
        warn!(error = %e, "Sync worker ended abnormally");
    }
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutdown signal received");
            shutdown.cancel();
        }
        _ = shutdown.cancelled() => {}
    }
}
