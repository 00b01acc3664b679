// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Process configuration is read from the environment once at startup into
//! [`ServerConfig`]. Package settings (auth mode, access list, HA peers) are
//! not configured here; they live in the settings store and change at
//! runtime through the API.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Root of the settings store and audit log | `/var/db/firewall-api` |
//! | `BACKUP_FILE` | Settings backup location | `/usr/local/share/firewall-api/backup.json` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8443` |
//! | `USERS_FILE` | Local user directory | `<DATA_DIR>/users.json` |
//! | `INTERFACES_FILE` | Interface address table | `<DATA_DIR>/interfaces.json` |
//! | `HA_SYNC_SCHEME` | Scheme used to reach peers | `https` |
//! | `HA_SYNC_PORT` | Peer port when an entry has none | `443` |
//! | `HA_SYNC_TIMEOUT_SECS` | Per-peer request timeout | `10` |
//! | `HA_SYNC_VERIFY_TLS` | Verify peer certificates | `false` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::services::replication::PeerTransport;
use crate::storage::paths::{DATA_ROOT, DEFAULT_BACKUP_FILE};
use crate::storage::StoragePaths;

/// Environment variable name for the data directory.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

/// Environment variable name for the backup file path.
pub const BACKUP_FILE_ENV: &str = "BACKUP_FILE";

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

pub const USERS_FILE_ENV: &str = "USERS_FILE";
pub const INTERFACES_FILE_ENV: &str = "INTERFACES_FILE";

pub const HA_SYNC_SCHEME_ENV: &str = "HA_SYNC_SCHEME";
pub const HA_SYNC_PORT_ENV: &str = "HA_SYNC_PORT";
pub const HA_SYNC_TIMEOUT_ENV: &str = "HA_SYNC_TIMEOUT_SECS";
pub const HA_SYNC_VERIFY_TLS_ENV: &str = "HA_SYNC_VERIFY_TLS";

/// Environment variable name for the log output format.
///
/// `json` selects structured JSON lines; anything else is human readable.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Default `RUST_LOG` filter.
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

pub const DEFAULT_HOST: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
pub const DEFAULT_PORT: u16 = 8443;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} has an invalid value '{value}'")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub paths: StoragePaths,
    pub users_file: PathBuf,
    pub interfaces_file: PathBuf,
    pub transport: PeerTransport,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let data_dir = lookup(DATA_DIR_ENV).unwrap_or_else(|| DATA_ROOT.to_string());
        let backup = lookup(BACKUP_FILE_ENV).unwrap_or_else(|| DEFAULT_BACKUP_FILE.to_string());
        let paths = StoragePaths::new(&data_dir).with_backup_file(backup);

        let host = parse(&lookup, HOST_ENV)?.unwrap_or(DEFAULT_HOST);
        let port = parse(&lookup, PORT_ENV)?.unwrap_or(DEFAULT_PORT);

        let users_file = lookup(USERS_FILE_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| paths.users_file());
        let interfaces_file = lookup(INTERFACES_FILE_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| paths.interfaces_file());

        let defaults = PeerTransport::default();
        let scheme = match lookup(HA_SYNC_SCHEME_ENV) {
            None => defaults.scheme,
            Some(s) if s == "http" || s == "https" => s,
            Some(value) => {
                return Err(ConfigError::Invalid {
                    var: HA_SYNC_SCHEME_ENV,
                    value,
                })
            }
        };
        let transport = PeerTransport {
            scheme,
            port: parse(&lookup, HA_SYNC_PORT_ENV)?.unwrap_or(defaults.port),
            timeout: parse(&lookup, HA_SYNC_TIMEOUT_ENV)?
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            verify_tls: parse(&lookup, HA_SYNC_VERIFY_TLS_ENV)?.unwrap_or(defaults.verify_tls),
        };

        Ok(Self {
            bind: SocketAddr::new(host, port),
            paths,
            users_file,
            interfaces_file,
            transport,
        })
    }
}

fn parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { var, value }),
    }
}
