// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Firewall API Access - Credential & Access-Control Service
//!
//! Guards a firewall's REST configuration API: every request passes an
//! ordered access gate, API credentials and signed tokens are issued and
//! rotated here, and package settings are replicated to HA peers.
//!
//! ## Modules
//!
//! - `api` - HTTP handlers for settings, tokens and operations (Axum)
//! - `auth` - Access gate, credentials and signed tokens
//! - `collaborators` - Host services the gate depends on (users, interfaces)
//! - `services` - Key rotation, HA replication, backup/restore
//! - `settings` - Package settings model, validation and locked repository
//! - `storage` - JSON file store and audit log

pub mod api;
pub mod auth;
pub mod cli;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod services;
pub mod settings;
pub mod state;
pub mod storage;
