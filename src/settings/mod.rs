// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Settings
//!
//! The package settings singleton: enablement, auth mode, interface and
//! network restrictions, credential records, signing secret and HA sync
//! configuration. Every reader works on a snapshot; every writer goes
//! through [`SettingsRepository::with_exclusive_lock`].

pub mod access_list;
pub mod model;
pub mod repository;
pub mod update;

pub use access_list::{permits, AccessListEntry};
pub use model::{
    owner_identity, ApiCredential, AuthMode, HashAlgorithm, PackageSettings, SettingsView,
    ANY_INTERFACE, LOCALHOST_INTERFACE,
};
pub use repository::SettingsRepository;
pub use update::{validate, validate_document, SaveError, SettingsError, SettingsUpdate};
