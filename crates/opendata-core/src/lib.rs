// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Open Data Viewer contributors

pub mod adapter;
pub mod basemap;
pub mod catalog;
pub mod classify;
pub mod config;
pub mod disclaimer;
pub mod engine;
pub mod feature;
pub mod popup;
pub mod proxy;
pub mod registry;
pub mod sanitize;
pub mod sidebar;
pub mod view;
pub mod viewer;
pub mod widgets;

use std::path::PathBuf;

pub use feature::Feature;
pub use registry::{LayerRegistry, RegistryError};
pub use viewer::{Viewer, ViewerEvent};

/// Directory holding `viewer.json` and the optional log file.
/// Falls back to the working directory when no home directory can be resolved.
pub fn get_config_root() -> PathBuf {
    directories::ProjectDirs::from("org", "opendata-viewer", "opendata-viewer")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}
