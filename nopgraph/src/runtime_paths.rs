// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use crate::config::ConfigError;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct RuntimePaths {
    pub root: PathBuf,
    pub config_file: PathBuf,
    pub users_file: PathBuf,
    pub content_file: PathBuf,
    pub content_dir: PathBuf,
    pub logs_dir: PathBuf,
}

impl RuntimePaths {
    pub fn from_root(root: &Path) -> Result<Self, ConfigError> {
        let root_path = if root.as_os_str().is_empty() {
            PathBuf::from(".")
        } else {
            root.to_path_buf()
        };

        let root_canonical = root_path.canonicalize().map_err(|e| {
            ConfigError::ValidationError(format!(
                "Failed to canonicalize runtime root '{}': {}",
                root_path.display(),
                e
            ))
        })?;

        let config_file = root_canonical.join("config.yaml");
        ensure_file_readable(&config_file, "Config file must be readable")?;

        let users_file = root_canonical.join("users.yaml");
        let content_file = root_canonical.join("content.yaml");
        let content_dir = root_canonical.join("content");
        let logs_dir = root_canonical.join("logs");

        ensure_dir_exists(&content_dir)?;

        let content_dir = content_dir.canonicalize().map_err(|e| {
            ConfigError::ValidationError(format!(
                "Failed to canonicalize content directory '{}': {}",
                content_dir.display(),
                e
            ))
        })?;

        Ok(Self {
            root: root_canonical,
            config_file,
            users_file,
            content_file,
            content_dir,
            logs_dir,
        })
    }

    /// Location of the blob backing a file resource.
    pub fn blob_path(&self, id: &str) -> PathBuf {
        self.content_dir.join(id)
    }
}

fn ensure_dir_exists(path: &Path) -> Result<(), ConfigError> {
    if !path.exists() {
        fs::create_dir_all(path).map_err(|e| {
            ConfigError::ValidationError(format!(
                "Failed to create directory '{}': {}",
                path.display(),
                e
            ))
        })?;
    }

    if !path.is_dir() {
        return Err(ConfigError::ValidationError(format!(
            "Content directory is not a directory: {}",
            path.display()
        )));
    }
    Ok(())
}

fn ensure_file_readable(path: &Path, context: &str) -> Result<(), ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::ValidationError(format!(
            "{} (not a file): {}",
            context,
            path.display()
        )));
    }

    fs::File::open(path).map(|_| ()).map_err(|err| {
        ConfigError::ValidationError(format!("{} ({}): {}", context, path.display(), err))
    })
}
