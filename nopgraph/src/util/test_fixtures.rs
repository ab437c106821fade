// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::runtime_paths::RuntimePaths;

/// Scratch runtime root under `target/test-fixtures`, removed on drop.
#[derive(Debug)]
pub struct TestFixtureRoot {
    path: PathBuf,
}

impl TestFixtureRoot {
    pub fn new_fixed(name: &str) -> std::io::Result<Self> {
        let root = fixtures_root().join(name);
        if root.exists() {
            fs::remove_dir_all(&root)?;
        }
        fs::create_dir_all(&root)?;
        Ok(Self { path: root })
    }

    pub fn new_unique(prefix: &str) -> std::io::Result<Self> {
        let name = format!("{}-{}", prefix, Uuid::new_v4());
        Self::new_fixed(&name)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn content_dir(&self) -> PathBuf {
        self.path.join("content")
    }

    pub fn write_blob(&self, id: &str, bytes: &[u8]) -> std::io::Result<()> {
        fs::create_dir_all(self.content_dir())?;
        fs::write(self.content_dir().join(id), bytes)
    }

    pub fn runtime_paths(&self) -> std::io::Result<RuntimePaths> {
        fs::create_dir_all(self.content_dir())?;
        let root = self.path.canonicalize()?;
        let content_dir = self.content_dir().canonicalize()?;

        Ok(RuntimePaths {
            config_file: root.join("config.yaml"),
            users_file: root.join("users.yaml"),
            content_file: root.join("content.yaml"),
            logs_dir: root.join("logs"),
            content_dir,
            root,
        })
    }
}

impl Drop for TestFixtureRoot {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

fn fixtures_root() -> PathBuf {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let repo_root = manifest_dir.parent().unwrap_or(&manifest_dir);
    repo_root.join("target").join("test-fixtures")
}
