// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use crate::iam::password::verify_password;
use crate::iam::types::{IamError, User, YamlUser, YamlUsersData};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

type UsersData = BTreeMap<String, User>;

pub trait PrincipalStore: Send + Sync {
    fn find_by_name(&self, name: &str) -> Result<Option<User>, IamError>;

    fn find_by_confirmation_key(&self, key: &str) -> Result<Option<User>, IamError>;

    fn clear_confirmation_key(&self, name: &str) -> Result<(), IamError>;

    /// Returns the principal only when the password matches its stored hash.
    fn verify_credentials(&self, username: &str, password: &str) -> Result<Option<User>, IamError> {
        let Some(user) = self.find_by_name(username)? else {
            return Ok(None);
        };
        let matches = verify_password(password, &user.password_hash)
            .map_err(|err| IamError::ParseError(format!("{}: {}", user.name, err)))?;
        Ok(matches.then_some(user))
    }
}

fn read_users(lock: &RwLock<UsersData>) -> RwLockReadGuard<'_, UsersData> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::error!("Principal store lock poisoned on read; recovering");
            poisoned.into_inner()
        }
    }
}

fn write_users(lock: &RwLock<UsersData>) -> RwLockWriteGuard<'_, UsersData> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::error!("Principal store lock poisoned on write; recovering");
            poisoned.into_inner()
        }
    }
}

fn find_key(users: &UsersData, key: &str) -> Option<User> {
    if key.trim().is_empty() {
        return None;
    }
    users
        .values()
        .find(|user| user.confirmation_key.as_deref() == Some(key))
        .cloned()
}

/// Principals persisted in `users.yaml`, cached in memory after load.
pub struct YamlPrincipalStore {
    users_file: PathBuf,
    users: RwLock<UsersData>,
}

impl YamlPrincipalStore {
    /// A missing file yields an empty store.
    pub fn load(users_file: PathBuf) -> Result<Self, IamError> {
        let users = if users_file.exists() {
            let content = std::fs::read_to_string(&users_file)
                .map_err(|e| IamError::FileError(format!("Failed to read users file: {}", e)))?;
            Self::parse_users(&content)?
        } else {
            log::warn!(
                "Users file {} not found; Basic-Auth and confirmations will reject everyone",
                users_file.display()
            );
            UsersData::new()
        };
        log::info!("Loaded {} principal(s)", users.len());
        Ok(Self {
            users_file,
            users: RwLock::new(users),
        })
    }

    fn parse_users(content: &str) -> Result<UsersData, IamError> {
        if content.trim().is_empty() {
            return Ok(UsersData::new());
        }
        let yaml_users: YamlUsersData = serde_yaml::from_str(content)
            .map_err(|e| IamError::ParseError(format!("Failed to parse users YAML: {}", e)))?;
        Ok(yaml_users
            .into_iter()
            .map(|(name, yaml_user)| (name.clone(), yaml_user.into_user(name)))
            .collect())
    }

    fn serialize_users(users: &UsersData) -> Result<String, IamError> {
        let yaml_users: YamlUsersData = users
            .iter()
            .map(|(name, user)| (name.clone(), YamlUser::from_user(user)))
            .collect();
        serde_yaml::to_string(&yaml_users)
            .map_err(|e| IamError::ParseError(format!("Failed to serialize users: {}", e)))
    }

    fn write_users_file(&self, content: &str) -> Result<(), IamError> {
        let parent = self.users_file.parent().ok_or_else(|| {
            IamError::FileError("Users file path has no parent directory".to_string())
        })?;
        let file_name = self
            .users_file
            .file_name()
            .ok_or_else(|| IamError::FileError("Users file path has no file name".to_string()))?;
        let (mut file, temp_path) = create_temp_file(parent, file_name)?;

        if let Err(err) = file.write_all(content.as_bytes()) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(IamError::FileError(format!(
                "Failed to write users temp file: {}",
                err
            )));
        }
        if let Err(err) = file.sync_all() {
            let _ = std::fs::remove_file(&temp_path);
            return Err(IamError::FileError(format!(
                "Failed to sync users temp file: {}",
                err
            )));
        }
        if let Err(err) = std::fs::rename(&temp_path, &self.users_file) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(IamError::FileError(format!(
                "Failed to replace users file: {}",
                err
            )));
        }
        Ok(())
    }
}

fn create_temp_file(
    dir: &Path,
    file_name: &std::ffi::OsStr,
) -> Result<(std::fs::File, PathBuf), IamError> {
    use std::fs::OpenOptions;
    const MAX_ATTEMPTS: u32 = 100;
    let base = file_name.to_string_lossy();
    for attempt in 0..MAX_ATTEMPTS {
        let candidate = dir.join(format!(".{}.tmp.{}.{}", base, std::process::id(), attempt));
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
        {
            Ok(file) => return Ok((file, candidate)),
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(err) => {
                return Err(IamError::FileError(format!(
                    "Failed to create temp users file: {}",
                    err
                )));
            }
        }
    }
    Err(IamError::FileError(
        "Failed to create temp users file after repeated attempts".to_string(),
    ))
}

impl PrincipalStore for YamlPrincipalStore {
    fn find_by_name(&self, name: &str) -> Result<Option<User>, IamError> {
        Ok(read_users(&self.users).get(name).cloned())
    }

    fn find_by_confirmation_key(&self, key: &str) -> Result<Option<User>, IamError> {
        Ok(find_key(&read_users(&self.users), key))
    }

    fn clear_confirmation_key(&self, name: &str) -> Result<(), IamError> {
        let mut users = write_users(&self.users);
        let mut updated = users.clone();
        let user = updated
            .get_mut(name)
            .ok_or_else(|| IamError::UserNotFound(name.to_string()))?;
        user.confirmation_key = None;
        let content = Self::serialize_users(&updated)?;
        self.write_users_file(&content)?;
        *users = updated;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryPrincipalStore {
    users: RwLock<UsersData>,
}

impl MemoryPrincipalStore {
    pub fn from_users(users: Vec<User>) -> Self {
        Self {
            users: RwLock::new(
                users
                    .into_iter()
                    .map(|user| (user.name.clone(), user))
                    .collect(),
            ),
        }
    }
}

impl PrincipalStore for MemoryPrincipalStore {
    fn find_by_name(&self, name: &str) -> Result<Option<User>, IamError> {
        Ok(read_users(&self.users).get(name).cloned())
    }

    fn find_by_confirmation_key(&self, key: &str) -> Result<Option<User>, IamError> {
        Ok(find_key(&read_users(&self.users), key))
    }

    fn clear_confirmation_key(&self, name: &str) -> Result<(), IamError> {
        let mut users = write_users(&self.users);
        let user = users
            .get_mut(name)
            .ok_or_else(|| IamError::UserNotFound(name.to_string()))?;
        user.confirmation_key = None;
        Ok(())
    }
}
