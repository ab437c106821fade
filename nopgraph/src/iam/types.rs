// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub name: String,
    pub email: Option<String>,
    pub password_hash: String,
    pub confirmation_key: Option<String>,
}

// Structure matching the YAML file format
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct YamlUser {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub password_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation_key: Option<String>,
}

impl YamlUser {
    pub fn into_user(self, name: String) -> User {
        User {
            name,
            email: self.email,
            password_hash: self.password_hash,
            confirmation_key: self.confirmation_key.filter(|k| !k.trim().is_empty()),
        }
    }

    pub fn from_user(user: &User) -> Self {
        Self {
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            confirmation_key: user.confirmation_key.clone(),
        }
    }
}

// The users.yaml file structure: user name -> yaml user data
pub type YamlUsersData = BTreeMap<String, YamlUser>;

#[derive(Debug, Clone)]
pub enum IamError {
    UserNotFound(String),
    FileError(String),
    ParseError(String),
}

impl std::fmt::Display for IamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IamError::UserNotFound(name) => write!(f, "User not found: {}", name),
            IamError::FileError(msg) => write!(f, "File error: {}", msg),
            IamError::ParseError(msg) => write!(f, "Parse error: {}", msg),
        }
    }
}

impl std::error::Error for IamError {}
