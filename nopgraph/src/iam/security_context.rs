// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use super::types::User;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Anonymous,
    Principal,
    Superuser,
}

/// Immutable lookup scope threaded through resolution and rendering.
///
/// Narrowing (for example after Basic-Auth) creates a new value; an existing
/// context is never mutated, so a render task owns exactly the scope it was
/// started with.
#[derive(Debug, Clone)]
pub struct SecurityContext {
    scope: Scope,
    principal: Option<Arc<User>>,
}

impl SecurityContext {
    pub fn anonymous() -> Self {
        Self {
            scope: Scope::Anonymous,
            principal: None,
        }
    }

    pub fn superuser() -> Self {
        Self {
            scope: Scope::Superuser,
            principal: None,
        }
    }

    pub fn for_user(user: User) -> Self {
        Self {
            scope: Scope::Principal,
            principal: Some(Arc::new(user)),
        }
    }

    pub fn from_optional_user(user: Option<User>) -> Self {
        user.map(Self::for_user).unwrap_or_else(Self::anonymous)
    }

    pub fn principal(&self) -> Option<&User> {
        self.principal.as_deref()
    }

    pub fn is_superuser(&self) -> bool {
        self.scope == Scope::Superuser
    }

    pub fn is_authenticated(&self) -> bool {
        self.scope == Scope::Principal
    }
}
