// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use super::model::{KindFilter, Resource, ResourceId};
use crate::iam::SecurityContext;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum RepositoryError {
    LoadError(String),
    Invalid(String),
}

impl std::fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RepositoryError::LoadError(msg) => write!(f, "Content load error: {}", msg),
            RepositoryError::Invalid(msg) => write!(f, "Invalid content: {}", msg),
        }
    }
}

impl std::error::Error for RepositoryError {}

/// Lookup filter for [`ContentRepository::find`]. Unset fields match anything.
#[derive(Debug, Clone, Default)]
pub struct ResourceQuery {
    pub kind: KindFilter,
    pub path: Option<String>,
    pub name: Option<String>,
    pub error_code: Option<u16>,
    pub with_routes: bool,
    pub positioned: bool,
}

impl ResourceQuery {
    pub fn pages() -> Self {
        Self {
            kind: KindFilter::Page,
            ..Self::default()
        }
    }

    pub fn partials() -> Self {
        Self {
            kind: KindFilter::Partial,
            ..Self::default()
        }
    }

    pub fn files() -> Self {
        Self {
            kind: KindFilter::File,
            ..Self::default()
        }
    }

    pub fn any() -> Self {
        Self::default()
    }

    pub fn path(mut self, path: &str) -> Self {
        self.path = Some(path.to_string());
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn error_code(mut self, status: u16) -> Self {
        self.error_code = Some(status);
        self
    }

    pub fn with_routes(mut self) -> Self {
        self.with_routes = true;
        self
    }

    /// Only resources with a position, ordered by ascending position.
    pub fn positioned(mut self) -> Self {
        self.positioned = true;
        self
    }

    pub fn matches(&self, resource: &Resource) -> bool {
        if !self.kind.accepts(&resource.kind) {
            return false;
        }
        if let Some(path) = &self.path
            && resource.explicit_path() != Some(path.as_str())
        {
            return false;
        }
        if let Some(name) = &self.name
            && resource.name != *name
        {
            return false;
        }
        if let Some(status) = self.error_code
            && !resource.shows_on_error(status)
        {
            return false;
        }
        if self.with_routes && resource.routes().is_empty() {
            return false;
        }
        if self.positioned && resource.position().is_none() {
            return false;
        }
        true
    }
}

pub trait Transaction: Send {
    fn commit(self: Box<Self>) -> Result<(), RepositoryError>;
}

/// Graph-backed content store consumed by resolution and rendering.
///
/// Every lookup is scoped by a [`SecurityContext`]: resources the scope may
/// not see are never returned, and the object handed back reflects only the
/// fields that scope is allowed to read.
pub trait ContentRepository: Send + Sync {
    fn find_by_id(
        &self,
        security: &SecurityContext,
        id: &ResourceId,
    ) -> Result<Option<Arc<Resource>>, RepositoryError>;

    /// Matches in repository order, or by position when the query asks for it.
    fn find(
        &self,
        security: &SecurityContext,
        query: &ResourceQuery,
    ) -> Result<Vec<Arc<Resource>>, RepositoryError>;

    fn begin_transaction(&self) -> Result<Box<dyn Transaction>, RepositoryError>;

    /// Where the bytes of a file resource live.
    fn file_location(&self, resource: &Resource) -> Option<PathBuf>;

    fn is_visible(&self, security: &SecurityContext, resource: &Resource) -> bool {
        is_visible_to(security, resource)
    }

    fn find_first(
        &self,
        security: &SecurityContext,
        query: &ResourceQuery,
    ) -> Result<Option<Arc<Resource>>, RepositoryError> {
        Ok(self.find(security, query)?.into_iter().next())
    }
}

pub fn is_visible_to(security: &SecurityContext, resource: &Resource) -> bool {
    if security.is_superuser() {
        return true;
    }
    if security.is_authenticated() {
        return resource.visible_to_public_users || resource.visible_to_authenticated_users;
    }
    resource.visible_to_public_users
}
