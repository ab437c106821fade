// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use super::model::{Resource, ResourceId, ResourceKind, Site};
use super::repository::{
    ContentRepository, RepositoryError, ResourceQuery, Transaction, is_visible_to,
};
use crate::iam::SecurityContext;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

fn default_true() -> bool {
    true
}

// Structure matching one entry of content.yaml
#[derive(Debug, Deserialize)]
struct ResourceRecord {
    #[serde(default)]
    id: Option<ResourceId>,
    #[serde(flatten)]
    kind: ResourceKind,
    #[serde(default)]
    name: String,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    content_type: Option<String>,
    #[serde(default)]
    last_modified: Option<DateTime<Utc>>,
    #[serde(default)]
    cache_for_seconds: Option<u64>,
    #[serde(default)]
    dont_cache: bool,
    #[serde(default)]
    enable_basic_auth: bool,
    #[serde(default)]
    basic_auth_realm: Option<String>,
    #[serde(default)]
    sites: Vec<Site>,
    #[serde(default = "default_true")]
    visible_to_public_users: bool,
    #[serde(default)]
    visible_to_authenticated_users: bool,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    children: Vec<ResourceId>,
    #[serde(default)]
    properties: BTreeMap<String, String>,
    #[serde(default)]
    private_properties: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ContentFile {
    #[serde(default)]
    resources: Vec<ResourceRecord>,
}

struct StoredResource {
    public: Arc<Resource>,
    privileged: Arc<Resource>,
}

#[derive(Default)]
struct TransactionCounters {
    commits: AtomicU64,
    rollbacks: AtomicU64,
}

/// Read-only repository loaded once from `content.yaml` plus file blobs.
pub struct MemoryRepository {
    entries: Vec<StoredResource>,
    by_id: HashMap<ResourceId, usize>,
    content_dir: PathBuf,
    counters: Arc<TransactionCounters>,
}

impl MemoryRepository {
    /// A missing `content.yaml` yields an empty repository.
    pub fn load(content_file: &Path, content_dir: &Path) -> Result<Self, RepositoryError> {
        if !content_file.exists() {
            log::warn!(
                "Content file {} not found; serving an empty repository",
                content_file.display()
            );
            return Self::from_yaml_str("", content_dir);
        }
        let yaml = std::fs::read_to_string(content_file).map_err(|e| {
            RepositoryError::LoadError(format!(
                "Failed to read content file '{}': {}",
                content_file.display(),
                e
            ))
        })?;
        let repository = Self::from_yaml_str(&yaml, content_dir)?;
        log::info!(
            "Loaded {} resource(s) from {}",
            repository.entries.len(),
            content_file.display()
        );
        Ok(repository)
    }

    pub fn from_yaml_str(yaml: &str, content_dir: &Path) -> Result<Self, RepositoryError> {
        let records = if yaml.trim().is_empty() {
            Vec::new()
        } else {
            let file: ContentFile = serde_yaml::from_str(yaml)
                .map_err(|e| RepositoryError::LoadError(format!("Invalid content YAML: {}", e)))?;
            file.resources
        };

        let mut entries = Vec::with_capacity(records.len());
        let mut by_id = HashMap::with_capacity(records.len());
        for record in records {
            let stored = Self::build_entry(record, content_dir);
            let id = stored.public.id.clone();
            if by_id.insert(id.clone(), entries.len()).is_some() {
                return Err(RepositoryError::Invalid(format!(
                    "duplicate resource id {}",
                    id
                )));
            }
            entries.push(stored);
        }

        for stored in &entries {
            for child in &stored.public.children {
                if !by_id.contains_key(child) {
                    log::warn!(
                        "Resource {} references unknown child {}",
                        stored.public.id,
                        child
                    );
                }
            }
        }

        Ok(Self {
            entries,
            by_id,
            content_dir: content_dir.to_path_buf(),
            counters: Arc::new(TransactionCounters::default()),
        })
    }

    fn build_entry(record: ResourceRecord, content_dir: &Path) -> StoredResource {
        let id = record.id.unwrap_or_else(ResourceId::generate);
        let mut kind = record.kind;
        let mut last_modified = record.last_modified;

        if let ResourceKind::File { size, .. } = &mut kind {
            match std::fs::metadata(content_dir.join(id.as_str())) {
                Ok(metadata) => {
                    *size = metadata.len();
                    if last_modified.is_none() {
                        last_modified = metadata.modified().ok().map(DateTime::<Utc>::from);
                    }
                }
                Err(err) => {
                    log::warn!("Blob for file resource {} unavailable: {}", id, err);
                }
            }
        }

        let public = Resource {
            id,
            kind,
            name: record.name,
            path: record.path,
            content_type: record.content_type,
            last_modified,
            cache_for_seconds: record.cache_for_seconds,
            dont_cache: record.dont_cache,
            enable_basic_auth: record.enable_basic_auth,
            basic_auth_realm: record.basic_auth_realm,
            sites: record.sites,
            visible_to_public_users: record.visible_to_public_users,
            visible_to_authenticated_users: record.visible_to_authenticated_users,
            content: record.content,
            children: record.children,
            properties: record.properties,
        };

        let mut privileged = public.clone();
        privileged.properties.extend(record.private_properties);

        StoredResource {
            public: Arc::new(public),
            privileged: Arc::new(privileged),
        }
    }

    fn view(stored: &StoredResource, security: &SecurityContext) -> Option<Arc<Resource>> {
        if security.is_superuser() {
            return Some(stored.privileged.clone());
        }
        if is_visible_to(security, &stored.public) {
            Some(stored.public.clone())
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn committed_transactions(&self) -> u64 {
        self.counters.commits.load(Ordering::Acquire)
    }

    pub fn rolled_back_transactions(&self) -> u64 {
        self.counters.rollbacks.load(Ordering::Acquire)
    }
}

impl ContentRepository for MemoryRepository {
    fn find_by_id(
        &self,
        security: &SecurityContext,
        id: &ResourceId,
    ) -> Result<Option<Arc<Resource>>, RepositoryError> {
        Ok(self
            .by_id
            .get(id)
            .and_then(|index| self.entries.get(*index))
            .and_then(|stored| Self::view(stored, security)))
    }

    fn find(
        &self,
        security: &SecurityContext,
        query: &ResourceQuery,
    ) -> Result<Vec<Arc<Resource>>, RepositoryError> {
        let mut found: Vec<Arc<Resource>> = self
            .entries
            .iter()
            .filter(|stored| query.matches(&stored.public))
            .filter_map(|stored| Self::view(stored, security))
            .collect();
        if query.positioned {
            found.sort_by_key(|resource| resource.position());
        }
        Ok(found)
    }

    fn begin_transaction(&self) -> Result<Box<dyn Transaction>, RepositoryError> {
        Ok(Box::new(MemoryTransaction {
            counters: self.counters.clone(),
            committed: false,
        }))
    }

    fn file_location(&self, resource: &Resource) -> Option<PathBuf> {
        if resource.is_file() {
            Some(self.content_dir.join(resource.id.as_str()))
        } else {
            None
        }
    }
}

struct MemoryTransaction {
    counters: Arc<TransactionCounters>,
    committed: bool,
}

impl Transaction for MemoryTransaction {
    fn commit(mut self: Box<Self>) -> Result<(), RepositoryError> {
        self.committed = true;
        self.counters.commits.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        if !self.committed {
            log::debug!("Transaction dropped without commit; rolling back");
            self.counters.rollbacks.fetch_add(1, Ordering::AcqRel);
        }
    }
}
