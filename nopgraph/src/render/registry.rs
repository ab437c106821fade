// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct StreamEntry {
    pub request: String,
    pub opened_at: Instant,
}

/// Open streaming responses, keyed by connection handle.
#[derive(Default)]
pub struct StreamRegistry {
    entries: Mutex<HashMap<u32, StreamEntry>>,
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u32, StreamEntry>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::error!("Stream registry lock poisoned; recovering");
                poisoned.into_inner()
            }
        }
    }

    /// The entry lives until the returned guard is dropped.
    pub fn register(self: &Arc<Self>, connection_id: u32, request: String) -> StreamRegistration {
        self.lock().insert(
            connection_id,
            StreamEntry {
                request,
                opened_at: Instant::now(),
            },
        );
        StreamRegistration {
            registry: self.clone(),
            connection_id,
        }
    }

    pub fn active(&self) -> usize {
        self.lock().len()
    }

    #[cfg(test)]
    fn contains(&self, connection_id: u32) -> bool {
        self.lock().contains_key(&connection_id)
    }

    #[cfg(test)]
    fn snapshot(&self) -> Vec<(u32, StreamEntry)> {
        self.lock()
            .iter()
            .map(|(id, entry)| (*id, entry.clone()))
            .collect()
    }
}

pub struct StreamRegistration {
    registry: Arc<StreamRegistry>,
    connection_id: u32,
}

impl StreamRegistration {
    pub fn connection_id(&self) -> u32 {
        self.connection_id
    }
}

impl Drop for StreamRegistration {
    fn drop(&mut self) {
        if let Some(entry) = self.registry.lock().remove(&self.connection_id) {
            log::debug!(
                "Stream {} ({}) closed after {:?}",
                self.connection_id,
                entry.request,
                entry.opened_at.elapsed()
            );
        }
    }
}
