// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use crate::config::SessionConfig;
use actix_web::cookie::{Cookie, SameSite};
use argon2::password_hash::rand_core::{OsRng, RngCore};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

const SESSION_ID_BYTES: usize = 32;
const MAX_SESSIONS: usize = 10000;

struct SessionEntry {
    user_name: String,
    expires_at: Instant,
}

/// In-memory login sessions keyed by an opaque random id.
pub struct SessionStore {
    cookie_name: String,
    ttl: Duration,
    sessions: Mutex<HashMap<String, SessionEntry>>,
}

impl SessionStore {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            cookie_name: config.cookie_name.clone(),
            ttl: Duration::from_secs(config.ttl_seconds),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, SessionEntry>> {
        match self.sessions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::error!("Session store lock poisoned; recovering");
                poisoned.into_inner()
            }
        }
    }

    pub fn open(&self, user_name: &str) -> String {
        let mut bytes = [0u8; SESSION_ID_BYTES];
        OsRng.fill_bytes(&mut bytes);
        let session_id = URL_SAFE_NO_PAD.encode(bytes);

        let now = Instant::now();
        let mut sessions = self.lock();
        sessions.retain(|_, entry| entry.expires_at > now);
        if sessions.len() >= MAX_SESSIONS
            && let Some(oldest) = sessions
                .iter()
                .min_by_key(|(_, entry)| entry.expires_at)
                .map(|(id, _)| id.clone())
        {
            sessions.remove(&oldest);
        }
        sessions.insert(
            session_id.clone(),
            SessionEntry {
                user_name: user_name.to_string(),
                expires_at: now + self.ttl,
            },
        );
        session_id
    }

    /// Returns the user name bound to a live session.
    pub fn resolve(&self, session_id: &str) -> Option<String> {
        let mut sessions = self.lock();
        let entry = sessions.get(session_id)?;
        if entry.expires_at <= Instant::now() {
            sessions.remove(session_id);
            return None;
        }
        Some(entry.user_name.clone())
    }

    pub fn invalidate(&self, session_id: &str) {
        self.lock().remove(session_id);
    }

    pub fn session_cookie(&self, session_id: &str) -> Cookie<'static> {
        Cookie::build(self.cookie_name.clone(), session_id.to_string())
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .max_age(actix_web::cookie::time::Duration::seconds(
                self.ttl.as_secs() as i64,
            ))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(ttl_seconds: u64) -> SessionStore {
        SessionStore::new(&SessionConfig {
            cookie_name: "sid".to_string(),
            ttl_seconds,
        })
    }

    #[test]
    fn open_and_resolve() {
        let sessions = store(60);
        let id = sessions.open("alice");
        assert_eq!(sessions.resolve(&id).as_deref(), Some("alice"));
        assert!(sessions.resolve("unknown").is_none());

        sessions.invalidate(&id);
        assert!(sessions.resolve(&id).is_none());
    }

    #[test]
    fn session_ids_are_unique() {
        let sessions = store(60);
        assert_ne!(sessions.open("alice"), sessions.open("alice"));
    }

    #[test]
    fn cookie_carries_configured_name() {
        let sessions = store(60);
        let cookie = sessions.session_cookie("abc");
        assert_eq!(cookie.name(), "sid");
        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.http_only(), Some(true));
    }
}
