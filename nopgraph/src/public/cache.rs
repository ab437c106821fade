// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use crate::content::Resource;
use actix_web::HttpResponseBuilder;
use actix_web::http::header::{
    CACHE_CONTROL, DATE, EXPIRES, HeaderMap, HeaderName, HttpDate, IF_MODIFIED_SINCE,
    LAST_MODIFIED, VARY,
};
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const CACHE_CONTROL_REVALIDATE: &str = "no-cache, must-revalidate, proxy-revalidate";
pub const CACHE_CONTROL_NEVER: &str =
    "private, no-cache, no-store, max-age=0, s-maxage=0, must-revalidate, proxy-revalidate";

/// Outcome of the conditional-GET check plus the caching headers to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheDecision {
    pub not_modified: bool,
    pub headers: Vec<(HeaderName, String)>,
}

impl CacheDecision {
    pub fn header(&self, name: &HeaderName) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn apply(&self, builder: &mut HttpResponseBuilder) {
        for (name, value) in &self.headers {
            builder.insert_header((name.clone(), value.as_str()));
        }
    }
}

pub fn evaluate(
    request_headers: &HeaderMap,
    resource: &Resource,
    dont_cache: bool,
    now: SystemTime,
) -> CacheDecision {
    let mut headers = vec![(DATE, HttpDate::from(now).to_string())];

    match (dont_cache, resource.cache_for_seconds) {
        (false, Some(seconds)) => {
            headers.push((
                CACHE_CONTROL,
                format!("max-age={}, s-maxage={}", seconds, seconds),
            ));
            let expires = now
                .checked_add(Duration::from_secs(seconds))
                .unwrap_or(now);
            headers.push((EXPIRES, HttpDate::from(expires).to_string()));
        }
        (false, None) => headers.push((CACHE_CONTROL, CACHE_CONTROL_REVALIDATE.to_string())),
        (true, _) => headers.push((CACHE_CONTROL, CACHE_CONTROL_NEVER.to_string())),
    }

    let mut not_modified = false;
    if let Some(last_modified) = resource.last_modified.and_then(whole_seconds) {
        headers.push((LAST_MODIFIED, HttpDate::from(last_modified).to_string()));

        if let Some(since) = if_modified_since(request_headers)
            && last_modified <= since
        {
            not_modified = true;
            headers.push((VARY, "Accept-Encoding".to_string()));
        }
    }

    CacheDecision {
        not_modified,
        headers,
    }
}

fn whole_seconds(timestamp: chrono::DateTime<chrono::Utc>) -> Option<SystemTime> {
    let seconds = u64::try_from(timestamp.timestamp()).ok()?;
    UNIX_EPOCH.checked_add(Duration::from_secs(seconds))
}

fn if_modified_since(request_headers: &HeaderMap) -> Option<SystemTime> {
    let raw = request_headers.get(IF_MODIFIED_SINCE)?;
    let parsed = raw
        .to_str()
        .ok()
        .and_then(|value| HttpDate::from_str(value).ok());
    match parsed {
        Some(date) => Some(SystemTime::from(date)),
        None => {
            log::warn!("Ignoring unparseable If-Modified-Since header: {:?}", raw);
            None
        }
    }
}
