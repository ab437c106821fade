// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

const RESOURCE_ID_LEN: usize = 32;

/// Stable resource identifier: 32 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn parse(value: &str) -> Option<Self> {
        if is_uuid_shaped(value) {
            Some(Self(value.to_ascii_lowercase()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ResourceId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        ResourceId::parse(&raw).ok_or_else(|| {
            serde::de::Error::custom(format!("resource id must be 32 hex characters: {}", raw))
        })
    }
}

pub fn is_uuid_shaped(value: &str) -> bool {
    value.len() == RESOURCE_ID_LEN && value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// The host a request was addressed to, as seen in its `Host` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHost {
    pub hostname: String,
    pub port: Option<u16>,
}

impl RequestHost {
    pub fn new(hostname: &str, port: Option<u16>) -> Self {
        Self {
            hostname: hostname.to_ascii_lowercase(),
            port,
        }
    }

    /// Parses `host[:port]`, including bracketed IPv6 literals.
    pub fn parse(host_header: &str, default_port: Option<u16>) -> Self {
        let value = host_header.trim();
        let (hostname, port) = if let Some(rest) = value.strip_prefix('[') {
            match rest.split_once(']') {
                Some((addr, tail)) => (addr, tail.strip_prefix(':')),
                None => (value, None),
            }
        } else {
            match value.rsplit_once(':') {
                Some((name, port)) if !name.contains(':') => (name, Some(port)),
                _ => (value, None),
            }
        };
        let port = port.and_then(|p| p.parse::<u16>().ok()).or(default_port);
        Self::new(hostname, port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Site {
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub port: Option<u16>,
}

impl Site {
    pub fn matches(&self, host: &RequestHost) -> bool {
        let hostname = self.hostname.trim();
        let host_ok = hostname.is_empty() || hostname.eq_ignore_ascii_case(&host.hostname);
        let port_ok = match self.port {
            None => true,
            Some(port) => host.port == Some(port),
        };
        host_ok && port_ok
    }
}

/// A registered route template such as `/reports/{year}`.
#[derive(Debug, Clone)]
pub struct RouteTemplate {
    template: String,
    pattern: Regex,
    params: Vec<String>,
}

impl RouteTemplate {
    pub fn parse(template: &str) -> Result<Self, String> {
        if !template.starts_with('/') {
            return Err(format!("route must start with '/': {}", template));
        }
        let mut pattern = String::from("^");
        let mut params = Vec::new();
        for segment in template.trim_end_matches('/').split('/').skip(1) {
            pattern.push('/');
            if let Some(name) = segment
                .strip_prefix('{')
                .and_then(|rest| rest.strip_suffix('}'))
            {
                let valid = !name.is_empty()
                    && name
                        .bytes()
                        .all(|b| b.is_ascii_alphanumeric() || b == b'_');
                if !valid || params.iter().any(|p| p == name) {
                    return Err(format!("invalid route parameter '{}' in {}", name, template));
                }
                pattern.push_str(&format!("(?P<{}>[^/]+)", name));
                params.push(name.to_string());
            } else if segment.contains('{') || segment.contains('}') {
                return Err(format!("malformed route segment '{}' in {}", segment, template));
            } else {
                pattern.push_str(&regex::escape(segment));
            }
        }
        pattern.push_str("/?$");
        let pattern = Regex::new(&pattern).map_err(|e| e.to_string())?;
        Ok(Self {
            template: template.to_string(),
            pattern,
            params,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Binds the parameters of `path`, or returns `None` when the template does not apply.
    pub fn bind(&self, path: &str) -> Option<BTreeMap<String, String>> {
        if self.params.is_empty() {
            return None;
        }
        let captures = self.pattern.captures(path)?;
        let mut bound = BTreeMap::new();
        for name in &self.params {
            let value = captures.name(name)?.as_str();
            let value = urlencoding::decode(value)
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| value.to_string());
            bound.insert(name.clone(), value);
        }
        Some(bound)
    }
}

impl<'de> Deserialize<'de> for RouteTemplate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        RouteTemplate::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResourceKind {
    Page {
        #[serde(default)]
        position: Option<i64>,
        #[serde(default)]
        show_on_error_codes: Vec<u16>,
        #[serde(default)]
        raw_output: bool,
        #[serde(default)]
        routes: Vec<RouteTemplate>,
    },
    Partial,
    File {
        #[serde(default)]
        size: u64,
        #[serde(default)]
        is_template: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KindFilter {
    Page,
    Partial,
    File,
    #[default]
    Any,
}

impl KindFilter {
    pub fn accepts(self, kind: &ResourceKind) -> bool {
        matches!(
            (self, kind),
            (KindFilter::Any, _)
                | (KindFilter::Page, ResourceKind::Page { .. })
                | (KindFilter::Partial, ResourceKind::Partial)
                | (KindFilter::File, ResourceKind::File { .. })
        )
    }
}

/// Anything servable at a URL.
#[derive(Debug, Clone)]
pub struct Resource {
    pub id: ResourceId,
    pub kind: ResourceKind,
    pub name: String,
    pub path: Option<String>,
    pub content_type: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub cache_for_seconds: Option<u64>,
    pub dont_cache: bool,
    pub enable_basic_auth: bool,
    pub basic_auth_realm: Option<String>,
    pub sites: Vec<Site>,
    pub visible_to_public_users: bool,
    pub visible_to_authenticated_users: bool,
    pub content: Option<String>,
    pub children: Vec<ResourceId>,
    pub properties: BTreeMap<String, String>,
}

impl Resource {
    pub fn is_page(&self) -> bool {
        matches!(self.kind, ResourceKind::Page { .. })
    }

    pub fn is_partial(&self) -> bool {
        matches!(self.kind, ResourceKind::Partial)
    }

    pub fn is_file(&self) -> bool {
        matches!(self.kind, ResourceKind::File { .. })
    }

    /// Pages and partials can be rendered as a tree.
    pub fn is_renderable(&self) -> bool {
        self.is_page() || self.is_partial()
    }

    pub fn explicit_path(&self) -> Option<&str> {
        self.path.as_deref().filter(|p| !p.trim().is_empty())
    }

    pub fn has_blank_name(&self) -> bool {
        self.name.trim().is_empty()
    }

    pub fn position(&self) -> Option<i64> {
        match &self.kind {
            ResourceKind::Page { position, .. } => *position,
            _ => None,
        }
    }

    pub fn routes(&self) -> &[RouteTemplate] {
        match &self.kind {
            ResourceKind::Page { routes, .. } => routes,
            _ => &[],
        }
    }

    pub fn shows_on_error(&self, status: u16) -> bool {
        match &self.kind {
            ResourceKind::Page {
                show_on_error_codes,
                ..
            } => show_on_error_codes.contains(&status),
            _ => false,
        }
    }

    pub fn raw_output(&self) -> bool {
        matches!(self.kind, ResourceKind::Page { raw_output: true, .. })
    }

    pub fn file_size(&self) -> Option<u64> {
        match self.kind {
            ResourceKind::File { size, .. } => Some(size),
            _ => None,
        }
    }

    pub fn is_template_file(&self) -> bool {
        matches!(
            self.kind,
            ResourceKind::File {
                is_template: true,
                ..
            }
        )
    }

    /// Empty site sets are visible everywhere. Partials are never site-scoped.
    pub fn is_visible_for_site(&self, host: &RequestHost) -> bool {
        if self.is_partial() || self.sites.is_empty() {
            return true;
        }
        self.sites.iter().any(|site| site.matches(host))
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}
