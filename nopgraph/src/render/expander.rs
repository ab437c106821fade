// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use super::context::RenderContext;
use crate::content::Resource;
use crate::util::html_escape;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static PLACEHOLDER_REGEX: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"\$\{([A-Za-z0-9_.\-]+)\}"));

pub trait TemplateExpander: Send + Sync {
    fn expand(&self, ctx: &RenderContext, resource: &Resource, raw: &str) -> String;
}

/// Substitutes `${...}` placeholders. Unknown names expand to nothing.
///
/// | Placeholder | Value |
/// |---|---|
/// | `${name}`, `${id}` | the resource being rendered |
/// | `${current.name}`, `${current.id}` | the detail object bound to the request |
/// | `${request.<param>}` | query or route parameter, HTML-escaped |
/// | `${user.name}` | the principal of the current scope |
/// | `${<property>}` | a property of the resource being rendered |
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaceholderExpander;

impl PlaceholderExpander {
    pub fn new() -> Self {
        Self
    }

    fn lookup(ctx: &RenderContext, resource: &Resource, key: &str) -> Option<String> {
        match key {
            "name" => return Some(resource.name.clone()),
            "id" => return Some(resource.id.to_string()),
            "current.name" => return ctx.data_node.as_ref().map(|node| node.name.clone()),
            "current.id" => return ctx.data_node.as_ref().map(|node| node.id.to_string()),
            "user.name" => return ctx.security.principal().map(|user| user.name.clone()),
            _ => {}
        }
        if let Some(param) = key.strip_prefix("request.") {
            return ctx.request.param(param).map(html_escape);
        }
        resource.property(key).map(str::to_string)
    }
}

impl TemplateExpander for PlaceholderExpander {
    fn expand(&self, ctx: &RenderContext, resource: &Resource, raw: &str) -> String {
        if !raw.contains("${") {
            return raw.to_string();
        }
        let regex = match PLACEHOLDER_REGEX.as_ref() {
            Ok(regex) => regex,
            Err(err) => {
                log::error!("Placeholder regex failed to compile: {}", err);
                return raw.to_string();
            }
        };
        regex
            .replace_all(raw, |caps: &Captures<'_>| {
                Self::lookup(ctx, resource, &caps[1]).unwrap_or_default()
            })
            .into_owned()
    }
}
