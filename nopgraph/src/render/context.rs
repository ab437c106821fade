// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use super::queue::FragmentQueue;
use crate::content::{RepositoryError, Resource};
use crate::iam::SecurityContext;
use actix_web::web::Bytes;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug)]
pub enum RenderError {
    DepthExceeded(usize),
    Repository(RepositoryError),
    /// The consumer went away; the producer should stop quietly.
    Disconnected,
    Failed(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::DepthExceeded(depth) => {
                write!(f, "Render depth limit exceeded at depth {}", depth)
            }
            RenderError::Repository(err) => write!(f, "Repository error during render: {}", err),
            RenderError::Disconnected => write!(f, "Client disconnected"),
            RenderError::Failed(msg) => write!(f, "Render failed: {}", msg),
        }
    }
}

impl std::error::Error for RenderError {}

impl From<RepositoryError> for RenderError {
    fn from(err: RepositoryError) -> Self {
        RenderError::Repository(err)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditMode {
    #[default]
    None,
    Content,
    Widget,
}

impl EditMode {
    pub const PARAM: &'static str = "edit";

    pub fn from_param(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("1") => EditMode::Widget,
            Some("2") => EditMode::Content,
            _ => EditMode::None,
        }
    }
}

/// Once set, stays set for the rest of the request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DontCache(bool);

impl DontCache {
    pub fn set_if(&mut self, condition: bool) {
        if condition {
            self.0 = true;
        }
    }

    pub fn get(&self) -> bool {
        self.0
    }
}

/// Request details carried into log lines and template expansion.
#[derive(Debug, Clone, Default)]
pub struct RequestInfo {
    pub method: String,
    pub path: String,
    pub query_string: String,
    pub remote_addr: Option<String>,
    pub params: BTreeMap<String, String>,
}

impl RequestInfo {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

impl fmt::Display for RequestInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let remote = self.remote_addr.as_deref().unwrap_or("-");
        if self.query_string.is_empty() {
            write!(f, "{} {} {}", remote, self.method, self.path)
        } else {
            write!(
                f,
                "{} {} {}?{}",
                remote, self.method, self.path, self.query_string
            )
        }
    }
}

enum RenderOutput {
    Buffer(String),
    Queue(Arc<FragmentQueue>),
}

/// Per-request rendering state. Created once per request and moved into the
/// render task when the page is streamed.
pub struct RenderContext {
    pub security: SecurityContext,
    pub edit_mode: EditMode,
    pub request: RequestInfo,
    pub data_node: Option<Arc<Resource>>,
    pub partial: bool,
    dont_cache: DontCache,
    output: RenderOutput,
}

impl RenderContext {
    pub fn new(security: SecurityContext, edit_mode: EditMode, request: RequestInfo) -> Self {
        Self {
            security,
            edit_mode,
            request,
            data_node: None,
            partial: false,
            dont_cache: DontCache::default(),
            output: RenderOutput::Buffer(String::new()),
        }
    }

    pub fn dont_cache(&self) -> bool {
        self.dont_cache.get()
    }

    pub fn mark_dont_cache(&mut self, condition: bool) {
        self.dont_cache.set_if(condition);
    }

    /// Replaces the lookup scope, e.g. with a Basic-Auth principal.
    pub fn narrow_to(&mut self, security: SecurityContext) {
        self.security = security;
    }

    pub fn stream_into(&mut self, queue: Arc<FragmentQueue>) {
        self.output = RenderOutput::Queue(queue);
    }

    pub fn append(&mut self, fragment: &str) -> Result<(), RenderError> {
        if fragment.is_empty() {
            return Ok(());
        }
        match &mut self.output {
            RenderOutput::Buffer(buffer) => {
                buffer.push_str(fragment);
                Ok(())
            }
            RenderOutput::Queue(queue) => {
                if queue.push(Bytes::copy_from_slice(fragment.as_bytes())) {
                    Ok(())
                } else {
                    Err(RenderError::Disconnected)
                }
            }
        }
    }

    pub fn take_buffer(&mut self) -> String {
        match &mut self.output {
            RenderOutput::Buffer(buffer) => std::mem::take(buffer),
            RenderOutput::Queue(_) => String::new(),
        }
    }
}
