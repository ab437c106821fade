// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::{ConfirmationConfig, ValidatedConfig};
use crate::content::ContentRepository;
use crate::iam::{PrincipalStore, SessionStore};
use crate::public::error::ErrorRenderer;
use crate::render::{
    PlaceholderExpander, RenderPipeline, StreamRegistry, TemplateExpander, TemplateTreeRenderer,
    TreeRenderer,
};

pub struct AppState {
    pub repository: Arc<dyn ContentRepository>,
    pub principals: Arc<dyn PrincipalStore>,
    pub expander: Arc<dyn TemplateExpander>,
    pub pipeline: RenderPipeline,
    pub sessions: SessionStore,
    pub error_renderer: ErrorRenderer,
    pub confirmation: ConfirmationConfig,
    pub server_port: u16,
    ready: AtomicBool,
}

impl AppState {
    pub fn new(
        config: &ValidatedConfig,
        repository: Arc<dyn ContentRepository>,
        principals: Arc<dyn PrincipalStore>,
    ) -> Self {
        let expander: Arc<dyn TemplateExpander> = Arc::new(PlaceholderExpander::new());
        let renderer = Arc::new(TemplateTreeRenderer::new(
            repository.clone(),
            expander.clone(),
        ));
        Self::with_renderer(config, repository, principals, expander, renderer)
    }

    pub fn with_renderer(
        config: &ValidatedConfig,
        repository: Arc<dyn ContentRepository>,
        principals: Arc<dyn PrincipalStore>,
        expander: Arc<dyn TemplateExpander>,
        renderer: Arc<dyn TreeRenderer>,
    ) -> Self {
        let registry = Arc::new(StreamRegistry::new());
        Self {
            repository,
            principals,
            expander,
            pipeline: RenderPipeline::new(renderer, &config.rendering, registry),
            sessions: SessionStore::new(&config.session),
            error_renderer: ErrorRenderer::new(config.app.name.clone()),
            confirmation: config.confirmation.clone(),
            server_port: config.server.port,
            ready: AtomicBool::new(false),
        }
    }

    /// Requests are answered with 503 until this is called.
    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn stream_registry(&self) -> &Arc<StreamRegistry> {
        self.pipeline.registry()
    }
}
