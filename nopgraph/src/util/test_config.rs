// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

#![allow(dead_code)]

use crate::config::{
    AppConfig, ConfirmationConfig, LoggingConfig, RenderingConfig, SecurityConfig, ServerConfig,
    SessionConfig, ValidatedConfig,
};

#[derive(Debug, Clone)]
pub struct TestConfigBuilder {
    config: ValidatedConfig,
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ValidatedConfig {
                app: AppConfig {
                    name: "Test App".to_string(),
                    description: "Test Description".to_string(),
                },
                server: ServerConfig {
                    host: "127.0.0.1".to_string(),
                    port: 5466,
                    workers: 1,
                },
                logging: LoggingConfig {
                    level: "info".to_string(),
                },
                security: SecurityConfig::default(),
                rendering: RenderingConfig {
                    async_enabled: true,
                    render_workers: 2,
                },
                confirmation: ConfirmationConfig::default(),
                session: SessionConfig::default(),
            },
        }
    }

    pub fn with_async_rendering(mut self, enabled: bool) -> Self {
        self.config.rendering.async_enabled = enabled;
        self
    }

    pub fn with_render_workers(mut self, workers: usize) -> Self {
        self.config.rendering.render_workers = workers;
        self
    }

    pub fn with_hsts(mut self, enabled: bool) -> Self {
        self.config.security.hsts_enabled = enabled;
        self
    }

    pub fn build(self) -> ValidatedConfig {
        self.config
    }
}

pub fn test_config() -> ValidatedConfig {
    TestConfigBuilder::new().build()
}
