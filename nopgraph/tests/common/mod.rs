// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

#![allow(dead_code)]

use actix_web::cookie::Cookie;
use actix_web::dev::{ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{App, web};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use nopgraph::app_state::AppState;
use nopgraph::config::ValidatedConfig;
use nopgraph::content::MemoryRepository;
use nopgraph::headers::Headers;
use nopgraph::iam::{MemoryPrincipalStore, SessionAuthMiddlewareFactory, User, hash_password};
use nopgraph::public;
use nopgraph::render::{PlaceholderExpander, TemplateExpander, TreeRenderer};
use nopgraph::util::test_config;
use nopgraph::util::test_fixtures::TestFixtureRoot;
use std::sync::Arc;

pub const USER_NAME: &str = "alice";
pub const USER_PASSWORD: &str = "wonderland";
pub const CONFIRMATION_KEY: &str = "k-123";
pub const LOGO_ID: &str = "00000000000000000000000000000006";
pub const LOGO_LEN: usize = 64;

pub const SITE_CONTENT: &str = r#"
resources:
  - id: "00000000000000000000000000000001"
    type: page
    name: home
    path: /
    position: 1
    content: "<h1>Home</h1>"
  - id: "00000000000000000000000000000002"
    type: page
    name: about
    path: /about
    cache_for_seconds: 120
    last_modified: "2023-11-14T22:13:20Z"
    content: "<p>About ${name}</p>"
    children: ["00000000000000000000000000000005"]
  - id: "00000000000000000000000000000003"
    type: page
    name: reports
    routes: ["/reports/{year}"]
    content: "Year ${request.year}"
  - id: "00000000000000000000000000000004"
    type: page
    name: not-found
    show_on_error_codes: [404]
    content: "<h1>Nothing here</h1>"
  - id: "00000000000000000000000000000005"
    type: partial
    name: sidebar
    content: "<aside>side</aside>"
  - id: "00000000000000000000000000000006"
    type: file
    name: logo.png
    path: /assets/logo.png
    content_type: image/png
    cache_for_seconds: 3600
  - id: "00000000000000000000000000000007"
    type: page
    name: vault
    path: /vault
    enable_basic_auth: true
    basic_auth_realm: 'Vault "${name}"'
    visible_to_public_users: false
    visible_to_authenticated_users: true
    content: "secret=${secret};user=${user.name}"
    private_properties:
      secret: hunter2
  - id: "00000000000000000000000000000008"
    type: page
    name: articles
    path: /articles
    content: "Article: ${current.name}"
  - id: "00000000000000000000000000000009"
    type: partial
    name: first-post
    content: "First!"
  - id: "0000000000000000000000000000000a"
    type: page
    name: live
    path: /live
    dont_cache: true
    content: "live"
"#;

pub struct TestHarness {
    pub fixture: TestFixtureRoot,
    pub config: ValidatedConfig,
    pub repository: Arc<MemoryRepository>,
    pub app_state: Arc<AppState>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: ValidatedConfig) -> Self {
        Self::build(config, SITE_CONTENT, None)
    }

    /// Builds a harness around `content`, optionally with a custom tree renderer.
    pub fn build(
        config: ValidatedConfig,
        content: &str,
        renderer: Option<Arc<dyn TreeRenderer>>,
    ) -> Self {
        let fixture = TestFixtureRoot::new_unique("nopgraph-it").expect("fixture root");
        let logo: Vec<u8> = (0..LOGO_LEN as u8).collect();
        fixture.write_blob(LOGO_ID, &logo).expect("logo blob");

        let repository = Arc::new(
            MemoryRepository::from_yaml_str(content, &fixture.content_dir()).expect("content"),
        );
        let principals = Arc::new(MemoryPrincipalStore::from_users(vec![User {
            name: USER_NAME.to_string(),
            email: Some("alice@example.com".to_string()),
            password_hash: hash_password(USER_PASSWORD).expect("hash"),
            confirmation_key: Some(CONFIRMATION_KEY.to_string()),
        }]));

        let app_state = match renderer {
            Some(renderer) => {
                let expander: Arc<dyn TemplateExpander> = Arc::new(PlaceholderExpander::new());
                AppState::with_renderer(
                    &config,
                    repository.clone(),
                    principals,
                    expander,
                    renderer,
                )
            }
            None => AppState::new(&config, repository.clone(), principals),
        };
        let app_state = Arc::new(app_state);
        app_state.mark_ready();

        Self {
            fixture,
            config,
            repository,
            app_state,
        }
    }

    /// Opens a session for the test principal and returns its cookie.
    pub fn login_cookie(&self) -> Cookie<'static> {
        let session_id = self.app_state.sessions.open(USER_NAME);
        self.app_state.sessions.session_cookie(&session_id)
    }
}

pub fn basic_auth_header(user: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:{}", user, password)))
}

pub fn header<'a>(response: &'a ServiceResponse, name: &str) -> Option<&'a str> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
}

pub fn build_test_app(
    harness: &TestHarness,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    > + use<>,
> {
    App::new()
        .app_data(web::Data::from(harness.app_state.clone()))
        .wrap(SessionAuthMiddlewareFactory)
        .wrap(Headers::new(&harness.config.security))
        .configure(public::configure)
}
