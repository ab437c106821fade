// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use crate::content::{ContentRepository, RepositoryError, Resource, ResourceQuery};
use crate::iam::{PrincipalStore, SecurityContext};
use crate::public::resolver::last_segment;
use crate::render::{RenderContext, TemplateExpander};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::sync::Arc;

#[derive(Debug)]
pub enum GateOutcome {
    NoBasicAuth,
    MustAuthenticate {
        realm: String,
    },
    /// `resource` was fetched again inside `security`, never under the
    /// superuser scope used to find it.
    Authenticated {
        security: SecurityContext,
        resource: Arc<Resource>,
    },
}

/// Per-resource HTTP Basic Authentication.
pub struct BasicAuthGate<'a> {
    repository: &'a dyn ContentRepository,
    principals: &'a dyn PrincipalStore,
    expander: &'a dyn TemplateExpander,
}

impl<'a> BasicAuthGate<'a> {
    pub fn new(
        repository: &'a dyn ContentRepository,
        principals: &'a dyn PrincipalStore,
        expander: &'a dyn TemplateExpander,
    ) -> Self {
        Self {
            repository,
            principals,
            expander,
        }
    }

    /// Looks for a protected page or file at `path` and, if there is one,
    /// checks the `Authorization` header against it.
    pub fn check_and_resolve(
        &self,
        path: &str,
        authorization: Option<&str>,
        ctx: &RenderContext,
    ) -> Result<GateOutcome, RepositoryError> {
        match self.find_protected(path)? {
            Some(resource) => Ok(self.authenticate(&resource, authorization, ctx)),
            None => Ok(GateOutcome::NoBasicAuth),
        }
    }

    pub fn authenticate(
        &self,
        resource: &Resource,
        authorization: Option<&str>,
        ctx: &RenderContext,
    ) -> GateOutcome {
        let realm = self.realm(resource, ctx);
        let Some((username, password)) = authorization.and_then(parse_basic_credentials) else {
            return GateOutcome::MustAuthenticate { realm };
        };

        let user = match self.principals.verify_credentials(&username, &password) {
            Ok(Some(user)) => user,
            Ok(None) => {
                log::info!("Basic auth failed for '{}' on {}", username, resource.name);
                return GateOutcome::MustAuthenticate { realm };
            }
            Err(err) => {
                log::info!(
                    "Basic auth check errored for '{}' on {}: {}",
                    username,
                    resource.name,
                    err
                );
                return GateOutcome::MustAuthenticate { realm };
            }
        };

        let security = SecurityContext::for_user(user);
        match self.repository.find_by_id(&security, &resource.id) {
            Ok(Some(rescoped)) => GateOutcome::Authenticated {
                security,
                resource: rescoped,
            },
            Ok(None) => {
                log::info!(
                    "'{}' authenticated but may not see {}",
                    username,
                    resource.name
                );
                GateOutcome::MustAuthenticate { realm }
            }
            Err(err) => {
                log::error!("Failed to re-resolve {}: {}", resource.id, err);
                GateOutcome::MustAuthenticate { realm }
            }
        }
    }

    /// The configured realm with placeholders expanded, else the resource name.
    pub fn realm(&self, resource: &Resource, ctx: &RenderContext) -> String {
        match resource
            .basic_auth_realm
            .as_deref()
            .filter(|realm| !realm.trim().is_empty())
        {
            Some(raw) => self.expander.expand(ctx, resource, raw),
            None => resource.name.clone(),
        }
    }

    fn find_protected(&self, path: &str) -> Result<Option<Arc<Resource>>, RepositoryError> {
        let superuser = SecurityContext::superuser();
        let mut paths = vec![path];
        if path.len() > 1
            && let Some(stripped) = path.strip_suffix('/')
        {
            paths.push(stripped);
        }

        let mut queries = Vec::new();
        for candidate in &paths {
            queries.push(ResourceQuery::pages().path(candidate));
            let name = last_segment(candidate);
            if !name.is_empty() {
                queries.push(ResourceQuery::pages().name(name));
            }
        }
        queries.push(ResourceQuery::files().path(path));
        let name = last_segment(path);
        if !name.is_empty() {
            queries.push(ResourceQuery::files().name(name));
        }

        for query in &queries {
            let found = self.repository.find(&superuser, query)?;
            if let Some(resource) = found.into_iter().find(|r| r.enable_basic_auth) {
                return Ok(Some(resource));
            }
        }
        Ok(None)
    }
}

/// Decodes `Basic <base64(user:pass)>`.
pub fn parse_basic_credentials(header: &str) -> Option<(String, String)> {
    let (scheme, encoded) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    if username.is_empty() {
        return None;
    }
    Some((username.to_string(), password.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::MemoryRepository;
    use crate::iam::{MemoryPrincipalStore, User, hash_password};
    use crate::render::{EditMode, PlaceholderExpander, RequestInfo};
    use std::path::Path;

    const CONTENT: &str = r#"
resources:
  - id: "00000000000000000000000000000001"
    type: page
    name: vault
    path: /vault
    enable_basic_auth: true
    basic_auth_realm: 'Vault "${name}"'
    visible_to_public_users: false
    visible_to_authenticated_users: true
    private_properties:
      secret: hidden
  - id: "00000000000000000000000000000002"
    type: file
    name: report.pdf
    enable_basic_auth: true
  - id: "00000000000000000000000000000003"
    type: page
    name: open
    path: /open
"#;

    fn fixtures() -> (MemoryRepository, MemoryPrincipalStore) {
        let repository =
            MemoryRepository::from_yaml_str(CONTENT, Path::new("/nonexistent")).expect("content");
        let principals = MemoryPrincipalStore::from_users(vec![User {
            name: "alice".to_string(),
            email: None,
            password_hash: hash_password("wonderland").expect("hash"),
            confirmation_key: None,
        }]);
        (repository, principals)
    }

    fn ctx() -> RenderContext {
        RenderContext::new(
            SecurityContext::anonymous(),
            EditMode::None,
            RequestInfo::default(),
        )
    }

    fn basic(user: &str, password: &str) -> String {
        format!("Basic {}", STANDARD.encode(format!("{}:{}", user, password)))
    }

    #[test]
    fn unprotected_paths_pass_through() {
        let (repository, principals) = fixtures();
        let expander = PlaceholderExpander::new();
        let gate = BasicAuthGate::new(&repository, &principals, &expander);
        let outcome = gate.check_and_resolve("/open", None, &ctx()).expect("gate");
        assert!(matches!(outcome, GateOutcome::NoBasicAuth));
    }

    #[test]
    fn missing_credentials_yield_expanded_realm() {
        let (repository, principals) = fixtures();
        let expander = PlaceholderExpander::new();
        let gate = BasicAuthGate::new(&repository, &principals, &expander);
        match gate.check_and_resolve("/vault", None, &ctx()).expect("gate") {
            GateOutcome::MustAuthenticate { realm } => assert_eq!(realm, r#"Vault "vault""#),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn realm_defaults_to_name_and_files_are_gated_by_name() {
        let (repository, principals) = fixtures();
        let expander = PlaceholderExpander::new();
        let gate = BasicAuthGate::new(&repository, &principals, &expander);
        let outcome = gate
            .check_and_resolve("/report.pdf", Some(&basic("alice", "nope")), &ctx())
            .expect("gate");
        match outcome {
            GateOutcome::MustAuthenticate { realm } => assert_eq!(realm, "report.pdf"),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn valid_credentials_rescope_the_resource() {
        let (repository, principals) = fixtures();
        let expander = PlaceholderExpander::new();
        let gate = BasicAuthGate::new(&repository, &principals, &expander);
        let header = basic("alice", "wonderland");
        match gate.check_and_resolve("/vault", Some(&header), &ctx()).expect("gate") {
            GateOutcome::Authenticated { security, resource } => {
                assert_eq!(security.principal().map(|u| u.name.as_str()), Some("alice"));
                assert!(!security.is_superuser());
                assert_eq!(resource.name, "vault");
                assert!(resource.property("secret").is_none());
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn trailing_slash_is_still_gated() {
        let (repository, principals) = fixtures();
        let expander = PlaceholderExpander::new();
        let gate = BasicAuthGate::new(&repository, &principals, &expander);
        let outcome = gate.check_and_resolve("/vault/", None, &ctx()).expect("gate");
        assert!(matches!(outcome, GateOutcome::MustAuthenticate { .. }));
    }

    #[test]
    fn credential_parsing() {
        assert_eq!(
            parse_basic_credentials(&basic("bob", "a:b")),
            Some(("bob".to_string(), "a:b".to_string()))
        );
        assert_eq!(parse_basic_credentials("Bearer abc"), None);
        assert_eq!(parse_basic_credentials("Basic !!!"), None);
        assert_eq!(parse_basic_credentials(&basic("", "x")), None);
    }
}
