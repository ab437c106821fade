// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

//! Maps a request path to the resource that answers it.
//!
//! Strategies run in a fixed order and the first hit wins:
//! UUID partial, dynamic route, page by path or name, the same without a
//! trailing slash, file lookup, segment fallback, then the index page.

use crate::content::{
    ContentRepository, RepositoryError, RequestHost, Resource, ResourceId, ResourceQuery,
    is_uuid_shaped,
};
use crate::iam::SecurityContext;
use crate::render::EditMode;
use std::collections::BTreeMap;
use std::sync::Arc;

pub struct ResolveRequest<'a> {
    /// Percent-decoded path, always starting with `/`.
    pub path: &'a str,
    /// Path as received on the wire; dynamic routes bind against it.
    pub raw_path: &'a str,
    pub query_string: &'a str,
    pub host: &'a RequestHost,
    pub edit_mode: EditMode,
    pub security: &'a SecurityContext,
}

#[derive(Debug, Clone)]
pub struct Resolution {
    pub resource: Arc<Resource>,
    /// Detail object for `/<page>/<object>` requests.
    pub data_node: Option<Arc<Resource>>,
    pub partial: bool,
    /// Matched through a route template; the response must not be cached.
    pub dynamic: bool,
    pub route_params: BTreeMap<String, String>,
}

impl Resolution {
    pub fn new(resource: Arc<Resource>) -> Self {
        Self {
            resource,
            data_node: None,
            partial: false,
            dynamic: false,
            route_params: BTreeMap::new(),
        }
    }

    fn partial(resource: Arc<Resource>) -> Self {
        Self {
            partial: true,
            ..Self::new(resource)
        }
    }
}

pub struct PathResolver<'a> {
    repository: &'a dyn ContentRepository,
}

impl<'a> PathResolver<'a> {
    pub fn new(repository: &'a dyn ContentRepository) -> Self {
        Self { repository }
    }

    pub fn resolve(&self, req: &ResolveRequest<'_>) -> Result<Option<Resolution>, RepositoryError> {
        let segments = segments(req.path);

        if let Some(resolution) = self.uuid_partial(req, &segments)? {
            return Ok(Some(resolution));
        }
        if let Some(resolution) = self.dynamic_route(req)? {
            return Ok(Some(resolution));
        }
        if let Some(page) = self.page_by_path_or_name(req, req.path)? {
            return Ok(Some(Resolution::new(page)));
        }
        if req.path.len() > 1
            && let Some(stripped) = req.path.strip_suffix('/')
            && let Some(page) = self.page_by_path_or_name(req, stripped)?
        {
            return Ok(Some(Resolution::new(page)));
        }
        if !segments.is_empty()
            && let Some(file) = self.file(req, &segments)?
        {
            return Ok(Some(Resolution::new(file)));
        }
        if let Some(resolution) = self.segment_fallback(req, &segments)? {
            return Ok(Some(resolution));
        }
        if segments.is_empty() {
            return Ok(self.index_page(req)?.map(Resolution::new));
        }

        log::debug!("No resource resolves {}", req.path);
        Ok(None)
    }

    fn uuid_partial(
        &self,
        req: &ResolveRequest<'_>,
        segments: &[&str],
    ) -> Result<Option<Resolution>, RepositoryError> {
        let [segment] = segments else {
            return Ok(None);
        };
        let Some(id) = ResourceId::parse(segment) else {
            return Ok(None);
        };
        Ok(self
            .repository
            .find_by_id(req.security, &id)?
            .filter(|resource| resource.is_partial())
            .map(Resolution::partial))
    }

    fn dynamic_route(&self, req: &ResolveRequest<'_>) -> Result<Option<Resolution>, RepositoryError> {
        let pages = self
            .repository
            .find(req.security, &ResourceQuery::pages().with_routes())?;
        for page in pages {
            if !site_allows(req, &page) {
                continue;
            }
            let bound = page.routes().iter().find_map(|route| route.bind(req.raw_path));
            if let Some(route_params) = bound {
                log::debug!("{} matched a route of page {}", req.path, page.id);
                return Ok(Some(Resolution {
                    dynamic: true,
                    route_params,
                    ..Resolution::new(page)
                }));
            }
        }
        Ok(None)
    }

    /// Pages whose explicit path equals `path`, or which have no path and a
    /// name equal to the last segment. Path matches win.
    fn page_by_path_or_name(
        &self,
        req: &ResolveRequest<'_>,
        path: &str,
    ) -> Result<Option<Arc<Resource>>, RepositoryError> {
        let by_path = self
            .repository
            .find(req.security, &ResourceQuery::pages().path(path))?;
        if let Some(page) = by_path.into_iter().find(|p| site_allows(req, p)) {
            return Ok(Some(page));
        }

        let name = last_segment(path);
        if name.trim().is_empty() {
            return Ok(None);
        }
        let by_name = self
            .repository
            .find(req.security, &ResourceQuery::pages().name(name))?;
        Ok(by_name
            .into_iter()
            .filter(|p| p.explicit_path().is_none() && !p.has_blank_name())
            .find(|p| site_allows(req, p)))
    }

    fn file(
        &self,
        req: &ResolveRequest<'_>,
        segments: &[&str],
    ) -> Result<Option<Arc<Resource>>, RepositoryError> {
        let mut candidates = vec![req.path.to_string()];
        if !req.query_string.is_empty() {
            candidates.push(format!("{}?{}", req.path, req.query_string));
        }
        if req.path.contains(' ') {
            candidates.push(req.path.replace(' ', "+"));
            candidates.push(req.path.replace(' ', "%20"));
        }

        for candidate in &candidates {
            let found = self
                .repository
                .find(req.security, &ResourceQuery::files().path(candidate))?;
            if let Some(file) = found.into_iter().find(|f| site_allows(req, f)) {
                return Ok(Some(file));
            }
        }

        let [segment] = segments else {
            return Ok(None);
        };
        if let Some(id) = ResourceId::parse(segment) {
            return Ok(self
                .repository
                .find_by_id(req.security, &id)?
                .filter(|r| r.is_file() && site_allows(req, r)));
        }
        let by_name = self
            .repository
            .find(req.security, &ResourceQuery::files().name(segment))?;
        Ok(by_name.into_iter().find(|f| site_allows(req, f)))
    }

    fn segment_fallback(
        &self,
        req: &ResolveRequest<'_>,
        segments: &[&str],
    ) -> Result<Option<Resolution>, RepositoryError> {
        match segments {
            [] => Ok(None),
            [segment] if !is_uuid_shaped(segment) => Ok(self
                .repository
                .find_first(req.security, &ResourceQuery::partials().name(segment))?
                .map(Resolution::partial)),
            [segment] => {
                let Some(id) = ResourceId::parse(segment) else {
                    return Ok(None);
                };
                let found = self
                    .repository
                    .find_by_id(req.security, &id)?
                    .filter(|r| r.is_renderable() && site_allows(req, r));
                Ok(found.map(|resource| {
                    if resource.is_partial() {
                        Resolution::partial(resource)
                    } else {
                        Resolution::new(resource)
                    }
                }))
            }
            [parents @ .., detail] => {
                let Some(parent) = self.detail_parent(req, parents)? else {
                    return Ok(None);
                };
                let Some(data_node) = self.detail_object(req, detail)? else {
                    log::debug!("{}: no detail object named {}", req.path, detail);
                    return Ok(None);
                };
                Ok(Some(Resolution {
                    data_node: Some(data_node),
                    ..Resolution::new(parent)
                }))
            }
        }
    }

    fn detail_parent(
        &self,
        req: &ResolveRequest<'_>,
        parents: &[&str],
    ) -> Result<Option<Arc<Resource>>, RepositoryError> {
        if let [.., last] = parents
            && let Some(id) = ResourceId::parse(last)
        {
            return Ok(self
                .repository
                .find_by_id(req.security, &id)?
                .filter(|r| r.is_page() && site_allows(req, r)));
        }
        let parent_path = format!("/{}", parents.join("/"));
        self.page_by_path_or_name(req, &parent_path)
    }

    fn detail_object(
        &self,
        req: &ResolveRequest<'_>,
        detail: &str,
    ) -> Result<Option<Arc<Resource>>, RepositoryError> {
        if let Some(id) = ResourceId::parse(detail) {
            return self.repository.find_by_id(req.security, &id);
        }
        self.repository
            .find_first(req.security, &ResourceQuery::any().name(detail))
    }

    /// Lowest-positioned page the request may see. Basic-Auth pages count as
    /// visible when authenticated users may see them; the gate handles them.
    fn index_page(&self, req: &ResolveRequest<'_>) -> Result<Option<Arc<Resource>>, RepositoryError> {
        let candidates = self.repository.find(
            &SecurityContext::superuser(),
            &ResourceQuery::pages().positioned(),
        )?;
        for page in candidates {
            if req.edit_mode == EditMode::Content
                || (page.is_visible_for_site(req.host)
                    && self.repository.is_visible(req.security, &page))
            {
                return self.repository.find_by_id(req.security, &page.id);
            }
            if page.enable_basic_auth && page.visible_to_authenticated_users {
                return Ok(Some(page));
            }
        }
        Ok(None)
    }
}

fn site_allows(req: &ResolveRequest<'_>, resource: &Resource) -> bool {
    req.edit_mode == EditMode::Content || resource.is_visible_for_site(req.host)
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Text after the final `/`; blank for paths ending in a slash.
pub(crate) fn last_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or("")
}
