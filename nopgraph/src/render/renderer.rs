// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use super::context::{RenderContext, RenderError};
use super::expander::TemplateExpander;
use crate::content::{ContentRepository, Resource};
use std::sync::Arc;

pub const MAX_RENDER_DEPTH: usize = 64;

/// Walks a content tree, appending output to the context.
pub trait TreeRenderer: Send + Sync {
    fn render(
        &self,
        resource: &Resource,
        ctx: &mut RenderContext,
        depth: usize,
    ) -> Result<(), RenderError>;
}

/// Depth-first renderer: a resource's expanded `content`, then each child in order.
pub struct TemplateTreeRenderer {
    repository: Arc<dyn ContentRepository>,
    expander: Arc<dyn TemplateExpander>,
}

impl TemplateTreeRenderer {
    pub fn new(
        repository: Arc<dyn ContentRepository>,
        expander: Arc<dyn TemplateExpander>,
    ) -> Self {
        Self {
            repository,
            expander,
        }
    }
}

impl TreeRenderer for TemplateTreeRenderer {
    fn render(
        &self,
        resource: &Resource,
        ctx: &mut RenderContext,
        depth: usize,
    ) -> Result<(), RenderError> {
        if depth > MAX_RENDER_DEPTH {
            return Err(RenderError::DepthExceeded(depth));
        }
        if resource.is_file() {
            return Ok(());
        }

        if let Some(content) = resource.content.as_deref() {
            let expanded = self.expander.expand(ctx, resource, content);
            ctx.append(&expanded)?;
        }

        for child_id in &resource.children {
            // Children are looked up in the caller's scope; hidden ones are skipped.
            match self.repository.find_by_id(&ctx.security, child_id)? {
                Some(child) => self.render(&child, ctx, depth + 1)?,
                None => log::debug!(
                    "Skipping child {} of {}: not visible in this scope",
                    child_id,
                    resource.id
                ),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{MemoryRepository, ResourceId};
    use crate::iam::SecurityContext;
    use crate::render::context::{EditMode, RequestInfo};
    use crate::render::expander::PlaceholderExpander;
    use std::path::Path;

    const TREE: &str = r#"
resources:
  - id: "0000000000000000000000000000000a"
    type: page
    name: root
    content: "<main>"
    children: ["0000000000000000000000000000000b", "0000000000000000000000000000000c", "0000000000000000000000000000000d"]
  - id: "0000000000000000000000000000000b"
    type: partial
    name: intro
    content: "[${name}]"
  - id: "0000000000000000000000000000000c"
    type: partial
    name: hidden
    visible_to_public_users: false
    content: "SECRET"
  - id: "0000000000000000000000000000000d"
    type: partial
    name: outro
    content: "</main>"
  - id: "0000000000000000000000000000000e"
    type: partial
    name: loop
    content: "x"
    children: ["0000000000000000000000000000000e"]
"#;

    fn fixture() -> (Arc<MemoryRepository>, TemplateTreeRenderer) {
        let repo = Arc::new(
            MemoryRepository::from_yaml_str(TREE, Path::new("/nonexistent")).expect("repo"),
        );
        let renderer = TemplateTreeRenderer::new(repo.clone(), Arc::new(PlaceholderExpander));
        (repo, renderer)
    }

    fn anonymous_context() -> RenderContext {
        RenderContext::new(
            SecurityContext::anonymous(),
            EditMode::None,
            RequestInfo::default(),
        )
    }

    fn id(hex: &str) -> ResourceId {
        ResourceId::parse(hex).expect("id")
    }

    #[test]
    fn renders_children_in_order_and_skips_hidden() {
        let (repo, renderer) = fixture();
        let root = repo
            .find_by_id(
                &SecurityContext::anonymous(),
                &id("0000000000000000000000000000000a"),
            )
            .expect("lookup")
            .expect("root");
        let mut ctx = anonymous_context();
        renderer.render(&root, &mut ctx, 0).expect("render");
        assert_eq!(ctx.take_buffer(), "<main>[intro]</main>");
    }

    #[test]
    fn cycles_hit_the_depth_limit() {
        let (repo, renderer) = fixture();
        let looping = repo
            .find_by_id(
                &SecurityContext::anonymous(),
                &id("0000000000000000000000000000000e"),
            )
            .expect("lookup")
            .expect("loop");
        let mut ctx = anonymous_context();
        let err = renderer
            .render(&looping, &mut ctx, 0)
            .expect_err("depth limit");
        assert!(matches!(err, RenderError::DepthExceeded(_)));
    }
}
