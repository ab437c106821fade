// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use super::context::{RenderContext, RenderError, RequestInfo};
use super::pool::RenderPool;
use super::queue::{Fragment, FragmentQueue, StreamStart};
use super::registry::{StreamRegistration, StreamRegistry};
use super::renderer::TreeRenderer;
use crate::config::RenderingConfig;
use crate::content::Resource;
use crate::util::next_connection_id;
use actix_web::web::Bytes;
use futures_util::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Turns a resolved content tree into a response body, either fully buffered
/// or streamed fragment by fragment while the tree is still being walked.
pub struct RenderPipeline {
    renderer: Arc<dyn TreeRenderer>,
    pool: RenderPool,
    registry: Arc<StreamRegistry>,
    async_enabled: bool,
}

impl RenderPipeline {
    pub fn new(
        renderer: Arc<dyn TreeRenderer>,
        config: &RenderingConfig,
        registry: Arc<StreamRegistry>,
    ) -> Self {
        Self {
            renderer,
            pool: RenderPool::new(config.render_workers),
            registry,
            async_enabled: config.async_enabled,
        }
    }

    pub fn registry(&self) -> &Arc<StreamRegistry> {
        &self.registry
    }

    /// Raw-output pages are always buffered.
    pub fn use_streaming(&self, root: &Resource) -> bool {
        self.async_enabled && !root.raw_output()
    }

    pub async fn render_buffered(
        &self,
        root: Arc<Resource>,
        mut ctx: RenderContext,
    ) -> Result<String, RenderError> {
        let renderer = self.renderer.clone();
        let request = ctx.request.clone();
        let outcome = self
            .pool
            .run("render", move || {
                renderer.render(&root, &mut ctx, 0)?;
                Ok(ctx.take_buffer())
            })
            .await;
        match outcome {
            Ok(result) => result,
            Err(err) => {
                log::error!("Render task for {} aborted: {}", request, err);
                Err(RenderError::Failed(err.to_string()))
            }
        }
    }

    /// Starts the tree walk on the render pool and returns a body that yields
    /// fragments in the order they were produced.
    ///
    /// Resolves once the first fragment exists or the walk has ended. A walk
    /// that fails before producing anything is returned as `Err` so the caller
    /// can still answer with a 500.
    pub async fn render_streaming(
        &self,
        root: Arc<Resource>,
        mut ctx: RenderContext,
    ) -> Result<RenderBody, RenderError> {
        let queue = Arc::new(FragmentQueue::new());
        ctx.stream_into(queue.clone());

        let request = ctx.request.clone();
        let registration = self
            .registry
            .register(next_connection_id(), request.to_string());
        log::debug!(
            "Streaming render {} opened for {}",
            registration.connection_id(),
            request
        );

        let renderer = self.renderer.clone();
        let pool = self.pool.clone();
        let producer = queue.clone();
        let producer_request = request.clone();
        tokio::spawn(async move {
            let outcome = pool
                .run("render", move || renderer.render(&root, &mut ctx, 0))
                .await;
            match outcome {
                Ok(Ok(())) => producer.finish(),
                Ok(Err(RenderError::Disconnected)) => {
                    log::debug!("Render for {} stopped: client went away", producer_request);
                    producer.finish();
                }
                Ok(Err(err)) => {
                    log::error!("Render failed for {}: {}", producer_request, err);
                    producer.fail();
                }
                Err(err) => {
                    log::error!("Render task for {} aborted: {}", producer_request, err);
                    producer.fail();
                }
            }
        });

        let body = RenderBody {
            queue: queue.clone(),
            request,
            _registration: registration,
            done: false,
        };
        match queue.started().await {
            StreamStart::Ready => Ok(body),
            StreamStart::Failed => Err(RenderError::Failed(
                "render failed before any output".to_string(),
            )),
        }
    }
}

/// Response body fed by a [`FragmentQueue`].
///
/// Dropping the body (normally because the client disconnected) closes the
/// queue so the producer stops at its next append, and removes the stream
/// from the registry.
pub struct RenderBody {
    queue: Arc<FragmentQueue>,
    request: RequestInfo,
    _registration: StreamRegistration,
    done: bool,
}

impl Stream for RenderBody {
    type Item = Result<Bytes, RenderError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }
        match self.queue.poll_fragment(cx) {
            Poll::Ready(Fragment::Data(bytes)) => Poll::Ready(Some(Ok(bytes))),
            Poll::Ready(Fragment::End) => {
                self.done = true;
                Poll::Ready(None)
            }
            Poll::Ready(Fragment::Failed) => {
                self.done = true;
                Poll::Ready(Some(Err(RenderError::Failed(
                    "render failed after the response was committed".to_string(),
                ))))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for RenderBody {
    fn drop(&mut self) {
        if !self.queue.is_finished() {
            log::debug!("Stream closed before render completed: {}", self.request);
        }
        self.queue.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{ResourceId, ResourceKind};
    use crate::iam::SecurityContext;
    use crate::render::context::EditMode;
    use futures_util::StreamExt;
    use std::collections::BTreeMap;
    use std::time::Duration;

    struct ScriptedRenderer {
        fragments: Vec<&'static str>,
        delay: Duration,
        fail_after: Option<usize>,
    }

    impl TreeRenderer for ScriptedRenderer {
        fn render(
            &self,
            _resource: &Resource,
            ctx: &mut RenderContext,
            _depth: usize,
        ) -> Result<(), RenderError> {
            for (index, fragment) in self.fragments.iter().enumerate() {
                if self.fail_after == Some(index) {
                    return Err(RenderError::Failed("scripted".to_string()));
                }
                std::thread::sleep(self.delay);
                ctx.append(fragment)?;
            }
            if self.fail_after == Some(self.fragments.len()) {
                return Err(RenderError::Failed("scripted".to_string()));
            }
            Ok(())
        }
    }

    fn page(raw_output: bool) -> Arc<Resource> {
        Arc::new(Resource {
            id: ResourceId::generate(),
            kind: ResourceKind::Page {
                position: None,
                show_on_error_codes: Vec::new(),
                raw_output,
                routes: Vec::new(),
            },
            name: "page".to_string(),
            path: None,
            content_type: None,
            last_modified: None,
            cache_for_seconds: None,
            dont_cache: false,
            enable_basic_auth: false,
            basic_auth_realm: None,
            sites: Vec::new(),
            visible_to_public_users: true,
            visible_to_authenticated_users: false,
            content: None,
            children: Vec::new(),
            properties: BTreeMap::new(),
        })
    }

    fn pipeline(renderer: ScriptedRenderer) -> RenderPipeline {
        RenderPipeline::new(
            Arc::new(renderer),
            &RenderingConfig {
                async_enabled: true,
                render_workers: 2,
            },
            Arc::new(StreamRegistry::new()),
        )
    }

    fn context() -> RenderContext {
        RenderContext::new(
            SecurityContext::anonymous(),
            EditMode::None,
            RequestInfo::default(),
        )
    }

    async fn collect(mut body: RenderBody) -> (Vec<u8>, bool) {
        let mut bytes = Vec::new();
        let mut failed = false;
        while let Some(item) = body.next().await {
            match item {
                Ok(chunk) => bytes.extend_from_slice(&chunk),
                Err(_) => failed = true,
            }
        }
        (bytes, failed)
    }

    #[tokio::test]
    async fn streaming_preserves_fragment_order_under_delay() {
        let pipeline = pipeline(ScriptedRenderer {
            fragments: vec!["F1", "F2", "F3"],
            delay: Duration::from_millis(20),
            fail_after: None,
        });
        let body = pipeline
            .render_streaming(page(false), context())
            .await
            .expect("stream");
        assert_eq!(pipeline.registry().active(), 1);

        let (bytes, failed) = collect(body).await;
        assert_eq!(bytes, b"F1F2F3");
        assert!(!failed);
        assert_eq!(pipeline.registry().active(), 0);
    }

    #[tokio::test]
    async fn failure_before_output_is_an_error() {
        let pipeline = pipeline(ScriptedRenderer {
            fragments: vec!["F1"],
            delay: Duration::ZERO,
            fail_after: Some(0),
        });
        let result = pipeline.render_streaming(page(false), context()).await;
        assert!(result.is_err());
        assert_eq!(pipeline.registry().active(), 0);
    }

    #[tokio::test]
    async fn failure_after_output_terminates_the_stream() {
        let pipeline = pipeline(ScriptedRenderer {
            fragments: vec!["F1"],
            delay: Duration::ZERO,
            fail_after: Some(1),
        });
        // The failure may land before or after the body is handed out.
        match pipeline.render_streaming(page(false), context()).await {
            Ok(body) => {
                let (bytes, failed) = collect(body).await;
                assert!(failed);
                assert!(bytes.is_empty() || bytes == b"F1");
            }
            Err(err) => assert!(matches!(err, RenderError::Failed(_))),
        }
        assert_eq!(pipeline.registry().active(), 0);
    }

    #[tokio::test]
    async fn buffered_render_returns_whole_output() {
        let pipeline = pipeline(ScriptedRenderer {
            fragments: vec!["a", "b"],
            delay: Duration::ZERO,
            fail_after: None,
        });
        let html = pipeline
            .render_buffered(page(true), context())
            .await
            .expect("render");
        assert_eq!(html, "ab");
    }

    #[test]
    fn raw_output_pages_are_never_streamed() {
        let pipeline = pipeline(ScriptedRenderer {
            fragments: Vec::new(),
            delay: Duration::ZERO,
            fail_after: None,
        });
        assert!(pipeline.use_streaming(&page(false)));
        assert!(!pipeline.use_streaming(&page(true)));
    }
}
