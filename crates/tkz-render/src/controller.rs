//! Element lifecycle orchestration.
//!
//! Drives each discovered element through parse → fingerprint → cache
//! probe → render → post-process → notify. Cache hits resolve immediately
//! without touching the engine. Misses get a placeholder and are rendered
//! as one batch behind a [`RenderQueue`] ticket, so concurrently
//! discovered batches never interleave on the shared engine instance.

use std::sync::Arc;

use tkz_cache::RenderCache;
use tkz_engine::{EngineError, EngineHandle, TexOptions};

use crate::assemble::assemble;
use crate::discovery::{DiscoveryReceiver, RenderableElement};
use crate::events::{ElementId, PageSink, RenderFinished};
use crate::fingerprint::{Fingerprint, fingerprint};
use crate::fonts::FontProvider;
use crate::options::ElementOptions;
use crate::postprocess::{PostprocessOptions, postprocess};
use crate::queue::RenderQueue;

/// A cache miss waiting for its turn on the engine.
struct PendingRender {
    id: ElementId,
    text: String,
    options: ElementOptions,
    hash: Fingerprint,
}

struct Shared {
    engine: EngineHandle,
    sink: Arc<dyn PageSink>,
    cache: Arc<dyn RenderCache>,
    fonts: Option<Arc<dyn FontProvider>>,
}

/// Orchestrates rendering for discovered elements.
pub struct RenderController {
    shared: Arc<Shared>,
    queue: RenderQueue,
}

impl RenderController {
    #[must_use]
    pub fn new(
        engine: EngineHandle,
        sink: Arc<dyn PageSink>,
        cache: Arc<dyn RenderCache>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                engine,
                sink,
                cache,
                fonts: None,
            }),
            queue: RenderQueue::new(),
        }
    }

    #[must_use]
    pub fn with_fonts(
        engine: EngineHandle,
        sink: Arc<dyn PageSink>,
        cache: Arc<dyn RenderCache>,
        fonts: Arc<dyn FontProvider>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                engine,
                sink,
                cache,
                fonts: Some(fonts),
            }),
            queue: RenderQueue::new(),
        }
    }

    /// Consume discovery batches until the channel closes.
    pub async fn run(self, mut elements: DiscoveryReceiver) {
        while let Some(batch) = elements.next_batch().await {
            tracing::debug!("processing batch of {} element(s)", batch.len());
            let _ = self.process_batch(batch);
        }
        tracing::debug!("discovery channel closed, render loop exiting");
    }

    /// Handle one batch of discovered elements.
    ///
    /// Cache hits resolve before this returns. Misses are queued behind
    /// earlier batches; the returned handle completes when every miss in
    /// this batch reached a terminal state. `None` means the whole batch
    /// was served from cache.
    pub fn process_batch(
        &self,
        elements: Vec<RenderableElement>,
    ) -> Option<tokio::task::JoinHandle<()>> {
        let shared = &self.shared;
        let mut pending = Vec::new();

        for element in elements {
            let options = ElementOptions::from_attrs(&element.attrs);
            let hash = fingerprint(&options, &element.text);

            if !options.no_cache
                && let Some(markup) = shared.cache.get(hash.as_str())
            {
                tracing::debug!("cache hit for {} ({})", element.id, hash.short());
                shared.sink.resolve(element.id, &markup);
                shared.sink.element_loaded(element.id);
                continue;
            }

            shared
                .sink
                .show_placeholder(element.id, options.width(), options.height());
            pending.push(PendingRender {
                id: element.id,
                text: element.text,
                options,
                hash,
            });
        }

        if pending.is_empty() {
            return None;
        }

        // Claim the queue slot before spawning so batch order matches
        // discovery order even when tasks start out of order.
        let mut ticket = self.queue.enqueue();
        let shared = Arc::clone(shared);
        Some(tokio::spawn(async move {
            ticket.wait().await;
            for item in pending {
                shared.render_one(item).await;
            }
        }))
    }
}

impl Shared {
    async fn render_one(&self, item: PendingRender) {
        // A previous batch (or an identical element earlier in this one)
        // may have produced this exact output while we waited.
        if !item.options.no_cache
            && let Some(markup) = self.cache.get(item.hash.as_str())
        {
            tracing::debug!("cache hit after wait for {} ({})", item.id, item.hash.short());
            self.finish_success(item.id, &markup);
            return;
        }

        let document = assemble(&item.text, &item.options);
        let tex_options = TexOptions {
            show_console: item.options.show_console,
        };

        match self.engine.texify(&document, &tex_options).await {
            Ok(raw) => {
                let post = PostprocessOptions {
                    compose_pages: true,
                    embed_fonts: item.options.embed_fonts,
                    aria_label: item.options.aria_label.clone(),
                };
                // Cache-bypassing duplicates each render independently, so
                // they need distinct namespacing tokens to coexist on one
                // page. Cached output keeps the plain fingerprint.
                let ns_hash = if item.options.no_cache {
                    item.hash.salted(&item.id.to_string())
                } else {
                    item.hash.clone()
                };
                let markup = match self.run_postprocess(raw, ns_hash, post).await {
                    Some(markup) => markup,
                    None => return,
                };

                if !item.options.no_cache
                    && let Err(e) = self.cache.put(item.hash.as_str(), &markup)
                {
                    tracing::warn!("failed to cache render {}: {e}", item.hash.short());
                }
                self.finish_success(item.id, &markup);
            }
            Err(EngineError::Render { log }) => {
                tracing::error!("render failed for {}: {log}", item.id);
                self.sink.show_broken(item.id);
                self.sink
                    .render_finished(item.id, RenderFinished::error(log));
            }
            // Engine never came up or is gone; the placeholder stays so a
            // later recovery could still pick the element up.
            Err(e @ (EngineError::Unavailable(_) | EngineError::WorkerGone)) => {
                tracing::warn!("engine unavailable, {} stays on placeholder: {e}", item.id);
            }
        }
    }

    /// Post-process raw engine output into final markup.
    ///
    /// Font embedding does blocking HTTP or disk reads, so that variant
    /// runs on the blocking pool instead of a runtime worker. Returns
    /// `None` only if the blocking task itself died.
    async fn run_postprocess(
        &self,
        raw: String,
        hash: Fingerprint,
        post: PostprocessOptions,
    ) -> Option<String> {
        match &self.fonts {
            Some(provider) if post.embed_fonts => {
                let provider = Arc::clone(provider);
                let task = tokio::task::spawn_blocking(move || {
                    postprocess(&raw, &hash, &post, Some(provider.as_ref()))
                });
                match task.await {
                    Ok(markup) => Some(markup),
                    Err(e) => {
                        tracing::error!("post-processing task failed: {e}");
                        None
                    }
                }
            }
            _ => Some(postprocess(&raw, &hash, &post, None)),
        }
    }

    fn finish_success(&self, id: ElementId, markup: &str) {
        self.sink.resolve(id, markup);
        self.sink.element_loaded(id);
        self.sink.render_finished(id, RenderFinished::success());
    }
}
