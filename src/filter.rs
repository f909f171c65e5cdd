//! Streaming rewrite of one document
//!
//! [`InlinePreviewFilter`] consumes the event stream of a single document and
//! produces the rewritten markup window by window. Everything handed out by
//! [`InlinePreviewFilter::take_output`] is final; scripts are only ever
//! inserted into the window that has not been flushed yet.

use crate::capability::{Capability, CapabilityOracle};
use crate::classify::{classify, ElementKind};
use crate::config::RewriteConfig;
use crate::error::{Result, RewriteError};
use crate::logging::{
    HtmlApplication, LogSink, RewriterApplication, RewriterInfo, RewriterStats, DELAY_IMAGES_ID,
};
use crate::markup::{EndTag, Event, StartTag};
use crate::preview::ImageDataProvider;
use crate::resolver::{
    rewrite_for_lazyload, rewrite_with_preview, Decision, DocumentPolicy, ImageCandidateResolver,
    PreviewMode,
};
use crate::scripts::{ActivationCall, ScriptAssets, ScriptEmitter};
use crate::state::PreviewState;
use crate::tokenizer::tokenize;

/// External services a filter talks to
///
/// All of them may be shared between documents processed concurrently.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub oracle: &'a dyn CapabilityOracle,
    pub provider: &'a dyn ImageDataProvider,
    pub assets: &'a dyn ScriptAssets,
    pub log: &'a LogSink,
}

/// Output not yet handed to the caller
#[derive(Debug, Default)]
struct OutputBuffer {
    /// Flushed windows waiting to be taken
    committed: String,
    /// Current window, still open for script insertion
    window: String,
    /// Offset of the last `</body>` in `window`
    body_close: Option<usize>,
    /// Offset just past the last rewritten image in `window`
    rewritten_end: Option<usize>,
}

impl OutputBuffer {
    fn push(&mut self, text: &str) {
        self.window.push_str(text);
    }

    fn mark_body_close(&mut self) {
        self.body_close = Some(self.window.len());
    }

    fn mark_rewritten(&mut self) {
        self.rewritten_end = Some(self.window.len());
    }

    /// Place the window's closing scripts and hand the window over
    ///
    /// `trailer` goes before the last `</body>` (or at the end of the window),
    /// `scripts` right after the last rewritten image (or wherever the trailer
    /// goes). At a shared offset the trailer comes first. `tail` is appended
    /// after everything else.
    fn close(&mut self, trailer: &str, scripts: &str, tail: &str) {
        let end = self.body_close.unwrap_or(self.window.len());
        let after_image = self.rewritten_end.unwrap_or(end);

        if after_image == end {
            self.window.insert_str(end, &format!("{}{}", trailer, scripts));
        } else if after_image < end {
            self.window.insert_str(end, trailer);
            self.window.insert_str(after_image, scripts);
        } else {
            self.window.insert_str(after_image, scripts);
            self.window.insert_str(end, trailer);
        }
        self.window.push_str(tail);

        self.committed.push_str(&self.window);
        self.window.clear();
        self.body_close = None;
        self.rewritten_end = None;
    }
}

pub struct InlinePreviewFilter<'a> {
    document_url: String,
    config: &'a RewriteConfig,
    capability: Capability,
    status: HtmlApplication,
    resolver: ImageCandidateResolver<'a>,
    emitter: ScriptEmitter<'a>,
    log: &'a LogSink,
    state: PreviewState,
    output: OutputBuffer,
    noscript_depth: usize,
    finished: bool,
}

impl<'a> InlinePreviewFilter<'a> {
    /// Start a document
    ///
    /// The client is classified here, once, and the document statistics
    /// record is written right away.
    pub fn new(
        document_url: &str,
        user_agent: &str,
        config: &'a RewriteConfig,
        collaborators: Collaborators<'a>,
    ) -> Self {
        let (status, capability) = if config.preserve_urls {
            (HtmlApplication::NotApplied, Capability::unsupported())
        } else {
            match collaborators.oracle.capability_for(user_agent) {
                Ok(capability) if capability.supports_preview => {
                    (HtmlApplication::Active, capability)
                }
                Ok(capability) => (HtmlApplication::UserAgentNotSupported, capability),
                Err(e) => {
                    tracing::warn!(error = %e, user_agent = %user_agent, "Client classification failed");
                    (HtmlApplication::UserAgentNotSupported, Capability::unsupported())
                }
            }
        };

        collaborators.log.append_stats(RewriterStats {
            id: DELAY_IMAGES_ID.to_string(),
            html_status: status,
        });

        let policy = DocumentPolicy::new(config, &capability);
        tracing::debug!(
            url = %document_url,
            status = ?status,
            mode = ?policy.mode,
            mobile = capability.is_mobile_resize_class,
            "Starting document"
        );

        Self {
            document_url: document_url.to_string(),
            config,
            capability,
            status,
            resolver: ImageCandidateResolver::new(
                config,
                policy,
                collaborators.provider,
                collaborators.log,
            ),
            emitter: ScriptEmitter::new(collaborators.assets, config.debug),
            log: collaborators.log,
            state: PreviewState::new(),
            output: OutputBuffer::default(),
            noscript_depth: 0,
            finished: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == HtmlApplication::Active
    }

    pub fn capability(&self) -> &Capability {
        &self.capability
    }

    pub fn status(&self) -> HtmlApplication {
        self.status
    }

    /// Feed the next event of the document
    pub fn process(&mut self, event: Event) -> Result<()> {
        if self.finished {
            return Err(RewriteError::DocumentFinished);
        }

        match event {
            Event::StartTag(tag) => self.start_tag(tag),
            Event::EndTag(tag) => self.end_tag(tag),
            Event::Text(text) => self.output.push(&text),
            Event::Flush => self.close_window(false),
            Event::Finish => {
                self.close_window(true);
                self.finished = true;
            }
        }
        Ok(())
    }

    /// Take everything flushed since the previous call
    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output.committed)
    }

    fn start_tag(&mut self, tag: StartTag) {
        let kind = classify(&tag);
        if !self.is_active() {
            self.write_tag(&tag);
            return;
        }

        match kind {
            ElementKind::NoscriptBoundary => {
                if !tag.self_closing {
                    self.noscript_depth += 1;
                }
                self.write_tag(&tag);
            }
            kind if kind.is_image() && self.noscript_depth == 0 => self.image(tag),
            ElementKind::HeadBoundary => {
                self.write_tag(&tag);
                if self.config.defer_javascript && !self.state.head_bootstrap_emitted {
                    let mut script = String::new();
                    self.emitter.head_bootstrap(&mut script);
                    self.output.push(&script);
                    self.state.head_bootstrap_emitted = true;
                }
            }
            ElementKind::BodyBoundary => {
                self.write_tag(&tag);
                if !self.state.noscript_emitted {
                    let mut fallback = String::new();
                    self.emitter.noscript_fallback(&self.document_url, &mut fallback);
                    self.output.push(&fallback);
                    self.state.noscript_emitted = true;
                }
            }
            _ => self.write_tag(&tag),
        }
    }

    fn end_tag(&mut self, tag: EndTag) {
        if tag.is("noscript") {
            self.noscript_depth = self.noscript_depth.saturating_sub(1);
        } else if tag.is("body") {
            self.output.mark_body_close();
        }
        let mut text = String::new();
        tag.write_to(&mut text);
        self.output.push(&text);
    }

    fn image(&mut self, mut tag: StartTag) {
        match self.resolver.resolve(&tag, &mut self.state) {
            Decision::Rewritten {
                high_res_url,
                preview: Some(preview),
                mode,
            } => {
                let placeholder = if self.resolver.policy().lazyload_highres {
                    Some(self.emitter.blank_image_url())
                } else {
                    None
                };
                rewrite_with_preview(&mut tag, &preview, mode, placeholder);
                if mode == PreviewMode::Deferred {
                    self.state.register(&high_res_url, &preview);
                }
                self.write_tag(&tag);
                self.output.mark_rewritten();
                return;
            }
            Decision::LazyloadHandoff => {
                if !self.state.lazyload_bootstrap_emitted {
                    let mut script = String::new();
                    self.emitter.lazyload_bootstrap(&mut script);
                    self.output.push(&script);
                    self.state.lazyload_bootstrap_emitted = true;
                }
                rewrite_for_lazyload(&mut tag, self.emitter.blank_image_url());
            }
            Decision::Rewritten { preview: None, .. } | Decision::PassThrough => {}
        }
        self.write_tag(&tag);
    }

    fn write_tag(&mut self, tag: &StartTag) {
        let mut text = String::new();
        tag.write_to(&mut text);
        self.output.push(&text);
    }

    /// Emit the scripts due at a flush or at the end of the document
    fn close_window(&mut self, finishing: bool) {
        if !self.is_active() {
            self.output.close("", "", "");
            return;
        }

        let mut trailer = String::new();
        if finishing && self.state.lazyload_bootstrap_emitted {
            self.emitter.lazyload_trailer(&mut trailer);
        }

        let mut scripts = String::new();
        if !self.state.pending.is_empty() {
            if !self.state.bootstrap_emitted {
                self.emitter.inline_bootstrap(&mut scripts);
                self.state.bootstrap_emitted = true;
            }
            self.emitter
                .registration_block(&self.state.pending, &mut scripts);
            tracing::trace!(
                url = %self.document_url,
                registrations = self.state.pending.len(),
                "Emitting preview registrations"
            );
            self.log
                .append_info(RewriterInfo::delay_apply(RewriterApplication::AppliedOk));
            self.state.pending.clear();
            self.state.registrations_emitted = true;
        }

        if finishing && self.state.registrations_emitted && !self.state.defer_trailer_emitted {
            let call = if self.resolver.policy().lazyload_highres {
                ActivationCall::RegisterLazyLoadHighRes
            } else {
                ActivationCall::ReplaceWithHighRes
            };
            self.emitter.activation_block(call, &mut scripts);
            self.state.defer_trailer_emitted = true;
        }

        let mut loader = String::new();
        if finishing && self.config.defer_javascript {
            self.emitter.defer_loader(&mut loader);
        }

        self.output.close(&trailer, &scripts, &loader);
    }
}

/// Rewrite a document delivered in flush windows
///
/// Each window is tokenized separately; a `Flush` is fed between consecutive
/// windows and `Finish` after the last one.
pub fn rewrite_document(
    windows: &[&str],
    document_url: &str,
    user_agent: &str,
    config: &RewriteConfig,
    collaborators: Collaborators<'_>,
) -> Result<String> {
    let mut filter = InlinePreviewFilter::new(document_url, user_agent, config, collaborators);
    let mut output = String::new();

    for (i, window) in windows.iter().enumerate() {
        if i > 0 {
            filter.process(Event::Flush)?;
            output.push_str(&filter.take_output());
        }
        for event in tokenize(window)? {
            filter.process(event)?;
        }
    }
    filter.process(Event::Finish)?;
    output.push_str(&filter.take_output());

    Ok(output)
}
