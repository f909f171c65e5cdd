//! Per-image preview decisions
//!
//! For every eligible image element the resolver decides whether a preview is
//! inlined, the image is handed to lazy loading, or the element is left
//! alone. Lookups are made at most once per url and document.

use crate::capability::Capability;
use crate::config::RewriteConfig;
use crate::logging::{LogSink, RewriterInfo};
use crate::markup::StartTag;
use crate::preview::{ImageDataProvider, LowResData, PreviewRequest};
use crate::scripts::{HIGH_RES_SRC_ATTR, INLINE_PREVIEW_ONLOAD, LAZYLOAD_ONLOAD, LAZY_SRC_ATTR};
use crate::state::PreviewState;

/// How a preview reaches the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewMode {
    /// Registered from a script block, swapped in by script
    Deferred,
    /// Written straight into `src`, swapped by the element's own `onload`
    ExperimentalInline,
}

/// Switches derived once per document from the configuration and the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentPolicy {
    pub mode: PreviewMode,
    /// Ask the provider for the smaller mobile preview
    pub mobile_resize: bool,
    /// Images without a preview become lazy placeholders
    pub lazyload: bool,
    /// High resolution images load when scrolled into view
    pub lazyload_highres: bool,
}

impl DocumentPolicy {
    pub fn new(config: &RewriteConfig, capability: &Capability) -> Self {
        let lazyload_highres = config.lazyload_highres_images && capability.is_mobile_resize_class;
        let mode = if config.experimental_inline_preview && !lazyload_highres {
            PreviewMode::ExperimentalInline
        } else {
            PreviewMode::Deferred
        };
        Self {
            mode,
            mobile_resize: capability.is_mobile_resize_class && config.aggressive_mobile,
            lazyload: config.lazyload_images && capability.supports_lazyload,
            lazyload_highres,
        }
    }
}

/// Result of resolving one image element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Rewritten {
        high_res_url: String,
        preview: Option<LowResData>,
        mode: PreviewMode,
    },
    LazyloadHandoff,
    PassThrough,
}

pub struct ImageCandidateResolver<'a> {
    config: &'a RewriteConfig,
    policy: DocumentPolicy,
    provider: &'a dyn ImageDataProvider,
    log: &'a LogSink,
}

impl<'a> ImageCandidateResolver<'a> {
    pub fn new(
        config: &'a RewriteConfig,
        policy: DocumentPolicy,
        provider: &'a dyn ImageDataProvider,
        log: &'a LogSink,
    ) -> Self {
        Self {
            config,
            policy,
            provider,
            log,
        }
    }

    pub fn policy(&self) -> &DocumentPolicy {
        &self.policy
    }

    /// Decide what happens to `tag`
    ///
    /// Elements that are already rewritten, have no usable `src`, or whose
    /// `onload` would be clobbered are passed through without a record. Every
    /// other element gets exactly one image decision record.
    pub fn resolve(&self, tag: &StartTag, state: &mut PreviewState) -> Decision {
        if tag.has_attribute(HIGH_RES_SRC_ATTR) || tag.has_attribute(LAZY_SRC_ATTR) {
            return Decision::PassThrough;
        }
        let url = match image_url(tag) {
            Some(url) => url,
            None => return Decision::PassThrough,
        };
        let has_onload = tag.has_attribute("onload");
        if self.policy.mode == PreviewMode::ExperimentalInline && has_onload {
            tracing::debug!(url = %url, "Keeping image with its own onload handler");
            return Decision::PassThrough;
        }

        let preview = self.lookup(&url, state);
        self.log.append_info(RewriterInfo::image_decision(
            preview.as_ref().map(|data| data.byte_size),
        ));

        match preview {
            Some(data) => {
                tracing::debug!(url = %url, low_res_size = data.byte_size, "Inlining preview");
                Decision::Rewritten {
                    high_res_url: url,
                    preview: Some(data),
                    mode: self.policy.mode,
                }
            }
            None if self.policy.lazyload && !has_onload => {
                tracing::debug!(url = %url, "No preview, handing over to lazy loading");
                Decision::LazyloadHandoff
            }
            None => {
                tracing::debug!(url = %url, "No preview available");
                Decision::PassThrough
            }
        }
    }

    fn lookup(&self, url: &str, state: &mut PreviewState) -> Option<LowResData> {
        if let Some(cached) = state.cached(url) {
            return cached.cloned();
        }

        let outcome = if !self.config.allows_inlined_index(state.inlined_count()) {
            tracing::debug!(url = %url, inlined = state.inlined_count(), "Preview limit reached");
            None
        } else {
            let request = PreviewRequest {
                min_bytes: self.config.min_low_res_bytes,
                max_bytes: self.config.max_low_res_bytes,
                mobile_resize: self.policy.mobile_resize,
            };
            match self.provider.low_res_for(url, &request) {
                Ok(Some(data)) if self.config.accepts_low_res_size(data.byte_size) => Some(data),
                Ok(Some(data)) => {
                    tracing::debug!(
                        url = %url,
                        low_res_size = data.byte_size,
                        "Preview size outside configured limits"
                    );
                    None
                }
                Ok(None) => None,
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "Preview lookup failed");
                    None
                }
            }
        };

        state.remember(url, outcome.clone());
        outcome
    }
}

/// Decoded image url of an `<img>`/`<input>`, if it is worth rewriting
fn image_url(tag: &StartTag) -> Option<String> {
    let src = tag.get_attribute("src")?.trim();
    if src.is_empty() {
        return None;
    }
    let url = html_escape::decode_html_entities(src).into_owned();
    if url.get(..5).is_some_and(|scheme| scheme.eq_ignore_ascii_case("data:")) {
        return None;
    }
    Some(url)
}

/// Move the original url aside and attach the preview according to `mode`
pub fn rewrite_with_preview(
    tag: &mut StartTag,
    preview: &LowResData,
    mode: PreviewMode,
    placeholder_src: Option<&str>,
) {
    tag.rename_attribute("src", HIGH_RES_SRC_ATTR);
    match mode {
        PreviewMode::ExperimentalInline => {
            tag.push_attribute("src", &preview.data_uri());
            tag.push_attribute("onload", INLINE_PREVIEW_ONLOAD);
        }
        PreviewMode::Deferred => {
            if let Some(src) = placeholder_src {
                tag.push_attribute("src", &html_escape::encode_double_quoted_attribute(src));
            }
        }
    }
}

/// Turn the element into a lazy placeholder showing `blank_src`
pub fn rewrite_for_lazyload(tag: &mut StartTag, blank_src: &str) {
    tag.rename_attribute("src", LAZY_SRC_ATTR);
    tag.push_attribute("src", &html_escape::encode_double_quoted_attribute(blank_src));
    tag.push_attribute("onload", LAZYLOAD_ONLOAD);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preview::MemoryPreviewProvider;

    fn config() -> RewriteConfig {
        RewriteConfig {
            min_low_res_bytes: 0,
            ..RewriteConfig::default()
        }
    }

    fn img(src: &str) -> StartTag {
        StartTag::new("img").with_attribute("src", src).self_closing()
    }

    fn provider_with(urls: &[&str]) -> MemoryPreviewProvider {
        let mut provider = MemoryPreviewProvider::new();
        for url in urls {
            provider.insert(url, LowResData::new("image/jpeg", vec![7; 500]));
        }
        provider
    }

    #[test]
    fn test_policy_modes() {
        let experimental = RewriteConfig {
            experimental_inline_preview: true,
            lazyload_highres_images: true,
            ..config()
        };
        assert_eq!(
            DocumentPolicy::new(&experimental, &Capability::desktop()).mode,
            PreviewMode::ExperimentalInline
        );
        let mobile = DocumentPolicy::new(&experimental, &Capability::mobile());
        assert_eq!(mobile.mode, PreviewMode::Deferred);
        assert!(mobile.lazyload_highres);
        assert!(!mobile.mobile_resize);
    }

    #[test]
    fn test_repeated_url_uses_cache() {
        let config = config();
        let provider = provider_with(&["a.jpg"]);
        let log = LogSink::new();
        let resolver = ImageCandidateResolver::new(
            &config,
            DocumentPolicy::new(&config, &Capability::desktop()),
            &provider,
            &log,
        );
        let mut state = PreviewState::new();

        for _ in 0..3 {
            assert!(matches!(
                resolver.resolve(&img("a.jpg"), &mut state),
                Decision::Rewritten { .. }
            ));
        }
        assert_eq!(provider.calls(), 1);
        assert_eq!(state.inlined_count(), 1);
        assert_eq!(log.snapshot().rewriter_info.len(), 3);
    }

    #[test]
    fn test_index_cap_skips_provider() {
        let config = RewriteConfig {
            max_inlined_index: 0,
            ..config()
        };
        let provider = provider_with(&["a.jpg", "b.jpg"]);
        let log = LogSink::new();
        let resolver = ImageCandidateResolver::new(
            &config,
            DocumentPolicy::new(&config, &Capability::desktop()),
            &provider,
            &log,
        );
        let mut state = PreviewState::new();

        assert!(matches!(resolver.resolve(&img("a.jpg"), &mut state), Decision::Rewritten { .. }));
        assert_eq!(resolver.resolve(&img("b.jpg"), &mut state), Decision::PassThrough);
        assert!(matches!(resolver.resolve(&img("a.jpg"), &mut state), Decision::Rewritten { .. }));
        assert_eq!(provider.calls(), 1);
    }

    #[test]
    fn test_lazyload_handoff_and_failures() {
        let config = RewriteConfig {
            lazyload_images: true,
            ..config()
        };
        let mut provider = MemoryPreviewProvider::new();
        provider.insert_failure("broken.jpg", "bad huffman table");
        let log = LogSink::new();
        let resolver = ImageCandidateResolver::new(
            &config,
            DocumentPolicy::new(&config, &Capability::desktop()),
            &provider,
            &log,
        );
        let mut state = PreviewState::new();

        assert_eq!(resolver.resolve(&img("broken.jpg"), &mut state), Decision::LazyloadHandoff);
        let with_onload = img("other.jpg").with_attribute("onload", "go();");
        assert_eq!(resolver.resolve(&with_onload, &mut state), Decision::PassThrough);

        let records = log.snapshot().rewriter_info;
        assert_eq!(records.len(), 2);
        assert!(records
            .iter()
            .all(|r| !r.image.as_ref().unwrap().is_low_res_src_inserted));
    }

    #[test]
    fn test_ineligible_elements_are_not_logged() {
        let config = config();
        let provider = provider_with(&["a.jpg"]);
        let log = LogSink::new();
        let resolver = ImageCandidateResolver::new(
            &config,
            DocumentPolicy::new(&config, &Capability::desktop()),
            &provider,
            &log,
        );
        let mut state = PreviewState::new();

        let already = StartTag::new("img").with_attribute(HIGH_RES_SRC_ATTR, "a.jpg");
        assert_eq!(resolver.resolve(&already, &mut state), Decision::PassThrough);
        assert_eq!(resolver.resolve(&StartTag::new("img"), &mut state), Decision::PassThrough);
        assert_eq!(resolver.resolve(&img("  "), &mut state), Decision::PassThrough);
        assert_eq!(resolver.resolve(&img("DATA:image/gif;base64,R0lG"), &mut state), Decision::PassThrough);
        assert!(log.snapshot().rewriter_info.is_empty());
        assert_eq!(provider.calls(), 0);
    }

    #[test]
    fn test_non_ascii_urls() {
        let config = config();
        let provider = provider_with(&["aé€.jpg", "€"]);
        let log = LogSink::new();
        let resolver = ImageCandidateResolver::new(
            &config,
            DocumentPolicy::new(&config, &Capability::desktop()),
            &provider,
            &log,
        );
        let mut state = PreviewState::new();

        assert!(matches!(
            resolver.resolve(&img("aé€.jpg"), &mut state),
            Decision::Rewritten { .. }
        ));
        assert!(matches!(resolver.resolve(&img("€"), &mut state), Decision::Rewritten { .. }));
        assert_eq!(provider.calls(), 2);
    }

    #[test]
    fn test_size_limits_enforced_on_provider_output() {
        let config = RewriteConfig {
            min_low_res_bytes: 600,
            ..config()
        };

        struct Careless;
        impl ImageDataProvider for Careless {
            fn low_res_for(
                &self,
                _url: &str,
                _request: &PreviewRequest,
            ) -> Result<Option<LowResData>, crate::error::PreviewError> {
                Ok(Some(LowResData::new("image/jpeg", vec![0; 500])))
            }
        }

        let log = LogSink::new();
        let resolver = ImageCandidateResolver::new(
            &config,
            DocumentPolicy::new(&config, &Capability::desktop()),
            &Careless,
            &log,
        );
        let mut state = PreviewState::new();
        assert_eq!(resolver.resolve(&img("a.jpg"), &mut state), Decision::PassThrough);
        assert_eq!(state.inlined_count(), 0);
    }

    #[test]
    fn test_rewrite_with_preview() {
        let data = LowResData::new("image/jpeg", b"abc".to_vec());

        let mut tag = img("a.jpg");
        rewrite_with_preview(&mut tag, &data, PreviewMode::ExperimentalInline, None);
        let mut out = String::new();
        tag.write_to(&mut out);
        assert_eq!(
            out,
            format!(
                "<img pagespeed_high_res_src=\"a.jpg\" src=\"data:image/jpeg;base64,YWJj\" onload=\"{}\"/>",
                INLINE_PREVIEW_ONLOAD
            )
        );

        let mut tag = img("a.jpg");
        rewrite_with_preview(&mut tag, &data, PreviewMode::Deferred, Some("/psajs/1.0.gif"));
        let mut out = String::new();
        tag.write_to(&mut out);
        assert_eq!(out, "<img pagespeed_high_res_src=\"a.jpg\" src=\"/psajs/1.0.gif\"/>");
    }

    #[test]
    fn test_rewrite_for_lazyload() {
        let mut tag = img("a.jpg");
        rewrite_for_lazyload(&mut tag, "/psajs/1.0.gif");
        let mut out = String::new();
        tag.write_to(&mut out);
        assert_eq!(
            out,
            "<img pagespeed_lazy_src=\"a.jpg\" src=\"/psajs/1.0.gif\" \
             onload=\"pagespeed.lazyLoadImages.loadIfVisible(this);\"/>"
        );
    }
}
