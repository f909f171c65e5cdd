//! Script payloads injected into the rewritten document
//!
//! The JavaScript libraries themselves are opaque assets supplied by a
//! [`ScriptAssets`] implementation. This module only knows how to wrap them
//! and how to render the per-window registration calls. Debug and optimized
//! output differ solely in which asset variant is picked at render time.

use std::fmt::Write;

/// Attribute holding the original image url of a rewritten image
pub const HIGH_RES_SRC_ATTR: &str = "pagespeed_high_res_src";
/// Attribute holding the original image url of a lazy placeholder
pub const LAZY_SRC_ATTR: &str = "pagespeed_lazy_src";
/// Marks a script that a JavaScript deferral pass must leave in place
pub const NO_DEFER_ATTR: &str = "pagespeed_no_defer";

pub const BLANK_IMAGE_SRC: &str = "/psajs/1.0.gif";
pub const DEFER_JS_SRC: &str = "/psajs/js_defer.0.js";
pub const DEFER_JS_DEBUG_SRC: &str = "/psajs/js_defer_debug.0.js";

pub const DELAY_IMAGES_INLINE_SUFFIX: &str = "\npagespeed.delayImagesInlineInit();\n";
pub const DELAY_IMAGES_SUFFIX: &str = "\npagespeed.delayImagesInit();\n";
pub const REPLACE_WITH_LOW_RES_CALL: &str = "\npagespeed.delayImagesInline.replaceWithLowRes();\n";
pub const LAZYLOAD_OVERRIDE_CALL: &str = "pagespeed.lazyLoadImages.overrideAttributeFunctions();";

/// `onload` of an image carrying its preview in `src` directly
pub const INLINE_PREVIEW_ONLOAD: &str = "var elem=this;setTimeout(function(){elem.onload=null;\
elem.src=elem.getAttribute('pagespeed_high_res_src');},0);";
/// `onload` of a lazy placeholder
pub const LAZYLOAD_ONLOAD: &str = "pagespeed.lazyLoadImages.loadIfVisible(this);";

const NOSCRIPT_QUERY: &str = "ModPagespeed=noscript";

/// Static JavaScript libraries the rewriter may inject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StaticAsset {
    DelayImagesInlineJs,
    DelayImagesJs,
    LazyloadImagesJs,
    JsDisableJs,
}

/// Supplier of static script bodies and urls
pub trait ScriptAssets: Send + Sync {
    fn script(&self, asset: StaticAsset, debug: bool) -> &str;

    fn blank_image_url(&self) -> &str;

    fn defer_loader_url(&self, debug: bool) -> &str;
}

/// Assets compiled into the crate
#[derive(Debug, Clone)]
pub struct StaticAssetManager {
    blank_image_url: String,
    defer_loader_url: String,
    defer_loader_debug_url: String,
}

impl Default for StaticAssetManager {
    fn default() -> Self {
        Self {
            blank_image_url: BLANK_IMAGE_SRC.to_string(),
            defer_loader_url: DEFER_JS_SRC.to_string(),
            defer_loader_debug_url: DEFER_JS_DEBUG_SRC.to_string(),
        }
    }
}

impl StaticAssetManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve the static urls from a different prefix, e.g. a CDN
    pub fn with_static_prefix(prefix: &str) -> Self {
        let prefix = prefix.trim_end_matches('/');
        Self {
            blank_image_url: format!("{}/1.0.gif", prefix),
            defer_loader_url: format!("{}/js_defer.0.js", prefix),
            defer_loader_debug_url: format!("{}/js_defer_debug.0.js", prefix),
        }
    }
}

impl ScriptAssets for StaticAssetManager {
    fn script(&self, asset: StaticAsset, debug: bool) -> &str {
        let body = match (asset, debug) {
            (StaticAsset::DelayImagesInlineJs, true) => {
                include_str!("../assets/js/delay_images_inline_debug.js")
            }
            (StaticAsset::DelayImagesInlineJs, false) => {
                include_str!("../assets/js/delay_images_inline_opt.js")
            }
            (StaticAsset::DelayImagesJs, true) => include_str!("../assets/js/delay_images_debug.js"),
            (StaticAsset::DelayImagesJs, false) => include_str!("../assets/js/delay_images_opt.js"),
            (StaticAsset::LazyloadImagesJs, true) => {
                include_str!("../assets/js/lazyload_images_debug.js")
            }
            (StaticAsset::LazyloadImagesJs, false) => {
                include_str!("../assets/js/lazyload_images_opt.js")
            }
            (StaticAsset::JsDisableJs, true) => include_str!("../assets/js/js_disable_debug.js"),
            (StaticAsset::JsDisableJs, false) => include_str!("../assets/js/js_disable_opt.js"),
        };
        body.trim_end()
    }

    fn blank_image_url(&self) -> &str {
        &self.blank_image_url
    }

    fn defer_loader_url(&self, debug: bool) -> &str {
        if debug {
            &self.defer_loader_debug_url
        } else {
            &self.defer_loader_url
        }
    }
}

/// Which script switches previews to the original images
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationCall {
    ReplaceWithHighRes,
    RegisterLazyLoadHighRes,
}

impl ActivationCall {
    fn js(self) -> &'static str {
        match self {
            ActivationCall::ReplaceWithHighRes => "\npagespeed.delayImages.replaceWithHighRes();\n",
            ActivationCall::RegisterLazyLoadHighRes => {
                "\npagespeed.delayImages.registerLazyLoadHighRes();\n"
            }
        }
    }
}

/// Preview registrations collected for one flush window
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registrations {
    entries: Vec<(String, String)>,
}

impl Registrations {
    pub fn push(&mut self, url: &str, data_uri: String) {
        self.entries.push((url.to_string(), data_uri));
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Renders every piece of markup the rewriter injects
pub struct ScriptEmitter<'a> {
    assets: &'a dyn ScriptAssets,
    debug: bool,
}

impl<'a> ScriptEmitter<'a> {
    pub fn new(assets: &'a dyn ScriptAssets, debug: bool) -> Self {
        Self { assets, debug }
    }

    pub fn blank_image_url(&self) -> &str {
        self.assets.blank_image_url()
    }

    /// Library that registers previews, emitted once per document
    pub fn inline_bootstrap(&self, out: &mut String) {
        out.push_str("<script type=\"text/javascript\">");
        out.push_str(self.assets.script(StaticAsset::DelayImagesInlineJs, self.debug));
        out.push_str(DELAY_IMAGES_INLINE_SUFFIX);
        out.push_str("</script>");
    }

    /// One self-contained block: every registration of the window, then one trigger
    pub fn registration_block(&self, registrations: &Registrations, out: &mut String) {
        out.push_str("<script type=\"text/javascript\">");
        for (url, data_uri) in &registrations.entries {
            let _ = write!(
                out,
                "\npagespeed.delayImagesInline.addLowResImages('{}', '{}');",
                escape_js_string(url),
                escape_js_string(data_uri)
            );
        }
        out.push_str(REPLACE_WITH_LOW_RES_CALL);
        out.push_str("</script>");
    }

    /// Library and call that perform the final high resolution swap
    pub fn activation_block(&self, call: ActivationCall, out: &mut String) {
        out.push_str("<script type=\"text/javascript\">");
        out.push_str(self.assets.script(StaticAsset::DelayImagesJs, self.debug));
        out.push_str(DELAY_IMAGES_SUFFIX);
        out.push_str(call.js());
        out.push_str("</script>");
    }

    /// Lazy-load library, initialised as not deferred since the block is no-defer
    pub fn lazyload_bootstrap(&self, out: &mut String) {
        out.push_str(&no_defer_open());
        out.push_str(self.assets.script(StaticAsset::LazyloadImagesJs, self.debug));
        let _ = write!(
            out,
            "\npagespeed.lazyLoadInit(false, \"{}\");\n",
            escape_js_string(self.assets.blank_image_url())
        );
        out.push_str("</script>");
    }

    pub fn lazyload_trailer(&self, out: &mut String) {
        out.push_str(&no_defer_open());
        out.push_str(LAZYLOAD_OVERRIDE_CALL);
        out.push_str("</script>");
    }

    /// Head script announcing deferred JavaScript
    pub fn head_bootstrap(&self, out: &mut String) {
        out.push_str(&no_defer_open());
        out.push_str(self.assets.script(StaticAsset::JsDisableJs, self.debug));
        out.push_str("</script>");
    }

    pub fn defer_loader(&self, out: &mut String) {
        let _ = write!(
            out,
            "<script type=\"text/javascript\" src=\"{}\"></script>",
            html_escape::encode_double_quoted_attribute(self.assets.defer_loader_url(self.debug))
        );
    }

    /// Redirect for clients without JavaScript to the unrewritten page
    pub fn noscript_fallback(&self, document_url: &str, out: &mut String) {
        let url = noscript_url(document_url);
        let url = html_escape::encode_quoted_attribute(&url);
        let _ = write!(
            out,
            "<noscript><meta HTTP-EQUIV=\"refresh\" content=\"0;url='{url}'\">\
             <style><!--table,div,span,font,p{{display:none}} --></style>\
             <div style=\"display:block\">Please click <a href=\"{url}\">here</a> \
             if you are not redirected within a few seconds.</div></noscript>",
            url = url
        );
    }
}

fn no_defer_open() -> String {
    format!("<script type=\"text/javascript\" {}=\"\">", NO_DEFER_ATTR)
}

/// Url of the same page with rewriting switched off
pub fn noscript_url(document_url: &str) -> String {
    let base = document_url
        .split_once('#')
        .map(|(before, _)| before)
        .unwrap_or(document_url);
    if base.ends_with('?') || base.ends_with('&') {
        format!("{}{}", base, NOSCRIPT_QUERY)
    } else if base.contains('?') {
        format!("{}&{}", base, NOSCRIPT_QUERY)
    } else {
        format!("{}?{}", base, NOSCRIPT_QUERY)
    }
}

/// Escape text for a single or double quoted JavaScript string literal
/// embedded in a `<script>` element
pub fn escape_js_string(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\'' => escaped.push_str("\\'"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '<' => escaped.push_str("\\u003c"),
            '\u{2028}' => escaped.push_str("\\u2028"),
            '\u{2029}' => escaped.push_str("\\u2029"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emitter(assets: &StaticAssetManager, debug: bool) -> ScriptEmitter<'_> {
        ScriptEmitter::new(assets, debug)
    }

    #[test]
    fn test_registration_block_format() {
        let assets = StaticAssetManager::new();
        let mut registrations = Registrations::default();
        registrations.push("http://test.com/1.jpeg", "data:image/jpeg;base64,AAAA".to_string());
        registrations.push("http://test.com/2.jpeg", "data:image/jpeg;base64,BBBB".to_string());

        let mut out = String::new();
        emitter(&assets, false).registration_block(&registrations, &mut out);
        assert_eq!(
            out,
            "<script type=\"text/javascript\">\
             \npagespeed.delayImagesInline.addLowResImages('http://test.com/1.jpeg', 'data:image/jpeg;base64,AAAA');\
             \npagespeed.delayImagesInline.addLowResImages('http://test.com/2.jpeg', 'data:image/jpeg;base64,BBBB');\
             \npagespeed.delayImagesInline.replaceWithLowRes();\n</script>"
        );
    }

    #[test]
    fn test_activation_variants() {
        let assets = StaticAssetManager::new();
        let mut out = String::new();
        emitter(&assets, false).activation_block(ActivationCall::RegisterLazyLoadHighRes, &mut out);
        assert!(out.ends_with(
            "\npagespeed.delayImagesInit();\n\npagespeed.delayImages.registerLazyLoadHighRes();\n</script>"
        ));
    }

    #[test]
    fn test_debug_assets_keep_comments() {
        let assets = StaticAssetManager::new();
        for asset in [
            StaticAsset::DelayImagesInlineJs,
            StaticAsset::DelayImagesJs,
            StaticAsset::LazyloadImagesJs,
            StaticAsset::JsDisableJs,
        ] {
            assert!(assets.script(asset, true).contains("/*"), "{:?}", asset);
            assert!(!assets.script(asset, false).contains("/*"), "{:?}", asset);
        }
    }

    #[test]
    fn test_lazyload_bootstrap() {
        let assets = StaticAssetManager::new();
        let mut out = String::new();
        emitter(&assets, false).lazyload_bootstrap(&mut out);
        assert!(out.starts_with("<script type=\"text/javascript\" pagespeed_no_defer=\"\">"));
        assert!(out.ends_with("\npagespeed.lazyLoadInit(false, \"/psajs/1.0.gif\");\n</script>"));
    }

    #[test]
    fn test_noscript_url() {
        assert_eq!(
            noscript_url("http://test.com/page.html"),
            "http://test.com/page.html?ModPagespeed=noscript"
        );
        assert_eq!(
            noscript_url("http://test.com/?a=b#top"),
            "http://test.com/?a=b&ModPagespeed=noscript"
        );
    }

    #[test]
    fn test_noscript_fallback_escapes_url() {
        let assets = StaticAssetManager::new();
        let mut out = String::new();
        emitter(&assets, false).noscript_fallback("http://test.com/?a=b", &mut out);
        assert!(out.contains("url='http://test.com/?a=b&amp;ModPagespeed=noscript'"));
        assert!(out.starts_with("<noscript>"));
        assert!(out.ends_with("</noscript>"));
    }

    #[test]
    fn test_escape_js_string() {
        assert_eq!(escape_js_string("a'b\\c"), "a\\'b\\\\c");
        assert_eq!(escape_js_string("</script>"), "\\u003c/script>");
    }

    #[test]
    fn test_static_prefix() {
        let assets = StaticAssetManager::with_static_prefix("https://cdn.test.com/psajs/");
        assert_eq!(assets.blank_image_url(), "https://cdn.test.com/psajs/1.0.gif");
        assert_eq!(assets.defer_loader_url(true), "https://cdn.test.com/psajs/js_defer_debug.0.js");
    }
}
