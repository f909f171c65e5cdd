//! Configuration for the inline preview rewriter

use serde::Deserialize;
use std::env;
use std::str::FromStr;

/// Default minimum size of a low resolution preview worth inlining
pub const DEFAULT_MIN_LOW_RES_BYTES: u64 = 1024;
/// Default maximum size of a low resolution preview worth inlining
pub const DEFAULT_MAX_LOW_RES_BYTES: u64 = 1024 * 1024;

/// Per-document rewrite options
///
/// `max_low_res_bytes == 0` means unbounded, `max_inlined_index == -1`
/// means every distinct image may receive a preview.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RewriteConfig {
    pub min_low_res_bytes: u64,
    pub max_low_res_bytes: u64,
    pub max_inlined_index: i64,
    pub defer_javascript: bool,
    pub lazyload_images: bool,
    pub lazyload_highres_images: bool,
    pub experimental_inline_preview: bool,
    pub aggressive_mobile: bool,
    pub preserve_urls: bool,
    /// Keep human readable comments in injected scripts
    pub debug: bool,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        RewriteConfig {
            min_low_res_bytes: DEFAULT_MIN_LOW_RES_BYTES,
            max_low_res_bytes: DEFAULT_MAX_LOW_RES_BYTES,
            max_inlined_index: -1,
            defer_javascript: false,
            lazyload_images: false,
            lazyload_highres_images: false,
            experimental_inline_preview: false,
            aggressive_mobile: false,
            preserve_urls: false,
            debug: false,
        }
    }
}

impl RewriteConfig {
    /// Load `.env` (if any) and then read the configuration from the environment
    pub fn load() -> Self {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    /// Read the configuration from `PREVIEW_*` environment variables
    ///
    /// Missing variables fall back to defaults; unparsable ones are reported
    /// and fall back as well.
    pub fn from_env() -> Self {
        let defaults = RewriteConfig::default();
        RewriteConfig {
            min_low_res_bytes: env_or("PREVIEW_MIN_LOW_RES_BYTES", defaults.min_low_res_bytes),
            max_low_res_bytes: env_or("PREVIEW_MAX_LOW_RES_BYTES", defaults.max_low_res_bytes),
            max_inlined_index: env_or("PREVIEW_MAX_INLINED_INDEX", defaults.max_inlined_index),
            defer_javascript: env_flag("PREVIEW_DEFER_JAVASCRIPT", defaults.defer_javascript),
            lazyload_images: env_flag("PREVIEW_LAZYLOAD_IMAGES", defaults.lazyload_images),
            lazyload_highres_images: env_flag(
                "PREVIEW_LAZYLOAD_HIGHRES_IMAGES",
                defaults.lazyload_highres_images,
            ),
            experimental_inline_preview: env_flag(
                "PREVIEW_EXPERIMENTAL_INLINE",
                defaults.experimental_inline_preview,
            ),
            aggressive_mobile: env_flag("PREVIEW_AGGRESSIVE_MOBILE", defaults.aggressive_mobile),
            preserve_urls: env_flag("PREVIEW_PRESERVE_URLS", defaults.preserve_urls),
            debug: env_flag("PREVIEW_DEBUG", defaults.debug),
        }
    }

    /// Whether a preview of `byte_size` bytes falls inside the configured window
    pub fn accepts_low_res_size(&self, byte_size: u64) -> bool {
        byte_size >= self.min_low_res_bytes
            && (self.max_low_res_bytes == 0 || byte_size <= self.max_low_res_bytes)
    }

    /// Whether another distinct image may still receive a preview
    pub fn allows_inlined_index(&self, inlined_count: usize) -> bool {
        self.max_inlined_index < 0 || (inlined_count as i64) <= self.max_inlined_index
    }
}

fn env_or<T: FromStr + Copy>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(variable = name, value = %raw, "Ignoring unparsable setting");
            default
        }),
        Err(_) => default,
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "on" | "yes" => true,
            "0" | "false" | "off" | "no" => false,
            _ => {
                tracing::warn!(variable = name, value = %raw, "Ignoring unparsable flag");
                default
            }
        },
        Err(_) => default,
    }
}
