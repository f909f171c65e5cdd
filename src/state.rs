//! Per-document rewrite state

use std::collections::{HashMap, HashSet};

use crate::preview::LowResData;
use crate::scripts::Registrations;

/// Outcome of the one preview lookup made for a url
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedPreview {
    Available(LowResData),
    Unavailable,
}

/// Mutable state of one document, owned by its filter instance
///
/// Created when the document starts and dropped when it finishes; nothing in
/// here is shared with other documents.
#[derive(Debug, Default)]
pub struct PreviewState {
    seen_urls: HashMap<String, CachedPreview>,
    registered_urls: HashSet<String>,
    inlined_count: usize,
    /// Registrations collected since the last window close
    pub pending: Registrations,
    pub noscript_emitted: bool,
    pub head_bootstrap_emitted: bool,
    /// Preview registration library
    pub bootstrap_emitted: bool,
    pub lazyload_bootstrap_emitted: bool,
    /// At least one registration block has been written
    pub registrations_emitted: bool,
    /// High resolution activation script
    pub defer_trailer_emitted: bool,
}

impl PreviewState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached lookup outcome; `None` if the url was never looked up
    pub fn cached(&self, url: &str) -> Option<Option<&LowResData>> {
        self.seen_urls.get(url).map(|cached| match cached {
            CachedPreview::Available(data) => Some(data),
            CachedPreview::Unavailable => None,
        })
    }

    /// Store the lookup outcome for `url`
    ///
    /// Only the first outcome per url is kept. Returns whether it was stored.
    pub fn remember(&mut self, url: &str, outcome: Option<LowResData>) -> bool {
        if self.seen_urls.contains_key(url) {
            return false;
        }
        let cached = match outcome {
            Some(data) => {
                self.inlined_count += 1;
                CachedPreview::Available(data)
            }
            None => CachedPreview::Unavailable,
        };
        self.seen_urls.insert(url.to_string(), cached);
        true
    }

    /// Number of distinct urls that received a preview
    pub fn inlined_count(&self) -> usize {
        self.inlined_count
    }

    /// Queue the registration of `url` unless it was registered before
    pub fn register(&mut self, url: &str, data: &LowResData) -> bool {
        if !self.registered_urls.insert(url.to_string()) {
            return false;
        }
        self.pending.push(url, data.data_uri());
        true
    }
}
