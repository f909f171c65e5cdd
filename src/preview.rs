//! Low resolution preview data and its provider
//!
//! Producing the preview bytes (decoding, resizing, recompressing) happens
//! outside this crate. The rewriter only asks an [`ImageDataProvider`] for
//! whatever is available right now.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use crate::error::PreviewError;

/// An encoded low resolution preview
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LowResData {
    /// MIME type of `bytes`, e.g. `image/jpeg`
    pub content_type: String,
    pub bytes: Vec<u8>,
    /// Size compared against the configured thresholds
    pub byte_size: u64,
}

impl LowResData {
    /// Preview whose threshold size is its own encoded length
    pub fn new(content_type: &str, bytes: Vec<u8>) -> Self {
        let byte_size = bytes.len() as u64;
        Self {
            content_type: content_type.to_string(),
            bytes,
            byte_size,
        }
    }

    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.content_type, BASE64.encode(&self.bytes))
    }
}

/// Size limits and client class for one preview lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviewRequest {
    pub min_bytes: u64,
    /// 0 = unbounded
    pub max_bytes: u64,
    /// Produce the smaller preview used for resize-constrained mobile clients
    pub mobile_resize: bool,
}

/// Source of low resolution previews
///
/// `Ok(None)` means no preview is available (source too small, thresholds not
/// met, not encoded yet). `Err` is an unexpected fault; the rewriter treats it
/// the same way as `Ok(None)` for that single image.
pub trait ImageDataProvider: Send + Sync {
    fn low_res_for(
        &self,
        url: &str,
        request: &PreviewRequest,
    ) -> Result<Option<LowResData>, PreviewError>;
}

/// In-memory provider for previews computed ahead of time
///
/// Mobile lookups prefer the mobile variant and fall back to the desktop one.
/// Every lookup is counted.
#[derive(Debug, Default)]
pub struct MemoryPreviewProvider {
    desktop: HashMap<String, LowResData>,
    mobile: HashMap<String, LowResData>,
    failing: HashMap<String, String>,
    calls: AtomicUsize,
}

impl MemoryPreviewProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, url: &str, data: LowResData) {
        self.desktop.insert(url.to_string(), data);
    }

    pub fn insert_mobile(&mut self, url: &str, data: LowResData) {
        self.mobile.insert(url.to_string(), data);
    }

    /// Make lookups of `url` fail with [`PreviewError::EncodeFailed`]
    pub fn insert_failure(&mut self, url: &str, reason: &str) {
        self.failing.insert(url.to_string(), reason.to_string());
    }

    /// Number of lookups served so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ImageDataProvider for MemoryPreviewProvider {
    fn low_res_for(
        &self,
        url: &str,
        request: &PreviewRequest,
    ) -> Result<Option<LowResData>, PreviewError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(reason) = self.failing.get(url) {
            return Err(PreviewError::EncodeFailed(reason.clone()));
        }

        let found = if request.mobile_resize {
            self.mobile.get(url).or_else(|| self.desktop.get(url))
        } else {
            self.desktop.get(url)
        };

        Ok(found
            .filter(|data| {
                data.byte_size >= request.min_bytes
                    && (request.max_bytes == 0 || data.byte_size <= request.max_bytes)
            })
            .cloned())
    }
}
