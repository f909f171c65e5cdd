//! Structured rewrite records
//!
//! The rewriter appends one record per decision to a [`LogSink`] shared by all
//! documents being processed. Persisting or aggregating the records is the
//! embedder's business.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

/// Id of the image compression decision records
pub const IMAGE_COMPRESSION_ID: &str = "ic";
/// Id of the delay-images rewriter
pub const DELAY_IMAGES_ID: &str = "di";

/// Outcome of one rewrite attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RewriterApplication {
    AppliedOk,
    NotApplied,
}

/// Document-level status of a rewriter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HtmlApplication {
    Active,
    UserAgentNotSupported,
    NotApplied,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceInfo {
    pub is_inlined: bool,
    pub is_critical: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageResourceInfo {
    pub is_low_res_src_inserted: bool,
    pub low_res_size: u64,
}

/// A single rewrite record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RewriterInfo {
    pub id: String,
    pub status: RewriterApplication,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageResourceInfo>,
}

impl RewriterInfo {
    /// Record for an image that went through the preview decision
    pub fn image_decision(low_res_size: Option<u64>) -> Self {
        Self {
            id: IMAGE_COMPRESSION_ID.to_string(),
            status: RewriterApplication::NotApplied,
            resource: Some(ResourceInfo {
                is_inlined: false,
                is_critical: true,
            }),
            image: Some(ImageResourceInfo {
                is_low_res_src_inserted: low_res_size.is_some(),
                low_res_size: low_res_size.unwrap_or(0),
            }),
        }
    }

    /// Record for an emitted registration script
    pub fn delay_apply(status: RewriterApplication) -> Self {
        Self {
            id: DELAY_IMAGES_ID.to_string(),
            status,
            resource: None,
            image: None,
        }
    }
}

/// Per-document statistics of a rewriter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RewriterStats {
    pub id: String,
    pub html_status: HtmlApplication,
}

/// Everything logged so far
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoggingInfo {
    pub rewriter_info: Vec<RewriterInfo>,
    pub rewriter_stats: Vec<RewriterStats>,
}

impl LoggingInfo {
    /// Ids of rewriters with at least one applied record, in first-seen order
    pub fn applied_rewriters(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = Vec::new();
        for info in &self.rewriter_info {
            if info.status == RewriterApplication::AppliedOk && !ids.contains(&info.id.as_str()) {
                ids.push(&info.id);
            }
        }
        ids
    }

    pub fn html_status(&self, id: &str) -> Option<HtmlApplication> {
        self.rewriter_stats
            .iter()
            .rev()
            .find(|s| s.id == id)
            .map(|s| s.html_status)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Append-only record store shared between documents
#[derive(Debug, Clone, Default)]
pub struct LogSink {
    inner: Arc<Mutex<LoggingInfo>>,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_info(&self, info: RewriterInfo) {
        self.inner.lock().rewriter_info.push(info);
    }

    pub fn append_stats(&self, stats: RewriterStats) {
        self.inner.lock().rewriter_stats.push(stats);
    }

    /// Copy of everything recorded so far
    pub fn snapshot(&self) -> LoggingInfo {
        self.inner.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_decision_record() {
        let inserted = RewriterInfo::image_decision(Some(916));
        let image = inserted.image.as_ref().unwrap();
        assert!(image.is_low_res_src_inserted);
        assert_eq!(image.low_res_size, 916);
        assert_eq!(inserted.status, RewriterApplication::NotApplied);

        let skipped = RewriterInfo::image_decision(None);
        let image = skipped.image.as_ref().unwrap();
        assert!(!image.is_low_res_src_inserted);
        assert_eq!(image.low_res_size, 0);
        assert!(skipped.resource.as_ref().unwrap().is_critical);
    }

    #[test]
    fn test_applied_rewriters() {
        let sink = LogSink::new();
        sink.append_info(RewriterInfo::image_decision(Some(10)));
        sink.append_info(RewriterInfo::delay_apply(RewriterApplication::AppliedOk));
        sink.append_info(RewriterInfo::delay_apply(RewriterApplication::AppliedOk));

        let snapshot = sink.snapshot();
        assert_eq!(snapshot.applied_rewriters(), vec![DELAY_IMAGES_ID]);
    }

    #[test]
    fn test_json_export() {
        let sink = LogSink::new();
        sink.append_stats(RewriterStats {
            id: DELAY_IMAGES_ID.to_string(),
            html_status: HtmlApplication::UserAgentNotSupported,
        });
        sink.append_info(RewriterInfo::delay_apply(RewriterApplication::AppliedOk));

        let json = sink.snapshot().to_json().unwrap();
        assert!(json.contains("\"USER_AGENT_NOT_SUPPORTED\""));
        assert!(json.contains("\"APPLIED_OK\""));
        assert!(!json.contains("\"image\""));
    }

    #[test]
    fn test_concurrent_appends() {
        let sink = LogSink::new();
        std::thread::scope(|scope| {
            for _ in 0..4 {
                let sink = sink.clone();
                scope.spawn(move || {
                    for _ in 0..100 {
                        sink.append_info(RewriterInfo::image_decision(None));
                    }
                });
            }
        });
        assert_eq!(sink.snapshot().rewriter_info.len(), 400);
    }
}
