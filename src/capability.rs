//! Client capability classification
//!
//! The rewriter asks a [`CapabilityOracle`] exactly once per document and
//! keeps the answer for the document's whole lifetime.

use crate::error::CapabilityError;

/// What the requesting client can handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capability {
    /// Client runs the preview swap scripts
    pub supports_preview: bool,
    /// Client runs the lazy-load scripts
    pub supports_lazyload: bool,
    /// Small-screen client that gets resized previews
    pub is_mobile_resize_class: bool,
}

impl Capability {
    pub fn unsupported() -> Self {
        Self::default()
    }

    pub fn desktop() -> Self {
        Self {
            supports_preview: true,
            supports_lazyload: true,
            is_mobile_resize_class: false,
        }
    }

    pub fn mobile() -> Self {
        Self {
            is_mobile_resize_class: true,
            ..Self::desktop()
        }
    }
}

/// Maps a raw client identifier (user agent) to a [`Capability`]
pub trait CapabilityOracle: Send + Sync {
    fn capability_for(&self, client_id: &str) -> Result<Capability, CapabilityError>;
}

/// Substring based user agent classifier
///
/// A user agent is unsupported when it is empty or contains one of the
/// `unsupported` markers; it is mobile when it contains one of the `mobile`
/// markers. Matching is case-sensitive, like the markers themselves.
#[derive(Debug, Clone)]
pub struct UserAgentMatcher {
    unsupported: Vec<String>,
    no_lazyload: Vec<String>,
    mobile: Vec<String>,
}

impl Default for UserAgentMatcher {
    fn default() -> Self {
        Self {
            unsupported: ["unsupported", "MSIE 5.", "MSIE 6.", "Opera Mini", "Googlebot"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            no_lazyload: ["MSIE 7.", "BlackBerry"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            mobile: ["Android", "iPhone OS", "iPod", "Mobile", "Windows Phone"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl UserAgentMatcher {
    pub fn new(unsupported: Vec<String>, no_lazyload: Vec<String>, mobile: Vec<String>) -> Self {
        Self {
            unsupported,
            no_lazyload,
            mobile,
        }
    }

    fn matches(markers: &[String], user_agent: &str) -> bool {
        markers.iter().any(|m| user_agent.contains(m.as_str()))
    }
}

impl CapabilityOracle for UserAgentMatcher {
    fn capability_for(&self, client_id: &str) -> Result<Capability, CapabilityError> {
        let user_agent = client_id.trim();
        if user_agent.is_empty() || Self::matches(&self.unsupported, user_agent) {
            return Ok(Capability::unsupported());
        }
        Ok(Capability {
            supports_preview: true,
            supports_lazyload: !Self::matches(&self.no_lazyload, user_agent),
            is_mobile_resize_class: Self::matches(&self.mobile, user_agent),
        })
    }
}
