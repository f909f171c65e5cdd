//! Inline Preview Library
//!
//! Rewrites streamed HTML so that images first show a small inlined
//! low resolution preview and swap to the original image once the page has
//! loaded, optionally handing images without a preview to lazy loading.
//!
//! # Modules
//!
//! - `filter`: Per-document orchestration over the event stream
//! - `resolver`: Per-image preview decisions
//! - `scripts`: Injected script blocks and static assets
//! - `capability`, `preview`: Collaborator traits and default implementations
//! - `logging`: Structured rewrite records
//! - `tokenizer`: quick-xml based markup tokenizer

pub mod capability;
pub mod classify;
pub mod config;
pub mod error;
pub mod filter;
pub mod logging;
pub mod markup;
pub mod preview;
pub mod resolver;
pub mod scripts;
pub mod state;
pub mod tokenizer;

// Re-export common types
pub use capability::{Capability, CapabilityOracle, UserAgentMatcher};
pub use config::RewriteConfig;
pub use error::{CapabilityError, PreviewError, Result, RewriteError};
pub use filter::{rewrite_document, Collaborators, InlinePreviewFilter};
pub use logging::{HtmlApplication, LogSink, LoggingInfo, RewriterApplication, RewriterInfo};
pub use markup::{Attribute, EndTag, Event, StartTag};
pub use preview::{ImageDataProvider, LowResData, MemoryPreviewProvider, PreviewRequest};
pub use scripts::{ScriptAssets, StaticAsset, StaticAssetManager};
