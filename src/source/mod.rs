//! Source resolution and caching

pub mod cache;
pub mod resolver;

pub use cache::{CacheManager, CachedDocument};
pub use resolver::{materialize_upload, resolve_base64, resolve_cache, resolve_path, ResolvedPdf};
