//! Mirage Core - URL resolution and content rewriting.
//!
//! This crate holds the rewriting engine of the Mirage proxy. Given the
//! proxy's own origin and the URL a document was fetched from, it rewrites
//! every reference in HTML, CSS and JavaScript so the browser's follow-up
//! requests come back through the proxy instead of going to the target.
//!
//! Everything here is synchronous, stateless and total: rewrites never fail,
//! unusual references are left as they are.
//!
//! ## Pipeline
//!
//! ```text
//! fetched body ──► classify(content-type, path) ──► ContentKind
//!                                                       │
//!        ┌──────────────┬──────────────┬────────────────┤
//!        ▼              ▼              ▼                ▼
//!   transform_html  transform_css  transform_js       Other
//!   (+ runtime shim)     │              │          (pass-through)
//!        └──────────────┴──────┬───────┘
//!                              ▼
//!                   resolve(reference, ctx)
//! ```

pub mod classifier;
pub mod error;
pub mod resolver;
pub mod rewrite;
pub mod shim;
pub mod target;

pub use classifier::{classify, classify_by_extension, ContentKind};
pub use error::{Result, TargetError};
pub use resolver::{classify_reference, resolve, wrap_absolute, RewriteRule, PROXY_QUERY_PATH};
pub use rewrite::{transform, transform_css, transform_html, transform_js};
pub use shim::{generate_shim, shim_tag};
pub use target::{extract_target, origin_of, parse_target, RewriteContext};
