//! Runtime shim generation.
//!
//! Static rewriting only sees URLs present in the fetched bytes. The shim is a
//! small script injected at the top of every proxied document that patches
//! `fetch`, `XMLHttpRequest.prototype.open`, `window.open` and
//! `navigator.sendBeacon` so URLs built at runtime are routed through the
//! proxy as well, and spoofs `location` so same-origin checks see the target.
//!
//! The script lives in `assets/shim.js` with two substitution points,
//! `{{PROXY_ORIGIN}}` and `{{TARGET_ORIGIN}}`. Its `w(url)` helper mirrors
//! [`crate::resolve`] except for document-relative references, which runtime
//! code practically never produces.

use crate::target::RewriteContext;

/// Shim template.
pub const SHIM_TEMPLATE: &str = include_str!("../assets/shim.js");

const PROXY_ORIGIN_SLOT: &str = "{{PROXY_ORIGIN}}";
const TARGET_ORIGIN_SLOT: &str = "{{TARGET_ORIGIN}}";

/// Renders the shim script body for a request.
pub fn generate_shim(ctx: &RewriteContext) -> String {
    SHIM_TEMPLATE
        .replace(PROXY_ORIGIN_SLOT, &js_string_literal(ctx.proxy_origin()))
        .replace(TARGET_ORIGIN_SLOT, &js_string_literal(ctx.target_origin()))
}

/// Renders the shim wrapped in a `<script>` element, ready for injection.
pub fn shim_tag(ctx: &RewriteContext) -> String {
    format!("<script>{}</script>", generate_shim(ctx))
}

/// Encodes a value as a JavaScript string literal that is also safe inside
/// an HTML `<script>` element.
pub fn js_string_literal(value: &str) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|_| "\"\"".to_string())
        .replace('<', "\\u003c")
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029")
}
