//! HTML rewriting on top of `lol_html`'s streaming tag rewriter.
//!
//! Only attribute values change, plus two removals and one insertion:
//! - `integrity` and `crossorigin` are dropped everywhere
//! - `<meta http-equiv>` carrying CSP or X-Frame-Options is removed
//! - the runtime shim becomes the first child of the first `<head>`
//!
//! Text content and element order are never touched.

use std::cell::Cell;

use html_escape::decode_html_entities;
use lol_html::errors::RewritingError;
use lol_html::html_content::{ContentType, Element};
use lol_html::{element, HtmlRewriter, Settings};

use crate::resolver::resolve;
use crate::rewrite::css::rewrite_style_urls;
use crate::rewrite::srcset::rewrite_srcset;
use crate::shim::shim_tag;
use crate::target::RewriteContext;

/// Element/attribute pairs holding a single URL.
pub const URL_ATTRIBUTES: &[(&str, &str)] = &[
    ("a", "href"),
    ("link", "href"),
    ("script", "src"),
    ("img", "src"),
    ("source", "src"),
    ("iframe", "src"),
    ("form", "action"),
    ("video", "src"),
    ("audio", "src"),
];

/// Elements whose `srcset` is rewritten.
pub const SRCSET_ELEMENTS: &[&str] = &["img", "source"];

/// `http-equiv` values whose `<meta>` tags are removed.
const BLOCKED_HTTP_EQUIV: &[&str] = &["content-security-policy", "x-frame-options"];

/// Rewrites an HTML document and injects the runtime shim.
///
/// Never fails: if the rewriter rejects the input, the document is returned
/// unchanged.
pub fn transform_html(body: &str, ctx: &RewriteContext) -> String {
    match rewrite_document(body, ctx) {
        Ok(output) => output,
        Err(e) => {
            tracing::warn!(
                "HTML rewrite failed for {}, passing document through: {}",
                ctx.target_origin(),
                e
            );
            body.to_string()
        }
    }
}

fn rewrite_document(body: &str, ctx: &RewriteContext) -> Result<String, RewritingError> {
    let shim = shim_tag(ctx);
    let head_seen = Cell::new(false);
    let mut output = Vec::with_capacity(body.len() + shim.len());

    let mut handlers = vec![
        element!("head", |el| {
            if !head_seen.replace(true) {
                el.prepend(&shim, ContentType::Html);
            }
            Ok(())
        }),
        element!("meta[http-equiv]", |el| {
            let value = el.get_attribute("http-equiv").unwrap_or_default();
            if BLOCKED_HTTP_EQUIV.contains(&value.trim().to_ascii_lowercase().as_str()) {
                el.remove();
            }
            Ok(())
        }),
        element!("[integrity], [crossorigin]", |el| {
            el.remove_attribute("integrity");
            el.remove_attribute("crossorigin");
            Ok(())
        }),
        element!("[style]", |el| {
            if let Some(raw) = el.get_attribute("style") {
                let style = decode_html_entities(&raw);
                let rewritten = rewrite_style_urls(&style, ctx);
                if rewritten != style {
                    // Attribute values are written double-quoted.
                    el.set_attribute("style", &rewritten.replace('"', "'"))?;
                }
            }
            Ok(())
        }),
    ];

    for &(tag, attr) in URL_ATTRIBUTES {
        handlers.push(element!(format!("{tag}[{attr}]"), move |el| {
            rewrite_url_attribute(el, attr, ctx)
        }));
    }
    for &tag in SRCSET_ELEMENTS {
        handlers.push(element!(format!("{tag}[srcset]"), move |el| {
            if let Some(raw) = el.get_attribute("srcset") {
                let srcset = decode_html_entities(&raw);
                let rewritten = rewrite_srcset(&srcset, ctx);
                if rewritten != srcset {
                    el.set_attribute("srcset", &rewritten)?;
                }
            }
            Ok(())
        }));
    }

    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: handlers,
            ..Settings::default()
        },
        |chunk: &[u8]| output.extend_from_slice(chunk),
    );
    rewriter.write(body.as_bytes())?;
    rewriter.end()?;

    let mut document = String::from_utf8_lossy(&output).into_owned();
    if !head_seen.get() {
        document.insert_str(0, &shim);
    }

    tracing::debug!(
        "Rewrote HTML from {} ({} -> {} bytes)",
        ctx.target_origin(),
        body.len(),
        document.len()
    );
    Ok(document)
}

fn rewrite_url_attribute(
    el: &mut Element,
    attr: &str,
    ctx: &RewriteContext,
) -> lol_html::HandlerResult {
    if let Some(raw) = el.get_attribute(attr) {
        let value = decode_html_entities(&raw);
        let rewritten = resolve(&value, ctx);
        if rewritten != value {
            el.set_attribute(attr, &rewritten)?;
        }
    }
    Ok(())
}
