//! Content transformers, one per rewritten media type.
//!
//! Each transformer is a total function from the fetched body to the body sent
//! to the client. [`transform`] dispatches on a [`ContentKind`].

pub mod css;
pub mod html;
pub mod js;
pub mod srcset;

use crate::classifier::ContentKind;
use crate::target::RewriteContext;

pub use css::{rewrite_style_urls, transform_css};
pub use html::transform_html;
pub use js::transform_js;
pub use srcset::rewrite_srcset;

/// Runs the transformer for `kind`. [`ContentKind::Other`] is returned as is.
pub fn transform(kind: ContentKind, body: &str, ctx: &RewriteContext) -> String {
    match kind {
        ContentKind::Html => transform_html(body, ctx),
        ContentKind::Css => transform_css(body, ctx),
        ContentKind::JavaScript => transform_js(body, ctx),
        ContentKind::Other => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn ctx() -> RewriteContext {
        let target = Url::parse("https://t.example/").unwrap();
        RewriteContext::new("https://p.example", &target)
    }

    #[test]
    fn other_is_untouched() {
        let body = r#"{"next":"https://t.example/page/2"}"#;
        assert_eq!(transform(ContentKind::Other, body, &ctx()), body);
    }

    #[test]
    fn dispatches_by_kind() {
        let ctx = ctx();
        assert_eq!(
            transform(ContentKind::Css, "a{b:url(/x)}", &ctx),
            transform_css("a{b:url(/x)}", &ctx)
        );
        assert_eq!(
            transform(ContentKind::JavaScript, r#"u="https://t.example/x""#, &ctx),
            transform_js(r#"u="https://t.example/x""#, &ctx)
        );
        assert!(transform(ContentKind::Html, "<p></p>", &ctx).contains("<script>"));
    }
}
