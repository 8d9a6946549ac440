//! Stylesheet rewriting: `url(...)` values and `@import` targets.
//!
//! Pattern based rather than a CSS parse. Selectors, properties and comments
//! pass through byte for byte; only the URL arguments change.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::resolver::resolve;
use crate::target::RewriteContext;

/// `url(...)` with a double-quoted, single-quoted, or bare argument.
static CSS_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)url\(\s*(?:"(?P<dq>[^"]*)"|'(?P<sq>[^']*)'|(?P<bare>[^"')\s]*))\s*\)"#)
        .expect("valid CSS url regex")
});

/// `@import "..."` / `@import '...'`. The `url(...)` form is covered above.
static CSS_IMPORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)@import\s+(?:"(?P<dq>[^"]*)"|'(?P<sq>[^']*)')"#)
        .expect("valid CSS import regex")
});

/// Rewrites every `url(...)` and `@import` target in a stylesheet.
pub fn transform_css(body: &str, ctx: &RewriteContext) -> String {
    let with_urls = rewrite_style_urls(body, ctx);

    CSS_IMPORT_RE
        .replace_all(&with_urls, |caps: &Captures| {
            let (quote, raw) = quoted_argument(caps);
            format!("@import {quote}{}{quote}", resolve(raw, ctx))
        })
        .into_owned()
}

/// Rewrites `url(...)` values only. Used for stylesheets and inline `style`
/// attributes alike.
pub fn rewrite_style_urls(css: &str, ctx: &RewriteContext) -> String {
    if !contains_ignore_case(css, "url(") {
        return css.to_string();
    }

    CSS_URL_RE
        .replace_all(css, |caps: &Captures| {
            let (quote, raw) = quoted_argument(caps);
            if raw.trim().is_empty() || raw.trim_start().to_ascii_lowercase().starts_with("data:") {
                return caps[0].to_string();
            }
            format!("url({quote}{}{quote})", resolve(raw, ctx))
        })
        .into_owned()
}

/// Returns the quote character (possibly empty) and the argument text.
fn quoted_argument<'c>(caps: &'c Captures) -> (&'static str, &'c str) {
    if let Some(m) = caps.name("dq") {
        ("\"", m.as_str())
    } else if let Some(m) = caps.name("sq") {
        ("'", m.as_str())
    } else {
        ("", caps.name("bare").map(|m| m.as_str()).unwrap_or_default())
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack
        .as_bytes()
        .windows(needle.len())
        .any(|window| window.eq_ignore_ascii_case(needle.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::resolve;
    use url::Url;

    fn ctx() -> RewriteContext {
        let target = Url::parse("https://t.example/css/main.css").unwrap();
        RewriteContext::new("https://p.example", &target)
    }

    #[test]
    fn rewrites_url_and_import() {
        let ctx = ctx();
        let input = r#"body{background:url(/bg.png)} @import "theme.css";"#;
        let output = transform_css(input, &ctx);

        assert_eq!(
            output,
            format!(
                r#"body{{background:url({})}} @import "{}";"#,
                resolve("https://t.example/bg.png", &ctx),
                resolve("https://t.example/css/theme.css", &ctx),
            )
        );
    }

    #[test]
    fn keeps_quote_style() {
        let ctx = ctx();
        let output = transform_css(
            r#"a{b:url("x.png")} c{d:url('y.png')} @import 'z.css';"#,
            &ctx,
        );
        assert!(output.contains(&format!(r#"url("{}")"#, resolve("x.png", &ctx))));
        assert!(output.contains(&format!("url('{}')", resolve("y.png", &ctx))));
        assert!(output.contains(&format!("@import '{}'", resolve("z.css", &ctx))));
    }

    #[test]
    fn import_url_form_rewritten_once() {
        let ctx = ctx();
        let output = transform_css(r#"@import url("https://cdn.example/f.css");"#, &ctx);
        assert_eq!(
            output,
            format!(
                r#"@import url("{}");"#,
                resolve("https://cdn.example/f.css", &ctx)
            )
        );
    }

    #[test]
    fn data_uris_untouched() {
        let input = r#"i{background:url(data:image/png;base64,AAAA)} j{mask:url("DATA:image/svg+xml;utf8,<svg/>")}"#;
        assert_eq!(transform_css(input, &ctx()), input);
    }

    #[test]
    fn empty_url_untouched() {
        let input = "a{b:url()} c{d:url( '' )}";
        assert_eq!(transform_css(input, &ctx()), input);
    }

    #[test]
    fn fragment_references_untouched() {
        let input = "svg{filter:url(#blur)}";
        assert_eq!(transform_css(input, &ctx()), input);
    }

    #[test]
    fn uppercase_function_name() {
        let ctx = ctx();
        let output = rewrite_style_urls("background:URL(/a.png)", &ctx);
        assert_eq!(output, format!("background:url({})", resolve("/a.png", &ctx)));
    }

    #[test]
    fn no_url_means_no_change() {
        let input = "a{color:red}";
        assert_eq!(transform_css(input, &ctx()), input);
    }

    #[test]
    fn already_proxied_untouched() {
        let ctx = ctx();
        let once = transform_css("a{b:url(/x.png)}", &ctx);
        assert_eq!(transform_css(&once, &ctx), once);
    }
}
