//! Script rewriting: absolute URL string literals.
//!
//! This is approximate by nature. Literals that merely look like URLs are
//! rewritten too, and URLs assembled by concatenation at runtime are invisible
//! here; the runtime shim covers the latter for `fetch` and XHR.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::resolver::resolve;
use crate::target::RewriteContext;

/// A quoted `http(s)://` literal with at least five characters after the scheme.
///
/// Backtick literals exclude `$` so template interpolations are never split.
static JS_URL_LITERAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#""(?P<dq>(?i:https?)://[^"'`,\s\\]{5,})"|'(?P<sq>(?i:https?)://[^"'`,\s\\]{5,})'|`(?P<bt>(?i:https?)://[^"'`,\s\\$]{5,})`"#,
    )
    .expect("valid JS URL literal regex")
});

/// Rewrites absolute URL literals in a script body.
pub fn transform_js(body: &str, ctx: &RewriteContext) -> String {
    JS_URL_LITERAL_RE
        .replace_all(body, |caps: &Captures| {
            let (quote, raw) = if let Some(m) = caps.name("dq") {
                ('"', m.as_str())
            } else if let Some(m) = caps.name("sq") {
                ('\'', m.as_str())
            } else if let Some(m) = caps.name("bt") {
                ('`', m.as_str())
            } else {
                return caps[0].to_string();
            };
            format!("{quote}{}{quote}", resolve(raw, ctx))
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn ctx() -> RewriteContext {
        let target = Url::parse("https://t.example/js/app.js").unwrap();
        RewriteContext::new("https://p.example", &target)
    }

    #[test]
    fn rewrites_each_quote_style() {
        let ctx = ctx();
        let input = r#"a("https://api.example/v1");b('http://cdn.example/x.js');c(`https://t.example/y`);"#;
        let output = transform_js(input, &ctx);

        assert_eq!(
            output,
            format!(
                r#"a("{}");b('{}');c(`{}`);"#,
                resolve("https://api.example/v1", &ctx),
                resolve("http://cdn.example/x.js", &ctx),
                resolve("https://t.example/y", &ctx),
            )
        );
    }

    #[test]
    fn keeps_query_strings_whole() {
        let ctx = ctx();
        let output = transform_js(r#"fetch("https://api.example/q?a=1&b=2")"#, &ctx);
        assert_eq!(
            output,
            r#"fetch("https://p.example/?url=https%3A%2F%2Fapi.example%2Fq%3Fa%3D1%26b%3D2")"#
        );
    }

    #[test]
    fn short_and_relative_literals_untouched() {
        let input = r#"var a="http://x";var b="/api/data";var c='img.png';"#;
        assert_eq!(transform_js(input, &ctx()), input);
    }

    #[test]
    fn mismatched_quotes_untouched() {
        let input = r#"var a="https://example.com/a';"#;
        assert_eq!(transform_js(input, &ctx()), input);
    }

    #[test]
    fn template_interpolation_untouched() {
        let input = "fetch(`https://api.example/${id}`)";
        assert_eq!(transform_js(input, &ctx()), input);
    }

    #[test]
    fn already_proxied_untouched() {
        let ctx = ctx();
        let once = transform_js(r#"x="https://api.example/v1""#, &ctx);
        assert_eq!(transform_js(&once, &ctx), once);
    }

    #[test]
    fn concatenated_urls_are_missed() {
        let input = r#"var u="https:"+"//api.example/v1";"#;
        assert_eq!(transform_js(input, &ctx()), input);
    }
}
