//! `srcset` candidate list rewriting.

use crate::resolver::resolve;
use crate::target::RewriteContext;

/// Rewrites each URL in a `srcset` value, leaving descriptors and separators
/// exactly as they were.
///
/// A candidate URL is a run of non-whitespace characters; commas at its end
/// separate candidates. This keeps `data:` candidates, which contain commas
/// of their own, in one piece.
pub fn rewrite_srcset(value: &str, ctx: &RewriteContext) -> String {
    let mut out = String::with_capacity(value.len() * 2);
    let mut rest = value;

    loop {
        let separators = rest.len()
            - rest
                .trim_start_matches(|c: char| c.is_ascii_whitespace() || c == ',')
                .len();
        out.push_str(&rest[..separators]);
        rest = &rest[separators..];
        if rest.is_empty() {
            break;
        }

        let url_end = rest
            .find(|c: char| c.is_ascii_whitespace())
            .unwrap_or(rest.len());
        let candidate = &rest[..url_end];
        let url = candidate.trim_end_matches(',');
        let trailing = &candidate[url.len()..];

        out.push_str(&resolve(url, ctx));
        out.push_str(trailing);
        rest = &rest[url_end..];

        if !trailing.is_empty() {
            continue;
        }

        let descriptor_end = rest.find(',').unwrap_or(rest.len());
        out.push_str(&rest[..descriptor_end]);
        rest = &rest[descriptor_end..];
    }

    out
}
