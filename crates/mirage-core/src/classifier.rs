//! Content classification: picks the rewrite pipeline for a fetched response.

/// Media types that say nothing useful about the payload.
const GENERIC_TYPES: &[&str] = &[
    "text/plain",
    "application/octet-stream",
    "binary/octet-stream",
];

/// Rewrite pipeline selected for a response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ContentKind {
    /// HTML document.
    Html,
    /// Stylesheet.
    Css,
    /// Script.
    JavaScript,
    /// Anything else, forwarded untouched.
    #[default]
    Other,
}

impl ContentKind {
    /// Returns the kind name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Html => "html",
            ContentKind::Css => "css",
            ContentKind::JavaScript => "javascript",
            ContentKind::Other => "other",
        }
    }

    /// Content type sent to the client for rewritten kinds.
    ///
    /// Returns `None` for [`ContentKind::Other`], whose upstream type is kept.
    pub fn response_content_type(&self) -> Option<&'static str> {
        match self {
            ContentKind::Html => Some("text/html;charset=utf-8"),
            ContentKind::Css => Some("text/css"),
            ContentKind::JavaScript => Some("application/javascript"),
            ContentKind::Other => None,
        }
    }

    /// Returns true if the body is rewritten rather than passed through.
    pub fn is_rewritten(&self) -> bool {
        !matches!(self, ContentKind::Other)
    }
}

/// Classifies a response by its declared media type, falling back to the
/// extension of the target path when the declared type is empty or generic.
pub fn classify(declared_content_type: &str, target_path: &str) -> ContentKind {
    let essence = declared_content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if essence == "text/html" || essence == "application/xhtml+xml" {
        return ContentKind::Html;
    }
    if essence == "text/css" {
        return ContentKind::Css;
    }
    if essence.contains("javascript") || essence.contains("ecmascript") {
        return ContentKind::JavaScript;
    }

    if essence.is_empty() || GENERIC_TYPES.contains(&essence.as_str()) {
        return classify_by_extension(target_path);
    }

    ContentKind::Other
}

/// Classifies by path suffix alone. Query and fragment are ignored.
pub fn classify_by_extension(target_path: &str) -> ContentKind {
    let path = target_path
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();

    if path.ends_with(".css") {
        ContentKind::Css
    } else if path.ends_with(".js") || path.ends_with(".mjs") {
        ContentKind::JavaScript
    } else {
        ContentKind::Other
    }
}
