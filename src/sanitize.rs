//! Checks and cleanup for the rich-text HTML produced by the posting editor.

use once_cell::sync::Lazy;
use regex::Regex;

static SCRIPT_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script[^>]*>.*?</script>").expect("valid regex"));
static EVENT_HANDLER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\bon\w+\s*=\s*["'][^"']*["']"#).expect("valid regex")
});
static JAVASCRIPT_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)javascript:").expect("valid regex"));
static IFRAME_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<iframe[^>]*>.*?</iframe>").expect("valid regex"));
static ANY_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

const FORBIDDEN_MARKERS: [&str; 4] = ["<script", "javascript:", "onerror=", "onclick="];

/// Blank content is valid; emptiness is enforced separately.
pub fn is_valid_rich_text(html: &str) -> bool {
    if html.trim().is_empty() {
        return true;
    }
    let lower = html.to_lowercase();
    !FORBIDDEN_MARKERS.iter().any(|marker| lower.contains(marker))
}

pub fn sanitize_rich_text(html: &str) -> String {
    if html.trim().is_empty() {
        return html.to_string();
    }
    let without_scripts = SCRIPT_BLOCK.replace_all(html, "");
    let without_handlers = EVENT_HANDLER.replace_all(&without_scripts, "");
    let without_urls = JAVASCRIPT_URL.replace_all(&without_handlers, "");
    let without_frames = IFRAME_BLOCK.replace_all(&without_urls, "");
    without_frames.trim().to_string()
}

pub fn html_to_plain_text(html: &str) -> String {
    if html.trim().is_empty() {
        return String::new();
    }
    let stripped = ANY_TAG.replace_all(html, "");
    let decoded = stripped
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    WHITESPACE.replace_all(&decoded, " ").trim().to_string()
}

/// True when nothing readable remains once markup is stripped.
pub fn is_blank_rich_text(html: &str) -> bool {
    html_to_plain_text(html).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn editor_markup_is_valid() {
        assert!(is_valid_rich_text(""));
        assert!(is_valid_rich_text(
            "<h2>About</h2><p>We build <strong>tools</strong>.</p><ul><li>Rust</li></ul>"
        ));
    }

    #[test]
    fn script_and_handlers_are_invalid() {
        assert!(!is_valid_rich_text("<p>hi</p><SCRIPT>alert(1)</SCRIPT>"));
        assert!(!is_valid_rich_text("<a href=\"JavaScript:void(0)\">x</a>"));
        assert!(!is_valid_rich_text("<img src=x onerror=alert(1)>"));
        assert!(!is_valid_rich_text("<p onClick=\"go()\">x</p>"));
    }

    #[test]
    fn sanitize_strips_active_content() {
        let dirty = "  <p onmouseover=\"track()\">Hello</p><script type=\"text/javascript\">\nsteal()\n</script><a href=\"javascript:go()\">link</a><iframe src=\"https://evil\"></iframe>  ";
        assert_eq!(
            sanitize_rich_text(dirty),
            "<p >Hello</p><a href=\"go()\">link</a>"
        );
    }

    #[test]
    fn sanitize_keeps_words_that_contain_on() {
        let html = "<p data-section='x'>Contact honor='y'</p>";
        assert_eq!(sanitize_rich_text(html), html);
    }

    #[test]
    fn plain_text_decodes_entities_and_collapses_whitespace() {
        let html = "<p>Salary &amp; benefits</p>\n\n<p>&lt;remote&gt;&nbsp;&quot;ok&quot; it&#39;s</p>";
        assert_eq!(
            html_to_plain_text(html),
            "Salary & benefits <remote> \"ok\" it's"
        );
    }

    #[test]
    fn blank_detection_ignores_markup() {
        assert!(is_blank_rich_text("<p><br></p>"));
        assert!(is_blank_rich_text("   "));
        assert!(!is_blank_rich_text("<p>x</p>"));
    }
}
