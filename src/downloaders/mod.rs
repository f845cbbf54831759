pub mod gamulator;
pub mod hexrom;
pub mod romspedia;

use crate::scrapers::absolutize;
use regex::Regex;
use std::sync::LazyLock;

static ANCHOR_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<a\b[^>]*>").expect("anchor tag pattern"));
static HREF_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\bhref\s*=\s*["']([^"']+)["']"#).expect("href pattern"));
static CLASS_OR_ID_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\b(?:class|id)\s*=\s*["']([^"']*)["']"#).expect("class/id pattern"));
static ARCHIVE_HREF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.(?:zip|rar)(?:[?#].*)?$").expect("archive href pattern"));
static BARE_ARCHIVE_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)https?://[^"'\s<>]+?\.(?:zip|rar)\b"#).expect("bare archive pattern"));
static TABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<table.*?</table>").expect("table pattern"));

struct Anchor<'a> {
    href: &'a str,
    tag: &'a str,
}

fn anchors(html: &str) -> impl Iterator<Item = Anchor<'_>> {
    ANCHOR_TAG.find_iter(html).filter_map(|m| {
        let tag = m.as_str();
        let href = HREF_ATTR.captures(tag)?.get(1)?.as_str();
        Some(Anchor { href, tag })
    })
}

fn is_archive(href: &str) -> bool {
    ARCHIVE_HREF.is_match(href)
}

/// First archive anchor whose class or id contains `marker`.
pub(crate) fn marked_archive_anchor(html: &str, marker: &str, page_url: &str) -> Option<String> {
    let marker = marker.to_lowercase();
    anchors(html)
        .filter(|a| is_archive(a.href))
        .find(|a| {
            CLASS_OR_ID_ATTR
                .captures_iter(a.tag)
                .any(|c| c[1].to_lowercase().contains(&marker))
        })
        .map(|a| absolutize(page_url, a.href))
}

/// Any absolute `.zip`/`.rar` URL in the page text.
pub(crate) fn bare_archive_url(html: &str) -> Option<String> {
    BARE_ARCHIVE_URL
        .find(html)
        .map(|m| m.as_str().to_string())
}

/// First archive anchor anywhere on the page, relative links included.
pub(crate) fn first_archive_anchor(html: &str, page_url: &str) -> Option<String> {
    anchors(html)
        .find(|a| is_archive(a.href))
        .map(|a| absolutize(page_url, a.href))
}

/// First archive anchor strictly after the first `<table>` (older layouts).
pub(crate) fn archive_anchor_after_table(html: &str, page_url: &str) -> Option<String> {
    let table = TABLE.find(html)?;
    anchors(&html[table.end()..])
        .find(|a| is_archive(a.href))
        .map(|a| absolutize(page_url, a.href))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "https://hexrom.com/roms/gba/metroid/download/";

    #[test]
    fn marked_anchor_accepts_any_attribute_order() {
        let html = r#"<a href="/files/x.zip" class="btn btn-download">Get</a>"#;
        assert_eq!(
            marked_archive_anchor(html, "download", PAGE).as_deref(),
            Some("https://hexrom.com/files/x.zip")
        );

        let html = r#"<a id="download" href='https://cdn.x/y.rar'>Get</a>"#;
        assert_eq!(marked_archive_anchor(html, "download", PAGE).as_deref(), Some("https://cdn.x/y.rar"));
    }

    #[test]
    fn marked_anchor_requires_archive_extension() {
        let html = r#"<a class="download" href="/go/123">Get</a>"#;
        assert_eq!(marked_archive_anchor(html, "download", PAGE), None);
    }

    #[test]
    fn bare_url_stops_at_extension() {
        let html = r#"<script>var u = "https://dl.example.com/Metroid%20Fusion.zip";</script>"#;
        assert_eq!(
            bare_archive_url(html).as_deref(),
            Some("https://dl.example.com/Metroid%20Fusion.zip")
        );
        assert_eq!(bare_archive_url("<p>nothing</p>"), None);
    }

    #[test]
    fn after_table_skips_earlier_anchors() {
        let html = r#"<a href="/before.zip">x</a><table><tr><td>Size</td></tr></table><p><a href="/after.zip">dl</a></p>"#;
        assert_eq!(
            archive_anchor_after_table(html, PAGE).as_deref(),
            Some("https://hexrom.com/after.zip")
        );
    }
}
