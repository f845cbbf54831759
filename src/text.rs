use regex::{Captures, Regex};
use scraper::Html;
use std::sync::LazyLock;

const REPLACEMENT: &str = "\u{FFFD}";

const NAMED_ENTITIES: [(&str, &str); 5] = [
    ("&amp;", "&"),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&nbsp;", " "),
];

static DECIMAL_ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&#([0-9]+);").expect("decimal entity pattern"));
static HEX_ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&#[xX]([0-9A-Fa-f]+);").expect("hex entity pattern"));
static BLANK_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("blank line pattern"));

/// Turns a scraped HTML text fragment into display text.
///
/// Trims, decodes named/decimal/hex entities and strips control characters
/// (newlines survive). Passes repeat until nothing changes, so the result
/// is stable under a second call.
pub fn clean_html_text(raw: &str) -> String {
    let mut current = clean_pass(raw);
    loop {
        let next = clean_pass(&current);
        if next == current {
            return next;
        }
        current = next;
    }
}

fn clean_pass(input: &str) -> String {
    let mut text = input.trim().to_string();

    for (entity, replacement) in NAMED_ENTITIES {
        text = text.replace(entity, replacement);
    }
    text = text.replace('\r', "");

    let text = DECIMAL_ENTITY.replace_all(&text, |caps: &Captures| {
        decode_code_point(&caps[1], 10).unwrap_or_else(|| caps[0].to_string())
    });
    let text = HEX_ENTITY.replace_all(&text, |caps: &Captures| {
        decode_code_point(&caps[1], 16).unwrap_or_else(|| caps[0].to_string())
    });

    text.chars()
        .filter(|c| *c == '\n' || !c.is_control())
        .collect()
}

fn decode_code_point(digits: &str, radix: u32) -> Option<String> {
    let code = u32::from_str_radix(digits, radix).ok()?;
    Some(
        char::from_u32(code)
            .unwrap_or(char::REPLACEMENT_CHARACTER)
            .to_string(),
    )
}

/// Splits raw bytes into one string per UTF-8 code point.
///
/// A bad lead or continuation byte becomes U+FFFD and scanning resumes at
/// the next byte; a sequence cut off by the end of input becomes U+FFFD and
/// ends the scan.
pub fn split_codepoints(bytes: &[u8]) -> Vec<String> {
    let mut out = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let width = match bytes[i] {
            0x00..=0x7F => 1,
            b if b & 0xE0 == 0xC0 => 2,
            b if b & 0xF0 == 0xE0 => 3,
            b if b & 0xF8 == 0xF0 => 4,
            _ => 0,
        };

        if width == 0 {
            out.push(REPLACEMENT.to_string());
            i += 1;
            continue;
        }
        if i + width > bytes.len() {
            out.push(REPLACEMENT.to_string());
            break;
        }

        let chunk = &bytes[i..i + width];
        if chunk[1..].iter().any(|b| b & 0xC0 != 0x80) {
            out.push(REPLACEMENT.to_string());
            i += 1;
            continue;
        }

        match std::str::from_utf8(chunk) {
            Ok(s) => out.push(s.to_string()),
            Err(_) => out.push(REPLACEMENT.to_string()),
        }
        i += width;
    }

    out
}

/// Form-style percent encoding: unreserved characters pass, space becomes `+`.
pub fn url_encode(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            b' ' => encoded.push('+'),
            other => encoded.push_str(&format!("%{:02X}", other)),
        }
    }
    encoded
}

/// Text content of an HTML fragment, one text node per `separator`.
pub fn fragment_text(fragment: &str, separator: &str) -> String {
    let document = Html::parse_fragment(fragment);
    document
        .root_element()
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(separator)
}

pub fn collapse_blank_lines(text: &str) -> String {
    BLANK_RUN.replace_all(text, "\n\n").into_owned()
}

/// Byte-offset window into `text`, widened to the nearest char boundaries.
pub(crate) fn window(text: &str, start: usize, len: usize) -> &str {
    let mut start = start.min(text.len());
    while !text.is_char_boundary(start) {
        start -= 1;
    }
    let mut end = start.saturating_add(len).min(text.len());
    while !text.is_char_boundary(end) {
        end += 1;
    }
    &text[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_named_and_numeric_entities() {
        assert_eq!(clean_html_text("Mega Man &amp; Bass"), "Mega Man & Bass");
        assert_eq!(clean_html_text("Caf&#233;"), "Café");
        assert_eq!(clean_html_text("It&#x27;s"), "It's");
        assert_eq!(clean_html_text("&lt;b&gt; &quot;x&quot;"), "<b> \"x\"");
        assert_eq!(clean_html_text("a&nbsp;b"), "a b");
        assert_eq!(clean_html_text("&#x1F3AE;"), "\u{1F3AE}");
    }

    #[test]
    fn trims_and_strips_controls() {
        assert_eq!(clean_html_text("  \tZelda\r\n"), "Zelda");
        assert_eq!(clean_html_text("line1\nline2\u{7}"), "line1\nline2");
    }

    #[test]
    fn cleaning_is_idempotent() {
        let samples = [
            "Mega Man &amp; Bass",
            "&amp;amp;lt;",
            "&#32; padded &#32;",
            "\u{1}  x",
            "Caf&#233; &#xD800; &#99999999999;",
            "&amp;#233;",
            "plain",
            "",
        ];
        for s in samples {
            let once = clean_html_text(s);
            assert_eq!(clean_html_text(&once), once, "input {:?}", s);
        }
    }

    #[test]
    fn splits_codepoints() {
        assert_eq!(split_codepoints("aé€".as_bytes()), vec!["a", "é", "€"]);
        assert_eq!(split_codepoints(&[b'a', 0xFF, b'b']), vec!["a", REPLACEMENT, "b"]);
        assert_eq!(split_codepoints(&[b'a', 0xE2, 0x82]), vec!["a", REPLACEMENT]);
        assert_eq!(split_codepoints(&[0xC3, b'x']), vec![REPLACEMENT, "x"]);
    }

    #[test]
    fn encodes_query_values() {
        assert_eq!(url_encode("super mario"), "super+mario");
        assert_eq!(url_encode("a&b/c~"), "a%26b%2Fc~");
    }

    #[test]
    fn fragment_text_joins_nodes() {
        assert_eq!(fragment_text("<p>One <b>two</b></p><p>three</p>", "\n"), "One\ntwo\nthree");
    }

    #[test]
    fn window_respects_char_boundaries() {
        let s = "ééé";
        assert_eq!(window(s, 1, 2), "é");
        assert_eq!(window(s, 2, 3), "éé");
        assert_eq!(window(s, 10, 5), "");
    }
}
