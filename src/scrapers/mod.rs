pub mod gamulator;
pub mod hexrom;
pub mod romspedia;

use regex::Regex;
use std::sync::LazyLock;
use url::Url;

static PAGE_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)/page/\d+/?").expect("page segment pattern"));
static CONSOLE_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/roms/([^/?#]+)").expect("console path pattern"));
static GAME_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/roms/[^/?#]+/[^/?#]+").expect("game path pattern"));

const NON_GAME_URL_PARTS: [&str; 5] = ["/emulators/", "/emulator/", "/how-to-", "/bios/", "/tutorial/"];
const NON_GAME_TITLE_PARTS: [&str; 5] = ["emulator", "how to", "install", "bios", "tutorial"];

/// Resolves `href` against `base`; already-absolute links pass through.
pub(crate) fn absolutize(base: &str, href: &str) -> String {
    let href = href.trim();
    if href.is_empty() || href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    match Url::parse(base).and_then(|b| b.join(href)) {
        Ok(url) => url.to_string(),
        Err(_) => format!("{}/{}", base.trim_end_matches('/'), href.trim_start_matches('/')),
    }
}

/// Emulator downloads, BIOS packs and how-to articles that share the
/// game-card markup.
pub(crate) fn is_non_game(title: &str, url: &str) -> bool {
    let url = url.to_lowercase();
    let title = title.to_lowercase();
    NON_GAME_URL_PARTS.iter().any(|p| url.contains(p))
        || NON_GAME_TITLE_PARTS.iter().any(|p| title.contains(p))
}

/// Search-shaped listings have no trustworthy page count.
pub(crate) fn is_search_url(url: &str) -> bool {
    url.contains("/search?") || url.contains("search_term_string=") || url.contains("?search=") || url.contains("&search=")
}

/// The `/roms/<console>` segment that scopes a URL to one console.
pub fn console_path(url: &str) -> Option<String> {
    CONSOLE_PATH
        .captures(url)
        .map(|c| c[1].to_lowercase())
}

/// True when the URL points below a console, at a single game.
pub(crate) fn is_game_path(url: &str) -> bool {
    GAME_PATH.is_match(url)
}

/// Builds `.../page/N/` URLs, dropping any page segment already present.
/// The query string stays at the end.
pub(crate) fn with_page_segment(url: &str, page: u32) -> String {
    let stripped = PAGE_SEGMENT.replace_all(url, "/");
    let (path, query) = match stripped.find('?') {
        Some(i) => (&stripped[..i], &stripped[i..]),
        None => (&stripped[..], ""),
    };

    let mut built = path.to_string();
    if !built.ends_with('/') {
        built.push('/');
    }
    if page > 1 {
        built.push_str(&format!("page/{}/", page));
    }
    built.push_str(query);
    built
}

/// Removes `name=...` from the query string.
pub(crate) fn strip_query_param(url: &str, name: &str) -> String {
    let Some((path, query)) = url.split_once('?') else {
        return url.to_string();
    };
    let prefix = format!("{}=", name);
    let kept: Vec<&str> = query
        .split('&')
        .filter(|pair| !pair.is_empty() && !pair.starts_with(&prefix))
        .collect();
    if kept.is_empty() {
        path.to_string()
    } else {
        format!("{}?{}", path, kept.join("&"))
    }
}

/// Appends `name=value` with `?` or `&` as needed.
pub(crate) fn with_query_param(url: &str, name: &str, value: impl std::fmt::Display) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}{}={}", url, separator, name, value)
}

/// First capture group of `re` in `text`, or `""`.
pub(crate) fn capture(re: &Regex, text: &str) -> String {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Largest number captured by `re` anywhere in `text`.
pub(crate) fn max_capture(re: &Regex, text: &str) -> Option<u32> {
    re.captures_iter(text)
        .filter_map(|c| c.get(1)?.as_str().parse::<u32>().ok())
        .max()
}

/// Splits `html` into card segments, each starting at a match of `start`
/// and running to the next one (or the end of the document).
pub(crate) fn card_segments<'a>(start: &Regex, html: &'a str) -> Vec<&'a str> {
    let starts: Vec<usize> = start.find_iter(html).map(|m| m.start()).collect();
    starts
        .iter()
        .enumerate()
        .map(|(i, &from)| {
            let to = starts.get(i + 1).copied().unwrap_or(html.len());
            &html[from..to]
        })
        .collect()
}
