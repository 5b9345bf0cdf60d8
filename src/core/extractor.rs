use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};

/// Embed hosts whose URLs can be handed straight to the download engine.
pub const HOST_HINTS: &[&str] = &["supervideo.cc", "p2pplay", "kinoger.pw", "kinoger.ru"];

/// Extensions that mark a URL as a direct stream manifest or container.
pub const STREAM_EXTS: &[&str] = &[".m3u8", ".mpd", ".mp4"];

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^"'\s<>\\]+"#).unwrap());

/// True when the URL itself already references a stream: query string
/// aside, the path ends in a known streaming extension.
pub fn looks_like_stream(raw: &str) -> bool {
    match url::Url::parse(raw) {
        Ok(parsed) => STREAM_EXTS.iter().any(|ext| parsed.path().ends_with(ext)),
        Err(_) => false,
    }
}

fn matches_host_hint(url: &str) -> bool {
    HOST_HINTS.iter().any(|hint| url.contains(hint))
}

/// Collect embed-player URLs from raw page markup.
///
/// Scans the text for absolute URLs in document order and additionally walks
/// `iframe[src]` attributes of the parsed DOM, keeping only URLs that match a
/// known embed-host fingerprint. Duplicates are removed, insertion order is
/// preserved, and no input can make this fail: unmatched markup just yields
/// an empty list.
pub fn extract_embed_urls(html: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut found = Vec::new();

    for m in URL_RE.find_iter(html) {
        let url = m.as_str().trim_end_matches(['.', ',', ')', ';']);
        if matches_host_hint(url) && seen.insert(url.to_string()) {
            found.push(url.to_string());
        }
    }

    let document = Html::parse_document(html);
    if let Ok(selector) = Selector::parse("iframe[src]") {
        for element in document.select(&selector) {
            if let Some(src) = element.value().attr("src") {
                let src = src.trim();
                if src.starts_with("http")
                    && matches_host_hint(src)
                    && seen.insert(src.to_string())
                {
                    found.push(src.to_string());
                }
            }
        }
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_only_known_hosts() {
        let html = r#"
            <a href="https://supervideo.cc/e/abc123">watch</a>
            <a href="https://example.com/unrelated">other</a>
            <script>var u = "https://cdn.p2pplay.pro/stream/42";</script>
        "#;
        let urls = extract_embed_urls(html);
        assert_eq!(
            urls,
            vec![
                "https://supervideo.cc/e/abc123".to_string(),
                "https://cdn.p2pplay.pro/stream/42".to_string(),
            ]
        );
    }

    #[test]
    fn preserves_document_order_and_dedupes() {
        let html = r#"
            https://kinoger.ru/v/1 https://supervideo.cc/e/2
            https://kinoger.ru/v/1
        "#;
        let urls = extract_embed_urls(html);
        assert_eq!(urls.len(), 2);
        assert_eq!(urls[0], "https://kinoger.ru/v/1");
        assert_eq!(urls[1], "https://supervideo.cc/e/2");
    }

    #[test]
    fn picks_up_iframe_sources() {
        let html = r#"<html><body>
            <iframe src="https://kinoger.pw/embed/777"></iframe>
            <iframe src="/relative/player"></iframe>
        </body></html>"#;
        let urls = extract_embed_urls(html);
        assert_eq!(urls, vec!["https://kinoger.pw/embed/777".to_string()]);
    }

    #[test]
    fn empty_on_no_matches() {
        assert!(extract_embed_urls("<html><body>nothing here</body></html>").is_empty());
        assert!(extract_embed_urls("").is_empty());
    }

    #[test]
    fn stream_detection_strips_query_string() {
        assert!(looks_like_stream("https://cdn.example/v/master.m3u8?token=x"));
        assert!(looks_like_stream("https://cdn.example/clip.mp4"));
        assert!(looks_like_stream("https://cdn.example/manifest.mpd"));
        assert!(!looks_like_stream("https://cdn.example/watch?v=clip.mp4"));
        assert!(!looks_like_stream("https://cdn.example/page.html"));
    }
}
