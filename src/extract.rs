//! Pull the first page link out of pasted share text.

use std::sync::LazyLock;

use regex::Regex;

/// Scheme, authority, then any run of URL-safe characters or percent escapes.
static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://(?:[a-zA-Z0-9$\-_@.&+!*(),/:;=?#~\[\]']|%[0-9a-fA-F]{2})+").unwrap()
});

/// Return the first absolute http(s) URL in `text`, left to right.
///
/// Share text from mobile apps wraps the link in prose, emoji and CJK
/// punctuation; only the link itself is returned. Trailing sentence
/// punctuation that is not part of the link is dropped.
pub fn extract_url(text: &str) -> Option<String> {
    URL_PATTERN.find_iter(text).find_map(|found| {
        let url = found
            .as_str()
            .trim_end_matches(|c| matches!(c, '.' | ',' | ';' | ':' | '!' | '?' | ')' | '\''));

        // Skip bare schemes like "https://..." with no authority after them
        let rest = url.split_once("://").map(|(_, r)| r).unwrap_or("");
        (!rest.is_empty() && !rest.starts_with('/')).then(|| url.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_from_share_text() {
        assert_eq!(
            extract_url("check this out https://example.com/v/123 lol").as_deref(),
            Some("https://example.com/v/123")
        );
    }

    #[test]
    fn test_extract_returns_first_of_many() {
        let text = "a http://first.example/x then https://second.example/y";
        assert_eq!(extract_url(text).as_deref(), Some("http://first.example/x"));
    }

    #[test]
    fn test_extract_keeps_query_and_percent_encoding() {
        let text = "7.43 复制打开 https://v.example.com/abc/?q=%E4%B8%AD&x=1 看看";
        assert_eq!(
            extract_url(text).as_deref(),
            Some("https://v.example.com/abc/?q=%E4%B8%AD&x=1")
        );
    }

    #[test]
    fn test_extract_stops_at_cjk_and_whitespace() {
        assert_eq!(
            extract_url("链接https://v.example.com/Zx9/复制").as_deref(),
            Some("https://v.example.com/Zx9/")
        );
    }

    #[test]
    fn test_extract_drops_trailing_punctuation() {
        assert_eq!(
            extract_url("see (https://example.com/a).").as_deref(),
            Some("https://example.com/a")
        );
    }

    #[test]
    fn test_extract_skips_bare_scheme_for_later_link() {
        assert_eq!(
            extract_url("see https://... or https://example.com/v/123").as_deref(),
            Some("https://example.com/v/123")
        );
        assert_eq!(
            extract_url("bad https:///x good https://example.com/a").as_deref(),
            Some("https://example.com/a")
        );
    }

    #[test]
    fn test_extract_not_found() {
        assert_eq!(extract_url(""), None);
        assert_eq!(extract_url("no links here"), None);
        assert_eq!(extract_url("ftp://example.com/file"), None);
        assert_eq!(extract_url("https://"), None);
        assert_eq!(extract_url("www.example.com/no-scheme"), None);
    }
}
