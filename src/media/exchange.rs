//! Network exchanges seen by a page session and the candidates kept from them.

/// One observed request/response pair.
///
/// Only metadata is carried; the body stays with the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkExchange {
    pub url: String,
    pub status: u16,
    pub content_type: String,
    /// Length from response headers, if the server disclosed one.
    pub declared_length: Option<u64>,
}

impl NetworkExchange {
    pub fn new(url: impl Into<String>, status: u16, content_type: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status,
            content_type: content_type.into(),
            declared_length: None,
        }
    }

    pub fn with_length(mut self, length: u64) -> Self {
        self.declared_length = Some(length);
        self
    }

    /// URL path without query string or fragment, lowercased.
    pub fn path_lower(&self) -> String {
        match url::Url::parse(&self.url) {
            Ok(u) => u.path().to_ascii_lowercase(),
            Err(_) => self
                .url
                .split(['?', '#'])
                .next()
                .unwrap_or_default()
                .to_ascii_lowercase(),
        }
    }
}

/// A response provisionally identified as the primary media stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaCandidate {
    pub url: String,
    pub size_bytes: u64,
}

/// Resolve a byte length from raw header values.
///
/// `Content-Length` wins; a `Content-Range` total (`bytes 0-99/1234`) is the
/// fallback for servers that answer with the full range on a 200.
pub fn length_from_headers(content_length: Option<&str>, content_range: Option<&str>) -> Option<u64> {
    let from_length = content_length
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|&n| n > 0);
    if from_length.is_some() {
        return from_length;
    }

    content_range
        .and_then(|v| v.rsplit_once('/'))
        .and_then(|(_, total)| total.trim().parse::<u64>().ok())
        .filter(|&n| n > 0)
}

/// Case-insensitive lookup in a CDP header object (`{"Content-Type": "..."}`).
pub fn header_lookup<'a>(headers: &'a serde_json::Value, name: &str) -> Option<&'a str> {
    headers
        .as_object()?
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .and_then(|(_, value)| value.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_lower_strips_query() {
        let ex = NetworkExchange::new("https://cdn.example.com/a/B.MP4?sig=1#t=2", 200, "");
        assert_eq!(ex.path_lower(), "/a/b.mp4");
    }

    #[test]
    fn test_header_lookup_ignores_case() {
        let headers = serde_json::json!({"Content-Length": "1000", "content-type": "video/mp4"});
        assert_eq!(header_lookup(&headers, "content-length"), Some("1000"));
        assert_eq!(header_lookup(&headers, "Content-Type"), Some("video/mp4"));
        assert_eq!(header_lookup(&headers, "content-range"), None);
        assert_eq!(header_lookup(&serde_json::Value::Null, "x"), None);
    }

    #[test]
    fn test_length_from_headers() {
        assert_eq!(length_from_headers(Some("1000"), None), Some(1000));
        assert_eq!(length_from_headers(Some(" 42 "), Some("bytes 0-1/99")), Some(42));
        assert_eq!(length_from_headers(Some("0"), Some("bytes 0-99/5000")), Some(5000));
        assert_eq!(length_from_headers(None, Some("bytes */*")), None);
        assert_eq!(length_from_headers(Some("abc"), None), None);
        assert_eq!(length_from_headers(None, None), None);
    }
}
