//! Fallback: read the media URL straight off the rendered `<video>` element.

use serde::Deserialize;

use crate::error::AcquireError;

/// Raw attributes of the primary media element, as read from the DOM.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MediaElementSnapshot {
    /// The element's own `src` attribute.
    #[serde(default)]
    pub src: Option<String>,
    /// `src` of each nested `<source>`, in document order.
    #[serde(default)]
    pub sources: Vec<Option<String>>,
}

/// JavaScript that serializes the first element matching a selector.
///
/// `{selector}` is replaced with a JSON string literal.
pub const SNAPSHOT_SCRIPT: &str = r#"
    (() => {
        const el = document.querySelector({selector});
        if (!el) return null;
        return {
            src: el.getAttribute('src'),
            sources: Array.from(el.querySelectorAll('source')).map(s => s.getAttribute('src')),
        };
    })()
"#;

/// Build the snapshot script for `selector`.
pub fn snapshot_script(selector: &str) -> String {
    let literal = serde_json::to_string(selector).unwrap_or_else(|_| "\"video\"".to_string());
    SNAPSHOT_SCRIPT.replace("{selector}", &literal)
}

enum Reference {
    Fetchable(String),
    Opaque,
    Unusable,
}

fn classify(raw: &str) -> Reference {
    let value = raw.trim();
    let lower = value.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        Reference::Fetchable(value.to_string())
    } else if value.starts_with("//") && value.len() > 2 {
        Reference::Fetchable(format!("https:{}", value))
    } else if lower.starts_with("blob:") || lower.starts_with("mediasource:") {
        Reference::Opaque
    } else {
        Reference::Unusable
    }
}

/// Resolve a fetchable URL from a media element.
///
/// The element's own `src` is authoritative: an absolute or protocol-relative
/// URL is used directly, an in-memory (`blob:`) reference is an error. Only
/// when `src` is missing or unusable are nested `<source>`s consulted.
/// `Ok(None)` means the element offered nothing.
pub fn resolve_from_element(
    element: &MediaElementSnapshot,
) -> Result<Option<String>, AcquireError> {
    if let Some(src) = element.src.as_deref() {
        match classify(src) {
            Reference::Fetchable(url) => return Ok(Some(url)),
            Reference::Opaque => {
                return Err(AcquireError::UnsupportedMediaEncoding {
                    reference: src.trim().to_string(),
                })
            }
            Reference::Unusable => {}
        }
    }

    let mut opaque = None;
    for source in element.sources.iter().flatten() {
        match classify(source) {
            Reference::Fetchable(url) => return Ok(Some(url)),
            Reference::Opaque if opaque.is_none() => opaque = Some(source.trim().to_string()),
            _ => {}
        }
    }

    match opaque {
        Some(reference) => Err(AcquireError::UnsupportedMediaEncoding { reference }),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(src: Option<&str>, sources: &[Option<&str>]) -> MediaElementSnapshot {
        MediaElementSnapshot {
            src: src.map(String::from),
            sources: sources.iter().map(|s| s.map(String::from)).collect(),
        }
    }

    #[test]
    fn test_absolute_src() {
        let el = element(Some("https://cdn.example.com/a.mp4"), &[]);
        assert_eq!(
            resolve_from_element(&el).unwrap().as_deref(),
            Some("https://cdn.example.com/a.mp4")
        );
    }

    #[test]
    fn test_protocol_relative_src_gets_https() {
        let el = element(Some("//cdn.example.com/a.mp4"), &[]);
        assert_eq!(
            resolve_from_element(&el).unwrap().as_deref(),
            Some("https://cdn.example.com/a.mp4")
        );
    }

    #[test]
    fn test_blob_src_is_unsupported() {
        let el = element(
            Some("blob:https://www.example.com/0f2c"),
            &[Some("https://cdn.example.com/b.mp4")],
        );
        let err = resolve_from_element(&el).unwrap_err();
        assert!(matches!(err, AcquireError::UnsupportedMediaEncoding { .. }));
    }

    #[test]
    fn test_nested_sources_in_document_order() {
        let el = element(
            None,
            &[
                None,
                Some("/relative.mp4"),
                Some("//cdn.example.com/first.mp4"),
                Some("https://cdn.example.com/second.mp4"),
            ],
        );
        assert_eq!(
            resolve_from_element(&el).unwrap().as_deref(),
            Some("https://cdn.example.com/first.mp4")
        );
    }

    #[test]
    fn test_empty_src_falls_through_to_sources() {
        let el = element(Some(""), &[Some("http://cdn.example.com/c.mp4")]);
        assert_eq!(
            resolve_from_element(&el).unwrap().as_deref(),
            Some("http://cdn.example.com/c.mp4")
        );
    }

    #[test]
    fn test_only_blob_sources_is_unsupported() {
        let el = element(None, &[Some("blob:https://x/1")]);
        assert!(matches!(
            resolve_from_element(&el),
            Err(AcquireError::UnsupportedMediaEncoding { .. })
        ));
    }

    #[test]
    fn test_nothing_usable() {
        assert_eq!(resolve_from_element(&element(None, &[])).unwrap(), None);
        assert_eq!(
            resolve_from_element(&element(Some("data:video/mp4;base64,AA"), &[])).unwrap(),
            None
        );
    }

    #[test]
    fn test_snapshot_script_quotes_selector() {
        let script = snapshot_script("video.main[data-x=\"1\"]");
        assert!(script.contains(r#"document.querySelector("video.main[data-x=\"1\"]")"#));
    }

    #[test]
    fn test_snapshot_deserializes_nulls() {
        let el: MediaElementSnapshot =
            serde_json::from_str(r#"{"src": null, "sources": [null, "https://a/b.mp4"]}"#).unwrap();
        assert_eq!(el.src, None);
        assert_eq!(el.sources.len(), 2);
    }
}
