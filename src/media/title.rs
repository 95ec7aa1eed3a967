//! Derive a filename stem from page metadata.

use crate::config::DetectionSettings;

/// Characters that are illegal in filenames on at least one common platform.
const ILLEGAL: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Page metadata the title chain draws from.
#[derive(Debug, Clone, Default)]
pub struct TitleSources {
    pub document_title: Option<String>,
    /// Text of the first non-empty `title_selectors` match.
    pub heading: Option<String>,
}

/// Strip illegal characters and control characters, then trim.
pub fn sanitize(raw: &str) -> String {
    raw.chars()
        .filter(|c| !ILLEGAL.contains(c) && !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Keep at most `max_chars` characters (not bytes).
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

fn clean(raw: Option<&str>, max_chars: usize) -> Option<String> {
    let cleaned = truncate_chars(&sanitize(raw?), max_chars);
    (!cleaned.is_empty()).then_some(cleaned)
}

/// Resolve the filename stem. First success wins:
/// document title (unless it is only the site brand), then heading text,
/// then `<prefix>_<unix seconds>`.
pub fn resolve_title(sources: &TitleSources, settings: &DetectionSettings, now_unix: i64) -> String {
    let max = settings.title_max_chars;

    let from_document = clean(sources.document_title.as_deref(), max).filter(|t| {
        !settings
            .brand_placeholders
            .iter()
            .any(|brand| brand.trim() == t)
    });

    from_document
        .or_else(|| clean(sources.heading.as_deref(), max))
        .unwrap_or_else(|| {
            let synthetic = format!("{}_{}", sanitize(&settings.synthetic_prefix), now_unix);
            truncate_chars(&synthetic, max)
        })
}
