//! Pick the most likely primary stream from the observed candidates.

use super::exchange::MediaCandidate;

/// Select the largest candidate; the earliest observed wins a tie.
///
/// The true content is, empirically, the largest contiguous media response
/// on the page. Nothing cross-checks this against what the player actually
/// renders, so multi-resolution delivery can defeat it.
pub fn select_primary(candidates: &[MediaCandidate]) -> Option<&MediaCandidate> {
    candidates.iter().reduce(|best, c| {
        if c.size_bytes > best.size_bytes {
            c
        } else {
            best
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: u64 = 1024 * 1024;

    fn candidate(url: &str, size: u64) -> MediaCandidate {
        MediaCandidate {
            url: url.to_string(),
            size_bytes: size,
        }
    }

    #[test]
    fn test_selects_largest() {
        let candidates = vec![
            candidate("half", MIB / 2),
            candidate("three", 3 * MIB),
            candidate("two", 2 * MIB),
        ];
        assert_eq!(select_primary(&candidates).unwrap().url, "three");
    }

    #[test]
    fn test_tie_goes_to_first_observed() {
        let candidates = vec![
            candidate("first", 4 * MIB),
            candidate("second", 4 * MIB),
        ];
        assert_eq!(select_primary(&candidates).unwrap().url, "first");
    }

    #[test]
    fn test_empty_is_none() {
        assert!(select_primary(&[]).is_none());
    }
}
