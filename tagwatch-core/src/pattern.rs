//! Tag-format compatibility matching and candidate selection
//!
//! Two tags are format-compatible when they share the same arrangement of
//! digit runs, letter runs, and separator characters. This keeps a service
//! pinned to its versioning scheme: a `1.25.3` deployment only ever sees
//! `D.DD.D`-shaped candidates, never date stamps or suffixed variants.

const DIGIT_MARKER: char = 'D';
const LETTER_MARKER: char = 'A';

/// Collapses a tag into its structural pattern: digits become `D`, letters
/// become `A`, everything else stays as-is.
pub fn normalize(tag: &str) -> String {
    tag.chars()
        .map(|c| {
            if c.is_ascii_digit() {
                DIGIT_MARKER
            } else if c.is_ascii_alphabetic() {
                LETTER_MARKER
            } else {
                c
            }
        })
        .collect()
}

/// True when both tags collapse to the same pattern.
pub fn compatible(a: &str, b: &str) -> bool {
    normalize(a) == normalize(b)
}

/// Picks the update candidate for a deployed tag out of a fetched tag list.
///
/// Candidates are the format-compatible tags, ordered by plain descending
/// string comparison. This ordering is deliberately not numeric-aware:
/// `"9"` sorts above `"10"`, so a multi-digit component can hide a newer
/// release. Downstream expectations depend on this exact ordering, so it
/// stays until the contract changes.
///
/// Returns `None` when no compatible tag exists or the top candidate is the
/// deployed tag itself.
pub fn select_candidate(deployed: &str, tags: &[String]) -> Option<String> {
    let mut candidates: Vec<&str> = tags
        .iter()
        .map(String::as_str)
        .filter(|tag| compatible(tag, deployed))
        .collect();

    candidates.sort_unstable_by(|a, b| b.cmp(a));

    let top = *candidates.first()?;
    (top != deployed).then(|| top.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn normalize_marks_digits_and_letters() {
        assert_eq!(normalize("v1.2.3"), "AD.D.D");
        assert_eq!(normalize("1.25.3-alpine"), "D.DD.D-AAAAAA");
    }

    #[test]
    fn same_scheme_tags_share_a_pattern() {
        assert_eq!(normalize("v1.2.3"), normalize("v9.8.7"));
        assert_ne!(normalize("v1.2.3"), normalize("v9.10.11"));
        assert_ne!(normalize("v1.2.3"), normalize("1.2.3-alpine"));
    }

    #[test]
    fn compatible_is_reflexive_and_symmetric() {
        for tag in ["1.4.0", "v2.1", "2024-01-15", "latest"] {
            assert!(compatible(tag, tag));
        }
        for (a, b) in [("1.4.0", "2.9.1"), ("1.4.0", "1.10.0"), ("alpine", "24")] {
            assert_eq!(compatible(a, b), compatible(b, a));
        }
    }

    #[test]
    fn selects_lexicographic_max_not_numeric_max() {
        // "1.10.0" has a different pattern than "1.4.0", so it is filtered
        // out before ordering even matters; among the rest, plain string
        // comparison picks "1.5.0".
        let candidate = select_candidate("1.4.0", &tags(&["1.4.0", "1.5.0", "1.10.0"]));
        assert_eq!(candidate.as_deref(), Some("1.5.0"));
    }

    #[test]
    fn multi_digit_components_lose_to_string_order() {
        // Documented limitation: "1.9.0" outranks "1.10.0" under string
        // comparison even though both share the deployed pattern here.
        let candidate = select_candidate("1.11.0", &tags(&["1.11.0", "1.90.0", "1.100.0"]));
        assert_eq!(candidate.as_deref(), Some("1.90.0"));
    }

    #[test]
    fn rejects_tags_from_other_schemes() {
        let fetched = tags(&["2024-01-15", "1.4.1-alpine", "latest", "1.4.1"]);
        assert_eq!(select_candidate("1.4.0", &fetched).as_deref(), Some("1.4.1"));
    }

    #[test]
    fn no_update_when_deployed_is_top_or_set_empty() {
        assert_eq!(select_candidate("1.5.0", &tags(&["1.4.0", "1.5.0"])), None);
        assert_eq!(select_candidate("1.5.0", &tags(&[])), None);
        assert_eq!(select_candidate("1.5.0", &tags(&["2024-01-15"])), None);
    }
}
