//! Cleanup of raw transliterator output.

/// Replacements applied in order, each over the whole string.
const HYPHEN_RULES: [(&str, &str); 3] = [(" - ", "-"), (" -", "-"), ("- ", "-")];

/// Collapse spacing around hyphens in compound names ("Shibuya - ku" →
/// "Shibuya-ku").
///
/// The rule sequence is re-run until nothing changes: a single pass leaves
/// "a   -" at "a  -", so one pass alone would not be idempotent. Every
/// replacement shortens the string, which bounds the loop.
pub fn normalize_hyphens(raw: &str) -> String {
    let mut current = raw.to_string();
    loop {
        let mut next = current.clone();
        for (from, to) in HYPHEN_RULES {
            if next.contains(from) {
                next = next.replace(from, to);
            }
        }
        if next == current {
            return current;
        }
        current = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn collapses_spaced_hyphens() {
        assert_eq!(normalize_hyphens("Shibuya - ku"), "Shibuya-ku");
        assert_eq!(normalize_hyphens("Shibuya -ku"), "Shibuya-ku");
        assert_eq!(normalize_hyphens("Shibuya- ku"), "Shibuya-ku");
        assert_eq!(normalize_hyphens("Shin - Osaka - eki"), "Shin-Osaka-eki");
    }

    #[test]
    fn leaves_other_text_alone() {
        assert_eq!(normalize_hyphens("Tokyo Tower"), "Tokyo Tower");
        assert_eq!(normalize_hyphens("Osaka-shi"), "Osaka-shi");
        assert_eq!(normalize_hyphens(""), "");
    }

    #[test]
    fn handles_runs_of_spaces_and_hyphens() {
        assert_eq!(normalize_hyphens("a   -   b"), "a-b");
        assert_eq!(normalize_hyphens("a - - b"), "a--b");
        assert_eq!(normalize_hyphens(" - "), "-");
    }

    proptest! {
        #[test]
        fn idempotent(s in "[a-c -]{0,24}") {
            let once = normalize_hyphens(&s);
            prop_assert_eq!(normalize_hyphens(&once), once);
        }

        #[test]
        fn idempotent_any_text(s in "\\PC{0,32}") {
            let once = normalize_hyphens(&s);
            prop_assert_eq!(normalize_hyphens(&once), once);
        }
    }
}
