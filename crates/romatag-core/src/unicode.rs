//! Character-level script classification for Japanese place names.

/// Check the full Hiragana block (U+3040..U+309F).
pub fn is_hiragana(c: char) -> bool {
    ('\u{3040}'..='\u{309F}').contains(&c)
}

/// Check the full Katakana block (U+30A0..U+30FF). Includes the middle dot
/// ・ (U+30FB) and the prolonged sound mark ー (U+30FC).
pub fn is_katakana(c: char) -> bool {
    ('\u{30A0}'..='\u{30FF}').contains(&c)
}

/// CJK Unified Ideographs plus Extension A and B.
///
/// Wider than the range `is_all_latin` checks: the transliterator must know
/// it cannot read an Extension-A kanji even though such a name is not
/// flagged for conversion in the first place.
pub fn is_kanji(c: char) -> bool {
    ('\u{4E00}'..='\u{9FFF}').contains(&c)
        || ('\u{3400}'..='\u{4DBF}').contains(&c)
        || ('\u{20000}'..='\u{2A6DF}').contains(&c)
}

pub fn is_kana(c: char) -> bool {
    is_hiragana(c) || is_katakana(c)
}

pub fn is_latin(c: char) -> bool {
    c.is_ascii_alphabetic()
}

/// Characters that mark a name as Japanese script.
fn is_japanese_script(c: char) -> bool {
    ('\u{4E00}'..='\u{9FFF}').contains(&c) || is_hiragana(c) || is_katakana(c)
}

/// True unless `text` contains a kanji (U+4E00..U+9FFF), hiragana or
/// katakana character.
///
/// Only Japanese script is flagged. Accented Latin, full-width punctuation,
/// Hangul and everything else counts as "Latin" here, and the empty string
/// is vacuously all-Latin.
pub fn is_all_latin(text: &str) -> bool {
    !text.chars().any(is_japanese_script)
}

/// True if `text` has at least one ASCII letter. Drives title casing of the
/// transliterator output, never the decision to convert.
pub fn has_latin_chars(text: &str) -> bool {
    text.chars().any(is_latin)
}

/// Convert a katakana string to hiragana.
/// ー, ・ and non-katakana characters are passed through unchanged.
pub fn katakana_to_hiragana(s: &str) -> String {
    s.chars()
        .map(|c| {
            if ('\u{30A1}'..='\u{30F6}').contains(&c) {
                char::from_u32(c as u32 - 0x60).unwrap_or(c)
            } else {
                c
            }
        })
        .collect()
}

/// Check if a string is a usable kana reading: hiragana or katakana only,
/// including ー, and non-empty.
pub fn is_kana_reading(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| is_kana(c) && c != '・')
}

/// Fold a full-width ASCII variant (U+FF01..U+FF5E) to its ASCII form.
pub fn fold_fullwidth(c: char) -> char {
    if ('\u{FF01}'..='\u{FF5E}').contains(&c) {
        char::from_u32(c as u32 - 0xFEE0).unwrap_or(c)
    } else {
        c
    }
}
