use std::collections::HashMap;
use std::sync::OnceLock;

use super::RomajiSystem;

/// (kana, hepburn, nihon-shiki, kunrei-shiki). Hiragana only; katakana is
/// folded to hiragana before lookup.
#[rustfmt::skip]
const SYLLABLES: &[(&str, &str, &str, &str)] = &[
    ("あ", "a", "a", "a"), ("い", "i", "i", "i"), ("う", "u", "u", "u"),
    ("え", "e", "e", "e"), ("お", "o", "o", "o"),
    ("か", "ka", "ka", "ka"), ("き", "ki", "ki", "ki"), ("く", "ku", "ku", "ku"),
    ("け", "ke", "ke", "ke"), ("こ", "ko", "ko", "ko"),
    ("さ", "sa", "sa", "sa"), ("し", "shi", "si", "si"), ("す", "su", "su", "su"),
    ("せ", "se", "se", "se"), ("そ", "so", "so", "so"),
    ("た", "ta", "ta", "ta"), ("ち", "chi", "ti", "ti"), ("つ", "tsu", "tu", "tu"),
    ("て", "te", "te", "te"), ("と", "to", "to", "to"),
    ("な", "na", "na", "na"), ("に", "ni", "ni", "ni"), ("ぬ", "nu", "nu", "nu"),
    ("ね", "ne", "ne", "ne"), ("の", "no", "no", "no"),
    ("は", "ha", "ha", "ha"), ("ひ", "hi", "hi", "hi"), ("ふ", "fu", "hu", "hu"),
    ("へ", "he", "he", "he"), ("ほ", "ho", "ho", "ho"),
    ("ま", "ma", "ma", "ma"), ("み", "mi", "mi", "mi"), ("む", "mu", "mu", "mu"),
    ("め", "me", "me", "me"), ("も", "mo", "mo", "mo"),
    ("や", "ya", "ya", "ya"), ("ゆ", "yu", "yu", "yu"), ("よ", "yo", "yo", "yo"),
    ("ら", "ra", "ra", "ra"), ("り", "ri", "ri", "ri"), ("る", "ru", "ru", "ru"),
    ("れ", "re", "re", "re"), ("ろ", "ro", "ro", "ro"),
    ("わ", "wa", "wa", "wa"), ("ゐ", "i", "wi", "i"), ("ゑ", "e", "we", "e"),
    ("を", "o", "wo", "o"),
    ("が", "ga", "ga", "ga"), ("ぎ", "gi", "gi", "gi"), ("ぐ", "gu", "gu", "gu"),
    ("げ", "ge", "ge", "ge"), ("ご", "go", "go", "go"),
    ("ざ", "za", "za", "za"), ("じ", "ji", "zi", "zi"), ("ず", "zu", "zu", "zu"),
    ("ぜ", "ze", "ze", "ze"), ("ぞ", "zo", "zo", "zo"),
    ("だ", "da", "da", "da"), ("ぢ", "ji", "di", "zi"), ("づ", "zu", "du", "zu"),
    ("で", "de", "de", "de"), ("ど", "do", "do", "do"),
    ("ば", "ba", "ba", "ba"), ("び", "bi", "bi", "bi"), ("ぶ", "bu", "bu", "bu"),
    ("べ", "be", "be", "be"), ("ぼ", "bo", "bo", "bo"),
    ("ぱ", "pa", "pa", "pa"), ("ぴ", "pi", "pi", "pi"), ("ぷ", "pu", "pu", "pu"),
    ("ぺ", "pe", "pe", "pe"), ("ぽ", "po", "po", "po"),
    ("ゔ", "vu", "vu", "vu"),
    ("ぁ", "a", "a", "a"), ("ぃ", "i", "i", "i"), ("ぅ", "u", "u", "u"),
    ("ぇ", "e", "e", "e"), ("ぉ", "o", "o", "o"),
    ("ゃ", "ya", "ya", "ya"), ("ゅ", "yu", "yu", "yu"), ("ょ", "yo", "yo", "yo"),
    ("ゎ", "wa", "wa", "wa"), ("ゕ", "ka", "ka", "ka"), ("ゖ", "ke", "ke", "ke"),
    // yōon
    ("きゃ", "kya", "kya", "kya"), ("きゅ", "kyu", "kyu", "kyu"), ("きょ", "kyo", "kyo", "kyo"),
    ("しゃ", "sha", "sya", "sya"), ("しゅ", "shu", "syu", "syu"), ("しょ", "sho", "syo", "syo"),
    ("しぇ", "she", "sye", "sye"),
    ("ちゃ", "cha", "tya", "tya"), ("ちゅ", "chu", "tyu", "tyu"), ("ちょ", "cho", "tyo", "tyo"),
    ("ちぇ", "che", "tye", "tye"),
    ("にゃ", "nya", "nya", "nya"), ("にゅ", "nyu", "nyu", "nyu"), ("にょ", "nyo", "nyo", "nyo"),
    ("ひゃ", "hya", "hya", "hya"), ("ひゅ", "hyu", "hyu", "hyu"), ("ひょ", "hyo", "hyo", "hyo"),
    ("みゃ", "mya", "mya", "mya"), ("みゅ", "myu", "myu", "myu"), ("みょ", "myo", "myo", "myo"),
    ("りゃ", "rya", "rya", "rya"), ("りゅ", "ryu", "ryu", "ryu"), ("りょ", "ryo", "ryo", "ryo"),
    ("ぎゃ", "gya", "gya", "gya"), ("ぎゅ", "gyu", "gyu", "gyu"), ("ぎょ", "gyo", "gyo", "gyo"),
    ("じゃ", "ja", "zya", "zya"), ("じゅ", "ju", "zyu", "zyu"), ("じょ", "jo", "zyo", "zyo"),
    ("じぇ", "je", "zye", "zye"),
    ("ぢゃ", "ja", "dya", "zya"), ("ぢゅ", "ju", "dyu", "zyu"), ("ぢょ", "jo", "dyo", "zyo"),
    ("びゃ", "bya", "bya", "bya"), ("びゅ", "byu", "byu", "byu"), ("びょ", "byo", "byo", "byo"),
    ("ぴゃ", "pya", "pya", "pya"), ("ぴゅ", "pyu", "pyu", "pyu"), ("ぴょ", "pyo", "pyo", "pyo"),
    // extended katakana combinations
    ("ふぁ", "fa", "fa", "fa"), ("ふぃ", "fi", "fi", "fi"), ("ふぇ", "fe", "fe", "fe"),
    ("ふぉ", "fo", "fo", "fo"),
    ("てぃ", "ti", "ti", "ti"), ("でぃ", "di", "di", "di"),
    ("とぅ", "tu", "tu", "tu"), ("どぅ", "du", "du", "du"),
    ("うぃ", "wi", "wi", "wi"), ("うぇ", "we", "we", "we"), ("うぉ", "wo", "wo", "wo"),
    ("ゔぁ", "va", "va", "va"), ("ゔぃ", "vi", "vi", "vi"), ("ゔぇ", "ve", "ve", "ve"),
    ("ゔぉ", "vo", "vo", "vo"),
    ("つぁ", "tsa", "tsa", "tsa"), ("いぇ", "ye", "ye", "ye"),
];

fn table() -> &'static HashMap<&'static str, [&'static str; 3]> {
    static TABLE: OnceLock<HashMap<&'static str, [&'static str; 3]>> = OnceLock::new();
    TABLE.get_or_init(|| {
        SYLLABLES
            .iter()
            .map(|&(kana, hep, nihon, kunrei)| (kana, [hep, nihon, kunrei]))
            .collect()
    })
}

fn syllable(kana: &str, system: RomajiSystem) -> Option<&'static str> {
    let forms = table().get(kana)?;
    Some(match system {
        RomajiSystem::Hepburn => forms[0],
        RomajiSystem::Nihon => forms[1],
        RomajiSystem::Kunrei => forms[2],
    })
}

/// Longest syllable at `chars[i..]`: a two-character yōon first, then a
/// single kana. Returns the romaji and the number of chars consumed.
fn next_syllable(chars: &[char], i: usize, system: RomajiSystem) -> Option<(&'static str, usize)> {
    if i >= chars.len() {
        return None;
    }
    if i + 1 < chars.len() {
        let pair: String = chars[i..i + 2].iter().collect();
        if let Some(r) = syllable(&pair, system) {
            return Some((r, 2));
        }
    }
    let mut buf = [0u8; 4];
    syllable(chars[i].encode_utf8(&mut buf), system).map(|r| (r, 1))
}

fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'i' | 'u' | 'e' | 'o')
}

fn circumflex(c: char) -> Option<char> {
    match c {
        'a' => Some('â'),
        'i' => Some('î'),
        'u' => Some('û'),
        'e' => Some('ê'),
        'o' => Some('ô'),
        _ => None,
    }
}

/// Mark the vowel at the end of `out` as long.
///
/// Hepburn as written on signage drops the length; Nihon-shiki and
/// Kunrei-shiki write a circumflex.
fn lengthen(out: &mut String, system: RomajiSystem) {
    if system == RomajiSystem::Hepburn {
        return;
    }
    if let Some(long) = out.chars().last().and_then(circumflex) {
        out.pop();
        out.push(long);
    }
}

/// Convert a hiragana string (katakana already folded) to romaji.
///
/// Handles sokuon (っ doubles the next consonant, `tch` in Hepburn), hatsuon
/// (ん, with `n'` before a vowel or y) and long vowels (おう, おお, うう and
/// ー). Characters outside the table are copied through.
pub fn kana_to_romaji(hiragana: &str, system: RomajiSystem) -> String {
    let chars: Vec<char> = hiragana.chars().collect();
    let mut out = String::with_capacity(chars.len() * 3);
    let mut sokuon = false;
    // Last output char came from a syllable vowel that may still be lengthened.
    let mut open_vowel: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            'っ' => {
                sokuon = true;
                open_vowel = None;
                i += 1;
                continue;
            }
            'ー' => {
                if open_vowel.take().is_some() {
                    lengthen(&mut out, system);
                }
                i += 1;
                continue;
            }
            'ん' => {
                out.push('n');
                let next_opens = next_syllable(&chars, i + 1, system)
                    .and_then(|(r, _)| r.chars().next())
                    .is_some_and(|f| is_vowel(f) || f == 'y');
                if next_opens {
                    out.push('\'');
                }
                sokuon = false;
                open_vowel = None;
                i += 1;
                continue;
            }
            _ => {}
        }

        let Some((romaji, used)) = next_syllable(&chars, i, system) else {
            out.push(c);
            sokuon = false;
            open_vowel = None;
            i += 1;
            continue;
        };
        i += used;

        let long = used == 1
            && matches!(
                (open_vowel, romaji),
                (Some('o'), "u") | (Some('u'), "u") | (Some('o'), "o")
            );
        if long {
            lengthen(&mut out, system);
            open_vowel = None;
            sokuon = false;
            continue;
        }

        if sokuon {
            if let Some(first) = romaji.chars().next().filter(|f| !is_vowel(*f)) {
                if system == RomajiSystem::Hepburn && romaji.starts_with("ch") {
                    out.push('t');
                } else {
                    out.push(first);
                }
            }
            sokuon = false;
        }
        out.push_str(romaji);
        open_vowel = romaji.chars().last().filter(|v| is_vowel(*v));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hep(s: &str) -> String {
        kana_to_romaji(s, RomajiSystem::Hepburn)
    }

    #[test]
    fn basic_syllables() {
        assert_eq!(hep("かながわ"), "kanagawa");
        assert_eq!(hep("しぶや"), "shibuya");
        assert_eq!(hep("ちば"), "chiba");
        assert_eq!(hep("ふくしま"), "fukushima");
    }

    #[test]
    fn long_vowels_hepburn() {
        assert_eq!(hep("とうきょう"), "tokyo");
        assert_eq!(hep("おおさか"), "osaka");
        assert_eq!(hep("きゅうしゅう"), "kyushu");
        assert_eq!(hep("らーめん"), "ramen");
        // い and え are not collapsed
        assert_eq!(hep("にいがた"), "niigata");
        assert_eq!(hep("めいじ"), "meiji");
    }

    #[test]
    fn long_vowels_circumflex() {
        assert_eq!(kana_to_romaji("とうきょう", RomajiSystem::Kunrei), "tôkyô");
        assert_eq!(kana_to_romaji("きゅうしゅう", RomajiSystem::Nihon), "kyûsyû");
        assert_eq!(kana_to_romaji("らーめん", RomajiSystem::Kunrei), "râmen");
    }

    #[test]
    fn sokuon() {
        assert_eq!(hep("さっぽろ"), "sapporo");
        assert_eq!(hep("ほっかいどう"), "hokkaido");
        assert_eq!(hep("まっちゃ"), "matcha");
        assert_eq!(kana_to_romaji("まっちゃ", RomajiSystem::Kunrei), "mattya");
        assert_eq!(hep("あっ"), "a");
    }

    #[test]
    fn hatsuon() {
        assert_eq!(hep("しんじゅく"), "shinjuku");
        assert_eq!(hep("せんだい"), "sendai");
        assert_eq!(hep("しんおおさか"), "shin'osaka");
        assert_eq!(hep("きんよう"), "kin'yo");
        assert_eq!(hep("ほん"), "hon");
    }

    #[test]
    fn system_differences() {
        assert_eq!(kana_to_romaji("しちふじ", RomajiSystem::Hepburn), "shichifuji");
        assert_eq!(kana_to_romaji("しちふじ", RomajiSystem::Nihon), "sitihuzi");
        assert_eq!(kana_to_romaji("しちふじ", RomajiSystem::Kunrei), "sitihuzi");
        assert_eq!(kana_to_romaji("ぢづを", RomajiSystem::Nihon), "diduwo");
        assert_eq!(kana_to_romaji("ぢづを", RomajiSystem::Kunrei), "zizuo");
        assert_eq!(kana_to_romaji("ぢづを", RomajiSystem::Hepburn), "jizuo");
    }

    #[test]
    fn extended_katakana() {
        assert_eq!(hep("ふぁみりー"), "famiri");
        assert_eq!(hep("ゔぃら"), "vira");
        assert_eq!(hep("ぱーてぃー"), "pati");
    }

    #[test]
    fn unknown_chars_pass_through() {
        assert_eq!(hep("ゟ"), "ゟ");
        assert_eq!(hep("a"), "a");
    }
}
