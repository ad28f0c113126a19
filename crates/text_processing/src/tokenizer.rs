//! Text normalization shared by rule preprocessing and matching
//!
//! Literal patterns and turn texts go through the same pipeline so that
//! `#Héllo World` matches "hello, world!":
//! - Latin diacritics removed (NFD, combining diacritical marks dropped, NFC)
//! - Lowercase conversion
//! - Unicode word segmentation, punctuation stripped from each word
//! - Words joined with `-`
//!
//! Only the combining diacritical mark blocks are stripped, so vowel signs of
//! Indic scripts survive normalization.

use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

/// Separator between words of a tokenized text
pub const TOKEN_SEPARATOR: &str = "-";

fn is_diacritic(c: char) -> bool {
    matches!(
        c as u32,
        0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0x20D0..=0x20FF | 0xFE20..=0xFE2F
    )
}

/// Remove Latin diacritics (`"Příliš"` → `"Prilis"`)
pub fn remove_diacritics(text: &str) -> String {
    text.nfd().filter(|c| !is_diacritic(*c)).nfc().collect()
}

/// Normalize a text into its tokenized form (`"Héllo, World!"` → `"hello-world"`)
pub fn tokenize(text: &str) -> String {
    let plain = remove_diacritics(text).to_lowercase();
    let words: Vec<String> = plain
        .unicode_words()
        .map(|word| word.chars().filter(|c| c.is_alphanumeric()).collect::<String>())
        .filter(|word| !word.is_empty())
        .collect();
    words.join(TOKEN_SEPARATOR)
}

/// Check whether a code point belongs to the emoji ranges
///
/// Includes the joiners and modifiers that glue emoji sequences together.
pub fn is_emoji(c: char) -> bool {
    matches!(
        c as u32,
        0x1F000..=0x1FAFF
            | 0x2600..=0x27BF
            | 0x2300..=0x23FF
            | 0x2B00..=0x2BFF
            | 0x2190..=0x21FF
            | 0x2934..=0x2935
            | 0x25AA..=0x25FE
            | 0x3030
            | 0x303D
            | 0x3297
            | 0x3299
            | 0x00A9
            | 0x00AE
            | 0x2122
            | 0x2139
            | 0x200D
            | 0x20E3
            | 0xFE00..=0xFE0F
            | 0xE0020..=0xE007F
    )
}

/// Check whether a text is non-empty and made of emoji code points only
pub fn is_emoji_only(text: &str) -> bool {
    !text.is_empty() && text.chars().all(is_emoji)
}

/// Length of a text in characters (entity offsets are character based)
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_diacritics() {
        assert_eq!(remove_diacritics("Příliš žluťoučký kůň"), "Prilis zlutoucky kun");
        assert_eq!(remove_diacritics("café"), "cafe");
        // Devanagari vowel signs are not diacritics
        assert_eq!(remove_diacritics("नमस्ते"), "नमस्ते");
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(tokenize("Héllo, World!"), "hello-world");
        assert_eq!(tokenize("  I'm   FINE "), "im-fine");
        assert_eq!(tokenize("order #12"), "order-12");
        assert_eq!(tokenize("???"), "");
        assert_eq!(tokenize(""), "");
    }

    #[test]
    fn test_emoji_detection() {
        assert!(is_emoji_only("👍"));
        assert!(is_emoji_only("👍👍"));
        assert!(is_emoji_only("❤️"));
        assert!(is_emoji_only("👍🏽"));
        assert!(!is_emoji_only("👍 ok"));
        assert!(!is_emoji_only("ok"));
        assert!(!is_emoji_only(""));
    }

    #[test]
    fn test_char_len() {
        assert_eq!(char_len("žluť"), 4);
        assert_eq!(char_len("abc"), 3);
    }
}
