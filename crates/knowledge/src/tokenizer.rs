//! Text normalization shared by index build and query time.

/// Tokens of this many characters or fewer are dropped.
const MIN_TOKEN_CHARS: usize = 2;

/// Split `text` into lowercase alphanumeric tokens.
///
/// Words are split on whitespace. A word containing any non-alphanumeric
/// character is dropped whole rather than stripped, and words of two
/// characters or fewer are dropped. Build and query must share this
/// function; any divergence silently zeroes recall for affected terms.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .filter(|word| word.chars().all(char::is_alphanumeric))
        .filter(|word| word.chars().count() > MIN_TOKEN_CHARS)
        .map(str::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercases_and_drops_short_words() {
        assert_eq!(
            tokenize("An Introduction to Machine Learning"),
            vec!["introduction", "machine", "learning"]
        );
    }

    #[test]
    fn test_drops_words_with_punctuation() {
        // "learning." and "state-of-the-art" are dropped, not stripped
        assert_eq!(
            tokenize("deep learning. state-of-the-art models"),
            vec!["deep", "models"]
        );
    }

    #[test]
    fn test_keeps_digits_and_unicode_letters() {
        assert_eq!(tokenize("GPT4 über 2024 ab"), vec!["gpt4", "über", "2024"]);
    }

    #[test]
    fn test_length_counts_characters() {
        // Two chars, four bytes
        assert!(tokenize("éé").is_empty());
        assert_eq!(tokenize("ééé"), vec!["ééé"]);
    }

    #[test]
    fn test_deterministic() {
        let text = "Retrieval augmented generation\tgrounds\nanswers in retrieved passages";
        assert_eq!(tokenize(text), tokenize(text));
        assert!(tokenize("").is_empty());
        assert!(tokenize("   \n\t ").is_empty());
    }
}
