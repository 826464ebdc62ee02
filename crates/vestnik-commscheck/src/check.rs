//! The moderation rule: a comment is banned when its text contains any of
//! the configured substrings.

const BANNED: [&str; 3] = ["qwerty", "йцукен", "zxvbnm"];

/// Whether `text` contains a banned substring.
pub fn banned(text: &str) -> bool {
    BANNED.iter().any(|word| text.contains(word))
}
