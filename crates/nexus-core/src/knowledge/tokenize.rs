//! Identifier and text tokenization shared by labeling and keyword search.

/// Split text into lower-case words at non-alphanumeric characters and
/// camelCase boundaries.
///
/// `HTTPServer` yields `http`, `server`; `load_user2Profile` yields `load`,
/// `user2`, `profile`.
pub fn split_words(text: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let chars: Vec<char> = text.chars().collect();

    for (i, &ch) in chars.iter().enumerate() {
        if !ch.is_alphanumeric() {
            flush(&mut current, &mut words);
            continue;
        }
        if ch.is_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).is_some_and(|c| c.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_lower) {
                flush(&mut current, &mut words);
            }
        }
        current.extend(ch.to_lowercase());
    }
    flush(&mut current, &mut words);

    words
}

fn flush(current: &mut String, words: &mut Vec<String>) {
    if !current.is_empty() {
        words.push(std::mem::take(current));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_words() {
        assert_eq!(split_words("parseUserConfig"), vec!["parse", "user", "config"]);
        assert_eq!(split_words("HTTPServer"), vec!["http", "server"]);
        assert_eq!(split_words("load_user2Profile"), vec!["load", "user2", "profile"]);
        assert_eq!(split_words("fn main() {}"), vec!["fn", "main"]);
        assert!(split_words("  ::  ").is_empty());
    }
}
