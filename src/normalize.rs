// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Upper bound for a normalized key, in bytes.
pub const MAX_KEY_LEN: usize = 1_024;

/// Folds a raw field value into its index key.
///
/// Decomposes (NFD), drops diacritics, lowercases and keeps alphanumerics only.
/// The result is cut to [`MAX_KEY_LEN`] bytes on a character boundary.
///
/// ```
/// use posting_index::normalize;
///
/// assert_eq!("helloworld", normalize("Hello, World"));
/// assert_eq!("perez", normalize("Pérez"));
/// ```
#[must_use]
pub fn normalize(value: &str) -> String {
    let mut out = String::with_capacity(value.len().min(MAX_KEY_LEN));

    for c in value
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_alphanumeric())
    {
        if out.len() + c.len_utf8() > MAX_KEY_LEN {
            break;
        }
        out.push(c);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn normalize_case_and_punctuation() {
        assert_eq!("helloworld", normalize("Hello, World"));
        assert_eq!("helloworld", normalize("hello world"));
        assert_eq!("helloworld", normalize("HELLO WORLD"));
        assert_eq!("", normalize("!!! ,,, ---"));
        assert_eq!("", normalize(""));
    }

    #[test]
    fn normalize_diacritics() {
        assert_eq!("cancion", normalize("Canción"));
        assert_eq!("nino", normalize("NIÑO"));
        assert_eq!("aeiou", normalize("ÁÉÍÓÚ"));
        assert_eq!(normalize("Garcia Marquez"), normalize("García Márquez"));
    }

    #[test]
    fn normalize_keeps_digits() {
        assert_eq!("1984", normalize("1984"));
        assert_eq!("catch22", normalize("Catch-22"));
    }

    #[test]
    fn normalize_is_bounded() {
        let long = "a".repeat(MAX_KEY_LEN * 2);
        assert_eq!(MAX_KEY_LEN, normalize(&long).len());

        // multi-byte chars are never split
        let long = "ж".repeat(MAX_KEY_LEN);
        let key = normalize(&long);
        assert!(key.len() <= MAX_KEY_LEN);
        assert!(key.chars().all(|c| c == 'ж'));
    }
}
