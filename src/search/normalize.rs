//! Search normalization
//!
//! Case- and diacritic-insensitive folding (NFKD, combining marks removed,
//! lowercased) that remembers where every folded byte came from, so matches
//! found in folded text can be reported against the original characters.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Fold text for matching
pub fn normalize_for_search(text: &str) -> String {
    text.chars().flat_map(fold_char).collect()
}

fn fold_char(c: char) -> impl Iterator<Item = char> {
    std::iter::once(c)
        .nfkd()
        .filter(|d| !is_combining_mark(*d))
        .flat_map(char::to_lowercase)
        .filter(|d| !is_combining_mark(*d))
}

/// Folded text plus a byte-to-original-char map
#[derive(Debug, Clone)]
pub struct FoldedText {
    folded: String,
    /// For each byte of `folded`, the index of the original char it came from
    origins: Vec<usize>,
    original_chars: usize,
}

impl FoldedText {
    pub fn new(original: &str) -> Self {
        let mut folded = String::with_capacity(original.len());
        let mut origins = Vec::with_capacity(original.len());
        let mut original_chars = 0;

        for (index, c) in original.chars().enumerate() {
            for d in fold_char(c) {
                folded.push(d);
                origins.extend(std::iter::repeat(index).take(d.len_utf8()));
            }
            original_chars = index + 1;
        }

        Self {
            folded,
            origins,
            original_chars,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.folded
    }

    /// Number of chars in the original text
    pub fn original_len(&self) -> usize {
        self.original_chars
    }

    /// Map a folded byte range to `(start, length)` in original chars
    ///
    /// A match that covers part of an expanded char (a ligature, say)
    /// widens to the whole original char.
    pub fn original_range(&self, byte_start: usize, byte_len: usize) -> Option<(usize, usize)> {
        if byte_len == 0 {
            return None;
        }
        let first = *self.origins.get(byte_start)?;
        let last = *self.origins.get(byte_start + byte_len - 1)?;
        Some((first, last - first + 1))
    }

    /// Every non-overlapping occurrence of an already folded needle, left to right
    pub fn find_all(&self, folded_needle: &str) -> Vec<(usize, usize)> {
        if folded_needle.is_empty() {
            return Vec::new();
        }
        let mut ranges: Vec<(usize, usize)> = Vec::new();
        for (start, m) in self.folded.match_indices(folded_needle) {
            let Some((first, len)) = self.original_range(start, m.len()) else {
                continue;
            };
            // Several hits inside one expanded char widen to the same original char
            if let Some(&(prev_start, prev_len)) = ranges.last() {
                if first < prev_start + prev_len {
                    continue;
                }
            }
            ranges.push((first, len));
        }
        ranges
    }
}

/// Excerpt around a char range, on original text
///
/// Whitespace runs collapse to one space; elided ends get `...`.
pub fn create_excerpt(original: &str, start: usize, len: usize, context: usize) -> String {
    let chars: Vec<char> = original.chars().collect();
    excerpt_from_chars(&chars, start, len, context)
}

/// [`create_excerpt`] over a page already split into chars
pub fn excerpt_from_chars(chars: &[char], start: usize, len: usize, context: usize) -> String {
    let from = start.saturating_sub(context);
    let to = (start + len + context).min(chars.len());
    if from >= to {
        return String::new();
    }

    let mut excerpt = String::new();
    let mut last_was_space = false;
    for c in &chars[from..to] {
        if c.is_whitespace() {
            if !last_was_space {
                excerpt.push(' ');
            }
            last_was_space = true;
        } else {
            excerpt.push(*c);
            last_was_space = false;
        }
    }

    let prefix = if from > 0 { "..." } else { "" };
    let suffix = if to < chars.len() { "..." } else { "" };
    format!("{}{}{}", prefix, excerpt.trim(), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_for_search() {
        assert_eq!(normalize_for_search("Hello World"), "hello world");
        assert_eq!(normalize_for_search("Café"), "cafe");
        assert_eq!(normalize_for_search("Naïve"), "naive");
        assert_eq!(normalize_for_search("ÅNGSTRÖM"), "angstrom");
    }

    #[test]
    fn test_ranges_point_at_original_chars() {
        let folded = FoldedText::new("Le Café crème");
        let needle = normalize_for_search("CREME");

        assert_eq!(folded.find_all(&needle), vec![(8, 5)]);
        assert_eq!(folded.original_len(), 13);
    }

    #[test]
    fn test_ligature_widens_to_whole_char() {
        // U+FB01 folds to "fi"
        let folded = FoldedText::new("of\u{FB01}ce");
        assert_eq!(folded.find_all("fice"), vec![(2, 3)]);
        assert_eq!(folded.find_all("i"), vec![(2, 1)]);
    }

    #[test]
    fn test_hits_inside_one_ligature_collapse() {
        // U+FB03 folds to "ffi"; both "f" hits land on char 0
        let folded = FoldedText::new("\u{FB03}x");
        assert_eq!(folded.find_all("f"), vec![(0, 1)]);

        let folded = FoldedText::new("\u{FB00} off");
        assert_eq!(folded.find_all("f"), vec![(0, 1), (3, 1), (4, 1)]);
    }

    #[test]
    fn test_non_overlapping() {
        let folded = FoldedText::new("aaaa");
        assert_eq!(folded.find_all("aa"), vec![(0, 2), (2, 2)]);
        assert!(folded.find_all("").is_empty());
    }

    #[test]
    fn test_create_excerpt() {
        let text = "This is a test of the excerpt\n\n creation function.";
        let excerpt = create_excerpt(text, 10, 4, 8);
        assert_eq!(excerpt, "...is is a test of the...");

        assert_eq!(create_excerpt("short", 0, 5, 40), "short");

        let chars: Vec<char> = text.chars().collect();
        assert_eq!(excerpt_from_chars(&chars, 10, 4, 8), excerpt);
    }
}
