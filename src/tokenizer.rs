//! Text tokenization into word tokens and the non-word spans between them.
//!
//! A word is a maximal run of letters, digits and combining marks. Every
//! other character (whitespace, punctuation, symbols) lands in a [`Gap`],
//! so the original text can be rebuilt from the segment spans and
//! punctuation can be turned into pause hints downstream.

use std::ops::Range;

/// How strongly a non-word span asks for a pause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum PauseStrength {
    /// Plain whitespace or symbols with no prosodic meaning.
    #[default]
    None,
    /// Clause-level punctuation such as `,` `;` `:`.
    Short,
    /// Sentence-final punctuation such as `.` `!` `?`.
    Long,
}

/// A word of the input text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordToken<'a> {
    /// Original text, casing preserved.
    pub surface: &'a str,
    /// Lookup key, normalized with [`normalize_word`].
    pub key: String,
    /// Byte range of `surface` in the input.
    pub span: Range<usize>,
}

/// A run of non-word characters between words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gap<'a> {
    pub text: &'a str,
    pub span: Range<usize>,
    pub pause: PauseStrength,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    Word(WordToken<'a>),
    Gap(Gap<'a>),
}

/// Normalize a word into its lookup key: trimmed and lowercased with the
/// locale-independent Unicode mapping.
///
/// The lexicon and the tokenizer share this so lookups ignore input casing.
pub fn normalize_word(word: &str) -> String {
    word.trim().to_lowercase()
}

/// Split `text` into words and gaps, lazily.
///
/// The returned iterator is `Clone`, so a tokenization can be restarted
/// from any point without re-scanning the prefix.
pub fn tokenize(text: &str) -> Tokens<'_> {
    Tokens { text, pos: 0 }
}

/// Iterator returned by [`tokenize`].
#[derive(Debug, Clone)]
pub struct Tokens<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Iterator for Tokens<'a> {
    type Item = Segment<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = &self.text[self.pos..];
        let first = rest.chars().next()?;
        let in_word = is_word_char(first);

        let len = rest
            .char_indices()
            .find(|&(_, ch)| is_word_char(ch) != in_word)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());

        let span = self.pos..self.pos + len;
        let surface = &self.text[span.clone()];
        self.pos = span.end;

        let segment = if in_word {
            Segment::Word(WordToken {
                surface,
                key: normalize_word(surface),
                span,
            })
        } else {
            Segment::Gap(Gap {
                pause: gap_pause(self.text, span.clone()),
                text: surface,
                span,
            })
        };
        Some(segment)
    }
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || is_combining_mark(ch)
}

fn is_combining_mark(ch: char) -> bool {
    matches!(
        ch,
        '\u{0300}'..='\u{036F}'
            | '\u{1AB0}'..='\u{1AFF}'
            | '\u{1DC0}'..='\u{1DFF}'
            | '\u{20D0}'..='\u{20FF}'
    )
}

fn gap_pause(text: &str, span: Range<usize>) -> PauseStrength {
    let gap = &text[span.clone()];
    // "2.0" and "1,000" keep their separator inside the number.
    if gap.chars().count() == 1 && is_numeric_connector_between_digits(text, span) {
        return PauseStrength::None;
    }
    gap.chars().map(pause_hint).max().unwrap_or_default()
}

fn pause_hint(ch: char) -> PauseStrength {
    match ch {
        ',' | ';' | ':' | '—' | '–' | '，' | '、' | '；' | '：' => PauseStrength::Short,
        '.' | '!' | '?' | '…' | '。' | '！' | '？' | '\n' | '\r' => PauseStrength::Long,
        _ => PauseStrength::None,
    }
}

fn is_numeric_connector_between_digits(text: &str, span: Range<usize>) -> bool {
    if !matches!(&text[span.clone()], "." | ",") {
        return false;
    }

    let prev = text[..span.start].chars().next_back();
    let next = text[span.end..].chars().next();

    matches!(
        (prev, next),
        (Some(left), Some(right)) if left.is_ascii_digit() && right.is_ascii_digit()
    )
}

#[cfg(test)]
mod tests {
    use super::{normalize_word, tokenize, PauseStrength, Segment};

    fn words(text: &str) -> Vec<(String, String)> {
        tokenize(text)
            .filter_map(|s| match s {
                Segment::Word(w) => Some((w.surface.to_string(), w.key)),
                Segment::Gap(_) => None,
            })
            .collect()
    }

    fn gaps(text: &str) -> Vec<(String, PauseStrength)> {
        tokenize(text)
            .filter_map(|s| match s {
                Segment::Gap(g) => Some((g.text.to_string(), g.pause)),
                Segment::Word(_) => None,
            })
            .collect()
    }

    #[test]
    fn splits_words_and_punctuation() {
        assert_eq!(
            words("Hello, world!"),
            vec![
                ("Hello".to_string(), "hello".to_string()),
                ("world".to_string(), "world".to_string()),
            ]
        );
        assert_eq!(
            gaps("Hello, world!"),
            vec![
                (", ".to_string(), PauseStrength::Short),
                ("!".to_string(), PauseStrength::Long),
            ]
        );
    }

    #[test]
    fn spans_cover_the_whole_input() {
        let text = "  Привет,  мир — hello?\n";
        let rebuilt: String = tokenize(text)
            .map(|s| match s {
                Segment::Word(w) => &text[w.span],
                Segment::Gap(g) => &text[g.span],
            })
            .collect();
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn lowercases_cyrillic_keys_and_keeps_surface() {
        assert_eq!(
            words("МОСКВА Москва"),
            vec![
                ("МОСКВА".to_string(), "москва".to_string()),
                ("Москва".to_string(), "москва".to_string()),
            ]
        );
    }

    #[test]
    fn tokenizing_twice_is_identical() {
        let text = "hello world, привет мир.";
        let first: Vec<_> = tokenize(text).collect();
        let second: Vec<_> = tokenize(text).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn cloned_iterator_restarts_from_its_position() {
        let mut tokens = tokenize("one two three");
        tokens.next();
        let resumed = tokens.clone();
        assert_eq!(tokens.collect::<Vec<_>>(), resumed.collect::<Vec<_>>());
    }

    #[test]
    fn combining_marks_stay_inside_words() {
        // "ё" written as "е" + U+0308.
        assert_eq!(words("е\u{0308}лка").len(), 1);
    }

    #[test]
    fn numeric_separators_carry_no_pause() {
        assert_eq!(gaps("2.0"), vec![(".".to_string(), PauseStrength::None)]);
        assert_eq!(gaps("2, 0"), vec![(", ".to_string(), PauseStrength::Short)]);
    }

    #[test]
    fn newline_is_a_long_pause() {
        assert_eq!(gaps("a\nb"), vec![("\n".to_string(), PauseStrength::Long)]);
    }

    #[test]
    fn empty_text_yields_nothing() {
        assert_eq!(tokenize("").count(), 0);
    }

    #[test]
    fn normalize_trims_and_folds_case() {
        assert_eq!(normalize_word("  HeLLo "), "hello");
    }
}
