use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use crate::error::FormatError;
use crate::tokenizer::{normalize_word, tokenize, Segment};
use crate::vocab::Vocabulary;

/// A validated pronunciation override.
///
/// Every symbol in `phonemes` is known to the vocabulary the entry was
/// built against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexiconEntry {
    pub word: String,
    pub phonemes: Vec<String>,
}

/// Why a lexicon line was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// A word with no phonemes after it.
    TooFewFields,
    /// A phoneme the model's vocabulary does not contain.
    UnknownSymbol { word: String, symbol: String },
}

/// A skipped lexicon line. Non-fatal; returned next to the built table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineDiagnostic {
    /// 1-based line number in the source.
    pub line: usize,
    pub kind: DiagnosticKind,
}

impl fmt::Display for LineDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            DiagnosticKind::TooFewFields => {
                write!(f, "line {}: expected a word followed by phonemes", self.line)
            }
            DiagnosticKind::UnknownSymbol { word, symbol } => write!(
                f,
                "line {}: unknown phoneme {symbol:?} in entry for {word:?}",
                self.line
            ),
        }
    }
}

/// Word to phoneme-sequence overrides, validated against one vocabulary.
///
/// Read-only after construction and safe to share across threads.
#[derive(Debug, Clone, Default)]
pub struct Lexicon {
    entries: HashMap<String, LexiconEntry>,
}

impl Lexicon {
    /// An empty table: every word falls back to the default phonemizer.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load a lexicon file, validating it against `vocab`.
    ///
    /// A missing or unreadable file is a [`FormatError`]. A file whose every
    /// line was rejected still loads, as an empty table plus diagnostics.
    pub fn load(
        path: &Path,
        vocab: &Vocabulary,
    ) -> Result<(Self, Vec<LineDiagnostic>), FormatError> {
        let content = std::fs::read_to_string(path).map_err(|e| FormatError::io(path, e))?;
        let (lexicon, diagnostics) = Self::build(content.lines(), vocab);
        log::info!(
            "Loaded {} lexicon entries from {} ({} lines skipped)",
            lexicon.len(),
            path.display(),
            diagnostics.len()
        );
        if lexicon.is_empty() {
            log::warn!("Lexicon {} has no usable entries", path.display());
        }
        Ok((lexicon, diagnostics))
    }

    /// Build a table from lexicon lines.
    ///
    /// Each data line is `<word> <phoneme>...`, split on whitespace. Blank
    /// lines and lines starting with `#` are ignored. A `#` later on a data
    /// line is not a comment: it stays part of the last phoneme. Lines with
    /// no phonemes or with a phoneme outside `vocab` are skipped and
    /// reported. Words are case-folded; a repeated word replaces the
    /// earlier entry.
    ///
    /// Text is looked up one tokenizer word at a time, so a key such as
    /// `wi-fi` or `jean-paul` can never match. Such entries are kept but
    /// logged; list each part (`wi`, `fi`) separately instead.
    pub fn build<I, S>(lines: I, vocab: &Vocabulary) -> (Self, Vec<LineDiagnostic>)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut entries = HashMap::new();
        let mut diagnostics = Vec::new();

        for (idx, raw) in lines.into_iter().enumerate() {
            let line = idx + 1;
            let text = raw.as_ref().trim();
            if text.is_empty() || text.starts_with('#') {
                continue;
            }

            let mut fields = text.split_whitespace();
            let Some(word) = fields.next() else {
                continue;
            };
            let phonemes: Vec<String> = fields.map(str::to_string).collect();

            if phonemes.is_empty() {
                let diagnostic = LineDiagnostic {
                    line,
                    kind: DiagnosticKind::TooFewFields,
                };
                log::warn!("Skipping lexicon {diagnostic}");
                diagnostics.push(diagnostic);
                continue;
            }

            if let Some(symbol) = phonemes.iter().find(|p| !vocab.contains(p)) {
                let diagnostic = LineDiagnostic {
                    line,
                    kind: DiagnosticKind::UnknownSymbol {
                        word: word.to_string(),
                        symbol: symbol.clone(),
                    },
                };
                log::warn!("Skipping lexicon {diagnostic}");
                diagnostics.push(diagnostic);
                continue;
            }

            if !is_single_word(word) {
                log::warn!(
                    "Lexicon line {line}: {word:?} spans several words and will never match"
                );
            }

            let key = normalize_word(word);
            let entry = LexiconEntry {
                word: key.clone(),
                phonemes,
            };
            if entries.insert(key, entry).is_some() {
                log::debug!("Lexicon line {line} overrides an earlier entry for {word:?}");
            }
        }

        (Self { entries }, diagnostics)
    }

    /// Entry for a normalized key (see [`normalize_word`]).
    pub fn get(&self, key: &str) -> Option<&LexiconEntry> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LexiconEntry> {
        self.entries.values()
    }
}

/// Whether the tokenizer reads `word` back as exactly one word.
fn is_single_word(word: &str) -> bool {
    let mut segments = tokenize(word);
    matches!((segments.next(), segments.next()), (Some(Segment::Word(_)), None))
}
