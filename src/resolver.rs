//! Word-by-word phoneme resolution.
//!
//! Each word is pronounced from the lexicon when it has an entry and from
//! the default phonemizer otherwise. The per-word runs are fused, in input
//! order, into one [`PhonemeStream`] with boundary markers between words.

use std::ops::Range;

use serde::Deserialize;

use crate::error::PhonemizerError;
use crate::lexicon::{Lexicon, LexiconEntry};
use crate::phonemizer::Phonemizer;
use crate::tokenizer::{tokenize, PauseStrength, Segment, WordToken};

/// Where a phoneme came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhonemeSource {
    Lexicon,
    DefaultPhonemizer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamItem {
    Phoneme {
        symbol: String,
        source: PhonemeSource,
    },
    /// Separates two words' phoneme runs.
    Boundary { pause: PauseStrength },
}

/// Resolved phonemes and word boundaries for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhonemeStream {
    items: Vec<StreamItem>,
}

impl PhonemeStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_phoneme(&mut self, symbol: impl Into<String>, source: PhonemeSource) {
        self.items.push(StreamItem::Phoneme {
            symbol: symbol.into(),
            source,
        });
    }

    pub fn push_boundary(&mut self, pause: PauseStrength) {
        self.items.push(StreamItem::Boundary { pause });
    }

    pub fn items(&self) -> &[StreamItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of phoneme symbols, boundaries excluded.
    pub fn phoneme_count(&self) -> usize {
        self.phonemes().count()
    }

    /// Phoneme symbols in order, boundaries excluded.
    pub fn phonemes(&self) -> impl Iterator<Item = (&str, PhonemeSource)> {
        self.items.iter().filter_map(|item| match item {
            StreamItem::Phoneme { symbol, source } => Some((symbol.as_str(), *source)),
            StreamItem::Boundary { .. } => None,
        })
    }
}

impl IntoIterator for PhonemeStream {
    type Item = StreamItem;
    type IntoIter = std::vec::IntoIter<StreamItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

/// Which pronunciation sources the resolver may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrontendMode {
    /// Lexicon first, default phonemizer for misses.
    #[default]
    Auto,
    /// Lexicon only; misses are skipped.
    LexiconOnly,
    /// Default phonemizer only; the lexicon is ignored.
    PhonemizerOnly,
}

/// Why a word contributed nothing to the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// No lexicon entry and no phonemizer allowed or configured.
    NotInLexicon,
    /// The phonemizer failed or returned nothing.
    PhonemizerFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedWord {
    pub word: String,
    pub span: Range<usize>,
    pub reason: SkipReason,
}

/// Counters for one resolution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveStats {
    pub lexicon_words: usize,
    pub phonemizer_words: usize,
    pub skipped_words: usize,
    pub lexicon_phonemes: usize,
    pub phonemizer_phonemes: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub stream: PhonemeStream,
    pub skipped: Vec<SkippedWord>,
    pub stats: ResolveStats,
}

/// Outcome of looking a word up in the lexicon.
enum Pronunciation<'l> {
    Entry(&'l LexiconEntry),
    Fallback,
}

/// Resolves word tokens against a lexicon and an optional default
/// phonemizer.
///
/// Lookups are read-only, so one resolver may serve any number of
/// requests.
pub struct Resolver<'a> {
    lexicon: &'a Lexicon,
    phonemizer: Option<&'a dyn Phonemizer>,
    mode: FrontendMode,
}

impl<'a> Resolver<'a> {
    pub fn new(lexicon: &'a Lexicon, phonemizer: Option<&'a dyn Phonemizer>) -> Self {
        Self {
            lexicon,
            phonemizer,
            mode: FrontendMode::Auto,
        }
    }

    pub fn with_mode(mut self, mode: FrontendMode) -> Self {
        self.mode = mode;
        self
    }

    /// Tokenize and resolve `text`.
    pub fn resolve_text(&self, text: &str) -> Resolution {
        self.resolve(tokenize(text))
    }

    /// Resolve a tokenized text, left to right.
    ///
    /// Between two emitted words a boundary is inserted carrying the
    /// strongest pause hint of the gaps in between. Gaps before the first or
    /// after the last emitted word produce nothing. A word the phonemizer
    /// fails on is skipped; the rest of the text still resolves.
    ///
    /// Lexicon misses go to the phonemizer in a single batch before the
    /// fold.
    pub fn resolve<'t, I>(&self, segments: I) -> Resolution
    where
        I: IntoIterator<Item = Segment<'t>>,
    {
        let segments: Vec<Segment<'t>> = segments.into_iter().collect();
        let fallback_words: Vec<&'t str> = segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Word(word) if self.needs_phonemizer(word) => Some(word.surface),
                _ => None,
            })
            .collect();
        let mut phonemized = self.phonemize_all(&fallback_words).into_iter();

        let mut resolution = Resolution::default();
        let mut pending_pause = PauseStrength::None;
        let mut emitted_any = false;

        for segment in segments {
            let word = match segment {
                Segment::Gap(gap) => {
                    pending_pause = pending_pause.max(gap.pause);
                    continue;
                }
                Segment::Word(word) => word,
            };

            let (phonemes, source) = match self.pronounce(&word, &mut phonemized) {
                Ok(found) => found,
                Err(reason) => {
                    resolution.stats.skipped_words += 1;
                    resolution.skipped.push(SkippedWord {
                        word: word.surface.to_string(),
                        span: word.span,
                        reason,
                    });
                    continue;
                }
            };

            if emitted_any {
                resolution.stream.push_boundary(pending_pause);
            }
            pending_pause = PauseStrength::None;
            emitted_any = true;

            match source {
                PhonemeSource::Lexicon => {
                    resolution.stats.lexicon_words += 1;
                    resolution.stats.lexicon_phonemes += phonemes.len();
                }
                PhonemeSource::DefaultPhonemizer => {
                    resolution.stats.phonemizer_words += 1;
                    resolution.stats.phonemizer_phonemes += phonemes.len();
                }
            }
            for symbol in phonemes {
                resolution.stream.push_phoneme(symbol, source);
            }
        }

        log::debug!("Resolved text: {:?}", resolution.stats);
        resolution
    }

    fn lookup(&self, word: &WordToken<'_>) -> Pronunciation<'a> {
        if self.mode == FrontendMode::PhonemizerOnly {
            return Pronunciation::Fallback;
        }
        match self.lexicon.get(&word.key) {
            Some(entry) => Pronunciation::Entry(entry),
            None => Pronunciation::Fallback,
        }
    }

    /// The phonemizer this resolver may call, if any.
    fn active_phonemizer(&self) -> Option<&'a dyn Phonemizer> {
        match self.mode {
            FrontendMode::LexiconOnly => None,
            _ => self.phonemizer,
        }
    }

    fn needs_phonemizer(&self, word: &WordToken<'_>) -> bool {
        self.active_phonemizer().is_some()
            && matches!(self.lookup(word), Pronunciation::Fallback)
    }

    fn phonemize_all(&self, words: &[&str]) -> Vec<Result<Vec<String>, PhonemizerError>> {
        match self.active_phonemizer() {
            Some(phonemizer) if !words.is_empty() => {
                log::debug!("Phonemizing {} words", words.len());
                phonemizer.phonemize_batch(words)
            }
            _ => Vec::new(),
        }
    }

    fn pronounce<R>(
        &self,
        word: &WordToken<'_>,
        phonemized: &mut R,
    ) -> Result<(Vec<String>, PhonemeSource), SkipReason>
    where
        R: Iterator<Item = Result<Vec<String>, PhonemizerError>>,
    {
        if let Pronunciation::Entry(entry) = self.lookup(word) {
            return Ok((entry.phonemes.clone(), PhonemeSource::Lexicon));
        }
        if self.active_phonemizer().is_none() {
            log::debug!("No pronunciation for {:?}", word.surface);
            return Err(SkipReason::NotInLexicon);
        }

        match phonemized.next() {
            Some(Ok(symbols)) if !symbols.is_empty() => {
                Ok((symbols, PhonemeSource::DefaultPhonemizer))
            }
            Some(Ok(_)) => {
                log::warn!("Phonemizer returned nothing for {:?}", word.surface);
                Err(SkipReason::PhonemizerFailed("empty result".to_string()))
            }
            Some(Err(e)) => {
                log::warn!("Phonemizer failed for {:?}: {e}", word.surface);
                Err(SkipReason::PhonemizerFailed(e.to_string()))
            }
            None => {
                log::warn!("Phonemizer returned no result for {:?}", word.surface);
                Err(SkipReason::PhonemizerFailed("missing batch result".to_string()))
            }
        }
    }
}

/// Resolve `segments` with the default [`FrontendMode::Auto`].
pub fn resolve<'t, I>(
    segments: I,
    lexicon: &Lexicon,
    phonemizer: Option<&dyn Phonemizer>,
) -> PhonemeStream
where
    I: IntoIterator<Item = Segment<'t>>,
{
    Resolver::new(lexicon, phonemizer).resolve(segments).stream
}
