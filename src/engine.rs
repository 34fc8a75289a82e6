use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{EngineError, SynthesisError};
use crate::lexicon::{Lexicon, LineDiagnostic};
use crate::phonemizer::Phonemizer;
use crate::resolver::{FrontendMode, PhonemeSource, PhonemeStream, Resolution, Resolver, StreamItem};
use crate::tokenizer::PauseStrength;
use crate::vocab::Vocabulary;
use crate::{AcousticModel, AudioBuffer, ModelInput};

/// Symbols tried, in order, as the stand-in for unknown phonemes.
const PLACEHOLDER_CANDIDATES: &[&str] = &["<sil>", "sil", "_", " "];

/// A resolved phoneme stream plus runtime controls.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    pub stream: PhonemeStream,
    pub speaker_id: u32,
    /// Speech speed multiplier. Must be positive; default 1.0.
    pub speed: f32,
}

impl SynthesisRequest {
    pub fn new(stream: PhonemeStream) -> Self {
        Self {
            stream,
            speaker_id: 0,
            speed: 1.0,
        }
    }

    pub fn with_speaker(mut self, speaker_id: u32) -> Self {
        self.speaker_id = speaker_id;
        self
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }
}

/// Special ids derived from the vocabulary.
///
/// Piper-style vocabularies (`^`, `_`, `$` present) wrap the sequence in
/// BOS/EOS and put the pad id after every symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
struct TokenLayout {
    bos: Option<i64>,
    eos: Option<i64>,
    pad: Option<i64>,
    word_separator: Option<i64>,
    short_pause: Option<i64>,
    long_pause: Option<i64>,
    placeholder: Option<i64>,
}

impl TokenLayout {
    fn new(vocab: &Vocabulary, placeholder: Option<&str>) -> Result<Self, EngineError> {
        let placeholder = match placeholder {
            Some(symbol) => Some(vocab.id_of(symbol).ok_or_else(|| {
                EngineError::Config(format!(
                    "placeholder symbol {symbol:?} is not in the vocabulary"
                ))
            })?),
            None => vocab
                .first_of(PLACEHOLDER_CANDIDATES)
                .and_then(|s| vocab.id_of(s)),
        };

        let (bos, pad, eos) = match (vocab.id_of("^"), vocab.id_of("_"), vocab.id_of("$")) {
            (Some(bos), Some(pad), Some(eos)) => (Some(bos), Some(pad), Some(eos)),
            _ => (None, None, None),
        };

        Ok(Self {
            bos,
            eos,
            pad,
            word_separator: vocab.id_of(" "),
            short_pause: vocab.id_of(","),
            long_pause: vocab.id_of("."),
            placeholder,
        })
    }

    /// Encode a stream to ids. Returns the ids and how many of them came
    /// from phoneme symbols.
    fn encode(&self, vocab: &Vocabulary, stream: &PhonemeStream) -> (Vec<i64>, usize) {
        let mut ids = Vec::with_capacity(stream.len() * 2 + 3);
        let mut phonemes = 0usize;

        if let Some(bos) = self.bos {
            ids.push(bos);
            self.push_pad(&mut ids);
        }

        for item in stream.items() {
            match item {
                StreamItem::Phoneme { symbol, source } => {
                    let id = match vocab.id_of(symbol) {
                        Some(id) => Some(id),
                        None => self.substitute(symbol, *source),
                    };
                    if let Some(id) = id {
                        ids.push(id);
                        self.push_pad(&mut ids);
                        phonemes += 1;
                    }
                }
                StreamItem::Boundary { pause } => {
                    let pause_id = match pause {
                        PauseStrength::Long => self.long_pause,
                        PauseStrength::Short => self.short_pause,
                        PauseStrength::None => None,
                    };
                    for id in [pause_id, self.word_separator].into_iter().flatten() {
                        ids.push(id);
                        self.push_pad(&mut ids);
                    }
                }
            }
        }

        if let Some(eos) = self.eos {
            ids.push(eos);
        }
        (ids, phonemes)
    }

    fn push_pad(&self, ids: &mut Vec<i64>) {
        if let Some(pad) = self.pad {
            ids.push(pad);
        }
    }

    fn substitute(&self, symbol: &str, source: PhonemeSource) -> Option<i64> {
        match self.placeholder {
            Some(id) => {
                log::warn!("Unknown {source:?} phoneme {symbol:?}, using placeholder");
                Some(id)
            }
            None => {
                log::warn!("Unknown {source:?} phoneme {symbol:?} dropped (no placeholder)");
                None
            }
        }
    }
}

/// Drives the acoustic model with resolved phoneme streams.
///
/// The model sits behind a single mutex: one inference runs at a time,
/// whatever the number of calling threads.
pub struct SynthesisAdapter {
    vocab: Arc<Vocabulary>,
    layout: TokenLayout,
    model: Mutex<Box<dyn AcousticModel>>,
    sample_rate: u32,
    num_speakers: u32,
}

impl SynthesisAdapter {
    pub fn new(
        vocab: Arc<Vocabulary>,
        model: Box<dyn AcousticModel>,
        placeholder: Option<&str>,
    ) -> Result<Self, EngineError> {
        let layout = TokenLayout::new(&vocab, placeholder)?;
        let sample_rate = model.sample_rate();
        let num_speakers = model.num_speakers();
        if sample_rate == 0 {
            return Err(EngineError::ModelLoad("model reports a sample rate of 0".to_string()));
        }
        Ok(Self {
            vocab,
            layout,
            model: Mutex::new(model),
            sample_rate,
            num_speakers,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn num_speakers(&self) -> u32 {
        self.num_speakers
    }

    /// Synthesize one request.
    ///
    /// Fails on a non-positive speed, an out-of-range speaker, a stream with
    /// no usable phonemes, or a model error. Nothing shared is modified.
    pub fn synthesize(&self, request: &SynthesisRequest) -> Result<AudioBuffer, SynthesisError> {
        if !(request.speed.is_finite() && request.speed > 0.0) {
            return Err(SynthesisError::InvalidSpeed(request.speed));
        }

        let speaker_id = match self.num_speakers {
            0 => {
                if request.speaker_id != 0 {
                    log::debug!(
                        "Ignoring speaker id {} for single-speaker model",
                        request.speaker_id
                    );
                }
                None
            }
            n if request.speaker_id >= n => {
                return Err(SynthesisError::InvalidSpeaker {
                    speaker_id: request.speaker_id,
                    num_speakers: n,
                })
            }
            _ => Some(request.speaker_id),
        };

        let (token_ids, phonemes) = self.layout.encode(&self.vocab, &request.stream);
        if phonemes == 0 {
            return Err(SynthesisError::EmptyInput);
        }

        let input = ModelInput {
            token_ids,
            speaker_id,
            speed: request.speed,
        };
        log::debug!(
            "Running model on {} ids ({} phonemes), speaker={:?}, speed={}",
            input.token_ids.len(),
            phonemes,
            input.speaker_id,
            input.speed
        );

        let samples = {
            let mut model = self.model.lock().unwrap_or_else(PoisonError::into_inner);
            model.infer(&input)?
        };
        if samples.is_empty() {
            return Err(SynthesisError::EmptyOutput);
        }

        Ok(AudioBuffer {
            samples,
            sample_rate: self.sample_rate,
        })
    }
}

/// An explicitly owned synthesis engine.
///
/// Holds the model's vocabulary, the validated lexicon, the default
/// phonemizer and the model itself. Everything but the model is read-only
/// after construction; the engine is `Send + Sync` and may be shared
/// between threads.
pub struct Engine {
    vocab: Arc<Vocabulary>,
    lexicon: Arc<Lexicon>,
    diagnostics: Vec<LineDiagnostic>,
    phonemizer: Option<Box<dyn Phonemizer>>,
    mode: FrontendMode,
    adapter: SynthesisAdapter,
}

impl Engine {
    /// Build an engine from loaded parts.
    ///
    /// Every lexicon entry must use symbols of `vocab`.
    pub fn new(
        vocab: Arc<Vocabulary>,
        lexicon: Lexicon,
        model: Box<dyn AcousticModel>,
    ) -> Result<Self, EngineError> {
        if let Some(entry) = lexicon
            .iter()
            .find(|e| e.phonemes.iter().any(|p| !vocab.contains(p)))
        {
            return Err(EngineError::Config(format!(
                "lexicon entry {:?} uses symbols outside the model vocabulary",
                entry.word
            )));
        }

        let adapter = SynthesisAdapter::new(Arc::clone(&vocab), model, None)?;
        Ok(Self {
            vocab,
            lexicon: Arc::new(lexicon),
            diagnostics: Vec::new(),
            phonemizer: None,
            mode: FrontendMode::Auto,
            adapter,
        })
    }

    /// Load the vocabulary and optional lexicon from disk.
    ///
    /// Without a lexicon every word goes to the default phonemizer.
    pub fn from_sources(
        tokens_path: &Path,
        lexicon_path: Option<&Path>,
        model: Box<dyn AcousticModel>,
    ) -> Result<Self, EngineError> {
        let vocab = Arc::new(Vocabulary::load(tokens_path)?);
        let (lexicon, diagnostics) = match lexicon_path {
            Some(path) => Lexicon::load(path, &vocab)?,
            None => (Lexicon::empty(), Vec::new()),
        };
        let mut engine = Self::new(vocab, lexicon, model)?;
        engine.diagnostics = diagnostics;
        Ok(engine)
    }

    /// Construct the full VITS engine described by `config`.
    #[cfg(feature = "vits")]
    pub fn from_config(config: &crate::config::EngineConfig) -> Result<Self, EngineError> {
        use crate::engines::vits::{VitsModel, VitsParams};

        config.validate()?;
        let model = VitsModel::load(
            &config.model_path,
            VitsParams {
                num_threads: config.num_threads,
                noise_scale: config.noise_scale,
                noise_scale_w: config.noise_scale_w,
                length_scale: config.length_scale,
            },
        )?;
        if let Some(requested) = config.sample_rate {
            if requested != model.sample_rate() {
                log::info!(
                    "Requested sample rate {requested} ignored; model produces {}",
                    model.sample_rate()
                );
            }
        }

        let engine = Self::from_sources(
            &config.tokens_path,
            config.lexicon_path.as_deref(),
            Box::new(model),
        )?;
        let phonemizer = config.default_phonemizer(Arc::clone(&engine.vocab));
        let engine = engine
            .with_phonemizer(phonemizer)
            .with_frontend_mode(config.frontend_mode);
        match &config.placeholder_symbol {
            Some(symbol) => engine.with_placeholder(symbol),
            None => Ok(engine),
        }
    }

    pub fn with_phonemizer(mut self, phonemizer: Box<dyn Phonemizer>) -> Self {
        self.phonemizer = Some(phonemizer);
        self
    }

    pub fn with_frontend_mode(mut self, mode: FrontendMode) -> Self {
        self.mode = mode;
        self
    }

    /// Use `symbol` for unknown default-phonemizer phonemes.
    pub fn with_placeholder(mut self, symbol: &str) -> Result<Self, EngineError> {
        self.adapter.layout = TokenLayout::new(&self.vocab, Some(symbol))?;
        Ok(self)
    }

    /// Resolve `text` into a phoneme stream without running the model.
    pub fn resolve(&self, text: &str) -> Resolution {
        Resolver::new(&self.lexicon, self.phonemizer.as_deref())
            .with_mode(self.mode)
            .resolve_text(text)
    }

    /// Synthesize `text` with the given speaker and speed.
    pub fn synthesize(
        &self,
        text: &str,
        speaker_id: u32,
        speed: f32,
    ) -> Result<AudioBuffer, SynthesisError> {
        let resolution = self.resolve(text);
        if !resolution.skipped.is_empty() {
            log::info!(
                "{} of {} words skipped",
                resolution.skipped.len(),
                resolution.stats.lexicon_words
                    + resolution.stats.phonemizer_words
                    + resolution.stats.skipped_words
            );
        }
        let request = SynthesisRequest::new(resolution.stream)
            .with_speaker(speaker_id)
            .with_speed(speed);
        self.adapter.synthesize(&request)
    }

    /// Synthesize an already resolved request.
    pub fn synthesize_request(
        &self,
        request: &SynthesisRequest,
    ) -> Result<AudioBuffer, SynthesisError> {
        self.adapter.synthesize(request)
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocab
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    /// Lexicon lines skipped while loading.
    pub fn diagnostics(&self) -> &[LineDiagnostic] {
        &self.diagnostics
    }

    pub fn frontend_mode(&self) -> FrontendMode {
        self.mode
    }

    pub fn sample_rate(&self) -> u32 {
        self.adapter.sample_rate()
    }

    pub fn num_speakers(&self) -> u32 {
        self.adapter.num_speakers()
    }
}
