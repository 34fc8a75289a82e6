//! # lexicon-tts
//!
//! Cross-lingual pronunciation overrides for VITS/Piper text-to-speech
//! models.
//!
//! A model trained on one language's phonemes can voice loanwords and names
//! from another language when the caller supplies their pronunciation as a
//! phoneme sequence written in the model's own token vocabulary.
//!
//! ## Features
//!
//! - **Lexicon overrides**: `word phoneme...` lines validated against the
//!   model's `tokens.txt`; bad lines are reported, not fatal
//! - **Default phonemizer fallback**: espeak-ng (or the model's own
//!   graphemes) for words the lexicon does not cover
//! - **VITS backend**: ONNX inference via the `vits` feature
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! lexicon-tts = { version = "2026.2", features = ["vits"] }
//! ```
//!
//! ```ignore
//! use std::path::PathBuf;
//! use lexicon_tts::{Engine, EngineConfig};
//!
//! let config = EngineConfig::from_json_file(&PathBuf::from("voice.json"))?;
//! let engine = Engine::from_config(&config)?;
//!
//! let audio = engine.synthesize("Привет, Tokyo!", 0, 1.0)?;
//! audio.write_wav(&PathBuf::from("output.wav"))?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod engine;
pub mod engines;
pub mod error;
pub mod lexicon;
pub mod phonemizer;
pub mod resolver;
pub mod tokenizer;
pub mod vocab;

pub use config::EngineConfig;
pub use engine::{Engine, SynthesisAdapter, SynthesisRequest};
pub use error::{EngineError, FormatError, PhonemizerError, SynthesisError};
pub use lexicon::{Lexicon, LineDiagnostic};
pub use phonemizer::Phonemizer;
pub use resolver::{FrontendMode, PhonemeSource, PhonemeStream};
pub use vocab::Vocabulary;

use std::path::Path;

/// Audio produced by one synthesis request.
///
/// Mono f32 samples at the model's native sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Raw audio samples as f32 values
    pub samples: Vec<f32>,
    /// Sample rate reported by the model
    pub sample_rate: u32,
}

impl AudioBuffer {
    /// Write the audio to a 32-bit float WAV file.
    pub fn write_wav(&self, path: &Path) -> Result<(), hound::Error> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(path, spec)?;
        for &sample in &self.samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
        Ok(())
    }

    /// Duration of the audio in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// One inference call's input, already encoded to model ids.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInput {
    pub token_ids: Vec<i64>,
    /// `None` for single-speaker models.
    pub speaker_id: Option<u32>,
    /// Speech speed multiplier, always positive.
    pub speed: f32,
}

/// The acoustic model and vocoder, seen from the engine.
///
/// `infer` takes `&mut self`; the engine serializes all calls through one
/// lock, so implementations need not be reentrant.
pub trait AcousticModel: Send {
    /// Native output sample rate.
    fn sample_rate(&self) -> u32;

    /// Number of speakers. `0` means a single-speaker model that takes no
    /// speaker input.
    fn num_speakers(&self) -> u32;

    /// Run the model once over a full id sequence.
    fn infer(&mut self, input: &ModelInput) -> Result<Vec<f32>, SynthesisError>;
}

#[cfg(test)]
mod tests {
    use super::AudioBuffer;

    #[test]
    fn duration_follows_sample_rate() {
        let audio = AudioBuffer {
            samples: vec![0.0; 11025],
            sample_rate: 22050,
        };
        assert!((audio.duration_secs() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn writes_float_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let audio = AudioBuffer {
            samples: vec![0.0, 0.25, -0.25, 0.5],
            sample_rate: 16000,
        };
        audio.write_wav(&path).unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 16000);
        assert_eq!(reader.spec().channels, 1);
        let samples: Vec<f32> = reader.samples::<f32>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, audio.samples);
    }
}
