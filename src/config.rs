use std::path::{Path, PathBuf};
use std::sync::Arc;

use derive_builder::Builder;
use serde::Deserialize;

use crate::error::{EngineError, FormatError};
use crate::phonemizer::{EspeakConfig, EspeakPhonemizer, GraphemePhonemizer, Phonemizer};
use crate::resolver::FrontendMode;
use crate::vocab::Vocabulary;

fn default_voice() -> String {
    "ru".to_string()
}

fn default_speed() -> f32 {
    1.0
}

fn default_noise_scale() -> f32 {
    0.667
}

fn default_noise_scale_w() -> f32 {
    0.8
}

fn default_length_scale() -> f32 {
    1.0
}

/// Everything needed to construct an [`Engine`](crate::engine::Engine).
///
/// Usually read from JSON:
///
/// ```json
/// {
///   "model_path": "models/ru/model.onnx",
///   "tokens_path": "models/ru/tokens.txt",
///   "lexicon_path": "lexicons/loanwords.txt",
///   "data_dir": "models/espeak-ng-data",
///   "speed": 1.1
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Builder)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct EngineConfig {
    /// ONNX model file.
    pub model_path: PathBuf,
    /// `tokens.txt` or Piper `.onnx.json` holding the model vocabulary.
    pub tokens_path: PathBuf,
    /// Pronunciation overrides. Without one every word is phonemized.
    #[serde(default)]
    #[builder(setter(into, strip_option), default)]
    pub lexicon_path: Option<PathBuf>,
    /// `espeak-ng-data` directory. Enables the espeak-ng phonemizer.
    #[serde(default)]
    #[builder(setter(into, strip_option), default)]
    pub data_dir: Option<PathBuf>,
    /// espeak-ng binary, if not on PATH.
    #[serde(default)]
    #[builder(setter(into, strip_option), default)]
    pub espeak_bin: Option<PathBuf>,
    /// espeak-ng voice for the default phonemizer.
    #[serde(default = "default_voice")]
    #[builder(default = "default_voice()")]
    pub voice: String,
    #[serde(default)]
    #[builder(default)]
    pub frontend_mode: FrontendMode,
    #[serde(default)]
    #[builder(default)]
    pub speaker_id: u32,
    #[serde(default = "default_speed")]
    #[builder(default = "default_speed()")]
    pub speed: f32,
    /// Informational only: audio is always produced at the model's rate.
    #[serde(default)]
    #[builder(setter(into, strip_option), default)]
    pub sample_rate: Option<u32>,
    #[serde(default)]
    #[builder(setter(into, strip_option), default)]
    pub num_threads: Option<usize>,
    #[serde(default = "default_noise_scale")]
    #[builder(default = "default_noise_scale()")]
    pub noise_scale: f32,
    #[serde(default = "default_noise_scale_w")]
    #[builder(default = "default_noise_scale_w()")]
    pub noise_scale_w: f32,
    #[serde(default = "default_length_scale")]
    #[builder(default = "default_length_scale()")]
    pub length_scale: f32,
    /// Stand-in for unknown phonemes. Defaults to the first of `<sil>`,
    /// `sil`, `_`, `" "` in the vocabulary.
    #[serde(default)]
    #[builder(setter(into, strip_option), default)]
    pub placeholder_symbol: Option<String>,
}

impl EngineConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(speed) = self.speed {
            check_positive("speed", speed)?;
        }
        if let Some(length_scale) = self.length_scale {
            check_positive("length_scale", length_scale)?;
        }
        Ok(())
    }
}

fn check_positive(name: &str, value: f32) -> Result<(), String> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(format!("{name} must be a positive number, got {value}"))
    }
}

impl EngineConfig {
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Read and validate a JSON config file.
    pub fn from_json_file(path: &Path) -> Result<Self, EngineError> {
        let content = std::fs::read_to_string(path).map_err(|e| FormatError::io(path, e))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.model_path.as_os_str().is_empty() {
            return Err(EngineError::Config("model_path is required".to_string()));
        }
        if self.tokens_path.as_os_str().is_empty() {
            return Err(EngineError::Config("tokens_path is required".to_string()));
        }
        check_positive("speed", self.speed).map_err(EngineError::Config)?;
        check_positive("length_scale", self.length_scale).map_err(EngineError::Config)?;
        for (name, value) in [
            ("noise_scale", self.noise_scale),
            ("noise_scale_w", self.noise_scale_w),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(EngineError::Config(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// The default phonemizer this config asks for.
    ///
    /// espeak-ng when `data_dir` or `espeak_bin` is set, otherwise the
    /// model's own graphemes.
    pub fn default_phonemizer(&self, vocab: Arc<Vocabulary>) -> Box<dyn Phonemizer> {
        if self.data_dir.is_some() || self.espeak_bin.is_some() {
            Box::new(EspeakPhonemizer::new(EspeakConfig {
                bin_path: self.espeak_bin.clone(),
                data_path: self.data_dir.clone(),
                voice: self.voice.clone(),
            }))
        } else {
            log::info!("No espeak-ng data dir configured, using grapheme fallback");
            Box::new(GraphemePhonemizer::new(vocab))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::EngineConfig;
    use crate::error::EngineError;
    use crate::resolver::FrontendMode;
    use std::io::Write;
    use std::path::PathBuf;

    #[test]
    fn json_fills_in_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"model_path": "m.onnx", "tokens_path": "tokens.txt"}"#)
                .unwrap();
        assert_eq!(config.speaker_id, 0);
        assert_eq!(config.speed, 1.0);
        assert_eq!(config.voice, "ru");
        assert_eq!(config.frontend_mode, FrontendMode::Auto);
        assert_eq!(config.lexicon_path, None);
        assert_eq!(config.noise_scale, 0.667);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn json_without_model_path_is_rejected() {
        assert!(serde_json::from_str::<EngineConfig>(r#"{"tokens_path": "t.txt"}"#).is_err());
    }

    #[test]
    fn builder_matches_json_defaults() {
        let built = EngineConfig::builder()
            .model_path("m.onnx")
            .tokens_path("tokens.txt")
            .lexicon_path("lexicon.txt")
            .build()
            .unwrap();
        assert_eq!(built.lexicon_path, Some(PathBuf::from("lexicon.txt")));
        assert_eq!(built.length_scale, 1.0);
        assert_eq!(built.noise_scale_w, 0.8);
    }

    #[test]
    fn builder_rejects_non_positive_speed() {
        let result = EngineConfig::builder()
            .model_path("m.onnx")
            .tokens_path("tokens.txt")
            .speed(0.0)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn from_json_file_validates() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"model_path": "m.onnx", "tokens_path": "t.txt", "speed": -1.0, "frontend_mode": "phonemizer_only"}}"#
        )
        .unwrap();
        assert!(matches!(
            EngineConfig::from_json_file(file.path()),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn from_json_file_reads_all_options() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "model_path": "m.onnx",
                "tokens_path": "t.txt",
                "data_dir": "espeak-ng-data",
                "speaker_id": 3,
                "speed": 1.25,
                "sample_rate": 44100,
                "frontend_mode": "lexicon_only"
            }}"#
        )
        .unwrap();
        let config = EngineConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.speaker_id, 3);
        assert_eq!(config.speed, 1.25);
        assert_eq!(config.sample_rate, Some(44100));
        assert_eq!(config.frontend_mode, FrontendMode::LexiconOnly);
        assert_eq!(config.data_dir, Some(PathBuf::from("espeak-ng-data")));
    }
}
