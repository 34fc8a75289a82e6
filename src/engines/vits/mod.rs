//! VITS acoustic model running on ONNX Runtime.
//!
//! Works with the single-file ONNX exports used by Piper, Coqui and
//! sherpa-onnx. The model reads a phoneme id sequence and returns a mono f32
//! waveform at the sample rate stored in its metadata.
//!
//! # Model Files
//!
//! ```text
//! models/ru/
//! ├── model.onnx      # VITS graph with `sample_rate` / `n_speakers` metadata
//! └── tokens.txt      # "<symbol> <id>" per line
//! ```
//!
//! # Input Layouts
//!
//! | Export | Inputs |
//! |---|---|
//! | Piper, Coqui (`comment` metadata) | `input`, `input_lengths`, `scales[3]`, optional `sid` |
//! | sherpa-onnx / icefall | `x`, `x_length`, `noise_scale`, `length_scale`, `noise_scale_w`, optional `sid` |
//!
//! # Examples
//!
//! ```rust,no_run
//! use lexicon_tts::engines::vits::{VitsModel, VitsParams};
//! use lexicon_tts::Engine;
//! use std::path::Path;
//!
//! let model = VitsModel::load(Path::new("models/ru/model.onnx"), VitsParams::default())?;
//! let engine = Engine::from_sources(
//!     Path::new("models/ru/tokens.txt"),
//!     Some(Path::new("lexicons/loanwords.txt")),
//!     Box::new(model),
//! )?;
//! let audio = engine.synthesize("Привет", 0, 1.0)?;
//! println!("{} samples at {}Hz", audio.samples.len(), audio.sample_rate);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod model;

pub use model::{VitsError, VitsModel, VitsParams};
