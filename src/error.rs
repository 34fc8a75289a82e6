use std::path::PathBuf;

/// Failure to load a token vocabulary or lexicon source.
///
/// Construction never partially succeeds: any `FormatError` aborts it.
#[derive(thiserror::Error, Debug)]
pub enum FormatError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Source not found: {0}")]
    Missing(PathBuf),
    #[error("Line {line}: {reason}")]
    Malformed { line: usize, reason: String },
    #[error("Duplicate symbol {symbol:?} (ids {first} and {second})")]
    DuplicateSymbol {
        symbol: String,
        first: i64,
        second: i64,
    },
    #[error("Duplicate id {id} (symbols {first:?} and {second:?})")]
    DuplicateId {
        id: i64,
        first: String,
        second: String,
    },
    #[error("Token ids are not dense: expected id {expected}, found {found}")]
    SparseIds { expected: i64, found: i64 },
    #[error("Vocabulary is empty")]
    Empty,
    #[error("Invalid voice config: {0}")]
    Json(String),
}

impl FormatError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            FormatError::Missing(path.to_path_buf())
        } else {
            FormatError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}

/// Failure of the default phonemizer for a single word.
///
/// Recovered by the resolver: the word contributes no audio.
#[derive(thiserror::Error, Debug)]
pub enum PhonemizerError {
    #[error(
        "espeak-ng not found. Install: Linux: `sudo apt-get install espeak-ng`, \
         macOS: `brew install espeak-ng`, Windows: https://espeak-ng.org/download"
    )]
    EspeakNotFound,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Phonemization failed: {0}")]
    Failed(String),
    #[error("No phonemes produced for {0:?}")]
    Empty(String),
}

/// Failure of one synthesis call. Shared state is never affected.
#[derive(thiserror::Error, Debug)]
pub enum SynthesisError {
    #[error("Speaker id {speaker_id} out of range (model has {num_speakers} speakers)")]
    InvalidSpeaker { speaker_id: u32, num_speakers: u32 },
    #[error("Speed must be a positive finite number, got {0}")]
    InvalidSpeed(f32),
    #[error("No phonemes to synthesize")]
    EmptyInput,
    #[error("Model rejected the request: {0}")]
    Model(String),
    #[error("Model produced no audio")]
    EmptyOutput,
}

/// Failure to construct an [`Engine`](crate::engine::Engine).
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error("Invalid config: {0}")]
    Config(String),
    #[error("Failed to load model: {0}")]
    ModelLoad(String),
}
