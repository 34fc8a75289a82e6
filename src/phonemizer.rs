//! Default phonemizers: the fallback for words the lexicon does not cover.

use std::borrow::Cow;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;

use crate::error::PhonemizerError;
use crate::vocab::Vocabulary;

/// Converts a word into phoneme symbols using a language's default rules.
///
/// Implementations may emit symbols the target model does not know; the
/// synthesis adapter validates them again.
pub trait Phonemizer: Send + Sync {
    fn phonemize(&self, word: &str) -> Result<Vec<String>, PhonemizerError>;

    /// Phonemize several words at once, one result per word, in order.
    ///
    /// The default calls [`phonemize`](Phonemizer::phonemize) per word.
    fn phonemize_batch(&self, words: &[&str]) -> Vec<Result<Vec<String>, PhonemizerError>> {
        words.iter().map(|word| self.phonemize(word)).collect()
    }
}

impl<F> Phonemizer for F
where
    F: Fn(&str) -> Result<Vec<String>, PhonemizerError> + Send + Sync,
{
    fn phonemize(&self, word: &str) -> Result<Vec<String>, PhonemizerError> {
        self(word)
    }
}

/// Location and voice of the espeak-ng installation.
#[derive(Debug, Clone)]
pub struct EspeakConfig {
    /// espeak-ng binary. `None` runs `espeak-ng` from PATH.
    pub bin_path: Option<PathBuf>,
    /// `espeak-ng-data` directory. `None` uses the binary's built-in path.
    pub data_path: Option<PathBuf>,
    /// espeak-ng voice, e.g. `"ru"` or `"en-us"`.
    pub voice: String,
}

impl Default for EspeakConfig {
    fn default() -> Self {
        Self {
            bin_path: None,
            data_path: None,
            voice: "ru".to_string(),
        }
    }
}

/// Phonemizer backed by the `espeak-ng` command line tool.
///
/// The IPA output is split into one symbol per code point, which matches
/// the token tables of Piper-style VITS models.
#[derive(Debug, Clone, Default)]
pub struct EspeakPhonemizer {
    config: EspeakConfig,
}

impl EspeakPhonemizer {
    pub fn new(config: EspeakConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EspeakConfig {
        &self.config
    }
}

impl Phonemizer for EspeakPhonemizer {
    fn phonemize(&self, word: &str) -> Result<Vec<String>, PhonemizerError> {
        let output = run_espeak(&self.config, word)?;
        line_to_symbols(word, &output)
    }

    /// One espeak-ng process for all words, one input line per word.
    fn phonemize_batch(&self, words: &[&str]) -> Vec<Result<Vec<String>, PhonemizerError>> {
        if words.is_empty() {
            return Vec::new();
        }

        let output = match run_espeak(&self.config, &words.join("\n")) {
            Ok(output) => output,
            Err(PhonemizerError::EspeakNotFound) => {
                return words
                    .iter()
                    .map(|_| Err(PhonemizerError::EspeakNotFound))
                    .collect();
            }
            Err(e) => {
                log::warn!("Batched espeak-ng call failed ({e}), retrying per word");
                return words.iter().map(|word| self.phonemize(word)).collect();
            }
        };
        let lines: Vec<&str> = output.lines().collect();

        // espeak-ng should emit one line per input line for stdin mode.
        // If this assumption breaks, fall back to per-word invocation.
        if lines.len() != words.len() {
            log::debug!(
                "espeak-ng returned {} lines for {} words, retrying per word",
                lines.len(),
                words.len()
            );
            return words.iter().map(|word| self.phonemize(word)).collect();
        }

        words
            .iter()
            .zip(lines)
            .map(|(word, line)| line_to_symbols(word, line))
            .collect()
    }
}

fn line_to_symbols(word: &str, ipa: &str) -> Result<Vec<String>, PhonemizerError> {
    let symbols = ipa_to_symbols(ipa);
    if symbols.is_empty() {
        return Err(PhonemizerError::Empty(word.to_string()));
    }
    Ok(symbols)
}

fn run_espeak(config: &EspeakConfig, input: &str) -> Result<String, PhonemizerError> {
    let bin: &Path = config
        .bin_path
        .as_deref()
        .unwrap_or_else(|| Path::new("espeak-ng"));

    let mut command = Command::new(bin);
    command.args(["--ipa", "--stdin", "-q", "-v", config.voice.as_str()]);
    if let Some(data) = &config.data_path {
        // --path names the directory that contains espeak-ng-data.
        let home = match data.file_name().and_then(|n| n.to_str()) {
            Some("espeak-ng-data") => data.parent().unwrap_or(data.as_path()),
            _ => data.as_path(),
        };
        command.arg("--path").arg(home);
    }

    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PhonemizerError::EspeakNotFound
            } else {
                PhonemizerError::Io(e)
            }
        })?;

    if let Some(mut stdin) = child.stdin.take() {
        // espeak-ng under-processes a final line with no terminator.
        let stdin_payload = canonicalize_espeak_stdin_payload(input);
        if let Err(e) = stdin.write_all(stdin_payload.as_bytes()) {
            drop(stdin);
            // Reap the child before reporting the write failure.
            let _ = child.wait();
            return Err(PhonemizerError::Io(e));
        }
    }

    let output = child.wait_with_output()?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(PhonemizerError::Failed(format!(
            "espeak-ng exited with code {:?}: {stderr}",
            output.status.code()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn canonicalize_espeak_stdin_payload(input: &str) -> Cow<'_, str> {
    if input.ends_with('\n') {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(format!("{input}\n"))
    }
}

fn ipa_to_symbols(ipa: &str) -> Vec<String> {
    ipa.chars()
        .filter(|&ch| ch != '_' && !ch.is_whitespace())
        .map(String::from)
        .collect()
}

/// Spells a word with the vocabulary's own symbols.
///
/// Used for models whose tokens are graphemes (or for words already written
/// in the model's phoneme alphabet): the whole word if it is a symbol,
/// otherwise each character that is one.
#[derive(Debug, Clone)]
pub struct GraphemePhonemizer {
    vocab: Arc<Vocabulary>,
}

impl GraphemePhonemizer {
    pub fn new(vocab: Arc<Vocabulary>) -> Self {
        Self { vocab }
    }
}

impl Phonemizer for GraphemePhonemizer {
    fn phonemize(&self, word: &str) -> Result<Vec<String>, PhonemizerError> {
        if self.vocab.contains(word) {
            return Ok(vec![word.to_string()]);
        }
        let lower = word.to_lowercase();
        if self.vocab.contains(&lower) {
            return Ok(vec![lower]);
        }

        let symbols: Vec<String> = lower
            .chars()
            .map(String::from)
            .filter(|s| self.vocab.contains(s))
            .collect();
        if symbols.is_empty() {
            return Err(PhonemizerError::Empty(word.to_string()));
        }
        Ok(symbols)
    }
}

#[cfg(test)]
mod tests {
    use super::{
        canonicalize_espeak_stdin_payload, ipa_to_symbols, run_espeak, EspeakConfig,
        EspeakPhonemizer, GraphemePhonemizer, Phonemizer,
    };
    use crate::error::PhonemizerError;
    use crate::vocab::Vocabulary;
    use std::path::PathBuf;
    use std::process::Command;
    use std::sync::Arc;

    fn espeak_available() -> bool {
        Command::new("espeak-ng").arg("--version").output().is_ok()
    }

    #[test]
    fn splits_ipa_into_code_points() {
        assert_eq!(
            ipa_to_symbols("prʲɪˈvʲet_mʲir\n"),
            vec!["p", "r", "ʲ", "ɪ", "ˈ", "v", "ʲ", "e", "t", "m", "ʲ", "i", "r"]
        );
    }

    #[test]
    fn appends_trailing_newline_for_espeak_stdin() {
        assert_eq!(canonicalize_espeak_stdin_payload("America"), "America\n");
    }

    #[test]
    fn keeps_single_trailing_newline_for_espeak_stdin() {
        assert_eq!(canonicalize_espeak_stdin_payload("America\n"), "America\n");
    }

    #[test]
    fn missing_binary_is_reported() {
        let phonemizer = EspeakPhonemizer::new(EspeakConfig {
            bin_path: Some(PathBuf::from("/nonexistent/espeak-ng")),
            ..Default::default()
        });
        assert!(matches!(
            phonemizer.phonemize("привет"),
            Err(PhonemizerError::EspeakNotFound)
        ));
    }

    #[test]
    fn espeak_output_is_stable_with_or_without_trailing_newline() {
        // Skip when espeak-ng is unavailable in the execution environment.
        if !espeak_available() {
            return;
        }

        let config = EspeakConfig {
            voice: "en-us".to_string(),
            ..Default::default()
        };
        let without_newline = run_espeak(&config, "America").expect("espeak should succeed");
        let with_newline = run_espeak(&config, "America\n").expect("espeak should succeed");
        assert_eq!(without_newline.trim(), with_newline.trim());
    }

    #[test]
    fn espeak_phonemizes_a_word() {
        if !espeak_available() {
            return;
        }

        let phonemizer = EspeakPhonemizer::new(EspeakConfig {
            voice: "en-us".to_string(),
            ..Default::default()
        });
        let symbols = phonemizer.phonemize("me").expect("phonemize should succeed");
        assert_eq!(symbols.first().map(String::as_str), Some("m"));
    }

    #[test]
    fn batched_and_per_word_espeak_output_match() {
        if !espeak_available() {
            return;
        }

        let phonemizer = EspeakPhonemizer::new(EspeakConfig {
            voice: "en-us".to_string(),
            ..Default::default()
        });
        let words = ["Tokyo", "Kyoto", "me"];
        let batched: Vec<Vec<String>> = phonemizer
            .phonemize_batch(&words)
            .into_iter()
            .map(|r| r.expect("batched phonemize should succeed"))
            .collect();
        let per_word: Vec<Vec<String>> = words
            .iter()
            .map(|w| phonemizer.phonemize(w).expect("phonemize should succeed"))
            .collect();
        assert_eq!(batched, per_word);
    }

    #[test]
    fn missing_binary_fails_every_word_of_a_batch() {
        let phonemizer = EspeakPhonemizer::new(EspeakConfig {
            bin_path: Some(PathBuf::from("/nonexistent/espeak-ng")),
            ..Default::default()
        });
        let results = phonemizer.phonemize_batch(&["один", "два"]);
        assert_eq!(results.len(), 2);
        assert!(results
            .iter()
            .all(|r| matches!(r, Err(PhonemizerError::EspeakNotFound))));
        assert!(phonemizer.phonemize_batch(&[]).is_empty());
    }

    #[test]
    fn default_batch_keeps_per_word_failures() {
        let picky = |word: &str| -> Result<Vec<String>, PhonemizerError> {
            if word == "bad" {
                Err(PhonemizerError::Failed("no".to_string()))
            } else {
                Ok(vec![word.to_string()])
            }
        };
        let results = picky.phonemize_batch(&["ok", "bad", "fine"]);
        assert_eq!(results[0].as_ref().unwrap(), &vec!["ok".to_string()]);
        assert!(results[1].is_err());
        assert_eq!(results[2].as_ref().unwrap(), &vec!["fine".to_string()]);
    }

    #[cfg(unix)]
    #[test]
    fn write_failure_reaps_the_child_and_reports_io() {
        let bin = PathBuf::from("/bin/true");
        if !bin.exists() {
            return;
        }

        // `true` never reads stdin, so a payload larger than the pipe buffer
        // cannot be written.
        let config = EspeakConfig {
            bin_path: Some(bin),
            ..Default::default()
        };
        let payload = "а".repeat(1 << 20);
        assert!(matches!(
            run_espeak(&config, &payload),
            Err(PhonemizerError::Io(_))
        ));
    }

    #[test]
    fn grapheme_phonemizer_prefers_whole_word_symbols() {
        let vocab = Arc::new(Vocabulary::from_symbols(["_", "ts", "a", "b"]).unwrap());
        let phonemizer = GraphemePhonemizer::new(vocab);
        assert_eq!(phonemizer.phonemize("TS").unwrap(), vec!["ts"]);
        assert_eq!(phonemizer.phonemize("Abc").unwrap(), vec!["a", "b"]);
        assert!(matches!(
            phonemizer.phonemize("xyz"),
            Err(PhonemizerError::Empty(_))
        ));
    }

    #[test]
    fn closures_are_phonemizers() {
        let stub = |_: &str| -> Result<Vec<String>, PhonemizerError> {
            Ok(vec!["s1".to_string(), "s2".to_string()])
        };
        assert_eq!(stub.phonemize("anything").unwrap(), vec!["s1", "s2"]);
    }
}
