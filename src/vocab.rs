use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::error::FormatError;

/// The closed set of phoneme symbols a synthesis model accepts.
///
/// Symbols map to dense, 0-based, unique ids in both directions. A
/// vocabulary is immutable once loaded and is shared by every request
/// served by the same model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    symbols: Vec<String>,
    ids: HashMap<String, i64>,
}

impl Vocabulary {
    /// Load a vocabulary from disk.
    ///
    /// Files ending in `.json` are read as a Piper voice config
    /// (`phoneme_id_map`); anything else as a `tokens.txt` table.
    pub fn load(path: &Path) -> Result<Self, FormatError> {
        let content = std::fs::read_to_string(path).map_err(|e| FormatError::io(path, e))?;
        let vocab = if path.extension().and_then(|e| e.to_str()) == Some("json") {
            Self::parse_piper_config(&content)?
        } else {
            Self::parse_tokens(&content)?
        };
        log::info!("Loaded {} tokens from {}", vocab.len(), path.display());
        Ok(vocab)
    }

    /// Parse a `tokens.txt` table: one `"<symbol> <id>"` pair per line.
    ///
    /// A line holding only an id names the space symbol, whose own text is
    /// lost to whitespace splitting.
    pub fn parse_tokens(content: &str) -> Result<Self, FormatError> {
        let mut pairs = Vec::new();
        for (idx, raw) in content.lines().enumerate() {
            let line = idx + 1;
            let fields: Vec<&str> = raw.split_whitespace().collect();
            let (symbol, id) = match fields.as_slice() {
                [] => continue,
                [id] => (" ", *id),
                [symbol, id] => (*symbol, *id),
                _ => {
                    return Err(FormatError::Malformed {
                        line,
                        reason: format!("expected \"<symbol> <id>\", got {raw:?}"),
                    })
                }
            };
            let id: i64 = id.parse().map_err(|_| FormatError::Malformed {
                line,
                reason: format!("invalid token id {id:?}"),
            })?;
            pairs.push((symbol.to_string(), id));
        }
        Self::from_pairs(pairs)
    }

    /// Parse the `phoneme_id_map` of a Piper voice config.
    ///
    /// Each symbol maps to a list of ids; the first one is used.
    pub fn parse_piper_config(content: &str) -> Result<Self, FormatError> {
        let json: serde_json::Value = serde_json::from_str(content)
            .map_err(|e| FormatError::Json(format!("Failed to parse JSON: {e}")))?;

        let map = json
            .get("phoneme_id_map")
            .ok_or_else(|| FormatError::Json("Missing 'phoneme_id_map' field".to_string()))?
            .as_object()
            .ok_or_else(|| FormatError::Json("'phoneme_id_map' must be an object".to_string()))?;

        let mut pairs = Vec::with_capacity(map.len());
        for (symbol, ids) in map {
            let id = ids
                .as_array()
                .and_then(|ids| ids.first())
                .and_then(|id| id.as_i64())
                .ok_or_else(|| {
                    FormatError::Json(format!("No integer id for symbol {symbol:?}"))
                })?;
            pairs.push((symbol.clone(), id));
        }
        Self::from_pairs(pairs)
    }

    /// Build a vocabulary whose ids are the symbols' positions.
    pub fn from_symbols<I, S>(symbols: I) -> Result<Self, FormatError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_pairs(
            symbols
                .into_iter()
                .enumerate()
                .map(|(id, symbol)| (symbol.into(), id as i64)),
        )
    }

    /// Build a vocabulary from explicit `(symbol, id)` pairs.
    ///
    /// Rejects duplicate symbols, duplicate ids and gaps in the id range.
    pub fn from_pairs<I>(pairs: I) -> Result<Self, FormatError>
    where
        I: IntoIterator<Item = (String, i64)>,
    {
        let mut ids: HashMap<String, i64> = HashMap::new();
        let mut by_id: BTreeMap<i64, String> = BTreeMap::new();

        for (symbol, id) in pairs {
            if let Some(&first) = ids.get(&symbol) {
                return Err(FormatError::DuplicateSymbol {
                    symbol,
                    first,
                    second: id,
                });
            }
            if let Some(first) = by_id.get(&id) {
                return Err(FormatError::DuplicateId {
                    id,
                    first: first.clone(),
                    second: symbol,
                });
            }
            ids.insert(symbol.clone(), id);
            by_id.insert(id, symbol);
        }

        if by_id.is_empty() {
            return Err(FormatError::Empty);
        }

        let mut symbols = Vec::with_capacity(by_id.len());
        for (expected, (id, symbol)) in by_id.into_iter().enumerate() {
            let expected = expected as i64;
            if id != expected {
                return Err(FormatError::SparseIds {
                    expected,
                    found: id,
                });
            }
            symbols.push(symbol);
        }

        Ok(Self { symbols, ids })
    }

    /// Id of `symbol`, or `None` if the model does not know it.
    pub fn id_of(&self, symbol: &str) -> Option<i64> {
        self.ids.get(symbol).copied()
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.ids.contains_key(symbol)
    }

    pub fn symbol_of(&self, id: i64) -> Option<&str> {
        usize::try_from(id)
            .ok()
            .and_then(|idx| self.symbols.get(idx))
            .map(String::as_str)
    }

    /// First of `candidates` present in the vocabulary.
    pub fn first_of<'a>(&self, candidates: &[&'a str]) -> Option<&'a str> {
        candidates.iter().copied().find(|c| self.contains(c))
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Symbols in id order.
    pub fn iter(&self) -> impl Iterator<Item = (i64, &str)> {
        self.symbols
            .iter()
            .enumerate()
            .map(|(id, s)| (id as i64, s.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::Vocabulary;
    use crate::error::FormatError;
    use std::io::Write;

    #[test]
    fn parses_symbol_id_pairs() {
        let vocab = Vocabulary::parse_tokens("х 0\nэ 1\n\nл\t2\n").unwrap();
        assert_eq!(vocab.len(), 3);
        assert_eq!(vocab.id_of("л"), Some(2));
        assert_eq!(vocab.symbol_of(1), Some("э"));
        assert_eq!(vocab.id_of("ы"), None);
        assert_eq!(vocab.symbol_of(3), None);
        assert_eq!(vocab.symbol_of(-1), None);
    }

    #[test]
    fn bare_id_line_is_the_space_symbol() {
        let vocab = Vocabulary::parse_tokens("_ 0\n 1\na 2\n").unwrap();
        assert_eq!(vocab.id_of(" "), Some(1));
    }

    #[test]
    fn rejects_duplicate_symbols() {
        let err = Vocabulary::parse_tokens("a 0\nb 1\na 2\n").unwrap_err();
        assert!(matches!(
            err,
            FormatError::DuplicateSymbol { ref symbol, first: 0, second: 2 } if symbol == "a"
        ));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let err = Vocabulary::parse_tokens("a 0\nb 0\n").unwrap_err();
        assert!(matches!(err, FormatError::DuplicateId { id: 0, .. }));
    }

    #[test]
    fn rejects_gaps_in_id_range() {
        let err = Vocabulary::parse_tokens("a 0\nb 2\n").unwrap_err();
        assert!(matches!(
            err,
            FormatError::SparseIds {
                expected: 1,
                found: 2
            }
        ));
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(matches!(
            Vocabulary::parse_tokens("a 0\nb c 1\n").unwrap_err(),
            FormatError::Malformed { line: 2, .. }
        ));
        assert!(matches!(
            Vocabulary::parse_tokens("a zero\n").unwrap_err(),
            FormatError::Malformed { line: 1, .. }
        ));
        assert!(matches!(
            Vocabulary::parse_tokens("\n\n").unwrap_err(),
            FormatError::Empty
        ));
    }

    #[test]
    fn parses_piper_phoneme_id_map() {
        let json = r#"{
            "audio": {"sample_rate": 22050},
            "phoneme_id_map": {"_": [0], "^": [1], "$": [2], "a": [3, 7]}
        }"#;
        let vocab = Vocabulary::parse_piper_config(json).unwrap();
        assert_eq!(vocab.len(), 4);
        assert_eq!(vocab.id_of("a"), Some(3));
        assert_eq!(
            vocab.iter().map(|(_, s)| s).collect::<Vec<_>>(),
            vec!["_", "^", "$", "a"]
        );
    }

    #[test]
    fn piper_config_without_map_is_a_format_error() {
        let err = Vocabulary::parse_piper_config(r#"{"audio": {}}"#).unwrap_err();
        assert!(matches!(err, FormatError::Json(_)));
    }

    #[test]
    fn loads_tokens_file_from_disk() {
        let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        writeln!(file, "<sil> 0\nа 1\nб 2").unwrap();
        let vocab = Vocabulary::load(file.path()).unwrap();
        assert_eq!(vocab.id_of("б"), Some(2));
        assert_eq!(vocab.first_of(&["sil", "<sil>"]), Some("<sil>"));
    }

    #[test]
    fn missing_file_is_reported_as_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = Vocabulary::load(&dir.path().join("tokens.txt")).unwrap_err();
        assert!(matches!(err, FormatError::Missing(_)));
    }
}
