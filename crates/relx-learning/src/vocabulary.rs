//! Feature-key vocabulary snapshot

use std::collections::HashMap;
use std::path::Path;

use relx_core::{RelxError, Result};

/// The ordered feature keys seen at training time
///
/// Column `i` of every feature matrix corresponds to `keys()[i]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    keys: Vec<String>,
    index: HashMap<String, usize>,
}

impl Vocabulary {
    /// Build a vocabulary; rejects empty snapshots and duplicate keys
    pub fn new(keys: Vec<String>) -> Result<Self> {
        if keys.is_empty() {
            return Err(RelxError::VocabularyMismatch(
                "vocabulary snapshot is empty".to_string(),
            ));
        }

        let mut index = HashMap::with_capacity(keys.len());
        for (i, key) in keys.iter().enumerate() {
            if index.insert(key.clone(), i).is_some() {
                return Err(RelxError::VocabularyMismatch(format!(
                    "duplicate feature key {key:?}"
                )));
            }
        }

        Ok(Self { keys, index })
    }

    /// Read a JSON array of keys
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let keys: Vec<String> = serde_json::from_str(&content).map_err(|e| {
            RelxError::VocabularyMismatch(format!(
                "{} is not a JSON array of strings: {e}",
                path.display()
            ))
        })?;
        Self::new(keys)
    }

    /// Write the keys as a JSON array
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(&self.keys)?)?;
        Ok(())
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Column of a key
    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.index.get(key).copied()
    }

    /// Check that `live` lists exactly these keys in this order
    pub fn verify(&self, live: &[String]) -> Result<()> {
        if live == self.keys.as_slice() {
            return Ok(());
        }

        let missing = self.keys.iter().filter(|k| !live.contains(k)).count();
        let extra = live.iter().filter(|k| !self.index.contains_key(*k)).count();
        Err(RelxError::VocabularyMismatch(format!(
            "live key table has {} keys ({missing} missing, {extra} unexpected), expected {}",
            live.len(),
            self.keys.len()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_index() {
        let vocab = Vocabulary::new(keys(&["a", "b", "c"])).unwrap();
        assert_eq!(vocab.len(), 3);
        assert_eq!(vocab.index_of("b"), Some(1));
        assert_eq!(vocab.index_of("z"), None);
    }

    #[test]
    fn test_rejects_empty_and_duplicates() {
        assert!(matches!(
            Vocabulary::new(Vec::new()),
            Err(RelxError::VocabularyMismatch(_))
        ));
        assert!(matches!(
            Vocabulary::new(keys(&["a", "a"])),
            Err(RelxError::VocabularyMismatch(_))
        ));
    }

    #[test]
    fn test_file_roundtrip_and_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feature_keys.json");

        let vocab = Vocabulary::new(keys(&["TXT_e0_LEMMA_obama", "STR_SAME_SENTENCE"])).unwrap();
        vocab.save(&path).unwrap();
        assert_eq!(Vocabulary::from_file(&path).unwrap(), vocab);

        std::fs::write(&path, r#"{"keys": 1}"#).unwrap();
        assert!(matches!(
            Vocabulary::from_file(&path),
            Err(RelxError::VocabularyMismatch(_))
        ));
    }

    #[test]
    fn test_verify() {
        let vocab = Vocabulary::new(keys(&["a", "b"])).unwrap();
        assert!(vocab.verify(&keys(&["a", "b"])).is_ok());

        let err = vocab.verify(&keys(&["a", "c"])).unwrap_err();
        assert!(err.to_string().contains("1 missing, 1 unexpected"));
        assert!(vocab.verify(&keys(&["b", "a"])).is_err());
    }
}
