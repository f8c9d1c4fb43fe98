//! Model checkpoints
//!
//! A checkpoint is a JSON document:
//!
//! ```json
//! {
//!   "config": { "input_dim": 3 },
//!   "cardinality": 2,
//!   "state": { "weight": [[0.1, -0.1], [0.0, 0.2], [0.3, 0.0]], "bias": [0.0, 0.0] }
//! }
//! ```
//!
//! `weight` has one row per feature and one column per class.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use relx_core::{RelxError, Result};

/// Architecture settings recorded at training time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSettings {
    /// Number of input features
    pub input_dim: usize,

    /// Training hyper-parameters, carried through untouched
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ModelSettings {
    pub fn new(input_dim: usize) -> Self {
        Self {
            input_dim,
            extra: BTreeMap::new(),
        }
    }
}

/// Trained parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelState {
    pub weight: Vec<Vec<f32>>,
    pub bias: Vec<f32>,
}

/// A persisted model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub config: ModelSettings,
    pub cardinality: usize,
    pub state: ModelState,
}

impl Checkpoint {
    /// Read a checkpoint file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            RelxError::CheckpointMismatch(format!("{} is not a checkpoint: {e}", path.display()))
        })
    }

    /// Write the checkpoint as JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_extra_settings() {
        let json = r#"{
            "config": {"input_dim": 2, "lr": 0.001, "n_epochs": 50},
            "cardinality": 2,
            "state": {"weight": [[1.0, 0.0], [0.0, 1.0]], "bias": [0.0, 0.5]}
        }"#;
        let checkpoint: Checkpoint = serde_json::from_str(json).unwrap();

        assert_eq!(checkpoint.config.input_dim, 2);
        assert_eq!(checkpoint.config.extra["n_epochs"], 50);
        assert_eq!(checkpoint.state.bias, vec![0.0, 0.5]);
    }

    #[test]
    fn test_load_and_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("best_model.json");
        let checkpoint = Checkpoint {
            config: ModelSettings::new(1),
            cardinality: 2,
            state: ModelState {
                weight: vec![vec![0.5, -0.5]],
                bias: vec![0.0, 0.0],
            },
        };

        checkpoint.save(&path).unwrap();
        assert_eq!(Checkpoint::load(&path).unwrap(), checkpoint);

        std::fs::write(&path, "{}").unwrap();
        assert!(matches!(
            Checkpoint::load(&path),
            Err(RelxError::CheckpointMismatch(_))
        ));
    }
}
