//! RELX Learning - Featurization and scoring
//!
//! - `features`: the feature library (textual, structural, tabular)
//! - `vocabulary`: the training-time feature-key snapshot
//! - `featurizer`: sparse per-candidate features and dense feature matrices
//! - `checkpoint` / `model`: two-phase loading and logistic regression scoring

pub mod checkpoint;
pub mod features;
pub mod featurizer;
pub mod model;
pub mod vocabulary;

pub use checkpoint::{Checkpoint, ModelSettings, ModelState};
pub use features::FeatureLibrary;
pub use featurizer::{FeatureMatrix, Featurizer};
pub use model::LogisticRegression;
pub use vocabulary::Vocabulary;
