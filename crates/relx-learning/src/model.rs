//! Logistic regression
//!
//! Loading is two-phase: [`LogisticRegression::from_meta`] builds the
//! architecture from checkpoint metadata, then
//! [`LogisticRegression::load_weights`] fills in parameters and fails fast
//! on any shape mismatch.

use std::path::Path;

use ndarray::{Array1, Array2, Axis};
use tracing::info;

use relx_core::{Candidate, Label, RelxError, Result};

use crate::checkpoint::{Checkpoint, ModelSettings, ModelState};
use crate::featurizer::FeatureMatrix;

/// Only binary models are supported
const CARDINALITY: usize = 2;

#[derive(Debug, Clone)]
pub struct LogisticRegression {
    settings: ModelSettings,
    cardinality: usize,
    weight: Array2<f32>,
    bias: Array1<f32>,
    loaded: bool,
}

impl LogisticRegression {
    /// Build the architecture for `n_features` inputs
    pub fn from_meta(settings: ModelSettings, cardinality: usize, n_features: usize) -> Result<Self> {
        if cardinality != CARDINALITY {
            return Err(RelxError::CheckpointMismatch(format!(
                "cardinality {cardinality} is not supported, expected {CARDINALITY}"
            )));
        }
        if settings.input_dim != n_features {
            return Err(RelxError::CheckpointMismatch(format!(
                "checkpoint expects {} features, vocabulary has {n_features}",
                settings.input_dim
            )));
        }

        Ok(Self {
            settings,
            cardinality,
            weight: Array2::zeros((n_features, cardinality)),
            bias: Array1::zeros(cardinality),
            loaded: false,
        })
    }

    /// Fill in trained parameters
    pub fn load_weights(&mut self, state: &ModelState) -> Result<()> {
        let (rows, cols) = self.weight.dim();
        if state.weight.len() != rows {
            return Err(RelxError::CheckpointMismatch(format!(
                "weight has {} rows, expected {rows}",
                state.weight.len()
            )));
        }
        if let Some((i, row)) = state.weight.iter().enumerate().find(|(_, r)| r.len() != cols) {
            return Err(RelxError::CheckpointMismatch(format!(
                "weight row {i} has {} columns, expected {cols}",
                row.len()
            )));
        }
        if state.bias.len() != cols {
            return Err(RelxError::CheckpointMismatch(format!(
                "bias has {} entries, expected {cols}",
                state.bias.len()
            )));
        }

        let flat: Vec<f32> = state.weight.iter().flatten().copied().collect();
        self.weight = Array2::from_shape_vec((rows, cols), flat)
            .map_err(|e| RelxError::CheckpointMismatch(e.to_string()))?;
        self.bias = Array1::from_vec(state.bias.clone());
        self.loaded = true;
        Ok(())
    }

    /// Both loading phases from a checkpoint file
    pub fn load(path: impl AsRef<Path>, n_features: usize) -> Result<Self> {
        let path = path.as_ref();
        let checkpoint = Checkpoint::load(path)?;
        let mut model = Self::from_meta(checkpoint.config, checkpoint.cardinality, n_features)?;
        model.load_weights(&checkpoint.state)?;

        info!(
            checkpoint = %path.display(),
            features = n_features,
            cardinality = model.cardinality,
            "Loaded model"
        );
        Ok(model)
    }

    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }

    pub fn n_features(&self) -> usize {
        self.weight.nrows()
    }

    pub fn cardinality(&self) -> usize {
        self.cardinality
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Class probabilities, one row per input row
    ///
    /// Column `k` is the probability of label `k + 1`.
    pub fn predict_proba(&self, features: &FeatureMatrix) -> Result<Array2<f32>> {
        if !self.loaded {
            return Err(RelxError::CheckpointMismatch(
                "model weights have not been loaded".to_string(),
            ));
        }
        if features.ncols() != self.n_features() {
            return Err(RelxError::CheckpointMismatch(format!(
                "feature matrix has {} columns, model expects {}",
                features.ncols(),
                self.n_features()
            )));
        }

        let mut logits = features.dot(&self.weight) + &self.bias;
        for mut row in logits.axis_iter_mut(Axis(0)) {
            let max = row.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
            row.mapv_inplace(|v| (v - max).exp());
            let sum = row.sum();
            row.mapv_inplace(|v| v / sum);
        }
        Ok(logits)
    }

    /// Label each candidate
    ///
    /// A candidate gets `positive_label` when its probability for that label
    /// is at least `threshold`, and the other non-abstain label otherwise.
    pub fn predict(
        &self,
        candidates: &[Candidate],
        features: &FeatureMatrix,
        threshold: f32,
        positive_label: Label,
    ) -> Result<Vec<Label>> {
        if features.nrows() != candidates.len() {
            return Err(RelxError::CheckpointMismatch(format!(
                "feature matrix has {} rows for {} candidates",
                features.nrows(),
                candidates.len()
            )));
        }
        if positive_label == Label::Abstain {
            return Err(RelxError::ConfigError(
                "positive label cannot be ABSTAIN".to_string(),
            ));
        }

        let proba = self.predict_proba(features)?;
        let column = positive_label.as_u8() as usize - 1;

        Ok(proba
            .column(column)
            .iter()
            .map(|&p| {
                if p >= threshold {
                    positive_label
                } else {
                    positive_label.opposite()
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use relx_core::{Mention, Span};

    fn candidates(n: usize) -> Vec<Candidate> {
        (0..n)
            .map(|i| {
                let span = Span {
                    sentence: i,
                    word_start: 0,
                    word_end: 1,
                    char_start: 0,
                    char_end: 1,
                    text: "x".to_string(),
                };
                Candidate::new("R", 2, vec![Mention::new("M", "doc", span)]).unwrap()
            })
            .collect()
    }

    fn model(weight: Vec<Vec<f32>>, bias: Vec<f32>) -> LogisticRegression {
        let mut model =
            LogisticRegression::from_meta(ModelSettings::new(weight.len()), 2, weight.len())
                .unwrap();
        model.load_weights(&ModelState { weight, bias }).unwrap();
        model
    }

    #[test]
    fn test_from_meta_rejects_incompatible_metadata() {
        let err = LogisticRegression::from_meta(ModelSettings::new(3), 3, 3).unwrap_err();
        assert!(matches!(err, RelxError::CheckpointMismatch(_)));

        let err = LogisticRegression::from_meta(ModelSettings::new(3), 2, 4).unwrap_err();
        assert!(err.to_string().contains("expects 3 features"));
    }

    #[test]
    fn test_load_weights_fails_fast_on_shape() {
        let mut lr = LogisticRegression::from_meta(ModelSettings::new(2), 2, 2).unwrap();

        let short = ModelState {
            weight: vec![vec![0.0, 0.0]],
            bias: vec![0.0, 0.0],
        };
        assert!(lr.load_weights(&short).is_err());

        let ragged = ModelState {
            weight: vec![vec![0.0, 0.0], vec![0.0]],
            bias: vec![0.0, 0.0],
        };
        assert!(lr.load_weights(&ragged).is_err());

        let bad_bias = ModelState {
            weight: vec![vec![0.0, 0.0], vec![0.0, 0.0]],
            bias: vec![0.0],
        };
        assert!(lr.load_weights(&bad_bias).is_err());
        assert!(!lr.is_loaded());
    }

    #[test]
    fn test_predict_proba_rows_sum_to_one() {
        let lr = model(vec![vec![0.0, 2.0], vec![1.0, 0.0]], vec![0.0, 0.0]);
        let proba = lr.predict_proba(&array![[1.0, 0.0], [0.0, 1.0], [0.0, 0.0]]).unwrap();

        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-6);
        }
        assert!(proba[[0, 1]] > 0.8);
        assert!(proba[[1, 0]] > 0.7);
        assert!((proba[[2, 1]] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_threshold_rule() {
        let lr = model(vec![vec![0.0, 2.0]], vec![0.0, 0.0]);
        let features = array![[1.0], [0.0]];

        // Row count must match the candidate list
        assert!(lr.predict(&candidates(1), &features, 0.6, Label::True).is_err());

        let dummy = candidates(2);
        let labels = lr.predict(&dummy, &features, 0.6, Label::True).unwrap();
        assert_eq!(labels, vec![Label::True, Label::False]);

        // P(TRUE) = 0.5 on the zero row, which meets a 0.5 threshold
        let labels = lr.predict(&dummy, &features, 0.5, Label::True).unwrap();
        assert_eq!(labels, vec![Label::True, Label::True]);

        // With FALSE as the positive label neither row reaches 0.6
        let labels = lr.predict(&dummy, &features, 0.6, Label::False).unwrap();
        assert_eq!(labels, vec![Label::True, Label::True]);
    }

    #[test]
    fn test_width_mismatch() {
        let lr = model(vec![vec![0.0, 1.0]], vec![0.0, 0.0]);
        let err = lr.predict_proba(&array![[1.0, 1.0]]).unwrap_err();
        assert!(matches!(err, RelxError::CheckpointMismatch(_)));
    }

    #[test]
    fn test_unloaded_model() {
        let lr = LogisticRegression::from_meta(ModelSettings::new(1), 2, 1).unwrap();
        assert!(lr.predict_proba(&array![[1.0]]).is_err());
    }
}
