//! RELX Pipeline - Prediction facade
//!
//! Wires the parser, extractors, featurizer and model into one batch
//! prediction call. Each invocation walks a fixed stage sequence; see
//! [`Stage`].
//!
//! Author: hephaex@gmail.com

pub mod facade;
pub mod stage;

pub use facade::{Prediction, PredictionFacade};
pub use stage::{Stage, StageMachine};
