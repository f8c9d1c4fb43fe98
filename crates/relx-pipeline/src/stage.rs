//! Invocation stages

use std::fmt;

use relx_core::{RelxError, Result};

/// Stages of one prediction invocation, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Init,
    Parse,
    ExtractMentions,
    ExtractCandidates,
    Featurize,
    Score,
    Deduplicate,
    Done,
}

impl Stage {
    /// The stage that must follow this one
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Init => Some(Self::Parse),
            Self::Parse => Some(Self::ExtractMentions),
            Self::ExtractMentions => Some(Self::ExtractCandidates),
            Self::ExtractCandidates => Some(Self::Featurize),
            Self::Featurize => Some(Self::Score),
            Self::Score => Some(Self::Deduplicate),
            Self::Deduplicate => Some(Self::Done),
            Self::Done => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::Parse => "PARSE",
            Self::ExtractMentions => "EXTRACT_MENTIONS",
            Self::ExtractCandidates => "EXTRACT_CANDIDATES",
            Self::Featurize => "FEATURIZE",
            Self::Score => "SCORE",
            Self::Deduplicate => "DEDUPLICATE",
            Self::Done => "DONE",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tracks the current stage of one invocation
#[derive(Debug, Clone)]
pub struct StageMachine {
    current: Stage,
}

impl StageMachine {
    pub fn new() -> Self {
        Self {
            current: Stage::Init,
        }
    }

    pub fn current(&self) -> Stage {
        self.current
    }

    pub fn is_done(&self) -> bool {
        self.current == Stage::Done
    }

    /// Move to `stage`, which must be the successor of the current stage
    pub fn enter(&mut self, stage: Stage) -> Result<()> {
        match self.current.next() {
            Some(expected) if expected == stage => {
                self.current = stage;
                Ok(())
            }
            expected => Err(RelxError::StageOrderViolation {
                expected: expected.map_or("nothing", |s| s.as_str()).to_string(),
                found: stage.to_string(),
            }),
        }
    }
}

impl Default for StageMachine {
    fn default() -> Self {
        Self::new()
    }
}
