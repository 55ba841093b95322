use thiserror::Error;
use uuid::Uuid;

use crate::types::Stage;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("embedding dimension mismatch: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },

    #[error("item {0} is missing fields required by this operation")]
    NotEnriched(Uuid),

    #[error("validation verdict could not be parsed: {0}")]
    ValidationParse(String),

    #[error("stage {stage} aborted: {source}")]
    StageAborted {
        stage: Stage,
        #[source]
        source: anyhow::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PipelineError {
    /// Wrap any stage-level failure so the run report can name the stage.
    pub fn aborted(stage: Stage, source: anyhow::Error) -> Self {
        Self::StageAborted { stage, source }
    }
}
