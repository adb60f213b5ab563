use thiserror::Error;

pub type PlannerResult<T> = std::result::Result<T, PlannerError>;

/// Every failure the planner can report, each with a stable machine code.
#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("LLM config has no api_key")]
    MissingApiKey,

    #[error("corpus contains no posts")]
    EmptyPosts,

    #[error("no eligible seed candidates in corpus")]
    SeedCandidatesEmpty,

    #[error("model returned invalid topic seeds: {0}")]
    InvalidTopicSeeds(String),

    #[error("only {available} unique topics left after avoidance, {required} required")]
    InsufficientUniqueTopics { required: usize, available: usize },

    #[error("model returned an invalid plan item: {0}")]
    InvalidPlanResponse(String),

    #[error("model returned an invalid draft: {0}")]
    InvalidDraftResponse(String),

    #[error("queue generation failed: {0}")]
    RagGenerationFailed(#[source] Box<PlannerError>),

    #[error("external provider failed: {0}")]
    Provider(String),

    #[error("corpus source {source_name} is malformed: {reason}")]
    CorpusSchema { source_name: String, reason: String },

    #[error("no queue has been generated yet")]
    NotFound,

    #[error("position {index} is out of range for a queue of {len} items")]
    OutOfRange { index: usize, len: usize },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("storage failure: {0}")]
    Storage(String),
}

impl PlannerError {
    pub fn code(&self) -> &'static str {
        match self {
            PlannerError::MissingApiKey => "missing_api_key",
            PlannerError::EmptyPosts => "empty_posts",
            PlannerError::SeedCandidatesEmpty => "seed_candidates_empty",
            PlannerError::InvalidTopicSeeds(_) => "invalid_topic_seeds",
            PlannerError::InsufficientUniqueTopics { .. } => {
                "insufficient_unique_topics_after_avoidance"
            }
            PlannerError::InvalidPlanResponse(_) => "invalid_plan_response",
            PlannerError::InvalidDraftResponse(_) => "invalid_draft_response",
            PlannerError::RagGenerationFailed(_) => "rag_generation_failed",
            PlannerError::Provider(_) => "provider_error",
            PlannerError::CorpusSchema { .. } => "corpus_schema_error",
            PlannerError::NotFound => "not_found",
            PlannerError::OutOfRange { .. } => "out_of_range",
            PlannerError::InvalidInput(_) => "invalid_input",
            PlannerError::Storage(_) => "storage_error",
        }
    }

    /// External-service failures a caller may retry; input and invariant errors are final.
    pub fn is_retryable(&self) -> bool {
        match self {
            PlannerError::Provider(_)
            | PlannerError::InvalidTopicSeeds(_)
            | PlannerError::InvalidPlanResponse(_)
            | PlannerError::InvalidDraftResponse(_) => true,
            PlannerError::RagGenerationFailed(inner) => inner.is_retryable(),
            _ => false,
        }
    }

    /// Wraps generation-stage failures; input and invariant errors pass through untouched.
    pub fn into_generation_failure(self) -> PlannerError {
        match self {
            e @ (PlannerError::EmptyPosts
            | PlannerError::MissingApiKey
            | PlannerError::InsufficientUniqueTopics { .. }
            | PlannerError::RagGenerationFailed(_)
            | PlannerError::InvalidInput(_)
            | PlannerError::Storage(_)) => e,
            other => PlannerError::RagGenerationFailed(Box::new(other)),
        }
    }
}

impl From<std::io::Error> for PlannerError {
    fn from(e: std::io::Error) -> Self {
        PlannerError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for PlannerError {
    fn from(e: serde_json::Error) -> Self {
        PlannerError::Storage(e.to_string())
    }
}
