use buffer_pool::api::BpmError;

/// Errors raised while building or scanning a relation.
#[derive(Debug)]
pub enum RelationError {
    /// The scan has consumed every record; caught locally by bulk build
    /// and translated into normal completion, never surfaced past it.
    EndOfRelation,
    /// A failure from the underlying buffer pool manager.
    Bpm(BpmError),
}

impl From<BpmError> for RelationError {
    fn from(err: BpmError) -> Self {
        RelationError::Bpm(err)
    }
}

impl std::fmt::Display for RelationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelationError::EndOfRelation => write!(f, "end of relation"),
            RelationError::Bpm(err) => write!(f, "relation I/O error: {err}"),
        }
    }
}

impl std::error::Error for RelationError {}
