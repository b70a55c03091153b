#[derive(Debug)]
pub enum RepositoryError {
    /// Row missing or filtered out by the soft-delete flag.
    NotFound,
    /// A uniqueness constraint refused the write.
    Duplicate,
    Database(String),
}

impl std::fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RepositoryError::NotFound => write!(f, "Row not found"),
            RepositoryError::Duplicate => write!(f, "Uniqueness constraint violated"),
            RepositoryError::Database(msg) => write!(f, "Database error: {}", msg),
        }
    }
}

impl std::error::Error for RepositoryError {}
