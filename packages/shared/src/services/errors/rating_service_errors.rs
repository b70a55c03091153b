#[derive(Debug, PartialEq, Eq)]
pub enum RatingServiceError {
    RideNotFound,
    MatchNotFound,
    NotParticipant,
    NotCompleted,
    AlreadyRated,
    ValidationError(String),
    RepositoryError(String),
}

impl RatingServiceError {
    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            RatingServiceError::RideNotFound | RatingServiceError::MatchNotFound => "not_found",
            RatingServiceError::NotParticipant => "forbidden",
            RatingServiceError::NotCompleted => "not_completed",
            RatingServiceError::AlreadyRated => "already_rated",
            RatingServiceError::ValidationError(_) => "validation",
            RatingServiceError::RepositoryError(_) => "server_error",
        }
    }
}

impl std::fmt::Display for RatingServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RatingServiceError::RideNotFound => write!(f, "Ride not found"),
            RatingServiceError::MatchNotFound => write!(f, "Match not found"),
            RatingServiceError::NotParticipant => {
                write!(f, "Only a match participant may rate")
            }
            RatingServiceError::NotCompleted => write!(f, "Match is not completed"),
            RatingServiceError::AlreadyRated => write!(f, "Match already rated by this user"),
            RatingServiceError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            RatingServiceError::RepositoryError(msg) => write!(f, "Repository error: {}", msg),
        }
    }
}

impl std::error::Error for RatingServiceError {}
