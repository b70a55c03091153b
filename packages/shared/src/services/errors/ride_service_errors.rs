#[derive(Debug)]
pub enum RideServiceError {
    NotFound,
    NotOwner,
    ValidationError(String),
    RepositoryError(String),
}

impl RideServiceError {
    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            RideServiceError::NotFound => "not_found",
            RideServiceError::NotOwner => "forbidden",
            RideServiceError::ValidationError(_) => "validation",
            RideServiceError::RepositoryError(_) => "server_error",
        }
    }
}

impl std::fmt::Display for RideServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RideServiceError::NotFound => write!(f, "Ride not found"),
            RideServiceError::NotOwner => write!(f, "Only the ride owner may do this"),
            RideServiceError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            RideServiceError::RepositoryError(msg) => write!(f, "Repository error: {}", msg),
        }
    }
}

impl std::error::Error for RideServiceError {}
