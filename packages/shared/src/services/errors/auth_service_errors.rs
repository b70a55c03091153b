#[derive(Debug)]
pub enum AuthServiceError {
    InvalidToken,
    ExpiredToken,
    TokenCreation(String),
}

impl std::fmt::Display for AuthServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthServiceError::InvalidToken => write!(f, "Invalid token"),
            AuthServiceError::ExpiredToken => write!(f, "Expired token"),
            AuthServiceError::TokenCreation(msg) => write!(f, "Token creation error: {}", msg),
        }
    }
}

impl std::error::Error for AuthServiceError {}
