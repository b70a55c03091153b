#[derive(Debug, PartialEq, Eq)]
pub enum MatchWorkflowError {
    RideNotFound,
    MatchNotFound,
    /// The responder tried to match their own ride.
    OwnRide,
    NotRideOwner,
    NotParticipant,
    RideNotOpen,
    MatchNotPending,
    /// The ride already carries a final-positive match.
    AlreadyFinal,
    /// A live match for the same (driver, passenger) pair exists.
    AlreadyRequested,
    IllegalTransition,
    NoActiveMatch,
    /// The match is in no state that permits completion.
    BadState,
    RepositoryError(String),
}

impl MatchWorkflowError {
    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            MatchWorkflowError::RideNotFound | MatchWorkflowError::MatchNotFound => "not_found",
            MatchWorkflowError::OwnRide => "own_ride",
            MatchWorkflowError::NotRideOwner | MatchWorkflowError::NotParticipant => "forbidden",
            MatchWorkflowError::RideNotOpen => "not_open",
            MatchWorkflowError::MatchNotPending => "not_pending",
            MatchWorkflowError::AlreadyFinal => "already_final",
            MatchWorkflowError::AlreadyRequested => "already_requested",
            MatchWorkflowError::IllegalTransition => "illegal_transition",
            MatchWorkflowError::NoActiveMatch => "no_active_match",
            MatchWorkflowError::BadState => "bad_state",
            MatchWorkflowError::RepositoryError(_) => "server_error",
        }
    }
}

impl std::fmt::Display for MatchWorkflowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchWorkflowError::RideNotFound => write!(f, "Ride not found"),
            MatchWorkflowError::MatchNotFound => write!(f, "Match not found"),
            MatchWorkflowError::OwnRide => write!(f, "Cannot respond to your own ride"),
            MatchWorkflowError::NotRideOwner => write!(f, "Only the ride owner may do this"),
            MatchWorkflowError::NotParticipant => {
                write!(f, "Only a match participant may do this")
            }
            MatchWorkflowError::RideNotOpen => write!(f, "Ride is not open"),
            MatchWorkflowError::MatchNotPending => write!(f, "Match is not pending"),
            MatchWorkflowError::AlreadyFinal => {
                write!(f, "Ride already has a confirmed match")
            }
            MatchWorkflowError::AlreadyRequested => {
                write!(f, "A live request for this pair already exists")
            }
            MatchWorkflowError::IllegalTransition => write!(f, "Illegal ride status transition"),
            MatchWorkflowError::NoActiveMatch => write!(f, "Ride has no active match"),
            MatchWorkflowError::BadState => write!(f, "Match state does not permit this"),
            MatchWorkflowError::RepositoryError(msg) => write!(f, "Repository error: {}", msg),
        }
    }
}

impl std::error::Error for MatchWorkflowError {}
