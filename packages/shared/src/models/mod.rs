pub mod rating;
pub mod requests;
pub mod responses;
pub mod ride;
pub mod ride_match;
pub mod status;
pub mod user;
