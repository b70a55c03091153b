pub mod repository_errors;
