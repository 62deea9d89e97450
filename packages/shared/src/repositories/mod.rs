pub mod errors;
pub mod match_repository;
