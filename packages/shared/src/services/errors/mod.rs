pub mod chess_service_errors;
pub mod match_service_errors;
