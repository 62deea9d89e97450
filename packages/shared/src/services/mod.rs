pub mod chess_service;
pub mod clock_service;
pub mod code_generator;
pub mod errors;
pub mod expiry_sweeper;
pub mod match_lock;
pub mod match_service;
pub mod room_broadcaster;
pub mod session_attachment;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
