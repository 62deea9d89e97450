pub mod harness;
pub mod socket_client;

pub use harness::Harness;
pub use socket_client::SocketClient;
