pub mod events;
pub mod match_record;
pub mod requests;
pub mod responses;
pub mod snapshot;
pub mod time_control;
