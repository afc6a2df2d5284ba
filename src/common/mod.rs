pub mod config;
pub mod error;
pub mod responses;
pub mod utils;
