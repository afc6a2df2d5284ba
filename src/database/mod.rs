pub mod connection;
pub mod models;
pub mod queries;
pub mod repository;
