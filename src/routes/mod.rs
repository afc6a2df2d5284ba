pub mod certificates;
pub mod sign;
pub mod web;
