pub mod certificate;
pub mod sign;
