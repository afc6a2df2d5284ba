pub mod certificate;
pub mod conversion;
pub mod crypto;
pub mod file_store;
pub mod sign;
pub mod sign_queue;
pub mod toolchain;
pub mod verification;
