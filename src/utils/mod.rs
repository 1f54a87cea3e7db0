pub mod cache;
pub mod hash;
pub mod release;
