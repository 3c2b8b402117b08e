pub mod config;
pub mod error;
pub mod media;
pub mod platform;
pub mod sync;
pub mod tasks;
