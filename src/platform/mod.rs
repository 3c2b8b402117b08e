pub mod probe;
pub mod process;
