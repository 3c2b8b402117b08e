pub mod driver;
pub mod playback;
