pub mod oneshot;
pub mod streaming;
