pub mod accumulator;
pub mod codec;
pub mod models;
pub mod settings;
