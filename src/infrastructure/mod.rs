pub mod bluetooth;
pub mod logging;
pub mod mock;
pub mod radio;
