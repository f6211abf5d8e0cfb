pub mod btleplug_link;
pub mod protocol;
pub mod scanner;
pub mod supervisor;
