pub mod config;
pub mod driver;
pub mod logging;
pub mod render;
