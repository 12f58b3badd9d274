// Command handlers module
pub mod attach;
pub mod demo;
pub mod monitor_options;
