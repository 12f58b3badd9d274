// Core business logic module

pub mod threads_monitor;
