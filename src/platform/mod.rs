// Platform-specific code module

pub mod proc_threads;

pub use proc_threads::{host_parallelism, ProcThreads};
