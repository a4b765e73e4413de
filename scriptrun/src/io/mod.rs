//! Side-effecting operations: processes, PATH search, cache, config, installers.

pub mod atomic;
pub mod cache;
pub mod config;
pub mod deps;
pub mod detector;
pub mod installer;
pub mod path_search;
pub mod process;
