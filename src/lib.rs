// Library target shared by the binary, integration tests and benchmarks.

pub mod app;
pub mod config;
pub mod engine;
pub mod session;
pub mod store;
