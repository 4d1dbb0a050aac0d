pub mod config;
pub mod dashboard;
pub mod duck;
pub mod fetch;
pub mod insight;
pub mod logging;
pub mod pdf;
pub mod process;
pub mod sink;
pub mod sources;
