// src/fetch/mod.rs
//! HTTP access and payload parsing for the data sources.

pub mod download;
pub mod json;
pub mod request;
pub mod xml;

pub use download::download_file;
pub use request::{build_client, build_url, get_text};
