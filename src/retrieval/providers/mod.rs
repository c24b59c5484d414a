// src/retrieval/providers/mod.rs
pub mod directory;
pub mod http;

pub use directory::DirectoryProvider;
pub use http::HttpProvider;
