//! tus 1.0.0 client for Supabase-style storage.
//!
//! [`TusClient`] implements [`shelfdrop_uploader::ResumableEndpoint`]
//! over `reqwest` with Bearer token authentication.

mod client;
mod config;

pub use client::TusClient;
pub use config::TusConfig;
