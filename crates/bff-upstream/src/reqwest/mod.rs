//! Reqwest-based HTTP provider for downstream calls.
//!
//! # Example
//!
//! ```rust,ignore
//! use bff_upstream::reqwest::{ReqwestClient, ReqwestConfig};
//! use bff_upstream::UpstreamService;
//!
//! let client = ReqwestClient::new("http://user-service:8080", ReqwestConfig::default())?;
//! let identity: UpstreamService = client.into_service("identity");
//! ```

mod client;
mod config;
mod error;

pub use client::ReqwestClient;
pub use config::ReqwestConfig;
pub use error::{Error, Result};

/// Tracing target for reqwest client operations.
pub const TRACING_TARGET: &str = "bff_upstream::reqwest";
