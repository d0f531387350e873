#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod error;
mod service;

pub mod request;
pub mod response;

#[cfg(feature = "reqwest")]
#[cfg_attr(docsrs, doc(cfg(feature = "reqwest")))]
pub mod reqwest;

#[cfg(any(test, feature = "mock"))]
#[cfg_attr(docsrs, doc(cfg(feature = "mock")))]
pub mod mock;

pub use error::{BoxedError, Error, ErrorKind, Result};
pub use request::UpstreamRequest;
pub use response::{Envelope, UpstreamResponse};
pub use service::UpstreamService;

/// Tracing target for downstream service calls.
pub const TRACING_TARGET: &str = "bff_upstream::service";

/// Core trait for calling a downstream service.
///
/// Implement this trait to plug in another transport.
#[async_trait::async_trait]
pub trait UpstreamProvider: Send + Sync {
    /// Issues `request` and returns whatever the service answered.
    ///
    /// Non-2xx statuses are returned as responses, not errors; an `Err` means
    /// no response was obtained.
    async fn call(&self, request: UpstreamRequest) -> Result<UpstreamResponse>;
}
