//! [`Error`], [`ErrorKind`] and [`Result`].

mod aggregate_error;
mod http_error;
mod nats_error;
mod token_error;
mod upstream_error;

pub use http_error::{Error, ErrorKind, Result};
