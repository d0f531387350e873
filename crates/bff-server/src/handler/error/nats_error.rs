//! Key-value store error to HTTP error conversion.
//!
//! Only reached on paths that cannot degrade, such as recording a session at
//! login. The admission path maps store errors itself.

use super::http_error::{Error as HttpError, ErrorKind};

impl From<bff_nats::Error> for HttpError<'static> {
    fn from(nats_error: bff_nats::Error) -> Self {
        let message = match nats_error {
            bff_nats::Error::Connection(_) | bff_nats::Error::Timeout { .. } => {
                "Session storage is temporarily unavailable"
            }
            bff_nats::Error::Serialization(_) => "Stored data could not be decoded",
            bff_nats::Error::InvalidConfig { .. } => "Session storage is misconfigured",
            bff_nats::Error::Operation { .. } => "Session storage operation failed",
        };

        ErrorKind::InternalServerError
            .with_message(message)
            .with_resource("session_store")
            .with_context(nats_error.to_string())
    }
}
