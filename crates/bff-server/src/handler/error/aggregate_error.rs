//! Aggregation error to HTTP error conversion.

use super::http_error::{Error as HttpError, ErrorKind};
use crate::service::AggregateError;

impl From<AggregateError> for HttpError<'static> {
    fn from(error: AggregateError) -> Self {
        let kind = if error.is_deadline_exceeded() {
            ErrorKind::DeadlineExceeded
        } else {
            ErrorKind::BadGateway
        };

        let http_error = kind.with_context(error.to_string());
        match error.task() {
            Some(task) => http_error.with_resource(task),
            None => http_error,
        }
    }
}
