//! JSON extractor that validates the payload before the handler runs.

use std::borrow::Cow;
use std::collections::HashMap;

use axum::extract::{FromRequest, Request};
use derive_more::{Deref, DerefMut, From};
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationError, ValidationErrors};

use super::Json;
use crate::handler::{Error, ErrorKind};

/// [`Json`] plus [`Validate`]: rejects with `400` and a per-field message.
#[must_use]
#[derive(Debug, Clone, Copy, Default, Deref, DerefMut, From)]
pub struct ValidateJson<T>(pub T);

impl<T> ValidateJson<T> {
    /// Returns the inner validated value.
    #[inline]
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T, S> FromRequest<S> for ValidateJson<T>
where
    T: DeserializeOwned + Validate + 'static,
    S: Send + Sync,
{
    type Rejection = Error<'static>;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(data) = <Json<T> as FromRequest<S>>::from_request(req, state).await?;
        data.validate()?;
        Ok(Self(data))
    }
}

fn number_param(params: &HashMap<Cow<'static, str>, serde_json::Value>, name: &str) -> Option<u64> {
    params.get(name).and_then(serde_json::Value::as_u64)
}

fn format_validation_error(field: &str, error: &ValidationError) -> String {
    if let Some(message) = &error.message {
        return format!("Field '{field}': {message}");
    }

    match error.code.as_ref() {
        "required" => format!("Field '{field}' is required"),
        "email" => format!("Field '{field}' must be a valid email address"),
        "length" => match (number_param(&error.params, "min"), number_param(&error.params, "max")) {
            (Some(min), Some(max)) => {
                format!("Field '{field}' must be between {min} and {max} characters long")
            }
            (Some(min), None) => format!("Field '{field}' must be at least {min} characters long"),
            (None, Some(max)) => format!("Field '{field}' must be at most {max} characters long"),
            (None, None) => format!("Field '{field}' has invalid length"),
        },
        "range" => match (number_param(&error.params, "min"), number_param(&error.params, "max")) {
            (Some(min), Some(max)) => format!("Field '{field}' must be between {min} and {max}"),
            (Some(min), None) => format!("Field '{field}' must be at least {min}"),
            (None, Some(max)) => format!("Field '{field}' must be at most {max}"),
            (None, None) => format!("Field '{field}' is out of range"),
        },
        code => format!("Field '{field}' failed validation: {code}"),
    }
}

impl From<ValidationErrors> for Error<'static> {
    fn from(errors: ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, field_errors)| {
                field_errors
                    .iter()
                    .map(move |error| format_validation_error(field, error))
            })
            .collect();
        // Field order in the map is unspecified.
        messages.sort();

        let message = match messages.as_slice() {
            [] => "Validation failed".to_owned(),
            messages => messages.join(". "),
        };

        ErrorKind::BadRequest
            .with_message(message)
            .with_resource("request")
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize, Validate)]
    struct Credentials {
        #[validate(email)]
        email: String,
        #[validate(length(min = 8))]
        password: String,
    }

    #[test]
    fn field_errors_become_one_bad_request() {
        let credentials = Credentials {
            email: "not-an-email".to_owned(),
            password: "short".to_owned(),
        };

        let error = Error::from(credentials.validate().unwrap_err());

        assert_eq!(error.kind(), ErrorKind::BadRequest);
        assert_eq!(
            error.message(),
            Some(
                "Field 'email' must be a valid email address. \
                 Field 'password' must be at least 8 characters long"
            )
        );
    }

    #[derive(Debug, Deserialize, Validate)]
    struct Increment {
        #[validate(range(min = 1))]
        amount: i64,
    }

    #[test]
    fn out_of_range_field_is_named() {
        let error = Error::from(Increment { amount: 0 }.validate().unwrap_err());

        assert_eq!(error.kind(), ErrorKind::BadRequest);
        assert!(error.message().is_some_and(|message| message.contains("'amount'")));
    }

    #[test]
    fn wrapper_gives_mutable_access() {
        let mut increment = ValidateJson(Increment { amount: 1 });
        increment.amount += 2;
        assert_eq!(increment.into_inner().amount, 3);

        let mut raw = Json(vec![1_u8]);
        raw.push(2);
        assert_eq!(*raw, [1, 2]);
    }
}
