//! Request validation
//!
//! `ValidJson`, `ValidQuery` and `ValidPath` wrap the axum extractors and
//! turn every rejection into the API error envelope. Bodies and queries are
//! additionally checked through the `Validate` trait, which reports all
//! failing fields at once.

use axum::{
    extract::{FromRequest, FromRequestParts, Path, Query, Request},
    http::request::Parts,
    Json,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{de::DeserializeOwned, Serialize};

use crate::api::middleware::ApiError;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

static PINCODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{6}$").expect("valid pincode regex"));

/// One failing field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Collects field errors while checking a request
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.to_string(),
            message: message.into(),
        });
    }

    /// Character count within `min..=max`
    pub fn length(&mut self, field: &str, value: &str, min: usize, max: usize) {
        let len = value.chars().count();
        if len < min {
            if min == 1 {
                self.error(field, format!("{} is required", field));
            } else {
                self.error(field, format!("{} must be at least {} characters", field, min));
            }
        } else if len > max {
            self.error(field, format!("{} must be at most {} characters", field, max));
        }
    }

    pub fn optional_length(&mut self, field: &str, value: Option<&str>, min: usize, max: usize) {
        if let Some(value) = value {
            self.length(field, value, min, max);
        }
    }

    pub fn email(&mut self, field: &str, value: &str) {
        if !EMAIL_RE.is_match(value) {
            self.error(field, "Invalid email address");
        }
    }

    pub fn pincode(&mut self, field: &str, value: &str) {
        if !PINCODE_RE.is_match(value) {
            self.error(field, "Pincode must be 6 digits");
        }
    }

    pub fn check(&mut self, ok: bool, field: &str, message: &str) {
        if !ok {
            self.error(field, message);
        }
    }

    pub fn finish(self) -> Result<(), Vec<FieldError>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

/// Field-level checks run after deserialization
pub trait Validate {
    fn validate(&self) -> Result<(), Vec<FieldError>>;
}

fn rejection_details(field: &str, message: String) -> Vec<FieldError> {
    vec![FieldError {
        field: field.to_string(),
        message,
    }]
}

/// JSON body that deserialized and passed `Validate`
#[derive(Debug)]
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|rejection| {
            ApiError::validation(rejection_details("body", rejection.body_text()))
        })?;
        value.validate().map_err(ApiError::validation)?;
        Ok(Self(value))
    }
}

/// Query string that deserialized and passed `Validate`
#[derive(Debug)]
pub struct ValidQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ValidQuery<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| {
                ApiError::query_validation(rejection_details("query", rejection.body_text()))
            })?;
        value.validate().map_err(ApiError::query_validation)?;
        Ok(Self(value))
    }
}

/// Path parameters that deserialized
#[derive(Debug)]
pub struct ValidPath<T>(pub T);

impl<S, T> FromRequestParts<S> for ValidPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| {
                ApiError::params_validation(rejection_details("params", rejection.body_text()))
            })?;
        Ok(Self(value))
    }
}
